// ============================
// crates/backend-lib/src/presence.rs
// ============================
//! Per-user active WebSocket connection counts.
use std::collections::HashMap;
use std::sync::Mutex;

/// A user is online while at least one of their connections is live.
/// Entries are removed as soon as the count returns to zero.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    online: Mutex<HashMap<i64, u32>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more live connection, returning the new count.
    pub fn increment(&self, user_id: i64) -> u32 {
        let mut online = self.online.lock().unwrap();
        let count = online.entry(user_id).or_insert(0);
        *count += 1;
        *count
    }

    /// Record one connection gone, returning the remaining count.
    pub fn decrement(&self, user_id: i64) -> u32 {
        let mut online = self.online.lock().unwrap();
        match online.get_mut(&user_id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                *count
            },
            Some(_) => {
                online.remove(&user_id);
                0
            },
            None => 0,
        }
    }

    pub fn online(&self, user_id: i64) -> bool {
        self.online.lock().unwrap().contains_key(&user_id)
    }

    /// Number of distinct users currently online.
    pub fn active_users(&self) -> usize {
        self.online.lock().unwrap().len()
    }
}
