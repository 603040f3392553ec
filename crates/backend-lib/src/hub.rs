// ============================
// crates/backend-lib/src/hub.rs
// ============================
//! Directory of live rooms.
use crate::room::Room;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Owns the `key -> Room` map. Rooms are created lazily on first join and
/// removed once their last member departs. `get_or_create` and
/// `delete_if_empty` take the same write lock, so an empty-check can never
/// race a new joiner into a dangling room.
pub struct Hub {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    broadcast_depth: usize,
}

impl Hub {
    pub fn new(broadcast_depth: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            broadcast_depth,
        }
    }

    /// Read-only probe used by the lightweight /exists endpoint.
    pub fn exists(&self, key: &str) -> bool {
        self.rooms.read().unwrap().contains_key(key)
    }

    /// Return the live room for `key`, starting one if necessary. At most
    /// one room instance exists per key at any time.
    pub fn get_or_create(&self, key: &str) -> Arc<Room> {
        let mut rooms = self.rooms.write().unwrap();
        if let Some(room) = rooms.get(key) {
            return room.clone();
        }
        let room = Room::spawn(key, self.broadcast_depth);
        rooms.insert(key.to_string(), room.clone());
        room
    }

    /// Drop the mapping if the room has no members left.
    pub fn delete_if_empty(&self, key: &str) {
        let mut rooms = self.rooms.write().unwrap();
        if let Some(room) = rooms.get(key) {
            if room.size() == 0 {
                rooms.remove(key);
            }
        }
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.read().unwrap().len()
    }
}
