// ============================
// crates/backend-lib/src/messages.rs
// ============================
//! Wire-level chat message envelope.
//!
//! Every WebSocket frame carries one JSON object of this shape. The server
//! never interprets `body`; frames that do not parse as an envelope are
//! relayed verbatim.

use serde::{Deserialize, Serialize};

/// Username stamped on server-generated notices.
pub const SYSTEM_USER: &str = "system";

const RATE_LIMIT_BODY: &str =
    "You're sending messages too quickly. Please wait a moment and try again.";

/// One chat frame. All fields default so partially filled client payloads
/// still parse; the server completes them before fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub ts: i64,
}

impl ChatMessage {
    /// The throttling notice delivered only to the offending connection.
    pub fn rate_limit_notice(room: &str, now_ts: i64) -> Self {
        Self {
            room: room.to_string(),
            user: SYSTEM_USER.to_string(),
            body: RATE_LIMIT_BODY.to_string(),
            ts: now_ts,
        }
    }

    pub fn encode(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// Prepare an inbound payload for broadcast.
///
/// JSON envelopes get `user` overwritten with the authenticated username
/// (clients cannot spoof authorship), and `ts`/`room` filled when absent.
/// Anything that does not parse as an envelope passes through untouched.
pub fn rewrite_envelope(payload: &str, username: &str, room_key: &str, now_ts: i64) -> String {
    match serde_json::from_str::<ChatMessage>(payload) {
        Ok(mut message) => {
            if message.ts == 0 {
                message.ts = now_ts;
            }
            if message.room.is_empty() {
                message.room = room_key.to_string();
            }
            message.user = username.to_string();
            message.encode().unwrap_or_else(|| payload.to_string())
        },
        Err(_) => payload.to_string(),
    }
}
