//! Chat message identifiers shared between the engine and the transport.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a delivered chat message, used to edit it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    /// Chat the message lives in
    pub chat_id: i64,
    /// Message id within that chat
    pub message_id: i32,
}

impl MessageHandle {
    pub fn new(chat_id: i64, message_id: i32) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }

    /// Check if this message belongs to the given chat.
    #[inline]
    pub fn is_in_chat(&self, chat_id: i64) -> bool {
        self.chat_id == chat_id
    }
}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.message_id)
    }
}
