//! Chat transport abstraction.

use async_trait::async_trait;
use movewatch_core::MessageHandle;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
    #[error("Message {0} cannot be edited in chat {1}")]
    ForeignMessage(MessageHandle, i64),
    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

/// Inline button attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub label: String,
    /// Payload delivered back when the button is pressed.
    pub callback_data: String,
}

impl ActionButton {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Trait for chat clients able to send and edit HTML messages.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Send a new message; returns a handle to edit it later.
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        actions: &[ActionButton],
    ) -> Result<MessageHandle, DispatchError>;

    /// Replace the text and buttons of an existing message.
    async fn edit(
        &self,
        chat_id: i64,
        handle: &MessageHandle,
        text: &str,
        actions: &[ActionButton],
    ) -> Result<(), DispatchError>;
}

/// A message as seen by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub handle: MessageHandle,
    pub text: String,
    pub actions: Vec<ActionButton>,
    pub edited: bool,
}

/// Mock transport for testing.
#[derive(Default)]
pub struct MockTransport {
    messages: Mutex<Vec<SentMessage>>,
    next_id: AtomicI32,
    /// Make every send fail.
    pub fail_send: AtomicBool,
    /// Make every edit fail.
    pub fail_edit: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(1),
            ..Default::default()
        }
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_edit(&self, fail: bool) {
        self.fail_edit.store(fail, Ordering::SeqCst);
    }

    /// Every successful send and edit, in order.
    pub fn messages(&self) -> Vec<SentMessage> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn sent_count(&self) -> usize {
        self.messages().iter().filter(|m| !m.edited).count()
    }

    pub fn edit_count(&self) -> usize {
        self.messages().iter().filter(|m| m.edited).count()
    }

    fn record(&self, message: SentMessage) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }
}

#[async_trait]
impl NotificationTransport for MockTransport {
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        actions: &[ActionButton],
    ) -> Result<MessageHandle, DispatchError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(DispatchError::Rejected("mock send failure".to_string()));
        }
        let handle = MessageHandle::new(chat_id, self.next_id.fetch_add(1, Ordering::SeqCst));
        self.record(SentMessage {
            handle,
            text: text.to_string(),
            actions: actions.to_vec(),
            edited: false,
        });
        Ok(handle)
    }

    async fn edit(
        &self,
        chat_id: i64,
        handle: &MessageHandle,
        text: &str,
        actions: &[ActionButton],
    ) -> Result<(), DispatchError> {
        if self.fail_edit.load(Ordering::SeqCst) {
            return Err(DispatchError::Rejected("mock edit failure".to_string()));
        }
        if !handle.is_in_chat(chat_id) {
            return Err(DispatchError::ForeignMessage(*handle, chat_id));
        }
        self.record(SentMessage {
            handle: *handle,
            text: text.to_string(),
            actions: actions.to_vec(),
            edited: true,
        });
        Ok(())
    }
}
