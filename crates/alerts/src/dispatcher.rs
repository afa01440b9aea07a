//! Notification delivery with edit-then-send fallback.

use crate::transport::{ActionButton, DispatchError, NotificationTransport};
use movewatch_core::MessageHandle;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of a successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Message now showing the notification.
    pub handle: MessageHandle,
    /// True if an existing message was edited instead of sending a new one.
    pub edited: bool,
}

/// Sends notifications through a [`NotificationTransport`].
///
/// Delivery is a two-step protocol:
/// 1. With a previous message in the same chat (and editing enabled),
///    edit it in place.
/// 2. If there is no such message or the edit fails, send a new message.
#[derive(Clone)]
pub struct NotificationDispatcher {
    transport: Arc<dyn NotificationTransport>,
    edit_previous: bool,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn NotificationTransport>, edit_previous: bool) -> Self {
        Self {
            transport,
            edit_previous,
        }
    }

    pub fn transport(&self) -> &Arc<dyn NotificationTransport> {
        &self.transport
    }

    /// Deliver `text` to `chat_id`, editing `previous` when possible.
    pub async fn deliver(
        &self,
        chat_id: i64,
        previous: Option<MessageHandle>,
        text: &str,
        actions: &[ActionButton],
    ) -> Result<Delivery, DispatchError> {
        if let Some(handle) = previous.filter(|h| self.edit_previous && h.is_in_chat(chat_id)) {
            match self.transport.edit(chat_id, &handle, text, actions).await {
                Ok(()) => {
                    debug!(chat_id = chat_id, message = %handle, "Edited message");
                    return Ok(Delivery {
                        handle,
                        edited: true,
                    });
                }
                Err(e) => {
                    warn!(
                        chat_id = chat_id,
                        message = %handle,
                        error = %e,
                        "Edit failed, sending new message"
                    );
                }
            }
        }

        let handle = self.transport.send(chat_id, text, actions).await?;
        debug!(chat_id = chat_id, message = %handle, "Sent message");
        Ok(Delivery {
            handle,
            edited: false,
        })
    }

    /// Send a plain message without buttons or edit fallback.
    pub async fn announce(&self, chat_id: i64, text: &str) -> Result<MessageHandle, DispatchError> {
        self.transport.send(chat_id, text, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use pretty_assertions::assert_eq;

    const CHAT: i64 = -1001;

    fn dispatcher(edit_previous: bool) -> (Arc<MockTransport>, NotificationDispatcher) {
        let transport = Arc::new(MockTransport::new());
        let dispatcher = NotificationDispatcher::new(transport.clone(), edit_previous);
        (transport, dispatcher)
    }

    #[tokio::test]
    async fn test_send_without_previous() {
        let (transport, dispatcher) = dispatcher(true);
        let buttons = vec![ActionButton::new("ADA", "req_ADA")];

        let delivery = dispatcher.deliver(CHAT, None, "hello", &buttons).await.unwrap();
        assert!(!delivery.edited);
        assert_eq!(delivery.handle.chat_id, CHAT);

        let messages = transport.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "hello");
        assert_eq!(messages[0].actions, buttons);
    }

    #[tokio::test]
    async fn test_edit_previous_in_same_chat() {
        let (transport, dispatcher) = dispatcher(true);
        let first = dispatcher.deliver(CHAT, None, "one", &[]).await.unwrap();

        let second = dispatcher
            .deliver(CHAT, Some(first.handle), "two", &[])
            .await
            .unwrap();
        assert!(second.edited);
        assert_eq!(second.handle, first.handle);
        assert_eq!(transport.sent_count(), 1);
        assert_eq!(transport.edit_count(), 1);
    }

    #[tokio::test]
    async fn test_edit_failure_falls_back_to_send() {
        let (transport, dispatcher) = dispatcher(true);
        let first = dispatcher.deliver(CHAT, None, "one", &[]).await.unwrap();
        transport.set_fail_edit(true);

        let second = dispatcher
            .deliver(CHAT, Some(first.handle), "two", &[])
            .await
            .unwrap();
        assert!(!second.edited);
        assert_ne!(second.handle, first.handle);
        assert_eq!(transport.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_previous_in_other_chat_is_not_edited() {
        let (transport, dispatcher) = dispatcher(true);
        let other = MessageHandle::new(555, 9);

        let delivery = dispatcher.deliver(CHAT, Some(other), "x", &[]).await.unwrap();
        assert!(!delivery.edited);
        assert_eq!(transport.edit_count(), 0);
    }

    #[tokio::test]
    async fn test_editing_disabled_always_sends() {
        let (transport, dispatcher) = dispatcher(false);
        let first = dispatcher.deliver(CHAT, None, "one", &[]).await.unwrap();
        dispatcher
            .deliver(CHAT, Some(first.handle), "two", &[])
            .await
            .unwrap();
        assert_eq!(transport.sent_count(), 2);
        assert_eq!(transport.edit_count(), 0);
    }

    #[tokio::test]
    async fn test_send_failure_is_reported() {
        let (transport, dispatcher) = dispatcher(true);
        transport.set_fail_send(true);
        transport.set_fail_edit(true);

        let result = dispatcher
            .deliver(CHAT, Some(MessageHandle::new(CHAT, 1)), "x", &[])
            .await;
        assert!(matches!(result, Err(DispatchError::Rejected(_))));
        assert!(transport.messages().is_empty());
    }
}
