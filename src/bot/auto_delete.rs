// src/bot/auto_delete.rs - Messages queued for later deletion

use async_trait::async_trait;

use super::delayed_queue::{DelayedQueue, DuePayload};
use crate::error::TransportError;
use crate::platforms::ChatTransport;
use crate::types::{ChatId, MessageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoDeleteTarget {
    pub message_id: MessageId,
}

#[async_trait]
impl DuePayload for AutoDeleteTarget {
    const KIND: &'static str = "auto-delete";

    async fn fire(&self, chat_id: ChatId, transport: &dyn ChatTransport) -> Result<(), TransportError> {
        transport.delete_message(chat_id, self.message_id).await
    }
}

/// Keyed by entry id, so one chat may hold any number of pending deletions
pub type AutoDeleteQueue = DelayedQueue<AutoDeleteTarget>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::{CallKind, RecordingTransport, TransportCall};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_same_chat_holds_several_deletions() {
        let queue = AutoDeleteQueue::new();
        let transport = RecordingTransport::new();
        let now = Utc::now();

        queue.enqueue(5, now + Duration::seconds(10), AutoDeleteTarget { message_id: 1 }).await;
        queue.enqueue(5, now + Duration::seconds(20), AutoDeleteTarget { message_id: 2 }).await;
        assert_eq!(queue.pending_for(5).await.len(), 2);

        queue.sweep(now + Duration::seconds(10), &transport).await;
        assert_eq!(
            transport.calls().await,
            vec![TransportCall::Delete { chat_id: 5, message_id: 1 }]
        );

        transport.fail_on(CallKind::Delete).await;
        let outcomes = queue.sweep(now + Duration::seconds(30), &transport).await;
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].status.is_applied());
        assert!(queue.is_empty().await);
    }
}
