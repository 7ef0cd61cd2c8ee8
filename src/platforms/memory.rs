// src/platforms/memory.rs - In-process transport that records and logs every call

use async_trait::async_trait;
use log::info;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::ChatTransport;
use crate::error::TransportError;
use crate::types::{ChatId, MessageId, UserId};

/// Which kind of call a `TransportCall` is, used for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Restrict,
    Unrestrict,
    Delete,
    Ban,
    Unban,
    SendText,
    SendNotice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Restrict { chat_id: ChatId, user_id: UserId, duration: Duration },
    Unrestrict { chat_id: ChatId, user_id: UserId },
    Delete { chat_id: ChatId, message_id: MessageId },
    Ban { chat_id: ChatId, user_id: UserId },
    Unban { chat_id: ChatId, user_id: UserId },
    SendText { chat_id: ChatId, text: String },
    SendNotice { chat_id: ChatId, text: String },
}

impl TransportCall {
    pub fn kind(&self) -> CallKind {
        match self {
            TransportCall::Restrict { .. } => CallKind::Restrict,
            TransportCall::Unrestrict { .. } => CallKind::Unrestrict,
            TransportCall::Delete { .. } => CallKind::Delete,
            TransportCall::Ban { .. } => CallKind::Ban,
            TransportCall::Unban { .. } => CallKind::Unban,
            TransportCall::SendText { .. } => CallKind::SendText,
            TransportCall::SendNotice { .. } => CallKind::SendNotice,
        }
    }
}

/// Transport that keeps every call in memory. Calls are recorded even when they fail,
/// so tests can assert on attempts as well as on outcomes.
pub struct RecordingTransport {
    name: String,
    calls: Mutex<Vec<TransportCall>>,
    failing: Mutex<HashSet<CallKind>>,
    failing_chats: Mutex<HashSet<ChatId>>,
    next_message_id: AtomicI64,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            failing_chats: Mutex::new(HashSet::new()),
            next_message_id: AtomicI64::new(10_000),
        }
    }

    /// Make every call of this kind fail with a permission error
    pub async fn fail_on(&self, kind: CallKind) {
        self.failing.lock().await.insert(kind);
    }

    /// Make every call addressed to this chat fail with a network error
    pub async fn fail_chat(&self, chat_id: ChatId) {
        self.failing_chats.lock().await.insert(chat_id);
    }

    pub async fn heal(&self) {
        self.failing.lock().await.clear();
        self.failing_chats.lock().await.clear();
    }

    pub async fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().await.clone()
    }

    pub async fn calls_of(&self, kind: CallKind) -> Vec<TransportCall> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.kind() == kind)
            .cloned()
            .collect()
    }

    async fn record(&self, chat_id: ChatId, call: TransportCall) -> Result<(), TransportError> {
        let kind = call.kind();
        info!("[{}] {:?}", self.name, call);
        self.calls.lock().await.push(call);

        if self.failing_chats.lock().await.contains(&chat_id) {
            return Err(TransportError::Network(format!("chat {} unreachable", chat_id)));
        }
        if self.failing.lock().await.contains(&kind) {
            return Err(TransportError::PermissionDenied(format!("{:?}", kind).to_lowercase()));
        }
        Ok(())
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn restrict(&self, chat_id: ChatId, user_id: UserId, duration: Duration) -> Result<(), TransportError> {
        self.record(chat_id, TransportCall::Restrict { chat_id, user_id, duration }).await
    }

    async fn unrestrict(&self, chat_id: ChatId, user_id: UserId) -> Result<(), TransportError> {
        self.record(chat_id, TransportCall::Unrestrict { chat_id, user_id }).await
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), TransportError> {
        self.record(chat_id, TransportCall::Delete { chat_id, message_id }).await
    }

    async fn ban(&self, chat_id: ChatId, user_id: UserId) -> Result<(), TransportError> {
        self.record(chat_id, TransportCall::Ban { chat_id, user_id }).await
    }

    async fn unban(&self, chat_id: ChatId, user_id: UserId) -> Result<(), TransportError> {
        self.record(chat_id, TransportCall::Unban { chat_id, user_id }).await
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId, TransportError> {
        self.record(chat_id, TransportCall::SendText { chat_id, text: text.to_string() }).await?;
        Ok(self.next_message_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn send_notice(&self, chat_id: ChatId, text: &str) -> Result<(), TransportError> {
        self.record(chat_id, TransportCall::SendNotice { chat_id, text: text.to_string() }).await
    }

    fn platform_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_and_injects_failures() {
        let transport = RecordingTransport::new();

        let first = transport.send_text(1, "hello").await.unwrap();
        let second = transport.send_text(1, "again").await.unwrap();
        assert_eq!(second, first + 1);

        transport.fail_on(CallKind::Ban).await;
        assert!(matches!(transport.ban(1, 2).await, Err(TransportError::PermissionDenied(_))));

        transport.fail_chat(9).await;
        assert!(matches!(transport.delete_message(9, 5).await, Err(TransportError::Network(_))));

        // failed calls are still recorded as attempts
        assert_eq!(transport.calls().await.len(), 4);
        assert_eq!(transport.calls_of(CallKind::SendText).await.len(), 2);

        transport.heal().await;
        assert!(transport.ban(1, 2).await.is_ok());
    }
}
