use async_trait::async_trait;
use std::time::Duration;

use crate::error::TransportError;
use crate::types::{ChatId, MessageId, UserId};

pub mod memory;

/// Side-effecting calls the engine requests from the chat platform.
/// Every call is best effort; failures come back as `TransportError` and are never fatal.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Revoke the user's right to send messages for `duration`
    async fn restrict(&self, chat_id: ChatId, user_id: UserId, duration: Duration) -> Result<(), TransportError>;

    /// Give back the right to send messages
    async fn unrestrict(&self, chat_id: ChatId, user_id: UserId) -> Result<(), TransportError>;

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), TransportError>;

    async fn ban(&self, chat_id: ChatId, user_id: UserId) -> Result<(), TransportError>;

    /// Lift a ban so the user may rejoin
    async fn unban(&self, chat_id: ChatId, user_id: UserId) -> Result<(), TransportError>;

    /// Send a regular message, returning the id of the posted message
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId, TransportError>;

    /// Send a moderation notice (rendered differently by some platforms)
    async fn send_notice(&self, chat_id: ChatId, text: &str) -> Result<(), TransportError>;

    /// Get the platform identifier (e.g., "telegram", "memory")
    fn platform_name(&self) -> &str;
}
