// src/bot/scheduled.rs - Messages queued for later delivery

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::delayed_queue::{DelayedQueue, DuePayload};
use crate::error::TransportError;
use crate::platforms::ChatTransport;
use crate::types::ChatId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledMessage {
    pub text: String,
}

impl ScheduledMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl DuePayload for ScheduledMessage {
    const KIND: &'static str = "scheduled message";

    async fn fire(&self, chat_id: ChatId, transport: &dyn ChatTransport) -> Result<(), TransportError> {
        transport.send_text(chat_id, &self.text).await.map(|_| ())
    }
}

pub type ScheduledMessageQueue = DelayedQueue<ScheduledMessage>;
