// src/bot/delayed_queue.rs - Delayed-action store shared by the scheduled-message and auto-delete queues

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::fmt;
use tokio::sync::RwLock;

use crate::error::{ActionStatus, TransportError};
use crate::platforms::ChatTransport;
use crate::types::ChatId;

/// The action a queued entry performs when it comes due
#[async_trait]
pub trait DuePayload: Clone + Send + Sync + 'static {
    /// Label used in logs
    const KIND: &'static str;

    async fn fire(&self, chat_id: ChatId, transport: &dyn ChatTransport) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId {
    pub chat_id: ChatId,
    pub ordinal: u64,
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.chat_id, self.ordinal)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEntry<T> {
    pub id: EntryId,
    pub fire_at: DateTime<Utc>,
    pub payload: T,
}

/// Result of firing one due entry during a sweep
#[derive(Debug, Clone)]
pub struct SweepOutcome<T> {
    pub entry: QueuedEntry<T>,
    pub status: ActionStatus,
}

struct QueueInner<T> {
    next_ordinal: u64,
    entries: Vec<QueuedEntry<T>>,
}

/// Unsorted store of entries with absolute fire times. A sweep claims every due entry
/// under the write lock before firing any of them, so an entry is removed exactly once
/// and attempted at most once even when sweeps overlap.
pub struct DelayedQueue<T: DuePayload> {
    inner: RwLock<QueueInner<T>>,
}

impl<T: DuePayload> DelayedQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(QueueInner {
                next_ordinal: 1,
                entries: Vec::new(),
            }),
        }
    }

    pub async fn enqueue(&self, chat_id: ChatId, fire_at: DateTime<Utc>, payload: T) -> EntryId {
        let mut inner = self.inner.write().await;
        let id = EntryId {
            chat_id,
            ordinal: inner.next_ordinal,
        };
        inner.next_ordinal += 1;
        inner.entries.push(QueuedEntry { id, fire_at, payload });
        debug!("Queued {} {} for {}", T::KIND, id, fire_at.to_rfc3339());
        id
    }

    /// Fire and remove every entry with `fire_at <= now`, in insertion order.
    /// Entries are dropped whether or not their action succeeded.
    pub async fn sweep(&self, now: DateTime<Utc>, transport: &dyn ChatTransport) -> Vec<SweepOutcome<T>> {
        let due = self.claim_due(now).await;
        if due.is_empty() {
            return Vec::new();
        }

        let mut outcomes = Vec::with_capacity(due.len());
        for entry in due {
            let result = entry.payload.fire(entry.id.chat_id, transport).await;
            match &result {
                Ok(()) => debug!("Fired {} {}", T::KIND, entry.id),
                Err(e) => warn!("Failed to fire {} {}: {}", T::KIND, entry.id, e),
            }
            outcomes.push(SweepOutcome {
                status: ActionStatus::from_result(&result),
                entry,
            });
        }

        let failed = outcomes.iter().filter(|o| !o.status.is_applied()).count();
        info!("Swept {} due {} entries ({} failed)", outcomes.len(), T::KIND, failed);
        outcomes
    }

    async fn claim_due(&self, now: DateTime<Utc>) -> Vec<QueuedEntry<T>> {
        let mut inner = self.inner.write().await;
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.entries)
            .into_iter()
            .partition(|entry| entry.fire_at <= now);
        inner.entries = pending;
        due
    }

    pub async fn cancel(&self, id: EntryId) -> bool {
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        inner.entries.retain(|entry| entry.id != id);
        before != inner.entries.len()
    }

    pub async fn pending_for(&self, chat_id: ChatId) -> Vec<QueuedEntry<T>> {
        self.inner
            .read()
            .await
            .entries
            .iter()
            .filter(|entry| entry.id.chat_id == chat_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// Every entry, in insertion order
    pub async fn export(&self) -> Vec<QueuedEntry<T>> {
        self.inner.read().await.entries.clone()
    }

    /// Replace the queue contents. Ordinals are reassigned in the given order.
    pub async fn restore(&self, entries: Vec<(ChatId, DateTime<Utc>, T)>) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.next_ordinal = 1;
        for (chat_id, fire_at, payload) in entries {
            let id = EntryId {
                chat_id,
                ordinal: inner.next_ordinal,
            };
            inner.next_ordinal += 1;
            inner.entries.push(QueuedEntry { id, fire_at, payload });
        }
    }
}

impl<T: DuePayload> Default for DelayedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::{CallKind, RecordingTransport, TransportCall};
    use chrono::Duration;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct Ping(&'static str);

    #[async_trait]
    impl DuePayload for Ping {
        const KIND: &'static str = "ping";

        async fn fire(&self, chat_id: ChatId, transport: &dyn ChatTransport) -> Result<(), TransportError> {
            transport.send_notice(chat_id, self.0).await
        }
    }

    #[tokio::test]
    async fn test_due_entry_fires_once_and_is_removed() {
        let queue = DelayedQueue::new();
        let transport = RecordingTransport::new();
        let now = Utc::now();

        queue.enqueue(1, now + Duration::seconds(2), Ping("later")).await;
        queue.enqueue(1, now + Duration::seconds(60), Ping("much later")).await;
        assert_eq!(queue.len().await, 2);

        assert!(queue.sweep(now, &transport).await.is_empty());
        assert_eq!(queue.len().await, 2);

        let fired = queue.sweep(now + Duration::seconds(2), &transport).await;
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].entry.payload, Ping("later"));
        assert_eq!(queue.len().await, 1);

        assert!(queue.sweep(now + Duration::seconds(3), &transport).await.is_empty());
        assert_eq!(transport.calls_of(CallKind::SendNotice).await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_entries_are_dropped_and_do_not_block_others() {
        let queue = DelayedQueue::new();
        let transport = RecordingTransport::new();
        transport.fail_chat(2).await;
        let now = Utc::now();

        queue.enqueue(1, now, Ping("a")).await;
        queue.enqueue(2, now, Ping("b")).await;
        queue.enqueue(3, now, Ping("c")).await;

        let outcomes = queue.sweep(now, &transport).await;
        let statuses: Vec<bool> = outcomes.iter().map(|o| o.status.is_applied()).collect();
        assert_eq!(statuses, vec![true, false, true]);
        assert!(queue.is_empty().await);

        // insertion order is kept within a pass
        let chats: Vec<ChatId> = transport
            .calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                TransportCall::SendNotice { chat_id, .. } => Some(chat_id),
                _ => None,
            })
            .collect();
        assert_eq!(chats, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_never_double_fire() {
        let queue = Arc::new(DelayedQueue::new());
        let transport = Arc::new(RecordingTransport::new());
        let now = Utc::now();
        for _ in 0..50 {
            queue.enqueue(1, now, Ping("x")).await;
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            let transport = transport.clone();
            handles.push(tokio::spawn(async move {
                queue.sweep(now, transport.as_ref()).await.len()
            }));
        }

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }
        assert_eq!(total, 50);
        assert_eq!(transport.calls().await.len(), 50);
    }

    #[tokio::test]
    async fn test_cancel_pending_and_restore() {
        let queue = DelayedQueue::new();
        let now = Utc::now();
        let first = queue.enqueue(1, now, Ping("a")).await;
        queue.enqueue(2, now, Ping("b")).await;

        assert_eq!(queue.pending_for(2).await.len(), 1);
        assert!(queue.cancel(first).await);
        assert!(!queue.cancel(first).await);
        assert!(queue.pending_for(1).await.is_empty());

        queue.restore(vec![(5, now, Ping("c")), (6, now, Ping("d"))]).await;
        let exported = queue.export().await;
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[0].id, EntryId { chat_id: 5, ordinal: 1 });
        assert_eq!(exported[1].payload, Ping("d"));
    }
}
