// src/bot/activity.rs - Per-user sliding window of message timestamps

use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::types::UserId;

/// Timestamps are kept while `now - ts <= window`. Pruning happens lazily on every access.
pub struct ActivityWindow {
    window: Duration,
    timestamps: RwLock<HashMap<UserId, Vec<DateTime<Utc>>>>,
}

impl ActivityWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            timestamps: RwLock::new(HashMap::new()),
        }
    }

    /// Append a timestamp for the user and return how many remain in the window
    pub async fn record(&self, user_id: UserId, now: DateTime<Utc>) -> usize {
        let mut guard = self.timestamps.write().await;
        let entries = guard.entry(user_id).or_default();
        entries.push(now);
        Self::prune(entries, now, self.window);
        entries.len()
    }

    /// Number of timestamps left after pruning
    pub async fn count(&self, user_id: UserId, now: DateTime<Utc>) -> usize {
        let mut guard = self.timestamps.write().await;
        match guard.get_mut(&user_id) {
            Some(entries) => {
                Self::prune(entries, now, self.window);
                entries.len()
            }
            None => 0,
        }
    }

    pub async fn clear(&self, user_id: UserId) -> bool {
        self.timestamps.write().await.remove(&user_id).is_some()
    }

    /// Drop users whose window has emptied; returns how many were dropped
    pub async fn prune_idle(&self, now: DateTime<Utc>) -> usize {
        let mut guard = self.timestamps.write().await;
        let before = guard.len();
        guard.retain(|_, entries| {
            Self::prune(entries, now, self.window);
            !entries.is_empty()
        });
        let dropped = before - guard.len();
        if dropped > 0 {
            debug!("Dropped {} idle activity windows", dropped);
        }
        dropped
    }

    pub async fn tracked_users(&self) -> usize {
        self.timestamps.read().await.len()
    }

    fn prune(entries: &mut Vec<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) {
        entries.retain(|ts| now.signed_duration_since(*ts) <= window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + Duration::milliseconds(ms)
    }

    #[tokio::test]
    async fn test_window_prunes_old_entries() {
        let window = ActivityWindow::new(Duration::seconds(3));

        assert_eq!(window.record(1, at(0)).await, 1);
        assert_eq!(window.record(1, at(1_000)).await, 2);
        // exactly on the boundary is still inside
        assert_eq!(window.count(1, at(3_000)).await, 2);
        assert_eq!(window.count(1, at(3_001)).await, 1);
        assert_eq!(window.count(1, at(10_000)).await, 0);

        // pruning is idempotent
        assert_eq!(window.count(1, at(10_000)).await, 0);
        assert_eq!(window.count(99, at(0)).await, 0);
    }

    #[tokio::test]
    async fn test_users_are_independent_and_idle_ones_dropped() {
        let window = ActivityWindow::new(Duration::seconds(3));
        window.record(1, at(0)).await;
        window.record(2, at(5_000)).await;
        assert_eq!(window.tracked_users().await, 2);

        assert_eq!(window.prune_idle(at(6_000)).await, 1);
        assert_eq!(window.tracked_users().await, 1);
        assert_eq!(window.count(2, at(6_000)).await, 1);

        assert!(window.clear(2).await);
        assert!(!window.clear(2).await);
    }
}
