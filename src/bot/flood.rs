// src/bot/flood.rs - Rate-limit decisions on top of the activity window

use chrono::{DateTime, Utc};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

use super::activity::ActivityWindow;
use crate::config::FloodConfig;
use crate::types::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodDecision {
    None,
    Mute { duration: Duration },
}

/// Mutes a user once more than `threshold` messages land inside the window.
/// The window is not cleared here; admin exemption is the dispatcher's job.
pub struct FloodGuard {
    threshold: usize,
    mute_duration: Duration,
    window: Arc<ActivityWindow>,
}

impl FloodGuard {
    pub fn new(threshold: usize, mute_duration: Duration, window: Arc<ActivityWindow>) -> Self {
        Self {
            threshold,
            mute_duration,
            window,
        }
    }

    pub fn from_config(config: &FloodConfig, window: Arc<ActivityWindow>) -> Self {
        Self::new(config.threshold, config.mute_duration(), window)
    }

    pub async fn evaluate(&self, user_id: UserId, now: DateTime<Utc>) -> FloodDecision {
        self.window.record(user_id, now).await;
        let count = self.window.count(user_id, now).await;

        if count > self.threshold {
            debug!("User {} sent {} messages inside the flood window (threshold {})",
                   user_id, count, self.threshold);
            FloodDecision::Mute { duration: self.mute_duration }
        } else {
            FloodDecision::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> FloodGuard {
        let window = Arc::new(ActivityWindow::new(chrono::Duration::seconds(3)));
        FloodGuard::new(5, Duration::from_secs(600), window)
    }

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + chrono::Duration::milliseconds(ms)
    }

    #[tokio::test]
    async fn test_sixth_message_in_window_mutes() {
        let guard = guard();
        for i in 0..5 {
            assert_eq!(guard.evaluate(7, at(i * 400)).await, FloodDecision::None);
        }
        assert_eq!(
            guard.evaluate(7, at(2_400)).await,
            FloodDecision::Mute { duration: Duration::from_secs(600) }
        );
    }

    #[tokio::test]
    async fn test_spread_out_messages_do_not_mute() {
        let guard = guard();
        for i in 0..5 {
            assert_eq!(guard.evaluate(7, at(i * 1_000)).await, FloodDecision::None);
        }
        // a long steady stream never exceeds the threshold either
        for i in 5..20 {
            assert_eq!(guard.evaluate(7, at(i * 1_000)).await, FloodDecision::None);
        }
    }

    #[tokio::test]
    async fn test_users_are_counted_separately() {
        let guard = guard();
        for i in 0..5 {
            guard.evaluate(1, at(i * 100)).await;
            guard.evaluate(2, at(i * 100)).await;
        }
        assert_eq!(guard.evaluate(3, at(600)).await, FloodDecision::None);
        assert!(matches!(guard.evaluate(1, at(600)).await, FloodDecision::Mute { .. }));
    }
}
