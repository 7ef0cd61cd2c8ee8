// src/bot/state.rs - Single owned store for every shared moderation map

use log::info;
use std::sync::Arc;

use super::activity::ActivityWindow;
use super::auto_delete::AutoDeleteQueue;
use super::gban::GlobalBanRegistry;
use super::notes::NoteBook;
use super::scheduled::{ScheduledMessage, ScheduledMessageQueue};
use super::snapshot::{ScheduledRecord, StateSnapshot};
use super::stats::{MessageStats, ReputationBoard};
use super::warns::WarnLedger;
use crate::config::EngineConfig;

/// Each component guards its own map; the store hands out `Arc`s so the dispatcher,
/// the command layer and the sweepers all see the same state.
#[derive(Clone)]
pub struct ModerationState {
    pub activity: Arc<ActivityWindow>,
    pub warns: Arc<WarnLedger>,
    pub gbans: Arc<GlobalBanRegistry>,
    pub scheduled: Arc<ScheduledMessageQueue>,
    pub auto_delete: Arc<AutoDeleteQueue>,
    pub stats: Arc<MessageStats>,
    pub reputation: Arc<ReputationBoard>,
    pub notes: Arc<NoteBook>,
}

impl ModerationState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            activity: Arc::new(ActivityWindow::new(config.flood.window())),
            warns: Arc::new(WarnLedger::new(config.warns.ban_threshold)),
            gbans: Arc::new(GlobalBanRegistry::new()),
            scheduled: Arc::new(ScheduledMessageQueue::new()),
            auto_delete: Arc::new(AutoDeleteQueue::new()),
            stats: Arc::new(MessageStats::new()),
            reputation: Arc::new(ReputationBoard::new()),
            notes: Arc::new(NoteBook::new()),
        }
    }

    /// Pending auto-deletions and activity windows are transient and not exported
    pub async fn export(&self) -> StateSnapshot {
        let scheduled_messages = self
            .scheduled
            .export()
            .await
            .into_iter()
            .map(|entry| ScheduledRecord {
                chat_id: entry.id.chat_id,
                text: entry.payload.text,
                send_time: entry.fire_at,
            })
            .collect();

        StateSnapshot {
            warn_counts: self.warns.export().await,
            scheduled_messages,
            gban_list: self.gbans.list().await,
            user_reputation: self.reputation.export().await,
            notes_data: self.notes.export().await,
            user_stats: self.stats.export().await,
        }
    }

    /// Replace the persistent parts of the state wholesale
    pub async fn restore(&self, snapshot: StateSnapshot) {
        let summary = snapshot.summary();

        self.warns.restore(snapshot.warn_counts).await;
        self.scheduled
            .restore(
                snapshot
                    .scheduled_messages
                    .into_iter()
                    .map(|r| (r.chat_id, r.send_time, ScheduledMessage::new(r.text)))
                    .collect(),
            )
            .await;
        self.gbans.restore(snapshot.gban_list).await;
        self.reputation.restore(snapshot.user_reputation).await;
        self.notes.restore(snapshot.notes_data).await;
        self.stats.restore(snapshot.user_stats).await;

        info!("Restored moderation state: {}", summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let raw = r#"{
            "warn_counts": {"42": 2},
            "gban_list": [7, 9],
            "scheduled_messages": [{"chat_id": 1, "text": "hi", "send_time": "2030-01-01T00:00:00Z"}]
        }"#;
        let snapshot = StateSnapshot::from_json(raw).unwrap();

        let state = ModerationState::new(&EngineConfig::default());
        state.warns.warn(1, None).await;
        state.gbans.ban(100).await;
        state.restore(snapshot.clone()).await;

        assert_eq!(state.warns.count(42).await, 2);
        assert_eq!(state.warns.count(1).await, 0);
        assert!(state.gbans.is_banned(7).await);
        assert!(state.gbans.is_banned(9).await);
        assert!(!state.gbans.is_banned(100).await);

        let pending = state.scheduled.pending_for(1).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload.text, "hi");
        assert_eq!(pending[0].fire_at, Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());

        assert_eq!(state.export().await, snapshot);
    }

    #[tokio::test]
    async fn test_scheduled_order_survives_round_trip() {
        let state = ModerationState::new(&EngineConfig::default());
        let later = Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap();
        let sooner = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        state.scheduled.enqueue(1, later, ScheduledMessage::new("first")).await;
        state.scheduled.enqueue(2, sooner, ScheduledMessage::new("second")).await;
        state.notes.save(1, "rules", "be nice").await;
        state.stats.record(5, "eve").await;

        let exported = state.export().await;
        let texts: Vec<&str> = exported.scheduled_messages.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);

        let fresh = ModerationState::new(&EngineConfig::default());
        fresh.restore(exported.clone()).await;
        assert_eq!(fresh.export().await, exported);
        assert_eq!(fresh.notes.get(1, "rules").await.as_deref(), Some("be nice"));
    }
}
