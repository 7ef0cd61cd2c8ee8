// src/bot/warns.rs - Per-user warning counter with ban escalation

use log::{debug, info};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::types::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarnRecord {
    pub count: u32,
    pub last_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarnOutcome {
    Warned { count: u32, threshold: u32 },
    /// Threshold reached; the record has already been wiped
    Banned,
}

pub struct WarnLedger {
    ban_threshold: u32,
    records: RwLock<HashMap<UserId, WarnRecord>>,
}

impl WarnLedger {
    pub fn new(ban_threshold: u32) -> Self {
        Self {
            ban_threshold: ban_threshold.max(1),
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.ban_threshold
    }

    pub async fn warn(&self, user_id: UserId, reason: Option<&str>) -> WarnOutcome {
        let mut records = self.records.write().await;
        let record = records.entry(user_id).or_insert(WarnRecord {
            count: 0,
            last_reason: None,
        });
        record.count += 1;
        if let Some(reason) = reason {
            record.last_reason = Some(reason.to_string());
        }

        if record.count >= self.ban_threshold {
            records.remove(&user_id);
            info!("User {} reached {} warnings, escalating to ban", user_id, self.ban_threshold);
            WarnOutcome::Banned
        } else {
            debug!("User {} now has {}/{} warnings", user_id, record.count, self.ban_threshold);
            WarnOutcome::Warned {
                count: record.count,
                threshold: self.ban_threshold,
            }
        }
    }

    /// Returns false when there was nothing to reset
    pub async fn reset(&self, user_id: UserId) -> bool {
        self.records.write().await.remove(&user_id).is_some()
    }

    pub async fn count(&self, user_id: UserId) -> u32 {
        self.records
            .read()
            .await
            .get(&user_id)
            .map(|r| r.count)
            .unwrap_or(0)
    }

    pub async fn record(&self, user_id: UserId) -> Option<WarnRecord> {
        self.records.read().await.get(&user_id).cloned()
    }

    pub async fn export(&self) -> HashMap<UserId, u32> {
        self.records
            .read()
            .await
            .iter()
            .map(|(user, record)| (*user, record.count))
            .collect()
    }

    /// Replace every record. Zero counts are dropped.
    pub async fn restore(&self, counts: HashMap<UserId, u32>) {
        let mut records = self.records.write().await;
        records.clear();
        for (user, count) in counts.into_iter().filter(|(_, c)| *c > 0) {
            records.insert(user, WarnRecord { count, last_reason: None });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_third_warn_bans_and_wipes_the_slate() {
        let ledger = WarnLedger::new(3);

        assert_eq!(ledger.warn(42, Some("spam")).await, WarnOutcome::Warned { count: 1, threshold: 3 });
        assert_eq!(ledger.warn(42, None).await, WarnOutcome::Warned { count: 2, threshold: 3 });
        assert_eq!(ledger.record(42).await.unwrap().last_reason.as_deref(), Some("spam"));

        assert_eq!(ledger.warn(42, Some("again")).await, WarnOutcome::Banned);
        assert_eq!(ledger.count(42).await, 0);

        // post-ban warnings start over
        assert_eq!(ledger.warn(42, None).await, WarnOutcome::Warned { count: 1, threshold: 3 });
    }

    #[tokio::test]
    async fn test_reset_reports_whether_anything_existed() {
        let ledger = WarnLedger::new(3);
        assert!(!ledger.reset(5).await);

        ledger.warn(5, None).await;
        assert!(ledger.reset(5).await);
        assert_eq!(ledger.count(5).await, 0);
        assert!(!ledger.reset(5).await);
    }

    #[tokio::test]
    async fn test_export_and_restore_replace_state() {
        let ledger = WarnLedger::new(3);
        ledger.warn(1, None).await;

        let mut counts = HashMap::new();
        counts.insert(42, 2);
        counts.insert(43, 0);
        ledger.restore(counts).await;

        assert_eq!(ledger.count(1).await, 0);
        assert_eq!(ledger.count(42).await, 2);
        assert_eq!(ledger.export().await.len(), 1);
        assert_eq!(ledger.warn(42, None).await, WarnOutcome::Banned);
    }
}
