// src/bot/snapshot.rs - Manual JSON backup of the moderation state

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::stats::UserStats;
use crate::types::{ChatId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledRecord {
    pub chat_id: ChatId,
    pub text: String,
    pub send_time: DateTime<Utc>,
}

/// Point-in-time copy of everything worth keeping across restarts.
/// Missing keys restore as empty collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub warn_counts: HashMap<UserId, u32>,
    #[serde(default)]
    pub scheduled_messages: Vec<ScheduledRecord>,
    #[serde(default)]
    pub gban_list: Vec<UserId>,
    #[serde(default)]
    pub user_reputation: HashMap<UserId, i64>,
    #[serde(default)]
    pub notes_data: HashMap<ChatId, BTreeMap<String, String>>,
    #[serde(default)]
    pub user_stats: HashMap<UserId, UserStats>,
}

impl StateSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize state snapshot")
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse state snapshot")
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create snapshot directory {}", parent.display()))?;
        }

        let json = self.to_json()?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;

        info!("Saved state snapshot to {} ({})", path.display(), self.summary());
        Ok(())
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read snapshot from {}", path.display()))?;
        let snapshot = Self::from_json(&raw).with_context(|| format!("Snapshot {} is malformed", path.display()))?;

        info!("Loaded state snapshot from {} ({})", path.display(), snapshot.summary());
        Ok(snapshot)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} warned users, {} scheduled messages, {} global bans, {} reputation entries, {} chats with notes, {} users with stats",
            self.warn_counts.len(),
            self.scheduled_messages.len(),
            self.gban_list.len(),
            self.user_reputation.len(),
            self.notes_data.len(),
            self.user_stats.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parses_documented_format() {
        let raw = r#"{
            "warn_counts": {"42": 2},
            "gban_list": [7, 9],
            "scheduled_messages": [{"chat_id": 1, "text": "hi", "send_time": "2030-01-01T00:00:00Z"}]
        }"#;

        let snapshot = StateSnapshot::from_json(raw).unwrap();
        assert_eq!(snapshot.warn_counts.get(&42), Some(&2));
        assert_eq!(snapshot.gban_list, vec![7, 9]);
        assert_eq!(snapshot.scheduled_messages[0].send_time.to_rfc3339(), "2030-01-01T00:00:00+00:00");
        assert!(snapshot.notes_data.is_empty());
        assert!(snapshot.user_stats.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("backup.json");

        let mut snapshot = StateSnapshot::default();
        snapshot.gban_list = vec![3];
        snapshot.user_reputation.insert(5, 4);
        snapshot.save(&path).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"gban_list\""));
        assert!(written.contains("\"user_reputation\""));

        let loaded = StateSnapshot::load(&path).await.unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(StateSnapshot::load(&path).await.is_err());
        assert!(StateSnapshot::load(dir.path().join("missing.json")).await.is_err());
    }
}
