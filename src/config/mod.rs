// src/config/mod.rs - Engine configuration loaded from YAML with environment overrides

use anyhow::{Context, Result};
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::types::{ChatId, UserId, WordPattern};

const MAX_WINDOW_SECONDS: u64 = 86_400;

/// Every tunable of the moderation engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub flood: FloodConfig,
    pub warns: WarnConfig,
    pub sweep: SweepConfig,
    pub schedule: ScheduleConfig,
    pub auto_delete: AutoDeleteConfig,
    pub auto_mute: AutoMuteConfig,
    pub filters: FilterConfig,
    pub moderation: ModerationConfig,
    /// Owners may manage global bans and snapshots
    pub owners: Vec<UserId>,
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FloodConfig {
    /// Messages allowed inside the window; one more triggers a mute
    pub threshold: usize,
    pub window_seconds: u64,
    pub mute_seconds: u64,
    /// Drop the sender's activity window once a flood mute is applied
    pub reset_window_on_mute: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WarnConfig {
    pub ban_threshold: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SweepConfig {
    pub scheduled_interval_seconds: u64,
    pub auto_delete_interval_seconds: u64,
    /// How long shutdown waits for an in-flight sweep to finish
    pub shutdown_grace_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub max_delay_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutoDeleteConfig {
    pub max_delay_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutoMuteConfig {
    pub enabled: bool,
    /// Senders with at most this many recorded messages count as low-activity
    pub min_messages: u64,
    pub mute_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    pub delete_forwarded: bool,
    pub block_links: bool,
    pub link_pattern: String,
    /// Links containing one of these domains are allowed
    pub link_whitelist: Vec<String>,
    /// Literal, wildcard (`spam*`) or regex (`~/pattern/flags`) entries
    pub profanity: Vec<String>,
    pub whole_words_only: bool,
    pub blocked_extensions: Vec<String>,
}

/// Manual moderation commands
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModerationConfig {
    /// Chat that receives an audit line for every moderator action
    pub log_chat_id: Option<ChatId>,
    /// Longest `/tmute`; also the length of an open-ended `/mute`
    pub max_mute_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SnapshotConfig {
    pub path: PathBuf,
    pub save_on_shutdown: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flood: FloodConfig::default(),
            warns: WarnConfig::default(),
            sweep: SweepConfig::default(),
            schedule: ScheduleConfig::default(),
            auto_delete: AutoDeleteConfig::default(),
            auto_mute: AutoMuteConfig::default(),
            filters: FilterConfig::default(),
            moderation: ModerationConfig::default(),
            owners: Vec::new(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            window_seconds: 3,
            mute_seconds: 600,
            reset_window_on_mute: false,
        }
    }
}

impl Default for WarnConfig {
    fn default() -> Self {
        Self { ban_threshold: 3 }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            scheduled_interval_seconds: 5,
            auto_delete_interval_seconds: 5,
            shutdown_grace_seconds: 10,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { max_delay_seconds: 7 * 86_400 }
    }
}

impl Default for AutoDeleteConfig {
    fn default() -> Self {
        Self { max_delay_seconds: 3_600 }
    }
}

impl Default for AutoMuteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_messages: 5,
            mute_seconds: 300,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            delete_forwarded: true,
            block_links: true,
            link_pattern: r"(?i)(https?://\S+|t\.me/\S+)".to_string(),
            link_whitelist: Vec::new(),
            profanity: vec![
                "fuck".to_string(),
                "bitch".to_string(),
                "cunt".to_string(),
                "chutiya".to_string(),
                "randi".to_string(),
            ],
            whole_words_only: false,
            blocked_extensions: vec![
                "exe".to_string(),
                "apk".to_string(),
                "bat".to_string(),
                "scr".to_string(),
                "msi".to_string(),
            ],
        }
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            log_chat_id: None,
            // platforms treat restrictions longer than a year as permanent
            max_mute_seconds: 366 * 86_400,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("moderation_backup.json"),
            save_on_shutdown: false,
        }
    }
}

impl FloodConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_seconds.min(MAX_WINDOW_SECONDS) as i64)
    }

    pub fn mute_duration(&self) -> Duration {
        Duration::from_secs(self.mute_seconds)
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file, writing the defaults first if it is missing
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file not found, creating default: {}", path.display());
            Self::default().save(path).await?;
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: EngineConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;

        info!("Loaded moderation config from {}", path.display());
        Ok(config)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
            }
        }

        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config to: {}", path.display()))?;

        info!("Wrote moderation config to {}", path.display());
        Ok(())
    }

    /// Reject values that would disable a safeguard by accident
    pub fn validate(&self) -> Result<()> {
        if self.flood.threshold == 0 {
            return Err(anyhow::anyhow!("flood.threshold must be at least 1"));
        }
        if self.flood.window_seconds == 0 || self.flood.window_seconds > MAX_WINDOW_SECONDS {
            return Err(anyhow::anyhow!("flood.window_seconds must be between 1 and {}", MAX_WINDOW_SECONDS));
        }
        if self.warns.ban_threshold == 0 {
            return Err(anyhow::anyhow!("warns.ban_threshold must be at least 1"));
        }
        if self.sweep.scheduled_interval_seconds == 0 || self.sweep.auto_delete_interval_seconds == 0 {
            return Err(anyhow::anyhow!("sweep intervals must be at least 1 second"));
        }
        if self.schedule.max_delay_seconds <= 0 || self.auto_delete.max_delay_seconds <= 0 {
            return Err(anyhow::anyhow!("maximum delays must be positive"));
        }
        if self.moderation.max_mute_seconds <= 0 {
            return Err(anyhow::anyhow!("moderation.max_mute_seconds must be positive"));
        }

        Regex::new(&self.filters.link_pattern)
            .map_err(|e| anyhow::anyhow!("filters.link_pattern is not a valid regex: {}", e))?;

        for entry in &self.filters.profanity {
            WordPattern::parse(entry)
                .map_err(|e| anyhow::anyhow!("filters.profanity entry '{}': {}", entry, e))?;
        }

        debug!("Configuration validation passed");
        Ok(())
    }

    /// Apply `GROUPWARDEN_*` environment variables and `OWNER_ID` on top of the file values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_parse::<usize>("GROUPWARDEN_FLOOD_THRESHOLD")? {
            self.flood.threshold = v;
        }
        if let Some(v) = env_parse::<u64>("GROUPWARDEN_FLOOD_WINDOW_SECONDS")? {
            self.flood.window_seconds = v;
        }
        if let Some(v) = env_parse::<u64>("GROUPWARDEN_FLOOD_MUTE_SECONDS")? {
            self.flood.mute_seconds = v;
        }
        if let Some(v) = env_parse::<u32>("GROUPWARDEN_WARN_THRESHOLD")? {
            self.warns.ban_threshold = v;
        }
        if let Some(v) = env_parse::<u64>("GROUPWARDEN_SWEEP_INTERVAL_SECONDS")? {
            self.sweep.scheduled_interval_seconds = v;
            self.sweep.auto_delete_interval_seconds = v;
        }
        if let Some(v) = env_parse::<u64>("GROUPWARDEN_AUTO_MUTE_MIN_MESSAGES")? {
            self.auto_mute.min_messages = v;
        }
        if let Some(v) = env_parse::<u64>("GROUPWARDEN_AUTO_MUTE_SECONDS")? {
            self.auto_mute.mute_seconds = v;
        }
        if let Some(owner) = env_parse::<UserId>("OWNER_ID")? {
            if !self.owners.contains(&owner) {
                self.owners.push(owner);
            }
        }
        if let Some(chat_id) = env_parse::<ChatId>("LOG_CHANNEL_ID")? {
            self.moderation.log_chat_id = Some(chat_id);
        }
        if let Ok(path) = std::env::var("GROUPWARDEN_SNAPSHOT_PATH") {
            self.snapshot.path = PathBuf::from(path);
        }

        self.validate()
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owners.contains(&user_id)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_creates_default_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config").join("moderation.yaml");

        let config = EngineConfig::load(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.flood.threshold, 5);
        assert_eq!(config.flood.window_seconds, 3);
        assert_eq!(config.flood.mute_seconds, 600);
        assert_eq!(config.warns.ban_threshold, 3);
        assert_eq!(config.sweep.scheduled_interval_seconds, 5);
        assert_eq!(config.auto_mute.min_messages, 5);
        assert_eq!(config.auto_mute.mute_seconds, 300);
    }

    #[tokio::test]
    async fn test_partial_file_keeps_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("moderation.yaml");
        fs::write(&path, "flood:\n  threshold: 8\nowners: [42]\nmoderation:\n  log_chat_id: -1001\n")
            .await
            .unwrap();

        let config = EngineConfig::load(&path).await.unwrap();
        assert_eq!(config.flood.threshold, 8);
        assert_eq!(config.moderation.log_chat_id, Some(-1001));
        assert_eq!(config.moderation.max_mute_seconds, 366 * 86_400);
        assert_eq!(config.flood.window_seconds, 3);
        assert!(config.is_owner(42));
        assert!(!config.is_owner(7));
    }

    #[tokio::test]
    async fn test_invalid_values_are_rejected() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("moderation.yaml");
        fs::write(&path, "warns:\n  ban_threshold: 0\n").await.unwrap();
        assert!(EngineConfig::load(&path).await.is_err());

        let mut config = EngineConfig::default();
        config.filters.link_pattern = "(unclosed".to_string();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.filters.profanity.push("~/bad/z".to_string());
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.flood.window_seconds = u64::MAX;
        assert!(config.validate().is_err());
        assert_eq!(config.flood.window(), chrono::Duration::days(1));
    }
}
