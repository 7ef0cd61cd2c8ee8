// src/bot/stats.rs - Per-user message counters and reputation points

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::CommandError;
use crate::types::UserId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub messages: u64,
    #[serde(default)]
    pub display_name: String,
}

pub struct MessageStats {
    users: RwLock<HashMap<UserId, UserStats>>,
}

impl MessageStats {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Count one received message and return the new total
    pub async fn record(&self, user_id: UserId, display_name: &str) -> u64 {
        let mut users = self.users.write().await;
        let stats = users.entry(user_id).or_default();
        stats.messages += 1;
        if !display_name.is_empty() {
            stats.display_name = display_name.to_string();
        }
        stats.messages
    }

    pub async fn count(&self, user_id: UserId) -> u64 {
        self.users
            .read()
            .await
            .get(&user_id)
            .map(|s| s.messages)
            .unwrap_or(0)
    }

    pub async fn get(&self, user_id: UserId) -> Option<UserStats> {
        self.users.read().await.get(&user_id).cloned()
    }

    /// Most active users, highest count first
    pub async fn top(&self, limit: usize) -> Vec<(UserId, UserStats)> {
        let users = self.users.read().await;
        let mut ranked: Vec<(UserId, UserStats)> = users.iter().map(|(id, s)| (*id, s.clone())).collect();
        ranked.sort_by(|a, b| b.1.messages.cmp(&a.1.messages).then(a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }

    pub async fn total_messages(&self) -> u64 {
        self.users.read().await.values().map(|s| s.messages).sum()
    }

    pub async fn remove(&self, user_id: UserId) -> bool {
        self.users.write().await.remove(&user_id).is_some()
    }

    pub async fn export(&self) -> HashMap<UserId, UserStats> {
        self.users.read().await.clone()
    }

    pub async fn restore(&self, users: HashMap<UserId, UserStats>) {
        *self.users.write().await = users;
    }
}

impl Default for MessageStats {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ReputationBoard {
    points: RwLock<HashMap<UserId, i64>>,
}

impl ReputationBoard {
    pub fn new() -> Self {
        Self {
            points: RwLock::new(HashMap::new()),
        }
    }

    pub async fn give(&self, from: UserId, to: UserId) -> Result<i64, CommandError> {
        if from == to {
            return Err(CommandError::SelfReputation);
        }
        let mut points = self.points.write().await;
        let total = points.entry(to).or_insert(0);
        *total += 1;
        debug!("User {} gave reputation to {} (now {})", from, to, total);
        Ok(*total)
    }

    pub async fn points(&self, user_id: UserId) -> i64 {
        self.points.read().await.get(&user_id).copied().unwrap_or(0)
    }

    pub async fn leaderboard(&self, limit: usize) -> Vec<(UserId, i64)> {
        let points = self.points.read().await;
        let mut ranked: Vec<(UserId, i64)> = points.iter().map(|(id, p)| (*id, *p)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }

    pub async fn remove(&self, user_id: UserId) -> bool {
        self.points.write().await.remove(&user_id).is_some()
    }

    pub async fn export(&self) -> HashMap<UserId, i64> {
        self.points.read().await.clone()
    }

    pub async fn restore(&self, points: HashMap<UserId, i64>) {
        *self.points.write().await = points;
    }
}

impl Default for ReputationBoard {
    fn default() -> Self {
        Self::new()
    }
}
