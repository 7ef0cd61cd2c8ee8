// src/bot/gban.rs - Cross-chat ban list

use log::info;
use std::collections::HashSet;
use tokio::sync::RwLock;

use crate::types::UserId;

/// Users on this list are banned on sight in every chat
pub struct GlobalBanRegistry {
    banned: RwLock<HashSet<UserId>>,
}

impl GlobalBanRegistry {
    pub fn new() -> Self {
        Self {
            banned: RwLock::new(HashSet::new()),
        }
    }

    /// Returns false if the user was already listed
    pub async fn ban(&self, user_id: UserId) -> bool {
        let added = self.banned.write().await.insert(user_id);
        if added {
            info!("User {} added to the global ban list", user_id);
        }
        added
    }

    pub async fn unban(&self, user_id: UserId) -> bool {
        let removed = self.banned.write().await.remove(&user_id);
        if removed {
            info!("User {} removed from the global ban list", user_id);
        }
        removed
    }

    pub async fn is_banned(&self, user_id: UserId) -> bool {
        self.banned.read().await.contains(&user_id)
    }

    pub async fn list(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.banned.read().await.iter().copied().collect();
        users.sort_unstable();
        users
    }

    pub async fn len(&self) -> usize {
        self.banned.read().await.len()
    }

    pub async fn restore(&self, users: impl IntoIterator<Item = UserId>) {
        let mut banned = self.banned.write().await;
        banned.clear();
        banned.extend(users);
    }
}

impl Default for GlobalBanRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_semantics() {
        let registry = GlobalBanRegistry::new();

        assert!(!registry.unban(7).await);
        assert!(registry.ban(7).await);
        assert!(!registry.ban(7).await);
        assert_eq!(registry.len().await, 1);
        assert!(registry.is_banned(7).await);

        assert!(registry.unban(7).await);
        assert!(!registry.is_banned(7).await);
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_restore_replaces() {
        let registry = GlobalBanRegistry::new();
        registry.ban(1).await;
        registry.restore(vec![9, 7, 9]).await;

        assert_eq!(registry.list().await, vec![7, 9]);
        assert!(!registry.is_banned(1).await);
    }
}
