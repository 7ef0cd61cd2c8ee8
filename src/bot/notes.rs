// src/bot/notes.rs - Named notes per chat

use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::types::ChatId;

pub struct NoteBook {
    notes: RwLock<HashMap<ChatId, BTreeMap<String, String>>>,
}

impl NoteBook {
    pub fn new() -> Self {
        Self {
            notes: RwLock::new(HashMap::new()),
        }
    }

    /// Store a note; returns true if an existing note was overwritten
    pub async fn save(&self, chat_id: ChatId, name: &str, text: &str) -> bool {
        self.notes
            .write()
            .await
            .entry(chat_id)
            .or_default()
            .insert(name.to_lowercase(), text.to_string())
            .is_some()
    }

    pub async fn get(&self, chat_id: ChatId, name: &str) -> Option<String> {
        self.notes
            .read()
            .await
            .get(&chat_id)
            .and_then(|chat| chat.get(&name.to_lowercase()).cloned())
    }

    /// Note names, alphabetical
    pub async fn list(&self, chat_id: ChatId) -> Vec<String> {
        self.notes
            .read()
            .await
            .get(&chat_id)
            .map(|chat| chat.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn remove(&self, chat_id: ChatId, name: &str) -> bool {
        let mut notes = self.notes.write().await;
        let Some(chat) = notes.get_mut(&chat_id) else {
            return false;
        };
        let removed = chat.remove(&name.to_lowercase()).is_some();
        if chat.is_empty() {
            notes.remove(&chat_id);
        }
        removed
    }

    pub async fn export(&self) -> HashMap<ChatId, BTreeMap<String, String>> {
        self.notes.read().await.clone()
    }

    /// Replace every note. Names are lowercased so restored notes resolve like saved ones.
    pub async fn restore(&self, notes: HashMap<ChatId, BTreeMap<String, String>>) {
        let restored = notes
            .into_iter()
            .map(|(chat_id, chat)| {
                let chat: BTreeMap<String, String> = chat
                    .into_iter()
                    .map(|(name, text)| (name.to_lowercase(), text))
                    .collect();
                (chat_id, chat)
            })
            .filter(|(_, chat)| !chat.is_empty())
            .collect();
        *self.notes.write().await = restored;
    }
}

impl Default for NoteBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notes_are_per_chat_and_case_insensitive() {
        let book = NoteBook::new();
        assert!(!book.save(1, "Rules", "be nice").await);
        assert!(book.save(1, "rules", "be very nice").await);
        book.save(1, "faq", "read the pins").await;
        book.save(2, "rules", "other chat").await;

        assert_eq!(book.get(1, "RULES").await.as_deref(), Some("be very nice"));
        assert_eq!(book.list(1).await, vec!["faq", "rules"]);

        assert!(book.remove(2, "rules").await);
        assert!(!book.remove(2, "rules").await);
        assert!(book.list(2).await.is_empty());
        assert!(book.get(3, "rules").await.is_none());
    }

    #[tokio::test]
    async fn test_restored_names_are_lowercased() {
        let book = NoteBook::new();
        let mut chat = BTreeMap::new();
        chat.insert("Rules".to_string(), "be nice".to_string());
        book.restore(HashMap::from([(1, chat), (2, BTreeMap::new())])).await;

        assert_eq!(book.get(1, "rules").await.as_deref(), Some("be nice"));
        assert_eq!(book.list(1).await, vec!["rules"]);
        assert!(book.remove(1, "RULES").await);
        assert!(book.export().await.is_empty());
    }
}
