// src/types/mod.rs - Core message and pattern types shared by the engine

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub type ChatId = i64;
pub type UserId = i64;
pub type MessageId = i64;

/// Inbound message as handed over by the ingestion collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub user_id: UserId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_forwarded: bool,
    #[serde(default)]
    pub reply_target: Option<MessageRef>,
    #[serde(default)]
    pub attachment_extension: Option<String>,
}

impl InboundMessage {
    /// Plain text message from a regular member, stamped with the current time
    pub fn text(chat_id: ChatId, message_id: MessageId, user_id: UserId, text: &str) -> Self {
        Self {
            chat_id,
            message_id,
            user_id,
            display_name: format!("user{}", user_id),
            is_admin: false,
            text: Some(text.to_string()),
            timestamp: Utc::now(),
            is_forwarded: false,
            reply_target: None,
            attachment_extension: None,
        }
    }

    pub fn content(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Name used in notices; falls back to the numeric id
    pub fn sender_name(&self) -> String {
        if self.display_name.trim().is_empty() {
            self.user_id.to_string()
        } else {
            self.display_name.clone()
        }
    }

    /// Split a `/command arg1 arg2` message into its lowercase name and raw arguments.
    /// A `@botname` suffix on the command is dropped.
    pub fn command(&self) -> Option<(String, Vec<&str>)> {
        let content = self.content().trim_start();
        let body = content.strip_prefix('/')?;
        let mut parts = body.split_whitespace();
        let name = parts.next()?;
        let name = name.split('@').next().unwrap_or(name).to_lowercase();
        if name.is_empty() {
            return None;
        }
        Some((name, parts.collect()))
    }
}

/// Reference to another message, usually the one being replied to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Word pattern for the profanity filter: literal, wildcard or `~/regex/flags`
#[derive(Debug, Clone)]
pub enum WordPattern {
    /// Literal text match: "badword"
    Literal(String),
    /// Wildcard pattern: "bad*", "*word", "b?d"
    Wildcard(Regex),
    /// Regex pattern: ~/pattern/flags
    Regex(Regex),
}

impl WordPattern {
    /// Parse a configured entry. Entries starting with `~/` are regexes, entries with
    /// `*` or `?` are wildcards, anything else is a literal.
    pub fn parse(input: &str) -> Result<Self, String> {
        if input.starts_with("~/") {
            return Self::from_regex_string(input);
        }

        if input.contains('*') || input.contains('?') {
            let escaped = regex::escape(&input.to_lowercase())
                .replace(r"\*", r"\w*")
                .replace(r"\?", r"\w");
            return Regex::new(&format!("^{}$", escaped))
                .map(WordPattern::Wildcard)
                .map_err(|e| format!("Invalid wildcard pattern: {}", e));
        }

        if input.trim().is_empty() {
            return Err("Empty pattern".to_string());
        }

        Ok(WordPattern::Literal(input.to_lowercase()))
    }

    fn from_regex_string(input: &str) -> Result<Self, String> {
        let content = &input[2..];

        // Last slash separates the pattern from its flags
        let last_slash = content
            .rfind('/')
            .ok_or_else(|| "Regex pattern must end with '/'".to_string())?;
        let pattern = &content[..last_slash];
        let flags = &content[last_slash + 1..];

        let mut builder = regex::RegexBuilder::new(pattern);
        for flag in flags.chars() {
            match flag {
                'i' => { builder.case_insensitive(true); }
                'm' => { builder.multi_line(true); }
                's' => { builder.dot_matches_new_line(true); }
                'x' => { builder.ignore_whitespace(true); }
                _ => return Err(format!("Unknown regex flag: {}", flag)),
            }
        }

        builder
            .build()
            .map(WordPattern::Regex)
            .map_err(|e| format!("Invalid regex pattern: {}", e))
    }

    /// Check the pattern against already-lowercased text
    pub fn matches(&self, lowered: &str, original: &str, whole_words_only: bool) -> bool {
        match self {
            WordPattern::Literal(word) => {
                if whole_words_only {
                    Self::words(lowered).any(|w| w == word)
                } else {
                    lowered.contains(word.as_str())
                }
            }
            WordPattern::Wildcard(regex) => Self::words(lowered).any(|w| regex.is_match(w)),
            WordPattern::Regex(regex) => regex.is_match(original),
        }
    }

    fn words(text: &str) -> impl Iterator<Item = &str> {
        text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        let msg = InboundMessage::text(1, 1, 2, "/Warn@wardenbot spamming links");
        let (name, args) = msg.command().unwrap();
        assert_eq!(name, "warn");
        assert_eq!(args, vec!["spamming", "links"]);

        assert!(InboundMessage::text(1, 1, 2, "hello").command().is_none());
        assert!(InboundMessage::text(1, 1, 2, "/").command().is_none());
    }

    #[test]
    fn test_word_patterns() {
        let literal = WordPattern::parse("Badword").unwrap();
        assert!(literal.matches("this badwords here", "", false));
        assert!(!literal.matches("this badwords here", "", true));

        let wildcard = WordPattern::parse("spam*").unwrap();
        assert!(wildcard.matches("total spammer", "", false));
        assert!(!wildcard.matches("no match", "", false));

        let regex = WordPattern::parse("~/fr[e3]{2}\\s+money/i").unwrap();
        assert!(regex.matches("", "get FREE money now", false));

        assert!(WordPattern::parse("~/broken").is_err());
        assert!(WordPattern::parse("~/x/q").is_err());
    }
}
