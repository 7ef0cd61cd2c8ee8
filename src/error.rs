// src/error.rs - Typed failures for transport calls and moderator commands

use thiserror::Error;

/// Failure reported by the chat platform for a single side-effecting call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("insufficient permissions to {0}")]
    PermissionDenied(String),
    #[error("target not found")]
    NotFound,
    #[error("network failure: {0}")]
    Network(String),
    #[error("platform rejected the request: {0}")]
    Rejected(String),
}

/// Rejection of a moderator command. `Display` is for logs; replies use `user_message`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid duration '{0}'")]
    InvalidDuration(String),
    #[error("duration of {requested}s exceeds the {max}s limit")]
    DurationTooLong { requested: i64, max: i64 },
    #[error("unknown target user")]
    UnknownTarget,
    #[error("sender is not authorized")]
    NotAuthorized,
    #[error("users cannot give reputation to themselves")]
    SelfReputation,
    #[error("nothing to do: {0}")]
    NothingToDo(&'static str),
    #[error("action failed: {0}")]
    ActionFailed(&'static str),
}

impl CommandError {
    /// Short, sanitized reason shown to the chat
    pub fn user_message(&self) -> String {
        match self {
            CommandError::MissingArgument(usage) => format!("Usage: {}", usage),
            CommandError::InvalidDuration(_) => {
                "Invalid time. Use a number followed by s, m, h or d (e.g. 10m).".to_string()
            }
            CommandError::DurationTooLong { max, .. } => {
                format!("That is too long. The limit is {}.", humanize_seconds(*max))
            }
            CommandError::UnknownTarget => {
                "Reply to a user's message or give their numeric user id.".to_string()
            }
            CommandError::NotAuthorized => "You are not allowed to use this command.".to_string(),
            CommandError::SelfReputation => "You cannot give reputation to yourself.".to_string(),
            CommandError::NothingToDo(what) => format!("Nothing to do: {}.", what),
            CommandError::ActionFailed(what) => format!("Could not {} right now.", what),
        }
    }
}

/// Outcome of one transport call, kept for reports and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    Applied,
    Failed(TransportError),
}

impl ActionStatus {
    pub fn from_result<T>(result: &Result<T, TransportError>) -> Self {
        match result {
            Ok(_) => ActionStatus::Applied,
            Err(e) => ActionStatus::Failed(e.clone()),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ActionStatus::Applied)
    }
}

pub fn humanize_seconds(seconds: i64) -> String {
    if seconds % 86_400 == 0 && seconds >= 86_400 {
        format!("{}d", seconds / 86_400)
    } else if seconds % 3_600 == 0 && seconds >= 3_600 {
        format!("{}h", seconds / 3_600)
    } else if seconds % 60 == 0 && seconds >= 60 {
        format!("{}m", seconds / 60)
    } else {
        format!("{}s", seconds)
    }
}
