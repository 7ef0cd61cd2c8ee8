//! # groupwarden
//!
//! A real-time moderation engine for chat groups. Every inbound message runs through an
//! ordered chain (global ban, admin exemption, flood guard, content filters) and two
//! background loops fire scheduled messages and pending deletions on fixed intervals.
//!
//! ## Features
//!
//! - **Flood control**: sliding-window rate limiting with automatic mutes
//! - **Warn escalation**: per-user warnings that turn into a ban at a threshold
//! - **Global bans**: cross-chat ban list enforced before anything else
//! - **Delayed actions**: scheduled messages and auto-deletion with exactly-once removal
//! - **Snapshots**: manual JSON export and restore of the moderation state
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use groupwarden::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::load("groupwarden.yaml").await?;
//!     let transport = Arc::new(RecordingTransport::named("stdout"));
//!     let engine = ModerationEngine::new(config, transport)?;
//!
//!     engine.start().await?;
//!     let outcome = engine
//!         .handle_message(&InboundMessage::text(-100, 1, 42, "hello everyone"))
//!         .await;
//!     println!("{:?}", outcome.report.verdict);
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod config;
pub mod error;
pub mod platforms;
pub mod types;

// Re-export commonly used items
pub mod prelude {
    pub use crate::bot::commands::{CommandResponse, ModerationCommands};
    pub use crate::bot::dispatcher::{ActionRecord, DispatchReport, ModerationAction, ModerationDispatcher, Verdict};
    pub use crate::bot::shutdown::{ShutdownCoordinator, ShutdownPhase};
    pub use crate::bot::snapshot::StateSnapshot;
    pub use crate::bot::state::ModerationState;
    pub use crate::bot::{MessageOutcome, ModerationEngine};
    pub use crate::config::EngineConfig;
    pub use crate::error::{ActionStatus, CommandError, TransportError};
    pub use crate::platforms::{memory::RecordingTransport, ChatTransport};
    pub use crate::types::{ChatId, InboundMessage, MessageId, MessageRef, UserId};
    pub use anyhow::Result;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
