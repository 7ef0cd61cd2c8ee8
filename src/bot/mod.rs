use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::platforms::ChatTransport;
use crate::types::InboundMessage;

pub mod activity;
pub mod auto_delete;
pub mod commands;
pub mod delayed_queue;
pub mod dispatcher;
pub mod duration;
pub mod filters;
pub mod flood;
pub mod gban;
pub mod notes;
pub mod scheduled;
pub mod shutdown;
pub mod snapshot;
pub mod state;
pub mod stats;
pub mod sweeper;
pub mod warns;

use commands::{CommandResponse, ModerationCommands};
use dispatcher::{DispatchReport, ModerationDispatcher};
use shutdown::{ShutdownCoordinator, ShutdownStats};
use snapshot::StateSnapshot;
use state::ModerationState;

/// What happened to one inbound message
#[derive(Debug, Clone)]
pub struct MessageOutcome {
    pub report: DispatchReport,
    pub command: Option<CommandResponse>,
}

/// Core engine that owns the moderation state and every system built on it
pub struct ModerationEngine {
    config: EngineConfig,
    state: ModerationState,
    transport: Arc<dyn ChatTransport>,
    dispatcher: ModerationDispatcher,
    commands: ModerationCommands,
    shutdown: Arc<ShutdownCoordinator>,
}

impl ModerationEngine {
    pub fn new(config: EngineConfig, transport: Arc<dyn ChatTransport>) -> Result<Self> {
        config.validate()?;
        let state = ModerationState::new(&config);
        let dispatcher = ModerationDispatcher::new(&config, state.clone(), Arc::clone(&transport))
            .context("Failed to build content filters")?;
        let commands = ModerationCommands::new(config.clone(), state.clone(), Arc::clone(&transport));

        Ok(Self {
            config,
            state,
            transport,
            dispatcher,
            commands,
            shutdown: Arc::new(ShutdownCoordinator::new()),
        })
    }

    pub fn state(&self) -> &ModerationState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn shutdown_coordinator(&self) -> Arc<ShutdownCoordinator> {
        Arc::clone(&self.shutdown)
    }

    /// Start the background sweep loops
    pub async fn start(&self) -> Result<()> {
        info!(
            "Starting moderation engine on {} (flood {} msgs/{}s, ban after {} warns)",
            self.transport.platform_name(),
            self.config.flood.threshold,
            self.config.flood.window_seconds,
            self.config.warns.ban_threshold
        );
        sweeper::start_sweepers(&self.state, Arc::clone(&self.transport), &self.config.sweep, &self.shutdown).await;
        info!("Moderation engine started with {} background tasks", self.shutdown.task_count().await);
        Ok(())
    }

    /// Moderate one message, then run it as a command if it survived
    pub async fn handle_message(&self, message: &InboundMessage) -> MessageOutcome {
        let report = self.dispatcher.handle(message).await;
        debug!("Message {} in chat {}: {:?}", message.message_id, message.chat_id, report.verdict);

        let command = if report.allows_commands() {
            self.commands.process_command(message).await
        } else {
            None
        };

        MessageOutcome { report, command }
    }

    /// Consume inbound messages until the channel closes or shutdown is requested.
    /// Returns how many messages were handled.
    pub async fn run_message_loop(&self, mut inbound: mpsc::Receiver<InboundMessage>) -> usize {
        let mut handled = 0;
        let shutdown = self.shutdown.wait_for_shutdown();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                message = inbound.recv() => match message {
                    Some(message) => {
                        self.handle_message(&message).await;
                        handled += 1;
                    }
                    None => {
                        info!("Inbound message stream closed");
                        break;
                    }
                },
                _ = &mut shutdown => {
                    info!("Message loop stopping for shutdown");
                    break;
                }
            }
        }

        info!("Message loop handled {} messages", handled);
        handled
    }

    pub async fn save_snapshot(&self) -> Result<StateSnapshot> {
        let snapshot = self.state.export().await;
        snapshot.save(&self.config.snapshot.path).await?;
        Ok(snapshot)
    }

    pub async fn restore_snapshot(&self) -> Result<()> {
        let snapshot = StateSnapshot::load(&self.config.snapshot.path).await?;
        self.state.restore(snapshot).await;
        Ok(())
    }

    /// Stop the sweep loops (letting an in-flight pass finish) and optionally save a snapshot
    pub async fn shutdown(&self) -> Result<ShutdownStats> {
        let grace = Duration::from_secs(self.config.sweep.shutdown_grace_seconds);
        let stats = self.shutdown.drain(grace).await;

        if self.config.snapshot.save_on_shutdown {
            if let Err(e) = self.save_snapshot().await {
                warn!("Failed to save snapshot on shutdown: {:#}", e);
                return Err(e);
            }
        }

        info!("Moderation engine stopped");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::dispatcher::Verdict;
    use crate::platforms::memory::{CallKind, RecordingTransport};
    use chrono::Utc;
    use tempfile::tempdir;

    fn build_engine(config: EngineConfig) -> (ModerationEngine, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let engine = ModerationEngine::new(config, transport.clone()).unwrap();
        (engine, transport)
    }

    #[tokio::test]
    async fn test_filtered_message_is_not_run_as_command() {
        let (engine, transport) = build_engine(EngineConfig::default());
        let mut msg = InboundMessage::text(1, 5, 2, "/stats");
        msg.is_forwarded = true;

        let outcome = engine.handle_message(&msg).await;
        assert!(outcome.command.is_none());
        assert!(transport.calls_of(CallKind::SendText).await.is_empty());

        let outcome = engine.handle_message(&InboundMessage::text(1, 6, 2, "/stats")).await;
        assert_eq!(outcome.report.verdict, Verdict::Passed);
        assert!(outcome.command.unwrap().text.starts_with("Messages seen: 2"));
    }

    #[tokio::test]
    async fn test_scheduled_command_is_delivered_by_sweep() {
        let (engine, transport) = build_engine(EngineConfig::default());
        let mut msg = InboundMessage::text(1, 5, 2, "/schedule 1s good morning");
        msg.is_admin = true;
        engine.handle_message(&msg).await;
        assert_eq!(engine.state().scheduled.len().await, 1);

        let due = msg.timestamp + chrono::Duration::seconds(1);
        let fired = engine.state().scheduled.sweep(due, transport.as_ref()).await;
        assert_eq!(fired.len(), 1);
        assert!(engine.state().scheduled.is_empty().await);
    }

    #[tokio::test]
    async fn test_message_loop_ends_when_stream_closes() {
        let (engine, _transport) = build_engine(EngineConfig::default());
        let (tx, rx) = mpsc::channel(8);
        for i in 0..3 {
            tx.send(InboundMessage::text(1, i, 10 + i, "hi")).await.unwrap();
        }
        drop(tx);

        assert_eq!(engine.run_message_loop(rx).await, 3);
        assert_eq!(engine.state().stats.total_messages().await, 3);
    }

    #[tokio::test]
    async fn test_message_loop_ends_on_shutdown() {
        let (engine, _transport) = build_engine(EngineConfig::default());
        let (_tx, rx) = mpsc::channel::<InboundMessage>(8);

        engine.shutdown_coordinator().trigger_shutdown().await;
        assert_eq!(engine.run_message_loop(rx).await, 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_shutdown_stops_sweepers_and_saves_snapshot() {
        let dir = tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.snapshot.path = dir.path().join("state.json");
        config.snapshot.save_on_shutdown = true;
        let (engine, _transport) = build_engine(config);

        engine.start().await.unwrap();
        engine.state().gbans.ban(99).await;
        engine
            .state()
            .scheduled
            .enqueue(1, Utc::now() + chrono::Duration::hours(1), scheduled::ScheduledMessage::new("later"))
            .await;

        let stats = engine.shutdown().await.unwrap();
        assert_eq!(stats.tasks_stopped.len(), 3);
        assert!(!stats.forced_termination());

        let (restored, _) = build_engine({
            let mut config = EngineConfig::default();
            config.snapshot.path = dir.path().join("state.json");
            config
        });
        restored.restore_snapshot().await.unwrap();
        assert!(restored.state().gbans.is_banned(99).await);
        assert_eq!(restored.state().scheduled.len().await, 1);
    }
}
