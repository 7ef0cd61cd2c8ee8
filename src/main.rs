// src/main.rs - Run the moderation engine over newline-delimited JSON events on stdin

use anyhow::{Context, Result};
use log::{error, info, warn};
use std::env;
use std::io::{self, BufRead, BufReader};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;

use groupwarden::prelude::*;

const DEFAULT_CONFIG_PATH: &str = "groupwarden.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables and initialize logging
    dotenv::dotenv().ok();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Starting groupwarden v{}", groupwarden::VERSION);

    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("GROUPWARDEN_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let mut config = EngineConfig::load(&config_path)
        .await
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    config
        .apply_env_overrides()
        .context("Invalid configuration override in environment")?;

    if config.owners.is_empty() {
        warn!("No owners configured; owner-only commands are disabled (set OWNER_ID)");
    }

    // Every requested action is logged by the transport
    let transport = Arc::new(RecordingTransport::named("stdout"));
    let engine = ModerationEngine::new(config, transport)?;

    if engine.config().snapshot.path.exists() {
        match engine.restore_snapshot().await {
            Ok(()) => info!("Restored state from {}", engine.config().snapshot.path.display()),
            Err(e) => warn!("Ignoring unreadable snapshot: {:#}", e),
        }
    }

    let coordinator = engine.shutdown_coordinator();
    coordinator.start_signal_handlers();
    engine.start().await?;

    let (tx, rx) = mpsc::channel::<InboundMessage>(256);
    spawn_event_reader(BufReader::new(io::stdin()), tx).context("Failed to start the stdin reader")?;

    // the reader thread is never joined; a pending stdin read must not hold up exit
    let handled = engine.run_message_loop(rx).await;

    let stats = engine.shutdown().await?;
    info!(
        "groupwarden exiting after {} messages ({} tasks stopped, {} aborted)",
        handled,
        stats.tasks_stopped.len(),
        stats.tasks_aborted.len()
    );
    Ok(())
}

/// Parse one JSON event per line on a dedicated thread; malformed lines are logged and skipped
fn spawn_event_reader<R>(input: R, tx: mpsc::Sender<InboundMessage>) -> io::Result<thread::JoinHandle<usize>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("event-reader".to_string())
        .spawn(move || forward_events(input, &tx))
}

/// Returns how many events were forwarded
fn forward_events<R: BufRead>(input: R, tx: &mpsc::Sender<InboundMessage>) -> usize {
    let mut forwarded = 0;
    let mut line_number = 0usize;

    for line in input.lines() {
        line_number += 1;
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<InboundMessage>(&line) {
            Ok(message) => {
                if tx.blocking_send(message).is_err() {
                    break;
                }
                forwarded += 1;
            }
            Err(e) => warn!("Skipping malformed event on line {}: {}", line_number, e),
        }
    }

    info!("Event reader stopped after {} lines", line_number);
    forwarded
}
