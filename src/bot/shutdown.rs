// src/bot/shutdown.rs - Graceful shutdown management

use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Shutdown phases for orderly termination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Normal operation
    Running,
    /// Background loops finish their current pass and exit
    Draining,
    /// Shutdown complete
    Stopped,
}

/// Statistics about the shutdown process
#[derive(Debug, Clone, Default)]
pub struct ShutdownStats {
    pub tasks_stopped: Vec<String>,
    pub tasks_aborted: Vec<String>,
    pub duration: Duration,
}

impl ShutdownStats {
    pub fn forced_termination(&self) -> bool {
        !self.tasks_aborted.is_empty()
    }
}

/// Broadcasts the shutdown phase to background tasks and joins them on the way out
pub struct ShutdownCoordinator {
    phase: Arc<RwLock<ShutdownPhase>>,
    notifier: broadcast::Sender<ShutdownPhase>,
    tasks: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (notifier, _) = broadcast::channel(16);
        Self {
            phase: Arc::new(RwLock::new(ShutdownPhase::Running)),
            notifier,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Track a background task so `drain` can wait for it
    pub async fn register_task(&self, name: &str, handle: JoinHandle<()>) {
        self.tasks.lock().await.push((name.to_string(), handle));
        debug!("Registered background task: {}", name);
    }

    pub async fn task_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Subscribe to shutdown phase changes
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownPhase> {
        self.notifier.subscribe()
    }

    pub async fn phase(&self) -> ShutdownPhase {
        *self.phase.read().await
    }

    pub async fn is_shutdown_requested(&self) -> bool {
        self.phase().await != ShutdownPhase::Running
    }

    /// Start listening for Ctrl+C and SIGTERM
    pub fn start_signal_handlers(&self) {
        let phase = Arc::clone(&self.phase);
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C signal, initiating graceful shutdown...");
                    Self::enter_draining(&phase, &notifier).await;
                }
                Err(err) => error!("Failed to listen for Ctrl+C signal: {}", err),
            }
        });

        #[cfg(unix)]
        {
            let phase = Arc::clone(&self.phase);
            let notifier = self.notifier.clone();
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(err) => {
                        error!("Failed to register SIGTERM handler: {}", err);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal, initiating graceful shutdown...");
                    Self::enter_draining(&phase, &notifier).await;
                }
            });
        }

        info!("Shutdown signal handlers started");
    }

    /// Manually trigger shutdown (end of input, tests)
    pub async fn trigger_shutdown(&self) {
        info!("Shutdown manually triggered");
        Self::enter_draining(&self.phase, &self.notifier).await;
    }

    async fn enter_draining(phase: &RwLock<ShutdownPhase>, notifier: &broadcast::Sender<ShutdownPhase>) {
        let mut current = phase.write().await;
        if *current == ShutdownPhase::Running {
            *current = ShutdownPhase::Draining;
            // no subscribers is fine
            let _ = notifier.send(ShutdownPhase::Draining);
        }
    }

    /// Resolve once shutdown has been requested
    pub async fn wait_for_shutdown(&self) {
        let mut receiver = self.subscribe();
        if self.is_shutdown_requested().await {
            return;
        }
        loop {
            match receiver.recv().await {
                Ok(ShutdownPhase::Running) => continue,
                Ok(_) | Err(broadcast::error::RecvError::Closed) => return,
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    if self.is_shutdown_requested().await {
                        return;
                    }
                }
            }
        }
    }

    /// Move to `Draining`, give every registered task `grace` to finish, abort the
    /// stragglers and end in `Stopped`.
    pub async fn drain(&self, grace: Duration) -> ShutdownStats {
        let started = Instant::now();
        Self::enter_draining(&self.phase, &self.notifier).await;

        let tasks: Vec<(String, JoinHandle<()>)> = self.tasks.lock().await.drain(..).collect();
        info!("Waiting up to {:?} for {} background tasks", grace, tasks.len());

        let mut stats = ShutdownStats::default();
        let deadline = started + grace;
        for (name, mut handle) in tasks {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, &mut handle).await {
                Ok(Ok(())) => {
                    debug!("Background task '{}' stopped", name);
                    stats.tasks_stopped.push(name);
                }
                Ok(Err(e)) => {
                    error!("Background task '{}' ended abnormally: {}", name, e);
                    stats.tasks_stopped.push(name);
                }
                Err(_) => {
                    warn!("Background task '{}' did not stop in time, aborting", name);
                    handle.abort();
                    stats.tasks_aborted.push(name);
                }
            }
        }

        *self.phase.write().await = ShutdownPhase::Stopped;
        let _ = self.notifier.send(ShutdownPhase::Stopped);

        stats.duration = started.elapsed();
        info!(
            "Graceful shutdown completed in {:.2} seconds ({} stopped, {} aborted)",
            stats.duration.as_secs_f64(),
            stats.tasks_stopped.len(),
            stats.tasks_aborted.len()
        );
        stats
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_shutdown_phases() {
        let coordinator = ShutdownCoordinator::new();
        assert_eq!(coordinator.phase().await, ShutdownPhase::Running);

        coordinator.trigger_shutdown().await;
        assert_eq!(coordinator.phase().await, ShutdownPhase::Draining);
        coordinator.wait_for_shutdown().await;

        coordinator.drain(Duration::from_millis(50)).await;
        assert_eq!(coordinator.phase().await, ShutdownPhase::Stopped);
    }

    #[tokio::test]
    async fn test_drain_waits_for_cooperative_tasks() {
        let coordinator = ShutdownCoordinator::new();
        let finished = Arc::new(AtomicBool::new(false));

        let mut receiver = coordinator.subscribe();
        let flag = finished.clone();
        let handle = tokio::spawn(async move {
            let _ = receiver.recv().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
        });
        coordinator.register_task("worker", handle).await;

        let stats = coordinator.drain(Duration::from_secs(2)).await;
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(stats.tasks_stopped, vec!["worker".to_string()]);
        assert!(!stats.forced_termination());
        assert_eq!(coordinator.task_count().await, 0);
    }

    #[tokio::test]
    async fn test_drain_aborts_stuck_tasks() {
        let coordinator = ShutdownCoordinator::new();
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        coordinator.register_task("stuck", handle).await;

        let stats = coordinator.drain(Duration::from_millis(50)).await;
        assert!(stats.forced_termination());
        assert_eq!(stats.tasks_aborted, vec!["stuck".to_string()]);
    }
}
