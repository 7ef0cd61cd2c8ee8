// src/bot/sweeper.rs - Periodic loops that fire due queue entries

use chrono::Utc;
use log::{debug, info};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::delayed_queue::{DelayedQueue, DuePayload};
use super::shutdown::{ShutdownCoordinator, ShutdownPhase};
use super::state::ModerationState;
use crate::config::SweepConfig;
use crate::platforms::ChatTransport;

/// Run `pass` every `period` until the shutdown phase leaves `Running`.
/// A pass that has started always completes; the shutdown check happens between passes.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: broadcast::Receiver<ShutdownPhase>,
    mut pass: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("{} loop started ({:?} interval)", name, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => pass().await,
                phase = shutdown.recv() => match phase {
                    Ok(ShutdownPhase::Running) => continue,
                    Ok(_) | Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                },
            }
        }

        info!("{} loop received shutdown signal", name);
    })
}

/// One sweep of a delayed queue at the current time
pub async fn sweep_once<T: DuePayload>(queue: &DelayedQueue<T>, transport: &dyn ChatTransport) -> usize {
    let outcomes = queue.sweep(Utc::now(), transport).await;
    outcomes.len()
}

/// Start the scheduled-message, auto-delete and activity-pruning loops and register
/// them with the coordinator
pub async fn start_sweepers(
    state: &ModerationState,
    transport: Arc<dyn ChatTransport>,
    config: &SweepConfig,
    coordinator: &ShutdownCoordinator,
) {
    let scheduled = state.scheduled.clone();
    let scheduled_transport = transport.clone();
    let handle = spawn_periodic(
        "Scheduled message sweeper",
        Duration::from_secs(config.scheduled_interval_seconds),
        coordinator.subscribe(),
        move || {
            let queue = scheduled.clone();
            let transport = scheduled_transport.clone();
            async move {
                sweep_once(queue.as_ref(), transport.as_ref()).await;
            }
        },
    );
    coordinator.register_task("scheduled-sweeper", handle).await;

    let auto_delete = state.auto_delete.clone();
    let delete_transport = transport.clone();
    let handle = spawn_periodic(
        "Auto-delete sweeper",
        Duration::from_secs(config.auto_delete_interval_seconds),
        coordinator.subscribe(),
        move || {
            let queue = auto_delete.clone();
            let transport = delete_transport.clone();
            async move {
                sweep_once(queue.as_ref(), transport.as_ref()).await;
            }
        },
    );
    coordinator.register_task("auto-delete-sweeper", handle).await;

    let activity = state.activity.clone();
    let handle = spawn_periodic(
        "Activity pruner",
        Duration::from_secs(config.scheduled_interval_seconds.max(1) * 12),
        coordinator.subscribe(),
        move || {
            let activity = activity.clone();
            async move {
                let dropped = activity.prune_idle(Utc::now()).await;
                debug!("Activity pruner dropped {} idle users", dropped);
            }
        },
    );
    coordinator.register_task("activity-pruner", handle).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::scheduled::ScheduledMessage;
    use crate::config::EngineConfig;
    use crate::platforms::memory::{CallKind, RecordingTransport};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test_log::test(tokio::test)]
    async fn test_periodic_loop_stops_on_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = passes.clone();

        let handle = spawn_periodic("test loop", Duration::from_millis(10), coordinator.subscribe(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        coordinator.register_task("test-loop", handle).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        let stats = coordinator.drain(Duration::from_secs(1)).await;

        assert!(passes.load(Ordering::SeqCst) >= 1);
        assert!(!stats.forced_termination());
        let after = passes.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(passes.load(Ordering::SeqCst), after);
    }

    #[test_log::test(tokio::test)]
    async fn test_sweepers_deliver_due_entries() {
        let mut config = EngineConfig::default();
        config.sweep.scheduled_interval_seconds = 1;
        config.sweep.auto_delete_interval_seconds = 1;
        let state = ModerationState::new(&config);
        let transport = Arc::new(RecordingTransport::new());
        let coordinator = ShutdownCoordinator::new();

        state
            .scheduled
            .enqueue(1, Utc::now() - chrono::Duration::seconds(1), ScheduledMessage::new("due"))
            .await;
        start_sweepers(&state, transport.clone(), &config.sweep, &coordinator).await;
        assert_eq!(coordinator.task_count().await, 3);

        // the first tick fires immediately
        tokio::time::sleep(Duration::from_millis(100)).await;
        let stats = coordinator.drain(Duration::from_secs(2)).await;

        assert!(state.scheduled.is_empty().await);
        assert_eq!(transport.calls_of(CallKind::SendText).await.len(), 1);
        assert_eq!(stats.tasks_stopped.len(), 3);
    }
}
