use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::config::EngineConfig;
use crate::notification::DueNotificationDispatcher;
use crate::reminder::SessionReminderReconciler;

/// Background task driving the dispatch and reminder seeding sweeps
pub struct SweepTask {
    config: EngineConfig,
    dispatcher: Arc<DueNotificationDispatcher>,
    reminders: Arc<SessionReminderReconciler>,
    shutdown: broadcast::Receiver<()>,
}

impl SweepTask {
    pub fn new(
        config: EngineConfig,
        dispatcher: Arc<DueNotificationDispatcher>,
        reminders: Arc<SessionReminderReconciler>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            reminders,
            shutdown,
        }
    }

    /// Run both sweeps until a shutdown signal arrives.
    ///
    /// The seeding sweep runs once at startup so reminders exist before the
    /// first dispatch; the dispatch sweep waits one interval.
    pub async fn run(mut self) {
        let dispatch_interval = Duration::from_secs(self.config.dispatch_interval_seconds.max(1));
        let seed_interval = Duration::from_secs(self.config.seed_interval_seconds.max(1));

        let mut dispatch_timer = tokio::time::interval(dispatch_interval);
        let mut seed_timer = tokio::time::interval(seed_interval);
        // A slow store must not cause a burst of catch-up sweeps
        dispatch_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        seed_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip immediate first dispatch tick
        dispatch_timer.tick().await;

        tracing::info!(
            dispatch_interval_secs = dispatch_interval.as_secs(),
            dispatch_batch_size = self.config.dispatch_batch_size,
            seed_interval_secs = seed_interval.as_secs(),
            seed_window_minutes = self.config.seed_window_minutes,
            "Sweep task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Sweep task received shutdown signal");
                    break;
                }
                _ = dispatch_timer.tick() => {
                    self.run_dispatch(dispatch_interval).await;
                }
                _ = seed_timer.tick() => {
                    self.run_seed().await;
                }
            }
        }

        tracing::info!("Sweep task stopped");
    }

    async fn run_dispatch(&self, interval: Duration) {
        let start = Instant::now();
        let promoted = self
            .dispatcher
            .dispatch_due_notifications(self.config.dispatch_batch_size)
            .await;
        let elapsed = start.elapsed();

        tracing::debug!(
            promoted = promoted,
            elapsed_ms = elapsed.as_millis() as u64,
            "Dispatch sweep round completed"
        );

        // A full batch means more work is likely waiting
        if promoted as usize >= self.config.dispatch_batch_size {
            tracing::warn!(
                promoted = promoted,
                batch_size = self.config.dispatch_batch_size,
                "Dispatch sweep hit batch limit, backlog may be growing"
            );
        }
        if elapsed > interval / 2 {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                interval_ms = interval.as_millis() as u64,
                "Dispatch sweep took more than 50% of interval"
            );
        }
    }

    async fn run_seed(&self) {
        let reconciled = self
            .reminders
            .seed_upcoming_session_reminders(self.config.seed_window_minutes)
            .await;
        tracing::debug!(sessions = reconciled, "Reminder seeding round completed");
    }
}
