use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::clock::Clock;
use crate::metrics::{DispatchMetrics, StoreMetrics};
use crate::store::NotificationStore;

/// Statistics for the due-notification dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Sweeps that completed
    pub sweeps: AtomicU64,
    /// Sweeps aborted by a store error
    pub failed_sweeps: AtomicU64,
    /// Notifications promoted to sent
    pub promoted: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            failed_sweeps: self.failed_sweeps.load(Ordering::Relaxed),
            promoted: self.promoted.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub sweeps: u64,
    pub failed_sweeps: u64,
    pub promoted: u64,
}

/// Promotes due notifications to `sent`.
///
/// "Sent" means eligible for provider pickup; no channel delivery happens
/// here. Concurrent sweeps may select overlapping rows, but `mark_sent` only
/// promotes rows that are still pending or scheduled, so each row is counted
/// by at most one sweep.
pub struct DueNotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    clock: Arc<dyn Clock>,
    stats: DispatcherStats,
}

impl DueNotificationDispatcher {
    pub fn new(store: Arc<dyn NotificationStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            stats: DispatcherStats::default(),
        }
    }

    /// Promote up to `limit` due notifications. Returns the number promoted,
    /// or 0 when the store fails.
    #[tracing::instrument(skip(self))]
    pub async fn dispatch_due_notifications(&self, limit: usize) -> u64 {
        if limit == 0 {
            return 0;
        }
        let started = Instant::now();
        let now = self.clock.now();

        let due = match self.store.select_due(now, limit).await {
            Ok(ids) => ids,
            Err(e) => {
                self.record_failure("select_due", started);
                tracing::error!(error = %e, "Failed to select due notifications");
                return 0;
            }
        };
        if due.is_empty() {
            self.record_success(0, started);
            return 0;
        }

        match self.store.mark_sent(&due, now).await {
            Ok(promoted) => {
                self.record_success(promoted, started);
                tracing::info!(
                    selected = due.len(),
                    promoted = promoted,
                    "Dispatch sweep completed"
                );
                promoted
            }
            Err(e) => {
                self.record_failure("mark_sent", started);
                tracing::error!(
                    selected = due.len(),
                    error = %e,
                    "Failed to mark due notifications as sent"
                );
                0
            }
        }
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    fn record_success(&self, promoted: u64, started: Instant) {
        self.stats.sweeps.fetch_add(1, Ordering::Relaxed);
        self.stats.promoted.fetch_add(promoted, Ordering::Relaxed);
        DispatchMetrics::record_sweep(promoted, started.elapsed().as_secs_f64());
    }

    fn record_failure(&self, operation: &str, started: Instant) {
        self.stats.failed_sweeps.fetch_add(1, Ordering::Relaxed);
        StoreMetrics::record_error(operation);
        DispatchMetrics::record_failed_sweep(started.elapsed().as_secs_f64());
    }
}
