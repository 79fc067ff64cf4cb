//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::notification::DeliveryStatus;

use super::{
    CATALOG_CACHE_SIZE, CATALOG_LOOKUPS_TOTAL, DISPATCH_LAST_BATCH, DISPATCH_SWEEPS_TOTAL,
    DISPATCH_SWEEP_DURATION, FANOUT_RECIPIENTS_TOTAL, NOTIFICATIONS_DISPATCHED_TOTAL,
    NOTIFICATIONS_ENQUEUED_TOTAL, REMINDERS_RECONCILED_TOTAL, REMINDER_SEED_SESSIONS_TOTAL,
    STORE_ERRORS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording enqueue metrics
pub struct EnqueueMetrics;

impl EnqueueMetrics {
    /// Record a notification written with the given initial status
    pub fn record_written(status: DeliveryStatus) {
        NOTIFICATIONS_ENQUEUED_TOTAL
            .with_label_values(&[status.as_str()])
            .inc();
    }
}

/// Helper struct for recording event fan-out metrics
pub struct FanOutMetrics;

impl FanOutMetrics {
    pub fn record_persisted(event: &str) {
        FANOUT_RECIPIENTS_TOTAL
            .with_label_values(&[event, "persisted"])
            .inc();
    }

    pub fn record_failed(event: &str) {
        FANOUT_RECIPIENTS_TOTAL
            .with_label_values(&[event, "failed"])
            .inc();
    }
}

/// Helper struct for recording dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record a completed sweep
    pub fn record_sweep(promoted: u64, duration_secs: f64) {
        DISPATCH_SWEEPS_TOTAL.with_label_values(&["ok"]).inc();
        NOTIFICATIONS_DISPATCHED_TOTAL.inc_by(promoted);
        DISPATCH_LAST_BATCH.set(promoted as i64);
        DISPATCH_SWEEP_DURATION.observe(duration_secs);
    }

    /// Record a sweep aborted by a store failure
    pub fn record_failed_sweep(duration_secs: f64) {
        DISPATCH_SWEEPS_TOTAL.with_label_values(&["error"]).inc();
        DISPATCH_LAST_BATCH.set(0);
        DISPATCH_SWEEP_DURATION.observe(duration_secs);
    }
}

/// Helper struct for recording reminder metrics
pub struct ReminderMetrics;

impl ReminderMetrics {
    pub fn record_action(action: &str) {
        REMINDERS_RECONCILED_TOTAL.with_label_values(&[action]).inc();
    }

    pub fn record_cancelled(count: u64) {
        REMINDERS_RECONCILED_TOTAL
            .with_label_values(&["cancelled"])
            .inc_by(count);
    }

    pub fn record_seeded(sessions: usize) {
        REMINDER_SEED_SESSIONS_TOTAL.inc_by(sessions as u64);
    }
}

/// Helper struct for recording catalog cache metrics
pub struct CatalogMetrics;

impl CatalogMetrics {
    pub fn record_hit() {
        CATALOG_LOOKUPS_TOTAL.with_label_values(&["hit"]).inc();
    }

    pub fn record_miss() {
        CATALOG_LOOKUPS_TOTAL.with_label_values(&["miss"]).inc();
    }

    /// Store had no active row for the key
    pub fn record_absent() {
        CATALOG_LOOKUPS_TOTAL.with_label_values(&["absent"]).inc();
    }

    pub fn set_cache_size(size: usize) {
        CATALOG_CACHE_SIZE.set(size as i64);
    }
}

/// Helper struct for recording store failures
pub struct StoreMetrics;

impl StoreMetrics {
    pub fn record_error(operation: &str) {
        STORE_ERRORS_TOTAL.with_label_values(&[operation]).inc();
    }
}
