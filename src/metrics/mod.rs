//! Prometheus metrics for the notification engine.
//!
//! - Enqueue outcomes by initial delivery status
//! - Dispatch sweep throughput and latency
//! - Session reminder reconciliation actions
//! - Type catalog cache effectiveness
//! - Store failures by operation (every swallowed error lands here)

mod helpers;

pub use helpers::{
    encode_metrics, CatalogMetrics, DispatchMetrics, EnqueueMetrics, FanOutMetrics,
    ReminderMetrics, StoreMetrics,
};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "counsel_notify";

lazy_static! {
    // ============================================================================
    // Enqueue Metrics
    // ============================================================================

    /// Notifications written, by initial delivery status
    pub static ref NOTIFICATIONS_ENQUEUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_enqueued_total", METRIC_PREFIX),
        "Total notifications written by initial delivery status",
        &["status"]
    ).unwrap();

    /// Recipients handled by event-driven fan-out helpers
    pub static ref FANOUT_RECIPIENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_fanout_recipients_total", METRIC_PREFIX),
        "Recipients processed by event fan-out, by event and result",
        &["event", "result"]
    ).unwrap();

    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Notifications promoted to sent
    pub static ref NOTIFICATIONS_DISPATCHED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_dispatched_total", METRIC_PREFIX),
        "Total notifications promoted to sent by the dispatch sweep"
    ).unwrap();

    /// Dispatch sweeps run
    pub static ref DISPATCH_SWEEPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_sweeps_total", METRIC_PREFIX),
        "Total dispatch sweeps by outcome",
        &["outcome"]
    ).unwrap();

    /// Dispatch sweep latency
    pub static ref DISPATCH_SWEEP_DURATION: Histogram = register_histogram!(
        format!("{}_dispatch_sweep_duration_seconds", METRIC_PREFIX),
        "Dispatch sweep duration in seconds",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).unwrap();

    /// Notifications promoted by the most recent sweep
    pub static ref DISPATCH_LAST_BATCH: IntGauge = register_int_gauge!(
        format!("{}_dispatch_last_batch", METRIC_PREFIX),
        "Notifications promoted by the most recent dispatch sweep"
    ).unwrap();

    // ============================================================================
    // Reminder Metrics
    // ============================================================================

    /// Reminder reconciliation actions (created, updated, unchanged, cancelled, failed, ...)
    pub static ref REMINDERS_RECONCILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_reminders_reconciled_total", METRIC_PREFIX),
        "Session reminder reconciliation results by action",
        &["action"]
    ).unwrap();

    /// Sessions reconciled by the seeding sweep
    pub static ref REMINDER_SEED_SESSIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_reminder_seed_sessions_total", METRIC_PREFIX),
        "Total sessions reconciled by the upcoming-session seeding sweep"
    ).unwrap();

    // ============================================================================
    // Catalog Metrics
    // ============================================================================

    /// Catalog cache lookups by result (hit, miss, absent)
    pub static ref CATALOG_LOOKUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_catalog_lookups_total", METRIC_PREFIX),
        "Notification type catalog lookups by result",
        &["result"]
    ).unwrap();

    /// Entries currently cached
    pub static ref CATALOG_CACHE_SIZE: IntGauge = register_int_gauge!(
        format!("{}_catalog_cache_size", METRIC_PREFIX),
        "Number of notification types held in the catalog cache"
    ).unwrap();

    // ============================================================================
    // Store Metrics
    // ============================================================================

    /// Store failures by operation
    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_store_errors_total", METRIC_PREFIX),
        "Store call failures by operation",
        &["operation"]
    ).unwrap();
}
