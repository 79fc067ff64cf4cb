//! API layer - HTTP endpoint handlers organized by concern.

mod handlers;
mod health;
mod metrics;
mod routes;

pub use handlers::{
    assignment_event, dispatch_due, enqueue_notification, message_event,
    reconcile_session_reminder, seed_reminders,
};
pub use health::{health, stats};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
