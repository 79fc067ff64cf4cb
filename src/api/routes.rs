use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::{api_key_auth, AppState};

use super::handlers::{
    assignment_event, dispatch_due, enqueue_notification, message_event,
    reconcile_session_reminder, seed_reminders,
};
use super::health::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health, stats & metrics
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Engine triggers
        .nest(
            "/api/v1",
            Router::new()
                .route("/notifications", post(enqueue_notification))
                .route("/notifications/dispatch", post(dispatch_due))
                .route("/reminders/seed", post(seed_reminders))
                .route(
                    "/sessions/{session_id}/reminder",
                    post(reconcile_session_reminder),
                )
                .route("/events/message", post(message_event))
                .route("/events/assignment", post(assignment_event))
                .route_layer(middleware::from_fn_with_state(state, api_key_auth)),
        )
}
