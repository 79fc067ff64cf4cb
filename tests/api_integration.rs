//! HTTP surface tests
//!
//! Drive the router with `oneshot` against a memory-backed state.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio_test::assert_ok;
use tower::ServiceExt;

use counsel_notify::clock::FixedClock;
use counsel_notify::config::Settings;
use counsel_notify::notification::{DeliveryStatus, NotificationType, SESSION_REMINDER_TYPE};
use counsel_notify::server::{create_app, AppState, API_KEY_HEADER};
use counsel_notify::store::{MemoryStore, SessionRecord};

const API_KEY: &str = "test-key";

fn create_test_app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store.put_type(NotificationType::new(SESSION_REMINDER_TYPE).with_delay_seconds(3600));
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 5, 30, 12, 0, 0).unwrap(),
    ));

    let mut settings = Settings::default();
    settings.api.key = Some(API_KEY.to_string());

    let state = AppState::new(settings, store.clone(), clock, None);
    (create_app(state), store)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(API_KEY_HEADER, API_KEY)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_and_metrics_are_open() {
    let (app, _store) = create_test_app();

    let response = assert_ok!(
        app.clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
    );
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"]["backend"], "memory");

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_trigger_routes_require_api_key() {
    let (app, store) = create_test_app();

    let missing = Request::builder()
        .method("POST")
        .uri("/api/v1/notifications/dispatch")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(missing).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .method("POST")
        .uri("/api/v1/notifications")
        .header(API_KEY_HEADER, "nope")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"userId": "u-1", "title": "t", "message": "m"}).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(store.notification_count(), 0);
}

#[tokio::test]
async fn test_enqueue_then_dispatch() {
    let (app, store) = create_test_app();

    let response = app
        .clone()
        .oneshot(post(
            "/api/v1/notifications",
            json!({
                "userId": "u-1",
                "typeKey": "system_update",
                "title": "Maintenance",
                "message": "Tonight at 10",
                "priority": "high",
                "metadata": {"source": "ops"}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "pending");
    assert!(body["notificationId"].is_string());

    let response = app
        .oneshot(post("/api/v1/notifications/dispatch?limit=10", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["dispatched"], 1);

    let stored = store.notifications_for("u-1").pop().unwrap();
    assert_eq!(stored.delivery_status, DeliveryStatus::Sent);
    assert_eq!(stored.metadata["source"], "ops");
}

#[tokio::test]
async fn test_enqueue_validation() {
    let (app, store) = create_test_app();

    for body in [
        json!({"userId": "", "title": "t", "message": "m"}),
        json!({"userId": "system", "title": "t", "message": "m"}),
        json!({"userId": "u-1", "title": "  ", "message": "m"}),
    ] {
        let response = app
            .clone()
            .oneshot(post("/api/v1/notifications", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = json_body(response).await;
        assert_eq!(error["error"]["code"], "VALIDATION_ERROR");
    }
    assert_eq!(store.notification_count(), 0);
}

#[tokio::test]
async fn test_session_reminder_route() {
    let (app, store) = create_test_app();
    store.put_session(SessionRecord::new("s-1", "p-1", "c-1", "2025-06-01", "10:00"));

    let response = app
        .clone()
        .oneshot(post("/api/v1/sessions/s-1/reminder", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["outcome"], "reconciled");
    assert_eq!(body["patient"]["action"], "created");

    let response = app
        .oneshot(post("/api/v1/sessions/missing/reminder", json!({})))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["outcome"], "session_not_found");
    assert_eq!(store.notification_count(), 2);
}

#[tokio::test]
async fn test_seed_and_event_routes() {
    let (app, store) = create_test_app();
    store.put_session(SessionRecord::new("s-1", "p-1", "c-1", "2025-05-30", "18:00"));

    let response = app
        .clone()
        .oneshot(post("/api/v1/reminders/seed?windowMinutes=600", json!({})))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["sessionsReconciled"], 1);
    assert_eq!(body["windowMinutes"], 600);

    let response = app
        .clone()
        .oneshot(post(
            "/api/v1/events/assignment",
            json!({"patientId": "p-9", "counselorId": "c-9", "assignedBy": "admin"}),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["persisted"], 2);

    let response = app
        .oneshot(post("/api/v1/events/message", json!({"messageId": "unknown"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["recipients"], 0);
}

#[tokio::test]
async fn test_seed_rejects_out_of_range_window() {
    let (app, store) = create_test_app();
    store.put_session(SessionRecord::new("s-1", "p-1", "c-1", "2025-05-30", "18:00"));

    for window in ["0", "44641", "4611686018427387903"] {
        let response = app
            .clone()
            .oneshot(post(
                &format!("/api/v1/reminders/seed?windowMinutes={window}"),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "window {window}");
        assert_eq!(json_body(response).await["error"]["code"], "VALIDATION_ERROR");
    }
    assert_eq!(store.notification_count(), 0);

    let response = app
        .oneshot(post("/api/v1/reminders/seed?windowMinutes=44640", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["sessionsReconciled"], 1);
}
