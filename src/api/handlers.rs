//! Trigger endpoints over the notification engine.
//!
//! The engine itself never fails a call; handlers only reject malformed input.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::notification::{EnqueueOutcome, EnqueueRequest, FanOutReport};
use crate::reminder::{ReconcileOutcome, MAX_SEED_WINDOW_MINUTES};
use crate::server::AppState;

/// Recipient id that must never receive a notification.
const SYSTEM_USER: &str = "system";

#[derive(Debug, Default, Deserialize)]
pub struct DispatchParams {
    /// Maximum notifications to promote; defaults to `engine.dispatch_batch_size`
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub dispatched: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedParams {
    /// Look-ahead window; defaults to `engine.seed_window_minutes`
    pub window_minutes: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedResponse {
    pub window_minutes: i64,
    pub sessions_reconciled: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEventRequest {
    pub message_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentEventRequest {
    pub patient_id: String,
    pub counselor_id: String,
    #[serde(default)]
    pub assigned_by: Option<String>,
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// POST /api/v1/notifications
pub async fn enqueue_notification(
    State(state): State<AppState>,
    Json(request): Json<EnqueueRequest>,
) -> Result<Json<EnqueueOutcome>> {
    require("userId", &request.user_id)?;
    require("title", &request.title)?;
    if request.user_id == SYSTEM_USER {
        return Err(AppError::Validation(
            "userId must name a real recipient".to_string(),
        ));
    }

    Ok(Json(state.notifications.enqueue(request).await))
}

/// POST /api/v1/notifications/dispatch
pub async fn dispatch_due(
    State(state): State<AppState>,
    Query(params): Query<DispatchParams>,
) -> Result<Json<DispatchResponse>> {
    let limit = params
        .limit
        .unwrap_or(state.settings.engine.dispatch_batch_size);
    if limit == 0 {
        return Err(AppError::Validation("limit must be positive".to_string()));
    }

    let dispatched = state.dispatcher.dispatch_due_notifications(limit).await;
    Ok(Json(DispatchResponse { dispatched }))
}

/// POST /api/v1/reminders/seed
pub async fn seed_reminders(
    State(state): State<AppState>,
    Query(params): Query<SeedParams>,
) -> Result<Json<SeedResponse>> {
    let window_minutes = params
        .window_minutes
        .unwrap_or(state.settings.engine.seed_window_minutes);
    if window_minutes <= 0 {
        return Err(AppError::Validation(
            "windowMinutes must be positive".to_string(),
        ));
    }
    if window_minutes > MAX_SEED_WINDOW_MINUTES {
        return Err(AppError::Validation(format!(
            "windowMinutes must be at most {MAX_SEED_WINDOW_MINUTES}"
        )));
    }

    let sessions_reconciled = state
        .reminders
        .seed_upcoming_session_reminders(window_minutes)
        .await;
    Ok(Json(SeedResponse {
        window_minutes,
        sessions_reconciled,
    }))
}

/// POST /api/v1/sessions/{session_id}/reminder
pub async fn reconcile_session_reminder(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ReconcileOutcome>> {
    require("sessionId", &session_id)?;
    Ok(Json(
        state
            .reminders
            .ensure_session_reminder_for_session(&session_id)
            .await,
    ))
}

/// POST /api/v1/events/message
pub async fn message_event(
    State(state): State<AppState>,
    Json(request): Json<MessageEventRequest>,
) -> Result<Json<FanOutReport>> {
    require("messageId", &request.message_id)?;
    Ok(Json(
        state
            .notifications
            .enqueue_message_notifications(&request.message_id)
            .await,
    ))
}

/// POST /api/v1/events/assignment
pub async fn assignment_event(
    State(state): State<AppState>,
    Json(request): Json<AssignmentEventRequest>,
) -> Result<Json<FanOutReport>> {
    require("patientId", &request.patient_id)?;
    require("counselorId", &request.counselor_id)?;
    Ok(Json(
        state
            .notifications
            .enqueue_patient_assignment_notifications(
                &request.patient_id,
                &request.counselor_id,
                request.assigned_by.as_deref(),
            )
            .await,
    ))
}
