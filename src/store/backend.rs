//! Backend trait for the engine's persistent store.
//!
//! The store is an external data service; this trait is the narrow query
//! interface the engine needs from it, so that different implementations
//! (memory, PostgreSQL) can be used interchangeably.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::notification::{
    DeliveryStatus, Metadata, NewNotification, Notification, NotificationType, UnknownVariant,
};

use super::models::{ChatRecord, MessageRecord, SessionRecord, UserProfile};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A second session reminder for the same (user, session) was rejected
    #[error("Session reminder already exists for user {user_id} and session {session_id}")]
    Duplicate { user_id: String, session_id: String },

    /// The call did not complete within the configured budget
    #[error("Store call {operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// A stored row could not be mapped onto the engine's types
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// The configured backend cannot be built
    #[error("Store backend {0} is not available")]
    Unavailable(String),
}

impl From<UnknownVariant> for StoreError {
    fn from(err: UnknownVariant) -> Self {
        StoreError::InvalidData(err.to_string())
    }
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }
}

/// Field changes applied to an existing notification.
///
/// Schedule fields are always written; content fields only when `Some`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleUpdate {
    pub delivery_status: DeliveryStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Query interface over profiles, sessions, messages, the notification type
/// catalog and the notifications collection.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; a single store is shared by every
/// engine component and by concurrent request handlers.
///
/// # Uniqueness
///
/// `insert_notification` must reject a second `session_reminder` row for the
/// same `(user_id, metadata.sessionId)` with [`StoreError::Duplicate`].
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Short identifier for logs and health output.
    fn backend_name(&self) -> &'static str;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Catalog row matching `key` that is active.
    async fn find_active_type(&self, key: &str) -> Result<Option<NotificationType>, StoreError>;

    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;

    async fn find_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Sessions in `status` whose date lies in `[from, to]` (inclusive).
    async fn list_sessions_between(
        &self,
        status: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SessionRecord>, StoreError>;

    async fn find_message(&self, message_id: &str) -> Result<Option<MessageRecord>, StoreError>;

    async fn find_chat(&self, chat_id: &str) -> Result<Option<ChatRecord>, StoreError>;

    /// Insert a notification; the store assigns its id.
    async fn insert_notification(&self, new: NewNotification) -> Result<Notification, StoreError>;

    async fn find_notification(&self, id: Uuid) -> Result<Option<Notification>, StoreError>;

    /// The `session_reminder` row for `(user_id, session_id)`, if any.
    async fn find_session_reminder(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Notification>, StoreError>;

    /// Apply `update` to one notification. Returns whether a row matched.
    async fn update_schedule(&self, id: Uuid, update: ScheduleUpdate) -> Result<bool, StoreError>;

    /// Cancel every `session_reminder` for `session_id`, clearing
    /// `scheduled_for` and `delivered_at`. Returns the number of rows changed.
    async fn cancel_session_reminders(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Up to `limit` ids of pending/scheduled notifications whose
    /// `scheduled_for` is null or `<= now`, earliest first.
    async fn select_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Uuid>, StoreError>;

    /// Promote the given ids to `sent` with `delivered_at = now`, skipping
    /// any that are no longer pending/scheduled. Returns the number promoted.
    async fn mark_sent(&self, ids: &[Uuid], now: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::Timeout {
            operation: "find_session",
            timeout_ms: 250,
        };
        assert!(err.to_string().contains("find_session"));
        assert!(err.to_string().contains("250ms"));

        let dup = StoreError::Duplicate {
            user_id: "u-1".into(),
            session_id: "s-1".into(),
        };
        assert!(dup.is_duplicate());
        assert!(!err.is_duplicate());
    }
}
