//! PostgreSQL-based store backend.
//!
//! Reads the application's `notification_types`, `profiles`, `sessions`,
//! `chats` and `messages` tables and owns writes to `notifications`. The
//! schema lives in `migrations/`; the partial unique index
//! `uq_notifications_session_reminder` backs the one-reminder-per-session
//! guarantee.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::notification::{
    Metadata, NewNotification, Notification, NotificationType, SESSION_REMINDER_TYPE,
};

use super::backend::{NotificationStore, ScheduleUpdate, StoreError};
use super::models::{ChatRecord, MessageRecord, SessionRecord, UserProfile};

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, message, type_key, channels, priority, \
     delivery_status, scheduled_for, delivered_at, expires_at, metadata, is_read, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: String,
    title: String,
    message: String,
    type_key: Option<String>,
    channels: Vec<String>,
    priority: String,
    delivery_status: String,
    scheduled_for: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    metadata: Value,
    is_read: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            message: row.message,
            type_key: row.type_key,
            channels: row.channels.into_iter().collect(),
            priority: row.priority.parse()?,
            delivery_status: row.delivery_status.parse()?,
            scheduled_for: row.scheduled_for,
            delivered_at: row.delivered_at,
            expires_at: row.expires_at,
            metadata: into_object(row.metadata, "notifications.metadata")?,
            is_read: row.is_read,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NotificationTypeRow {
    key: String,
    default_priority: String,
    default_channels: Vec<String>,
    default_delay_seconds: i64,
    is_active: bool,
}

impl TryFrom<NotificationTypeRow> for NotificationType {
    type Error = StoreError;

    fn try_from(row: NotificationTypeRow) -> Result<Self, Self::Error> {
        Ok(NotificationType {
            key: row.key,
            default_priority: row.default_priority.parse()?,
            default_channels: row.default_channels.into_iter().collect(),
            default_delay_seconds: row.default_delay_seconds,
            is_active: row.is_active,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: String,
    full_name: Option<String>,
    notification_preferences: Value,
    support_preferences: Value,
}

impl TryFrom<ProfileRow> for UserProfile {
    type Error = StoreError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(UserProfile {
            id: row.id,
            full_name: row.full_name,
            notification_preferences: into_object(
                row.notification_preferences,
                "profiles.notification_preferences",
            )?,
            support_preferences: into_object(row.support_preferences, "profiles.support_preferences")?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    patient_id: String,
    counselor_id: String,
    date: String,
    time: String,
    status: String,
    session_type: Option<String>,
    duration_minutes: Option<i32>,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        SessionRecord {
            id: row.id,
            patient_id: row.patient_id,
            counselor_id: row.counselor_id,
            date: row.date,
            time: row.time,
            status: row.status,
            session_type: row.session_type,
            duration_minutes: row.duration_minutes,
        }
    }
}

/// JSON object columns may be stored as `null`; anything else that is not an
/// object is a data error.
fn into_object(value: Value, column: &str) -> Result<Metadata, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Metadata::new()),
        other => Err(StoreError::InvalidData(format!(
            "{column} is not a JSON object: {other}"
        ))),
    }
}

/// PostgreSQL-based store backend.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl NotificationStore for PostgresStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_active_type(&self, key: &str) -> Result<Option<NotificationType>, StoreError> {
        let row: Option<NotificationTypeRow> = sqlx::query_as(
            r#"
            SELECT key, default_priority, default_channels, default_delay_seconds, is_active
            FROM notification_types
            WHERE key = $1 AND is_active = TRUE
            LIMIT 1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(NotificationType::try_from).transpose()
    }

    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT id, full_name, notification_preferences, support_preferences
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserProfile::try_from).transpose()
    }

    async fn find_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, patient_id, counselor_id, date, time, status,
                   type AS session_type, duration_minutes
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SessionRecord::from))
    }

    async fn list_sessions_between(
        &self,
        status: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, patient_id, counselor_id, date, time, status,
                   type AS session_type, duration_minutes
            FROM sessions
            WHERE status = $1 AND date >= $2 AND date <= $3
            ORDER BY date ASC, time ASC
            "#,
        )
        .bind(status)
        .bind(from.format("%Y-%m-%d").to_string())
        .bind(to.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SessionRecord::from).collect())
    }

    async fn find_message(&self, message_id: &str) -> Result<Option<MessageRecord>, StoreError> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, chat_id, sender_id, content FROM messages WHERE id = $1",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, chat_id, sender_id, content)| MessageRecord {
            id,
            chat_id,
            sender_id,
            content,
        }))
    }

    async fn find_chat(&self, chat_id: &str) -> Result<Option<ChatRecord>, StoreError> {
        let row: Option<(String, Vec<String>)> =
            sqlx::query_as("SELECT id, participant_ids FROM chats WHERE id = $1")
                .bind(chat_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, participant_ids)| ChatRecord {
            id,
            participant_ids,
        }))
    }

    async fn insert_notification(&self, new: NewNotification) -> Result<Notification, StoreError> {
        let id = Uuid::new_v4();
        let sql = format!(
            r#"
            INSERT INTO notifications (
                id, user_id, title, message, type_key, channels, priority,
                delivery_status, scheduled_for, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );

        let row: NotificationRow = sqlx::query_as(&sql)
            .bind(id)
            .bind(&new.user_id)
            .bind(&new.title)
            .bind(&new.message)
            .bind(&new.type_key)
            .bind(new.channels.to_vec())
            .bind(new.priority.as_str())
            .bind(new.delivery_status.as_str())
            .bind(new.scheduled_for)
            .bind(Value::Object(new.metadata.clone()))
            .bind(new.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_insert_error(e, &new))?;

        let notification = Notification::try_from(row)?;

        tracing::trace!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            status = %notification.delivery_status,
            "Notification inserted into PostgreSQL"
        );

        Ok(notification)
    }

    async fn find_notification(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1");
        let row: Option<NotificationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Notification::try_from).transpose()
    }

    async fn find_session_reminder(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Notification>, StoreError> {
        let sql = format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1 AND type_key = $2 AND metadata ->> 'sessionId' = $3
            ORDER BY created_at ASC
            LIMIT 1
            "#
        );
        let row: Option<NotificationRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(SESSION_REMINDER_TYPE)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Notification::try_from).transpose()
    }

    async fn update_schedule(&self, id: Uuid, update: ScheduleUpdate) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET delivery_status = $2, scheduled_for = $3, delivered_at = $4, updated_at = $5,
                title = COALESCE($6, title),
                message = COALESCE($7, message),
                metadata = COALESCE($8, metadata)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.delivery_status.as_str())
        .bind(update.scheduled_for)
        .bind(update.delivered_at)
        .bind(update.updated_at)
        .bind(update.title)
        .bind(update.message)
        .bind(update.metadata.map(Value::Object))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn cancel_session_reminders(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET delivery_status = 'cancelled', scheduled_for = NULL, delivered_at = NULL, updated_at = $3
            WHERE type_key = $1
              AND metadata ->> 'sessionId' = $2
              AND (delivery_status <> 'cancelled' OR scheduled_for IS NOT NULL OR delivered_at IS NOT NULL)
            "#,
        )
        .bind(SESSION_REMINDER_TYPE)
        .bind(session_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn select_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Uuid>, StoreError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM notifications
            WHERE delivery_status IN ('pending', 'scheduled')
              AND (scheduled_for IS NULL OR scheduled_for <= $1)
            ORDER BY scheduled_for ASC NULLS FIRST, created_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn mark_sent(&self, ids: &[Uuid], now: DateTime<Utc>) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET delivery_status = 'sent', delivered_at = $2, updated_at = $2
            WHERE id = ANY($1) AND delivery_status IN ('pending', 'scheduled')
            "#,
        )
        .bind(ids)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// `LIMIT` value for a caller-supplied batch size.
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn map_insert_error(err: sqlx::Error, new: &NewNotification) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate {
                user_id: new.user_id.clone(),
                session_id: new.session_id().unwrap_or_default().to_string(),
            };
        }
    }
    StoreError::Postgres(err)
}
