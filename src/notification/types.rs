use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use uuid::Uuid;

/// Open key/value bag attached to every notification.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Ordered set of delivery channel names (`in_app`, `email`, ...).
pub type Channels = SmallVec<[String; 2]>;

/// Channel used when neither the caller nor the catalog names one.
pub const DEFAULT_CHANNEL: &str = "in_app";

/// Metadata key linking a notification to a counseling session.
pub const SESSION_ID_KEY: &str = "sessionId";

/// Type key of session reminder notifications.
pub const SESSION_REMINDER_TYPE: &str = "session_reminder";

pub fn default_channels() -> Channels {
    smallvec![DEFAULT_CHANNEL.to_string()]
}

/// Priority levels for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Low priority, can be delayed
    Low,
    /// Normal priority (default)
    #[default]
    Normal,
    /// High priority, should be delivered promptly
    High,
    /// Critical priority, immediate delivery required
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored enum column holds an unknown value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(UnknownVariant {
                kind: "priority",
                value: other.to_string(),
            }),
        }
    }
}

/// Delivery status of a notification.
///
/// ```text
/// pending   -> scheduled | sent | cancelled
/// scheduled -> pending | sent | cancelled
/// sent, failed, cancelled: terminal (the reminder reconciler may re-arm a
/// cancelled or sent reminder when its session is rescheduled)
/// ```
///
/// `failed` is reserved for provider-level failure reporting; nothing in
/// this crate sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Scheduled,
    Sent,
    Failed,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Scheduled => "scheduled",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the dispatch sweep may pick this notification up.
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, DeliveryStatus::Pending | DeliveryStatus::Scheduled)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "scheduled" => Ok(DeliveryStatus::Scheduled),
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            "cancelled" => Ok(DeliveryStatus::Cancelled),
            other => Err(UnknownVariant {
                kind: "delivery status",
                value: other.to_string(),
            }),
        }
    }
}

/// Catalog row describing the defaults of a notification type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationType {
    pub key: String,
    pub default_priority: Priority,
    pub default_channels: Channels,
    /// 0 means "deliver as soon as processed"
    pub default_delay_seconds: i64,
    pub is_active: bool,
}

impl NotificationType {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            default_priority: Priority::Normal,
            default_channels: default_channels(),
            default_delay_seconds: 0,
            is_active: true,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.default_priority = priority;
        self
    }

    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_channels = channels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_delay_seconds(mut self, seconds: i64) -> Self {
        self.default_delay_seconds = seconds;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// A persisted notification record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub type_key: Option<String>,
    pub channels: Channels,
    pub priority: Priority,
    pub delivery_status: DeliveryStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: Metadata,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Session this notification refers to, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.metadata.get(SESSION_ID_KEY).and_then(|v| v.as_str())
    }

    pub fn is_session_reminder(&self) -> bool {
        self.type_key.as_deref() == Some(SESSION_REMINDER_TYPE)
    }

    /// Whether a dispatch sweep running at `now` would promote this record.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.delivery_status.is_dispatchable()
            && self.scheduled_for.map_or(true, |at| at <= now)
    }
}

/// Insert payload for a notification; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub type_key: Option<String>,
    pub channels: Channels,
    pub priority: Priority,
    pub delivery_status: DeliveryStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    pub fn session_id(&self) -> Option<&str> {
        self.metadata.get(SESSION_ID_KEY).and_then(|v| v.as_str())
    }

    pub fn into_notification(self, id: Uuid) -> Notification {
        Notification {
            id,
            user_id: self.user_id,
            title: self.title,
            message: self.message,
            type_key: self.type_key,
            channels: self.channels,
            priority: self.priority,
            delivery_status: self.delivery_status,
            scheduled_for: self.scheduled_for,
            delivered_at: None,
            expires_at: None,
            metadata: self.metadata,
            is_read: false,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// A request to create a notification.
///
/// Unset options fall back to the type catalog, then to engine defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    pub user_id: String,
    #[serde(default)]
    pub type_key: Option<String>,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub channels: Option<Channels>,
}

impl EnqueueRequest {
    pub fn new(
        user_id: impl Into<String>,
        type_key: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            type_key: Some(type_key.into()),
            title: title.into(),
            message: message.into(),
            metadata: Metadata::new(),
            scheduled_for: None,
            priority: None,
            channels: None,
        }
    }

    /// A request with no catalog type: no defaults, no preference gating.
    pub fn untyped(
        user_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_key: None,
            ..Self::new(user_id, String::new(), title, message)
        }
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = Some(channels.into_iter().map(Into::into).collect());
        self
    }
}

/// Result of an enqueue call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueOutcome {
    /// Status the record was (or would have been) written with
    pub status: DeliveryStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    /// `None` when the write failed
    pub notification_id: Option<Uuid>,
}

impl EnqueueOutcome {
    pub fn persisted(&self) -> bool {
        self.notification_id.is_some()
    }
}
