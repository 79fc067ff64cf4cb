//! Read models for the external collections the engine consults.
//!
//! These rows are owned by the surrounding application; the engine only
//! reads them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::notification::Metadata;

/// Status value of a session that should carry reminders.
pub const SESSION_STATUS_SCHEDULED: &str = "scheduled";

/// A user's profile, restricted to the fields notification delivery needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub full_name: Option<String>,
    /// preference key -> boolean flag
    pub notification_preferences: Metadata,
    /// includes `reminderLeadTime` (minutes)
    pub support_preferences: Metadata,
}

impl UserProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }

    pub fn with_notification_preference(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.notification_preferences.insert(key.into(), value.into());
        self
    }

    pub fn with_support_preference(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.support_preferences.insert(key.into(), value.into());
        self
    }
}

/// A counseling session between a patient and a counselor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub patient_id: String,
    pub counselor_id: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM` or `HH:MM:SS`
    pub time: String,
    pub status: String,
    pub session_type: Option<String>,
    pub duration_minutes: Option<i32>,
}

impl SessionRecord {
    pub fn new(
        id: impl Into<String>,
        patient_id: impl Into<String>,
        counselor_id: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            patient_id: patient_id.into(),
            counselor_id: counselor_id.into(),
            date: date.into(),
            time: time.into(),
            status: SESSION_STATUS_SCHEDULED.to_string(),
            session_type: None,
            duration_minutes: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == SESSION_STATUS_SCHEDULED
    }
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
}

/// A conversation and its participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    pub participant_ids: Vec<String>,
}
