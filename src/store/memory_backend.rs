//! In-memory store backend using DashMap.
//!
//! Holds every collection in process memory. Used for development, for the
//! test suites, and as the fallback when no database is configured. All data
//! is lost on restart.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::notification::{
    DeliveryStatus, NewNotification, Notification, NotificationType, SESSION_REMINDER_TYPE,
};

use super::backend::{NotificationStore, ScheduleUpdate, StoreError};
use super::models::{ChatRecord, MessageRecord, SessionRecord, UserProfile};

/// In-memory store backend.
///
/// Session reminder uniqueness is enforced through `reminder_index`: the
/// entry for `(user_id, session_id)` is claimed before the row becomes
/// visible, so concurrent inserts for the same key cannot both succeed.
#[derive(Default)]
pub struct MemoryStore {
    types: DashMap<String, NotificationType>,
    profiles: DashMap<String, UserProfile>,
    sessions: DashMap<String, SessionRecord>,
    messages: DashMap<String, MessageRecord>,
    chats: DashMap<String, ChatRecord>,
    notifications: DashMap<Uuid, Notification>,
    reminder_index: DashMap<(String, String), Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a catalog row (inactive rows included).
    pub fn put_type(&self, notification_type: NotificationType) {
        self.types
            .insert(notification_type.key.clone(), notification_type);
    }

    pub fn put_profile(&self, profile: UserProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    pub fn put_session(&self, session: SessionRecord) {
        self.sessions.insert(session.id.clone(), session);
    }

    pub fn put_message(&self, message: MessageRecord) {
        self.messages.insert(message.id.clone(), message);
    }

    pub fn put_chat(&self, chat: ChatRecord) {
        self.chats.insert(chat.id.clone(), chat);
    }

    /// Snapshot of every stored notification, oldest first.
    pub fn notifications(&self) -> Vec<Notification> {
        let mut all: Vec<Notification> = self
            .notifications
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|n| n.created_at);
        all
    }

    pub fn notifications_for(&self, user_id: &str) -> Vec<Notification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect()
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.len()
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_active_type(&self, key: &str) -> Result<Option<NotificationType>, StoreError> {
        Ok(self
            .types
            .get(key)
            .filter(|t| t.is_active)
            .map(|t| t.clone()))
    }

    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.profiles.get(user_id).map(|p| p.clone()))
    }

    async fn find_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    async fn list_sessions_between(
        &self,
        status: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();

        let mut sessions: Vec<SessionRecord> = self
            .sessions
            .iter()
            .filter(|s| s.status == status && s.date >= from && s.date <= to)
            .map(|s| s.clone())
            .collect();
        sessions.sort_by(|a, b| (&a.date, &a.time).cmp(&(&b.date, &b.time)));
        Ok(sessions)
    }

    async fn find_message(&self, message_id: &str) -> Result<Option<MessageRecord>, StoreError> {
        Ok(self.messages.get(message_id).map(|m| m.clone()))
    }

    async fn find_chat(&self, chat_id: &str) -> Result<Option<ChatRecord>, StoreError> {
        Ok(self.chats.get(chat_id).map(|c| c.clone()))
    }

    async fn insert_notification(&self, new: NewNotification) -> Result<Notification, StoreError> {
        let id = Uuid::new_v4();

        let reminder_key = match (new.type_key.as_deref(), new.session_id()) {
            (Some(SESSION_REMINDER_TYPE), Some(session_id)) => {
                Some((new.user_id.clone(), session_id.to_string()))
            }
            _ => None,
        };

        let notification = new.into_notification(id);

        match reminder_key {
            Some(key) => match self.reminder_index.entry(key) {
                Entry::Occupied(existing) => {
                    let (user_id, session_id) = existing.key().clone();
                    Err(StoreError::Duplicate {
                        user_id,
                        session_id,
                    })
                }
                Entry::Vacant(slot) => {
                    self.notifications.insert(id, notification.clone());
                    slot.insert(id);
                    Ok(notification)
                }
            },
            None => {
                self.notifications.insert(id, notification.clone());
                Ok(notification)
            }
        }
    }

    async fn find_notification(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        Ok(self.notifications.get(&id).map(|n| n.clone()))
    }

    async fn find_session_reminder(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Notification>, StoreError> {
        let id = self
            .reminder_index
            .get(&(user_id.to_string(), session_id.to_string()))
            .map(|entry| *entry.value());

        Ok(id.and_then(|id| self.notifications.get(&id).map(|n| n.clone())))
    }

    async fn update_schedule(&self, id: Uuid, update: ScheduleUpdate) -> Result<bool, StoreError> {
        match self.notifications.get_mut(&id) {
            Some(mut notification) => {
                notification.delivery_status = update.delivery_status;
                notification.scheduled_for = update.scheduled_for;
                notification.delivered_at = update.delivered_at;
                notification.updated_at = update.updated_at;
                if let Some(title) = update.title {
                    notification.title = title;
                }
                if let Some(message) = update.message {
                    notification.message = message;
                }
                if let Some(metadata) = update.metadata {
                    notification.metadata = metadata;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn cancel_session_reminders(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut cancelled = 0;

        for mut entry in self.notifications.iter_mut() {
            let notification = entry.value_mut();
            if !notification.is_session_reminder() || notification.session_id() != Some(session_id) {
                continue;
            }

            let already_cancelled = notification.delivery_status
                == DeliveryStatus::Cancelled
                && notification.scheduled_for.is_none()
                && notification.delivered_at.is_none();
            if already_cancelled {
                continue;
            }

            notification.delivery_status = DeliveryStatus::Cancelled;
            notification.scheduled_for = None;
            notification.delivered_at = None;
            notification.updated_at = now;
            cancelled += 1;
        }

        Ok(cancelled)
    }

    async fn select_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Uuid>, StoreError> {
        let mut due: Vec<(Option<DateTime<Utc>>, DateTime<Utc>, Uuid)> = self
            .notifications
            .iter()
            .filter(|entry| entry.is_due(now))
            .map(|entry| (entry.scheduled_for, entry.created_at, entry.id))
            .collect();

        // NULLS FIRST, then earliest schedule, then oldest
        due.sort();
        Ok(due.into_iter().take(limit).map(|(_, _, id)| id).collect())
    }

    async fn mark_sent(&self, ids: &[Uuid], now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut promoted = 0;

        for id in ids {
            if let Some(mut notification) = self.notifications.get_mut(id) {
                if notification.delivery_status.is_dispatchable() {
                    notification.delivery_status = DeliveryStatus::Sent;
                    notification.delivered_at = Some(now);
                    notification.updated_at = now;
                    promoted += 1;
                }
            }
        }

        Ok(promoted)
    }
}
