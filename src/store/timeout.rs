//! Per-call timeout decorator for store backends.
//!
//! The store client may hang indefinitely on a stalled connection. Wrapping a
//! backend in [`TimeoutStore`] bounds every call so that a slow store turns
//! into an ordinary, logged [`StoreError::Timeout`] instead of stalling the
//! caller's request.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::notification::{NewNotification, Notification, NotificationType};

use super::backend::{NotificationStore, ScheduleUpdate, StoreError};
use super::models::{ChatRecord, MessageRecord, SessionRecord, UserProfile};

/// Store wrapper that applies a fixed timeout to every call.
pub struct TimeoutStore {
    inner: Arc<dyn NotificationStore>,
    timeout: Duration,
}

impl TimeoutStore {
    pub fn new(inner: Arc<dyn NotificationStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation = operation,
                    backend = self.inner.backend_name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(StoreError::Timeout {
                    operation,
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }
}

#[async_trait]
impl NotificationStore for TimeoutStore {
    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded("ping", self.inner.ping()).await
    }

    async fn find_active_type(&self, key: &str) -> Result<Option<NotificationType>, StoreError> {
        self.bounded("find_active_type", self.inner.find_active_type(key))
            .await
    }

    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        self.bounded("find_profile", self.inner.find_profile(user_id))
            .await
    }

    async fn find_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        self.bounded("find_session", self.inner.find_session(session_id))
            .await
    }

    async fn list_sessions_between(
        &self,
        status: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        self.bounded(
            "list_sessions_between",
            self.inner.list_sessions_between(status, from, to),
        )
        .await
    }

    async fn find_message(&self, message_id: &str) -> Result<Option<MessageRecord>, StoreError> {
        self.bounded("find_message", self.inner.find_message(message_id))
            .await
    }

    async fn find_chat(&self, chat_id: &str) -> Result<Option<ChatRecord>, StoreError> {
        self.bounded("find_chat", self.inner.find_chat(chat_id)).await
    }

    async fn insert_notification(&self, new: NewNotification) -> Result<Notification, StoreError> {
        self.bounded("insert_notification", self.inner.insert_notification(new))
            .await
    }

    async fn find_notification(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        self.bounded("find_notification", self.inner.find_notification(id))
            .await
    }

    async fn find_session_reminder(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<Notification>, StoreError> {
        self.bounded(
            "find_session_reminder",
            self.inner.find_session_reminder(user_id, session_id),
        )
        .await
    }

    async fn update_schedule(&self, id: Uuid, update: ScheduleUpdate) -> Result<bool, StoreError> {
        self.bounded("update_schedule", self.inner.update_schedule(id, update))
            .await
    }

    async fn cancel_session_reminders(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.bounded(
            "cancel_session_reminders",
            self.inner.cancel_session_reminders(session_id, now),
        )
        .await
    }

    async fn select_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Uuid>, StoreError> {
        self.bounded("select_due", self.inner.select_due(now, limit))
            .await
    }

    async fn mark_sent(&self, ids: &[Uuid], now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.bounded("mark_sent", self.inner.mark_sent(ids, now)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    /// Store whose catalog lookup never completes.
    struct StalledStore(MemoryStore);

    #[async_trait]
    impl NotificationStore for StalledStore {
        fn backend_name(&self) -> &'static str {
            "stalled"
        }
        async fn ping(&self) -> Result<(), StoreError> {
            self.0.ping().await
        }
        async fn find_active_type(&self, _key: &str) -> Result<Option<NotificationType>, StoreError> {
            std::future::pending().await
        }
        async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
            self.0.find_profile(user_id).await
        }
        async fn find_session(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
            self.0.find_session(id).await
        }
        async fn list_sessions_between(
            &self,
            status: &str,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<Vec<SessionRecord>, StoreError> {
            self.0.list_sessions_between(status, from, to).await
        }
        async fn find_message(&self, id: &str) -> Result<Option<MessageRecord>, StoreError> {
            self.0.find_message(id).await
        }
        async fn find_chat(&self, id: &str) -> Result<Option<ChatRecord>, StoreError> {
            self.0.find_chat(id).await
        }
        async fn insert_notification(&self, new: NewNotification) -> Result<Notification, StoreError> {
            self.0.insert_notification(new).await
        }
        async fn find_notification(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
            self.0.find_notification(id).await
        }
        async fn find_session_reminder(
            &self,
            user_id: &str,
            session_id: &str,
        ) -> Result<Option<Notification>, StoreError> {
            self.0.find_session_reminder(user_id, session_id).await
        }
        async fn update_schedule(&self, id: Uuid, update: ScheduleUpdate) -> Result<bool, StoreError> {
            self.0.update_schedule(id, update).await
        }
        async fn cancel_session_reminders(
            &self,
            session_id: &str,
            now: DateTime<Utc>,
        ) -> Result<u64, StoreError> {
            self.0.cancel_session_reminders(session_id, now).await
        }
        async fn select_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Uuid>, StoreError> {
            self.0.select_due(now, limit).await
        }
        async fn mark_sent(&self, ids: &[Uuid], now: DateTime<Utc>) -> Result<u64, StoreError> {
            self.0.mark_sent(ids, now).await
        }
    }

    #[tokio::test]
    async fn test_stalled_call_times_out() {
        let store = TimeoutStore::new(
            Arc::new(StalledStore(MemoryStore::new())),
            Duration::from_millis(20),
        );

        let err = store.find_active_type("anything").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Timeout {
                operation: "find_active_type",
                timeout_ms: 20
            }
        ));

        // Other calls pass straight through
        assert!(store.ping().await.is_ok());
        assert_eq!(store.backend_name(), "stalled");
    }
}
