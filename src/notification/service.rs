//! Notification writer and enqueue orchestrator.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::metrics::{EnqueueMetrics, StoreMetrics};
use crate::store::NotificationStore;

use super::catalog::TypeCatalog;
use super::preferences::PreferenceResolver;
use super::schedule::{determine_scheduled_for, initial_status};
use super::types::{default_channels, EnqueueOutcome, EnqueueRequest, NewNotification, Priority};

/// Entry point for creating notifications.
///
/// Cheap to clone; every clone shares the same store, catalog cache and clock.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    catalog: Arc<TypeCatalog>,
    preferences: Arc<PreferenceResolver>,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog: Arc::new(TypeCatalog::new(store.clone())),
            preferences: Arc::new(PreferenceResolver::new(store.clone())),
            store,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    pub fn preferences(&self) -> &Arc<PreferenceResolver> {
        &self.preferences
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Create one notification record.
    ///
    /// Never fails: a store write error is logged and reported through
    /// `notification_id: None`, with `status` still describing the record
    /// that would have been written.
    #[tracing::instrument(
        skip(self, request),
        fields(user_id = %request.user_id, type_key = ?request.type_key)
    )]
    pub async fn enqueue(&self, request: EnqueueRequest) -> EnqueueOutcome {
        let type_config = match request.type_key.as_deref() {
            Some(key) => self.catalog.get_type_config(key).await,
            None => None,
        };
        let preferences = self.preferences.get_user_preferences(&request.user_id).await;
        let deliver = preferences.should_deliver(request.type_key.as_deref());

        let now = self.clock.now();
        let scheduled_for = determine_scheduled_for(request.scheduled_for, type_config.as_ref(), now);
        let status = initial_status(deliver, scheduled_for, now);

        let priority = request
            .priority
            .or_else(|| type_config.as_ref().map(|t| t.default_priority))
            .unwrap_or(Priority::Normal);
        let channels = request
            .channels
            .filter(|c| !c.is_empty())
            .or_else(|| {
                type_config
                    .as_ref()
                    .map(|t| t.default_channels.clone())
                    .filter(|c| !c.is_empty())
            })
            .unwrap_or_else(default_channels);

        let new = NewNotification {
            user_id: request.user_id,
            title: request.title,
            message: request.message,
            type_key: request.type_key,
            channels,
            priority,
            delivery_status: status,
            scheduled_for,
            metadata: request.metadata,
            created_at: now,
        };

        match self.store.insert_notification(new).await {
            Ok(notification) => {
                EnqueueMetrics::record_written(status);
                tracing::debug!(
                    notification_id = %notification.id,
                    status = %status,
                    scheduled_for = ?scheduled_for,
                    "Notification enqueued"
                );
                EnqueueOutcome {
                    status,
                    scheduled_for,
                    notification_id: Some(notification.id),
                }
            }
            Err(e) => {
                StoreMetrics::record_error("insert_notification");
                tracing::error!(error = %e, status = %status, "Failed to write notification");
                EnqueueOutcome {
                    status,
                    scheduled_for,
                    notification_id: None,
                }
            }
        }
    }

    /// Run [`enqueue`](Self::enqueue) on a detached task.
    ///
    /// The triggering operation never waits on, or observes failure of, the write.
    pub fn spawn_enqueue(&self, request: EnqueueRequest) -> JoinHandle<EnqueueOutcome> {
        let service = self.clone();
        tokio::spawn(async move { service.enqueue(request).await })
    }
}
