use std::sync::Arc;
use std::time::Instant;

use crate::clock::Clock;
use crate::config::Settings;
use crate::notification::{DueNotificationDispatcher, NotificationService};
use crate::postgres::PostgresPool;
use crate::reminder::SessionReminderReconciler;
use crate::store::NotificationStore;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn NotificationStore>,
    pub notifications: NotificationService,
    pub dispatcher: Arc<DueNotificationDispatcher>,
    pub reminders: Arc<SessionReminderReconciler>,
    pub postgres_pool: Option<Arc<PostgresPool>>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire every engine component around one shared store and clock.
    pub fn new(
        settings: Settings,
        store: Arc<dyn NotificationStore>,
        clock: Arc<dyn Clock>,
        postgres_pool: Option<Arc<PostgresPool>>,
    ) -> Self {
        let notifications = NotificationService::new(store.clone(), clock.clone());
        let dispatcher = Arc::new(DueNotificationDispatcher::new(store.clone(), clock));
        let reminders = Arc::new(SessionReminderReconciler::new(
            notifications.clone(),
            settings.engine.default_reminder_lead_minutes,
        ));

        Self {
            settings: Arc::new(settings),
            store,
            notifications,
            dispatcher,
            reminders,
            postgres_pool,
            start_time: Instant::now(),
        }
    }
}
