//! Notification engine: type catalog, preference gating, scheduling,
//! enqueueing, event fan-out, and the due-notification sweep.
//!
//! All writes are best-effort. Operations return outcomes and counts rather
//! than errors; failures are logged and counted in
//! `counsel_notify_store_errors_total`.

mod catalog;
mod dispatcher;
mod events;
mod preferences;
mod schedule;
mod service;
mod types;

pub use catalog::TypeCatalog;
pub use dispatcher::{DispatcherStatsSnapshot, DueNotificationDispatcher};
pub use events::{
    message_preview, FanOutReport, COUNSELOR_ASSIGNED_TYPE, MESSAGE_PREVIEW_CHARS,
    MESSAGE_RECEIVED_TYPE, PATIENT_ASSIGNED_TYPE,
};
pub use preferences::{
    preference_flag, should_deliver, PreferenceResolver, UserPreferences,
    MAX_REMINDER_LEAD_MINUTES, REMINDER_LEAD_TIME_KEY,
};
pub use schedule::{determine_scheduled_for, initial_status, normalize};
pub use service::NotificationService;
pub use types::{
    default_channels, Channels, DeliveryStatus, EnqueueOutcome, EnqueueRequest, Metadata,
    NewNotification, Notification, NotificationType, Priority, UnknownVariant, DEFAULT_CHANNEL,
    SESSION_ID_KEY, SESSION_REMINDER_TYPE,
};
