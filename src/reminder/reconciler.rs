use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::metrics::{ReminderMetrics, StoreMetrics};
use crate::notification::{
    initial_status, normalize, DeliveryStatus, EnqueueRequest, Metadata, Notification,
    NotificationService, NotificationType, UserPreferences, MAX_REMINDER_LEAD_MINUTES,
    SESSION_ID_KEY, SESSION_REMINDER_TYPE,
};
use crate::store::{ScheduleUpdate, SessionRecord, SESSION_STATUS_SCHEDULED};

use super::session_time::session_start;

/// Metadata key recording the session start a reminder was computed for.
const SESSION_START_KEY: &str = "sessionStart";

/// Largest look-ahead accepted by the seeding sweep (31 days).
pub const MAX_SEED_WINDOW_MINUTES: i64 = 31 * 24 * 60;

/// What happened to one participant's reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "notificationId", rename_all = "snake_case")]
pub enum ParticipantOutcome {
    Created(Uuid),
    Updated(Uuid),
    Unchanged(Uuid),
    Failed,
}

impl ParticipantOutcome {
    pub fn notification_id(&self) -> Option<Uuid> {
        match self {
            ParticipantOutcome::Created(id)
            | ParticipantOutcome::Updated(id)
            | ParticipantOutcome::Unchanged(id) => Some(*id),
            ParticipantOutcome::Failed => None,
        }
    }

    fn action(&self) -> &'static str {
        match self {
            ParticipantOutcome::Created(_) => "created",
            ParticipantOutcome::Updated(_) => "updated",
            ParticipantOutcome::Unchanged(_) => "unchanged",
            ParticipantOutcome::Failed => "failed",
        }
    }
}

/// Result of reconciling one session's reminders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Session is scheduled; each participant's reminder was brought in line
    Reconciled {
        patient: ParticipantOutcome,
        counselor: ParticipantOutcome,
    },
    /// Session is no longer scheduled; `count` reminder rows were cancelled
    Cancelled { count: u64 },
    /// Session row is gone; any reminders left for it were cancelled
    SessionNotFound { cancelled: u64 },
    /// Session date/time could not be parsed; nothing was written
    InvalidSchedule,
    /// The store failed before any reminder could be reconciled
    StoreFailed,
}

#[derive(Debug, Clone, Copy)]
enum Role {
    Patient,
    Counselor,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Counselor => "counselor",
        }
    }
}

/// Keeps session reminders converged on the session record.
///
/// Safe to call any number of times per session: repeated calls with an
/// unchanged session leave exactly one reminder per participant with the same
/// `scheduled_for`. Concurrent calls for the same session converge on one row
/// per participant through the store's uniqueness guarantee.
pub struct SessionReminderReconciler {
    service: NotificationService,
    default_lead: Duration,
}

impl SessionReminderReconciler {
    /// `default_lead_minutes` applies when neither the participant nor the
    /// `session_reminder` catalog entry sets a lead time. It is clamped to
    /// `0..=MAX_REMINDER_LEAD_MINUTES`.
    pub fn new(service: NotificationService, default_lead_minutes: i64) -> Self {
        let minutes = default_lead_minutes.clamp(0, MAX_REMINDER_LEAD_MINUTES);
        Self {
            service,
            default_lead: Duration::try_minutes(minutes).unwrap_or_else(Duration::zero),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn ensure_session_reminder_for_session(&self, session_id: &str) -> ReconcileOutcome {
        let store = self.service.store();
        let session = match store.find_session(session_id).await {
            Ok(session) => session,
            Err(e) => {
                StoreMetrics::record_error("find_session");
                tracing::error!(session_id = %session_id, error = %e, "Failed to load session");
                ReminderMetrics::record_action("store_failed");
                return ReconcileOutcome::StoreFailed;
            }
        };

        let session = match session {
            Some(session) if session.is_scheduled() => session,
            Some(session) => {
                return match self.cancel_reminders(session_id).await {
                    Some(count) => {
                        tracing::info!(
                            session_id = %session_id,
                            status = %session.status,
                            cancelled = count,
                            "Session not scheduled, reminders cancelled"
                        );
                        ReconcileOutcome::Cancelled { count }
                    }
                    None => ReconcileOutcome::StoreFailed,
                };
            }
            None => {
                return match self.cancel_reminders(session_id).await {
                    Some(cancelled) => {
                        tracing::warn!(
                            session_id = %session_id,
                            cancelled = cancelled,
                            "Session not found, reminders cancelled"
                        );
                        ReminderMetrics::record_action("session_not_found");
                        ReconcileOutcome::SessionNotFound { cancelled }
                    }
                    None => ReconcileOutcome::StoreFailed,
                };
            }
        };

        let start = match session_start(&session.date, &session.time) {
            Ok(start) => start,
            Err(e) => {
                tracing::error!(
                    session_id = %session_id,
                    error = %e,
                    "Malformed session datetime, reminder generation aborted"
                );
                ReminderMetrics::record_action("invalid_schedule");
                return ReconcileOutcome::InvalidSchedule;
            }
        };

        let type_config = self
            .service
            .catalog()
            .get_type_config(SESSION_REMINDER_TYPE)
            .await;

        let (patient, counselor) = futures::join!(
            self.reconcile_participant(&session, Role::Patient, start, type_config.as_ref()),
            self.reconcile_participant(&session, Role::Counselor, start, type_config.as_ref()),
        );

        tracing::info!(
            session_id = %session_id,
            patient = patient.action(),
            counselor = counselor.action(),
            "Session reminders reconciled"
        );
        ReconcileOutcome::Reconciled { patient, counselor }
    }

    /// Reconcile every scheduled session starting within the next
    /// `window_minutes`. Returns the number of sessions reconciled.
    #[tracing::instrument(skip(self))]
    pub async fn seed_upcoming_session_reminders(&self, window_minutes: i64) -> usize {
        if window_minutes <= 0 {
            return 0;
        }
        let now = self.service.clock().now();
        let Some(horizon) =
            Duration::try_minutes(window_minutes).and_then(|window| now.checked_add_signed(window))
        else {
            tracing::warn!(window_minutes = window_minutes, "Seed window out of range, nothing seeded");
            return 0;
        };

        let sessions = match self
            .service
            .store()
            .list_sessions_between(SESSION_STATUS_SCHEDULED, now.date_naive(), horizon.date_naive())
            .await
        {
            Ok(sessions) => sessions,
            Err(e) => {
                StoreMetrics::record_error("list_sessions_between");
                tracing::error!(error = %e, "Failed to list upcoming sessions");
                return 0;
            }
        };

        let mut reconciled = 0;
        for session in sessions {
            let in_window = session_start(&session.date, &session.time)
                .map(|start| start >= now && start <= horizon)
                .unwrap_or(false);
            if !in_window {
                continue;
            }
            self.ensure_session_reminder_for_session(&session.id).await;
            reconciled += 1;
        }

        ReminderMetrics::record_seeded(reconciled);
        tracing::info!(
            window_minutes = window_minutes,
            sessions = reconciled,
            "Upcoming session reminders seeded"
        );
        reconciled
    }

    async fn cancel_reminders(&self, session_id: &str) -> Option<u64> {
        let now = self.service.clock().now();
        match self
            .service
            .store()
            .cancel_session_reminders(session_id, now)
            .await
        {
            Ok(count) => {
                ReminderMetrics::record_cancelled(count);
                Some(count)
            }
            Err(e) => {
                StoreMetrics::record_error("cancel_session_reminders");
                tracing::error!(session_id = %session_id, error = %e, "Failed to cancel reminders");
                None
            }
        }
    }

    async fn reconcile_participant(
        &self,
        session: &SessionRecord,
        role: Role,
        start: DateTime<Utc>,
        type_config: Option<&NotificationType>,
    ) -> ParticipantOutcome {
        let user_id = match role {
            Role::Patient => session.patient_id.as_str(),
            Role::Counselor => session.counselor_id.as_str(),
        };
        let preferences = self.service.preferences().get_user_preferences(user_id).await;
        let now = normalize(self.service.clock().now());
        let lead = self.lead_time(&preferences, type_config);
        let target = match start.checked_sub_signed(lead) {
            Some(at) => normalize(at).max(now),
            None => {
                tracing::warn!(
                    user_id = %user_id,
                    session_id = %session.id,
                    lead_seconds = lead.num_seconds(),
                    "Reminder lead time reaches past the calendar, reminding now"
                );
                now
            }
        };
        let deliver = preferences.should_deliver(Some(SESSION_REMINDER_TYPE));
        let content = ReminderContent::for_session(session, role, start);

        let outcome = match self.find_existing(user_id, &session.id).await {
            Err(()) => ParticipantOutcome::Failed,
            Ok(Some(existing)) => {
                self.apply(existing, start, target, deliver, now, content)
                    .await
            }
            Ok(None) => {
                let request = EnqueueRequest::new(
                    user_id,
                    SESSION_REMINDER_TYPE,
                    content.title.clone(),
                    content.message.clone(),
                )
                .metadata(content.metadata.clone())
                .scheduled_for(target);

                match self.service.enqueue(request).await.notification_id {
                    Some(id) => ParticipantOutcome::Created(id),
                    // Lost an insert race (or the write failed): converge on
                    // whatever row now holds the key
                    None => match self.find_existing(user_id, &session.id).await {
                        Ok(Some(existing)) => {
                            self.apply(existing, start, target, deliver, now, content)
                                .await
                        }
                        _ => ParticipantOutcome::Failed,
                    },
                }
            }
        };

        ReminderMetrics::record_action(outcome.action());
        outcome
    }

    /// Lead time: participant override, then catalog default delay, then the
    /// engine default. Catalog delays above `MAX_REMINDER_LEAD_MINUTES` are
    /// skipped.
    fn lead_time(
        &self,
        preferences: &UserPreferences,
        type_config: Option<&NotificationType>,
    ) -> Duration {
        let max_seconds = MAX_REMINDER_LEAD_MINUTES * 60;
        preferences
            .reminder_lead_time()
            .or_else(|| {
                type_config
                    .map(|config| config.default_delay_seconds)
                    .filter(|&seconds| seconds > 0 && seconds <= max_seconds)
            })
            .and_then(Duration::try_seconds)
            .unwrap_or(self.default_lead)
    }

    async fn find_existing(&self, user_id: &str, session_id: &str) -> Result<Option<Notification>, ()> {
        self.service
            .store()
            .find_session_reminder(user_id, session_id)
            .await
            .map_err(|e| {
                StoreMetrics::record_error("find_session_reminder");
                tracing::error!(
                    user_id = %user_id,
                    session_id = %session_id,
                    error = %e,
                    "Failed to look up existing reminder"
                );
            })
    }

    async fn apply(
        &self,
        existing: Notification,
        start: DateTime<Utc>,
        target: DateTime<Utc>,
        deliver: bool,
        now: DateTime<Utc>,
        content: ReminderContent,
    ) -> ParticipantOutcome {
        let status = initial_status(deliver, Some(target), now);

        // A moved session always gets a fresh reminder. Otherwise old and new
        // times that have both passed are the same reminder.
        let session_moved = recorded_start(&existing).is_some_and(|recorded| recorded != start);
        let same_schedule = !session_moved
            && (existing.scheduled_for == Some(target)
                || (existing.scheduled_for.is_some_and(|at| at <= now) && target <= now));
        let same_content = existing.title == content.title
            && existing.message == content.message
            && existing.metadata == content.metadata;

        if same_schedule
            && same_content
            && (existing.delivery_status == status
                || existing.delivery_status == DeliveryStatus::Sent)
        {
            return ParticipantOutcome::Unchanged(existing.id);
        }

        let update = if same_schedule && existing.delivery_status == DeliveryStatus::Sent {
            // Content only; keep the delivered record as it is
            ScheduleUpdate {
                delivery_status: DeliveryStatus::Sent,
                scheduled_for: existing.scheduled_for,
                delivered_at: existing.delivered_at,
                updated_at: now,
                title: Some(content.title),
                message: Some(content.message),
                metadata: Some(content.metadata),
            }
        } else {
            ScheduleUpdate {
                delivery_status: status,
                scheduled_for: Some(target),
                delivered_at: None,
                updated_at: now,
                title: Some(content.title),
                message: Some(content.message),
                metadata: Some(content.metadata),
            }
        };

        match self.service.store().update_schedule(existing.id, update).await {
            Ok(true) => ParticipantOutcome::Updated(existing.id),
            Ok(false) => {
                tracing::warn!(notification_id = %existing.id, "Reminder vanished before update");
                ParticipantOutcome::Failed
            }
            Err(e) => {
                StoreMetrics::record_error("update_schedule");
                tracing::error!(notification_id = %existing.id, error = %e, "Failed to update reminder");
                ParticipantOutcome::Failed
            }
        }
    }
}

/// Session start stored on a reminder by an earlier reconcile.
fn recorded_start(reminder: &Notification) -> Option<DateTime<Utc>> {
    let raw = reminder.metadata.get(SESSION_START_KEY)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

struct ReminderContent {
    title: String,
    message: String,
    metadata: Metadata,
}

impl ReminderContent {
    fn for_session(session: &SessionRecord, role: Role, start: DateTime<Utc>) -> Self {
        let kind = session
            .session_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("counseling");
        let message = format!(
            "Your {kind} session starts on {} at {} UTC.",
            session.date, session.time
        );

        let mut metadata = Metadata::new();
        metadata.insert(SESSION_ID_KEY.to_string(), json!(session.id));
        metadata.insert("sessionDate".to_string(), json!(session.date));
        metadata.insert("sessionTime".to_string(), json!(session.time));
        metadata.insert(SESSION_START_KEY.to_string(), json!(start.to_rfc3339()));
        metadata.insert("role".to_string(), json!(role.as_str()));

        Self {
            title: "Upcoming session reminder".to_string(),
            message,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FixedClock};
    use crate::store::{MemoryStore, NotificationStore, UserProfile};
    use chrono::TimeZone;
    use std::sync::Arc;

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
        reconciler: SessionReminderReconciler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        store.put_type(NotificationType::new(SESSION_REMINDER_TYPE).with_delay_seconds(3600));
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 5, 30, 12, 0, 0).unwrap(),
        ));
        let service = NotificationService::new(store.clone(), clock.clone());
        Fixture {
            reconciler: SessionReminderReconciler::new(service, 60),
            store,
            clock,
        }
    }

    fn session(date: &str, time: &str) -> SessionRecord {
        SessionRecord::new("s-1", "p-1", "c-1", date, time)
    }

    #[tokio::test]
    async fn test_creates_one_reminder_per_participant() {
        let f = fixture();
        f.store.put_session(session("2025-06-01", "10:00"));

        let outcome = f.reconciler.ensure_session_reminder_for_session("s-1").await;
        assert!(matches!(
            outcome,
            ReconcileOutcome::Reconciled {
                patient: ParticipantOutcome::Created(_),
                counselor: ParticipantOutcome::Created(_),
            }
        ));

        let reminder = f.store.find_session_reminder("p-1", "s-1").await.unwrap().unwrap();
        assert_eq!(
            reminder.scheduled_for,
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap())
        );
        assert_eq!(reminder.delivery_status, DeliveryStatus::Scheduled);
        assert_eq!(reminder.metadata["role"], "patient");
        assert_eq!(reminder.metadata["sessionStart"], "2025-06-01T10:00:00+00:00");
    }

    #[tokio::test]
    async fn test_repeat_calls_are_unchanged() {
        let f = fixture();
        f.store.put_session(session("2025-06-01", "10:00"));

        f.reconciler.ensure_session_reminder_for_session("s-1").await;
        let again = f.reconciler.ensure_session_reminder_for_session("s-1").await;
        assert!(matches!(
            again,
            ReconcileOutcome::Reconciled {
                patient: ParticipantOutcome::Unchanged(_),
                counselor: ParticipantOutcome::Unchanged(_),
            }
        ));
        assert_eq!(f.store.notification_count(), 2);
    }

    #[tokio::test]
    async fn test_past_reminder_is_clamped_to_now() {
        let f = fixture();
        // Starts in 30 minutes, lead time is an hour
        f.store.put_session(session("2025-05-30", "12:30"));

        f.reconciler.ensure_session_reminder_for_session("s-1").await;
        let reminder = f.store.find_session_reminder("c-1", "s-1").await.unwrap().unwrap();
        assert_eq!(reminder.scheduled_for, Some(f.clock.now()));
        assert_eq!(reminder.delivery_status, DeliveryStatus::Pending);

        // Later calls do not keep moving it
        f.clock.advance(Duration::minutes(5));
        let again = f.reconciler.ensure_session_reminder_for_session("s-1").await;
        assert!(matches!(
            again,
            ReconcileOutcome::Reconciled {
                counselor: ParticipantOutcome::Unchanged(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_sent_reminder_is_not_rearmed() {
        let f = fixture();
        f.store.put_session(session("2025-06-01", "10:00"));
        f.reconciler.ensure_session_reminder_for_session("s-1").await;

        let reminder = f.store.find_session_reminder("p-1", "s-1").await.unwrap().unwrap();
        f.clock.set(Utc.with_ymd_and_hms(2025, 6, 1, 9, 1, 0).unwrap());
        f.store.mark_sent(&[reminder.id], f.clock.now()).await.unwrap();

        f.reconciler.ensure_session_reminder_for_session("s-1").await;
        let after = f.store.find_notification(reminder.id).await.unwrap().unwrap();
        assert_eq!(after.delivery_status, DeliveryStatus::Sent);

        // A reschedule does re-arm it
        f.store.put_session(session("2025-06-02", "10:00"));
        f.reconciler.ensure_session_reminder_for_session("s-1").await;
        let rearmed = f.store.find_notification(reminder.id).await.unwrap().unwrap();
        assert_eq!(rearmed.delivery_status, DeliveryStatus::Scheduled);
        assert_eq!(rearmed.delivered_at, None);
        assert_eq!(rearmed.metadata["sessionDate"], "2025-06-02");
    }

    #[tokio::test]
    async fn test_session_moved_after_reminder_sent_is_rearmed() {
        let f = fixture();
        f.store.put_session(session("2025-06-01", "10:00"));
        f.reconciler.ensure_session_reminder_for_session("s-1").await;

        let reminder = f.store.find_session_reminder("p-1", "s-1").await.unwrap().unwrap();
        f.clock.set(Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap());
        f.store.mark_sent(&[reminder.id], f.clock.now()).await.unwrap();

        // New reminder time (09:15) is already past; remind right away
        f.store.put_session(session("2025-06-01", "10:15"));
        let outcome = f.reconciler.ensure_session_reminder_for_session("s-1").await;
        assert!(matches!(
            outcome,
            ReconcileOutcome::Reconciled {
                patient: ParticipantOutcome::Updated(_),
                ..
            }
        ));

        let rearmed = f.store.find_notification(reminder.id).await.unwrap().unwrap();
        assert_eq!(rearmed.delivery_status, DeliveryStatus::Pending);
        assert_eq!(rearmed.scheduled_for, Some(f.clock.now()));
        assert_eq!(rearmed.delivered_at, None);
        assert!(rearmed.message.contains("10:15"));
        assert_eq!(rearmed.metadata["sessionStart"], "2025-06-01T10:15:00+00:00");

        // Once delivered, the moved session does not trigger it again
        f.clock.advance(Duration::minutes(1));
        f.store.mark_sent(&[reminder.id], f.clock.now()).await.unwrap();
        f.clock.advance(Duration::minutes(1));
        let again = f.reconciler.ensure_session_reminder_for_session("s-1").await;
        assert!(matches!(
            again,
            ReconcileOutcome::Reconciled {
                patient: ParticipantOutcome::Unchanged(_),
                ..
            }
        ));
        let after = f.store.find_notification(reminder.id).await.unwrap().unwrap();
        assert_eq!(after.delivery_status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn test_out_of_range_lead_times_fall_back() {
        let f = fixture();
        f.store.put_session(session("2025-06-01", "10:00"));
        f.store.put_profile(UserProfile::new("p-1").with_support_preference("reminderLeadTime", 1e12));

        let outcome = f.reconciler.ensure_session_reminder_for_session("s-1").await;
        assert!(matches!(
            outcome,
            ReconcileOutcome::Reconciled {
                patient: ParticipantOutcome::Created(_),
                counselor: ParticipantOutcome::Created(_),
            }
        ));
        // The catalog's hour applies instead
        let patient = f.store.find_session_reminder("p-1", "s-1").await.unwrap().unwrap();
        assert_eq!(
            patient.scheduled_for,
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap())
        );

        // An oversized catalog delay and engine default are bounded too
        let store = Arc::new(MemoryStore::new());
        store.put_type(NotificationType::new(SESSION_REMINDER_TYPE).with_delay_seconds(i64::MAX));
        store.put_session(session("2025-06-01", "10:00"));
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 5, 30, 12, 0, 0).unwrap(),
        ));
        let reconciler = SessionReminderReconciler::new(
            NotificationService::new(store.clone(), clock.clone()),
            i64::MAX,
        );

        reconciler.ensure_session_reminder_for_session("s-1").await;
        let counselor = store.find_session_reminder("c-1", "s-1").await.unwrap().unwrap();
        assert_eq!(counselor.scheduled_for, Some(clock.now()));
        assert_eq!(counselor.delivery_status, DeliveryStatus::Pending);
    }

    #[tokio::test]
    async fn test_opt_out_after_creation_cancels_on_next_reconcile() {
        let f = fixture();
        f.store.put_session(session("2025-06-01", "10:00"));
        f.reconciler.ensure_session_reminder_for_session("s-1").await;

        f.store.put_profile(
            UserProfile::new("p-1").with_notification_preference("sessionReminders", false),
        );
        f.reconciler.ensure_session_reminder_for_session("s-1").await;

        let patient = f.store.find_session_reminder("p-1", "s-1").await.unwrap().unwrap();
        assert_eq!(patient.delivery_status, DeliveryStatus::Cancelled);
        let counselor = f.store.find_session_reminder("c-1", "s-1").await.unwrap().unwrap();
        assert_eq!(counselor.delivery_status, DeliveryStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_lead_time_fallbacks() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 5, 30, 12, 0, 0).unwrap(),
        ));
        // No catalog entry: engine default applies
        let reconciler =
            SessionReminderReconciler::new(NotificationService::new(store.clone(), clock), 15);
        store.put_session(session("2025-06-01", "10:00"));
        store.put_profile(UserProfile::new("c-1").with_support_preference("reminderLeadTime", "45"));

        reconciler.ensure_session_reminder_for_session("s-1").await;

        let patient = store.find_session_reminder("p-1", "s-1").await.unwrap().unwrap();
        assert_eq!(
            patient.scheduled_for,
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 9, 45, 0).unwrap())
        );
        let counselor = store.find_session_reminder("c-1", "s-1").await.unwrap().unwrap();
        assert_eq!(
            counselor.scheduled_for,
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 9, 15, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_malformed_datetime_writes_nothing() {
        let f = fixture();
        f.store.put_session(session("2025-06-01", "ten o'clock"));

        let outcome = f.reconciler.ensure_session_reminder_for_session("s-1").await;
        assert_eq!(outcome, ReconcileOutcome::InvalidSchedule);
        assert_eq!(f.store.notification_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_session_cancels_leftovers() {
        let f = fixture();
        f.store.put_session(session("2025-06-01", "10:00"));
        f.reconciler.ensure_session_reminder_for_session("s-1").await;

        let outcome = f.reconciler.ensure_session_reminder_for_session("s-404").await;
        assert_eq!(outcome, ReconcileOutcome::SessionNotFound { cancelled: 0 });
    }

    #[tokio::test]
    async fn test_seed_only_reconciles_sessions_in_window() {
        let f = fixture();
        f.store.put_session(SessionRecord::new("soon", "p-1", "c-1", "2025-05-30", "18:00"));
        f.store.put_session(SessionRecord::new("tomorrow", "p-2", "c-1", "2025-05-31", "11:00"));
        f.store.put_session(SessionRecord::new("later", "p-3", "c-1", "2025-06-05", "11:00"));
        f.store.put_session(SessionRecord::new("earlier", "p-4", "c-1", "2025-05-30", "08:00"));
        f.store.put_session(
            SessionRecord::new("cancelled", "p-5", "c-1", "2025-05-30", "18:00")
                .with_status("cancelled"),
        );

        let seeded = f.reconciler.seed_upcoming_session_reminders(24 * 60).await;
        assert_eq!(seeded, 2);
        assert!(f.store.find_session_reminder("p-1", "soon").await.unwrap().is_some());
        assert!(f.store.find_session_reminder("p-2", "tomorrow").await.unwrap().is_some());
        assert!(f.store.find_session_reminder("p-3", "later").await.unwrap().is_none());
        assert!(f.store.find_session_reminder("p-4", "earlier").await.unwrap().is_none());

        assert_eq!(f.reconciler.seed_upcoming_session_reminders(0).await, 0);
    }

    #[tokio::test]
    async fn test_seed_window_bounds() {
        let f = fixture();
        f.store.put_session(SessionRecord::new("soon", "p-1", "c-1", "2025-05-30", "18:00"));

        assert_eq!(f.reconciler.seed_upcoming_session_reminders(i64::MAX / 2).await, 0);
        assert_eq!(f.reconciler.seed_upcoming_session_reminders(i64::MAX).await, 0);
        assert_eq!(f.store.notification_count(), 0);

        let seeded = f
            .reconciler
            .seed_upcoming_session_reminders(MAX_SEED_WINDOW_MINUTES)
            .await;
        assert_eq!(seeded, 1);
    }
}
