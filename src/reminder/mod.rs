//! Session reminders: one per (participant, session), kept in step with the
//! session record.

mod reconciler;
mod session_time;

pub use reconciler::{
    ParticipantOutcome, ReconcileOutcome, SessionReminderReconciler, MAX_SEED_WINDOW_MINUTES,
};
pub use session_time::{session_start, InvalidSessionTime};
