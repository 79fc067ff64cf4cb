//! Schedule calculator and initial delivery status.

use chrono::{DateTime, Duration, SubsecRound, Utc};

use super::types::{DeliveryStatus, NotificationType};

/// Truncate to microseconds, the resolution PostgreSQL keeps for timestamps.
pub fn normalize(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

/// Effective delivery time for a new notification.
///
/// An explicit `requested` time always wins. Otherwise the type's default
/// delay applies; no type, a non-positive delay or one too large to add to
/// `now` means "next sweep" (`None`).
pub fn determine_scheduled_for(
    requested: Option<DateTime<Utc>>,
    type_config: Option<&NotificationType>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if let Some(at) = requested {
        return Some(normalize(at));
    }
    let config = type_config?;
    let delay = config.default_delay_seconds;
    if delay <= 0 {
        return None;
    }
    match Duration::try_seconds(delay).and_then(|d| now.checked_add_signed(d)) {
        Some(at) => Some(normalize(at)),
        None => {
            tracing::warn!(
                type_key = %config.key,
                delay_seconds = delay,
                "Default delay out of range, scheduling for next sweep"
            );
            None
        }
    }
}

/// Delivery status a record is written (or re-armed) with.
pub fn initial_status(
    should_deliver: bool,
    scheduled_for: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DeliveryStatus {
    if !should_deliver {
        return DeliveryStatus::Cancelled;
    }
    match scheduled_for {
        Some(at) if at > now => DeliveryStatus::Scheduled,
        _ => DeliveryStatus::Pending,
    }
}
