//! Preference resolution and delivery gating.
//!
//! Delivery is permissive: a notification is suppressed only when its type is
//! mapped to a preference flag and that flag is stored as boolean `false`.

use std::sync::Arc;

use serde_json::Value;

use crate::metrics::StoreMetrics;
use crate::store::{NotificationStore, UserProfile};

use super::types::Metadata;

/// Longest lead time a reminder may be sent ahead of its session (30 days).
pub const MAX_REMINDER_LEAD_MINUTES: i64 = 30 * 24 * 60;

/// Support preference holding the reminder lead time in minutes.
pub const REMINDER_LEAD_TIME_KEY: &str = "reminderLeadTime";

/// Notification type -> preference flag that can opt a user out of it.
const PREFERENCE_FLAGS: &[(&str, &str)] = &[
    ("message_received", "patientMessages"),
    ("session_reminder", "sessionReminders"),
    ("patient_assigned", "newPatientAssignments"),
    ("counselor_assigned", "counselorAssignments"),
    ("system_update", "systemUpdates"),
];

/// Preference flag gating `type_key`, if the type is opt-out capable.
pub fn preference_flag(type_key: &str) -> Option<&'static str> {
    PREFERENCE_FLAGS
        .iter()
        .find(|(key, _)| *key == type_key)
        .map(|(_, flag)| *flag)
}

/// A user's stored preferences as seen by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPreferences {
    pub notification_preferences: Metadata,
    pub support_preferences: Metadata,
    pub full_name: Option<String>,
}

impl From<UserProfile> for UserPreferences {
    fn from(profile: UserProfile) -> Self {
        Self {
            notification_preferences: profile.notification_preferences,
            support_preferences: profile.support_preferences,
            full_name: profile.full_name,
        }
    }
}

impl UserPreferences {
    /// Whether a notification of `type_key` may be delivered to this user.
    pub fn should_deliver(&self, type_key: Option<&str>) -> bool {
        should_deliver(type_key, self)
    }

    /// The user's reminder lead time in seconds.
    ///
    /// Accepts a JSON number or a numeric string (minutes). Missing,
    /// non-numeric, non-positive and values above
    /// [`MAX_REMINDER_LEAD_MINUTES`] yield `None`.
    pub fn reminder_lead_time(&self) -> Option<i64> {
        let minutes = match self.support_preferences.get(REMINDER_LEAD_TIME_KEY)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        if !minutes.is_finite() || minutes <= 0.0 {
            return None;
        }
        if minutes > MAX_REMINDER_LEAD_MINUTES as f64 {
            tracing::warn!(
                minutes = minutes,
                max_minutes = MAX_REMINDER_LEAD_MINUTES,
                "Reminder lead time out of range, ignoring"
            );
            return None;
        }
        Some((minutes * 60.0).round() as i64)
    }
}

/// `false` only when `type_key` is mapped and its flag is explicitly `false`.
///
/// Untyped notifications, unmapped types, missing flags and non-boolean
/// values are all deliverable.
pub fn should_deliver(type_key: Option<&str>, preferences: &UserPreferences) -> bool {
    let Some(flag) = type_key.and_then(preference_flag) else {
        return true;
    };
    !matches!(
        preferences.notification_preferences.get(flag),
        Some(Value::Bool(false))
    )
}

/// Loads user preferences from the store.
pub struct PreferenceResolver {
    store: Arc<dyn NotificationStore>,
}

impl PreferenceResolver {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// Preferences for `user_id`; empty (fully permissive) when the profile
    /// is missing or the store fails.
    pub async fn get_user_preferences(&self, user_id: &str) -> UserPreferences {
        match self.store.find_profile(user_id).await {
            Ok(Some(profile)) => profile.into(),
            Ok(None) => {
                tracing::debug!(user_id = %user_id, "No profile found, using default preferences");
                UserPreferences::default()
            }
            Err(e) => {
                StoreMetrics::record_error("find_profile");
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "Failed to load preferences, delivering by default"
                );
                UserPreferences::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn prefs_with(key: &str, value: Value) -> UserPreferences {
        let mut prefs = UserPreferences::default();
        prefs.notification_preferences.insert(key.to_string(), value);
        prefs
    }

    #[test]
    fn test_explicit_false_blocks_mapped_type() {
        let prefs = prefs_with("patientMessages", json!(false));
        assert!(!should_deliver(Some("message_received"), &prefs));
        // Other types are unaffected
        assert!(should_deliver(Some("session_reminder"), &prefs));
    }

    #[test]
    fn test_permissive_defaults() {
        assert!(should_deliver(Some("message_received"), &UserPreferences::default()));
        assert!(should_deliver(
            Some("message_received"),
            &prefs_with("patientMessages", json!(true))
        ));
        assert!(should_deliver(
            Some("message_received"),
            &prefs_with("patientMessages", json!("false"))
        ));
        assert!(should_deliver(
            Some("message_received"),
            &prefs_with("patientMessages", json!(0))
        ));
        assert!(should_deliver(None, &prefs_with("patientMessages", json!(false))));
    }

    #[test]
    fn test_unmapped_type_cannot_be_opted_out() {
        let prefs = prefs_with("marketing", json!(false));
        assert!(preference_flag("marketing").is_none());
        assert!(should_deliver(Some("marketing"), &prefs));
    }

    #[test]
    fn test_reminder_lead_time() {
        let mut prefs = UserPreferences::default();
        assert_eq!(prefs.reminder_lead_time(), None);

        prefs.support_preferences.insert(REMINDER_LEAD_TIME_KEY.into(), json!(30));
        assert_eq!(prefs.reminder_lead_time(), Some(1800));

        prefs.support_preferences.insert(REMINDER_LEAD_TIME_KEY.into(), json!("15"));
        assert_eq!(prefs.reminder_lead_time(), Some(900));

        prefs.support_preferences.insert(REMINDER_LEAD_TIME_KEY.into(), json!(0));
        assert_eq!(prefs.reminder_lead_time(), None);

        prefs.support_preferences.insert(REMINDER_LEAD_TIME_KEY.into(), json!(-10));
        assert_eq!(prefs.reminder_lead_time(), None);

        prefs.support_preferences.insert(REMINDER_LEAD_TIME_KEY.into(), json!("soon"));
        assert_eq!(prefs.reminder_lead_time(), None);

        prefs.support_preferences.insert(REMINDER_LEAD_TIME_KEY.into(), json!(true));
        assert_eq!(prefs.reminder_lead_time(), None);

        prefs.support_preferences.insert(
            REMINDER_LEAD_TIME_KEY.into(),
            json!(MAX_REMINDER_LEAD_MINUTES),
        );
        assert_eq!(prefs.reminder_lead_time(), Some(MAX_REMINDER_LEAD_MINUTES * 60));

        prefs.support_preferences.insert(REMINDER_LEAD_TIME_KEY.into(), json!(1e12));
        assert_eq!(prefs.reminder_lead_time(), None);

        prefs.support_preferences.insert(REMINDER_LEAD_TIME_KEY.into(), json!("1e300"));
        assert_eq!(prefs.reminder_lead_time(), None);
    }

    #[tokio::test]
    async fn test_resolver_loads_profile() {
        let store = Arc::new(MemoryStore::new());
        store.put_profile(
            UserProfile::new("u-1")
                .with_name("Dana")
                .with_notification_preference("sessionReminders", false),
        );
        let resolver = PreferenceResolver::new(store);

        let prefs = resolver.get_user_preferences("u-1").await;
        assert_eq!(prefs.full_name.as_deref(), Some("Dana"));
        assert!(!prefs.should_deliver(Some("session_reminder")));

        let missing = resolver.get_user_preferences("u-2").await;
        assert_eq!(missing, UserPreferences::default());
    }
}
