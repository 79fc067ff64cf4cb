//! Event-driven enqueue helpers.
//!
//! Each helper turns a business event into one `enqueue` call per recipient.
//! Recipients are independent: one failed write never blocks the others.

use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::metrics::{FanOutMetrics, StoreMetrics};

use super::service::NotificationService;
use super::types::{EnqueueOutcome, EnqueueRequest, Priority};

pub const MESSAGE_RECEIVED_TYPE: &str = "message_received";
pub const PATIENT_ASSIGNED_TYPE: &str = "patient_assigned";
pub const COUNSELOR_ASSIGNED_TYPE: &str = "counselor_assigned";

/// Characters of a chat message kept in its notification body.
pub const MESSAGE_PREVIEW_CHARS: usize = 140;

const ELLIPSIS: char = '…';
const FALLBACK_SENDER: &str = "Someone";
const FALLBACK_PATIENT: &str = "A patient";
const FALLBACK_COUNSELOR: &str = "your counselor";

/// Per-event fan-out summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanOutReport {
    pub event: &'static str,
    /// Recipients an enqueue was attempted for
    pub recipients: usize,
    /// Recipients whose record was written
    pub persisted: usize,
    /// Recipients whose write failed
    pub failed: usize,
}

impl FanOutReport {
    fn empty(event: &'static str) -> Self {
        Self {
            event,
            ..Default::default()
        }
    }

    fn from_outcomes(event: &'static str, outcomes: &[EnqueueOutcome]) -> Self {
        let persisted = outcomes.iter().filter(|o| o.persisted()).count();
        for outcome in outcomes {
            if outcome.persisted() {
                FanOutMetrics::record_persisted(event);
            } else {
                FanOutMetrics::record_failed(event);
            }
        }
        Self {
            event,
            recipients: outcomes.len(),
            persisted,
            failed: outcomes.len() - persisted,
        }
    }
}

/// First [`MESSAGE_PREVIEW_CHARS`] characters, with an ellipsis when cut.
pub fn message_preview(content: &str) -> String {
    let mut chars = content.char_indices();
    match chars.nth(MESSAGE_PREVIEW_CHARS) {
        Some((cut, _)) => {
            let mut preview = content[..cut].to_string();
            preview.push(ELLIPSIS);
            preview
        }
        None => content.to_string(),
    }
}

impl NotificationService {
    /// Notify every chat participant except the sender about a new message.
    #[tracing::instrument(skip(self))]
    pub async fn enqueue_message_notifications(&self, message_id: &str) -> FanOutReport {
        let message = match self.store().find_message(message_id).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::warn!(message_id = %message_id, "Message not found, nothing to notify");
                return FanOutReport::empty(MESSAGE_RECEIVED_TYPE);
            }
            Err(e) => {
                StoreMetrics::record_error("find_message");
                tracing::error!(message_id = %message_id, error = %e, "Failed to load message");
                return FanOutReport::empty(MESSAGE_RECEIVED_TYPE);
            }
        };

        let chat = match self.store().find_chat(&message.chat_id).await {
            Ok(Some(chat)) => chat,
            Ok(None) => {
                tracing::warn!(chat_id = %message.chat_id, "Chat not found, nothing to notify");
                return FanOutReport::empty(MESSAGE_RECEIVED_TYPE);
            }
            Err(e) => {
                StoreMetrics::record_error("find_chat");
                tracing::error!(chat_id = %message.chat_id, error = %e, "Failed to load chat");
                return FanOutReport::empty(MESSAGE_RECEIVED_TYPE);
            }
        };

        let mut recipients: Vec<&str> = chat
            .participant_ids
            .iter()
            .map(String::as_str)
            .filter(|id| *id != message.sender_id)
            .collect();
        recipients.sort_unstable();
        recipients.dedup();
        if recipients.is_empty() {
            return FanOutReport::empty(MESSAGE_RECEIVED_TYPE);
        }

        let sender_name = self.display_name(&message.sender_id).await;
        let title = match sender_name {
            Some(name) => format!("New message from {name}"),
            None => format!("New message from {FALLBACK_SENDER}"),
        };
        let body = message_preview(&message.content);

        let requests = recipients.into_iter().map(|recipient| {
            EnqueueRequest::new(recipient, MESSAGE_RECEIVED_TYPE, title.clone(), body.clone())
                .priority(Priority::High)
                .meta("messageId", message.id.clone())
                .meta("chatId", message.chat_id.clone())
                .meta("senderId", message.sender_id.clone())
        });
        let outcomes = join_all(requests.map(|request| self.enqueue(request))).await;

        let report = FanOutReport::from_outcomes(MESSAGE_RECEIVED_TYPE, &outcomes);
        tracing::info!(
            message_id = %message_id,
            recipients = report.recipients,
            failed = report.failed,
            "Message notifications enqueued"
        );
        report
    }

    /// Notify both sides of a new patient/counselor assignment.
    ///
    /// The counselor's notification is `high` priority, the patient's `normal`.
    #[tracing::instrument(skip(self))]
    pub async fn enqueue_patient_assignment_notifications(
        &self,
        patient_id: &str,
        counselor_id: &str,
        assigned_by: Option<&str>,
    ) -> FanOutReport {
        let (patient_name, counselor_name) = futures::join!(
            self.display_name(patient_id),
            self.display_name(counselor_id)
        );
        let patient_name = patient_name.unwrap_or_else(|| FALLBACK_PATIENT.to_string());
        let counselor_name = counselor_name.unwrap_or_else(|| FALLBACK_COUNSELOR.to_string());

        let with_context = |request: EnqueueRequest| {
            let request = request
                .meta("patientId", patient_id)
                .meta("counselorId", counselor_id);
            match assigned_by {
                Some(by) => request.meta("assignedBy", by),
                None => request,
            }
        };

        let to_counselor = with_context(
            EnqueueRequest::new(
                counselor_id,
                PATIENT_ASSIGNED_TYPE,
                "New patient assigned",
                format!("{patient_name} has been assigned to you."),
            )
            .priority(Priority::High),
        );
        let to_patient = with_context(
            EnqueueRequest::new(
                patient_id,
                COUNSELOR_ASSIGNED_TYPE,
                "Counselor assigned",
                format!("You have been matched with {counselor_name}."),
            )
            .priority(Priority::Normal),
        );

        let (counselor_outcome, patient_outcome) =
            futures::join!(self.enqueue(to_counselor), self.enqueue(to_patient));

        let report = FanOutReport::from_outcomes(
            PATIENT_ASSIGNED_TYPE,
            &[counselor_outcome, patient_outcome],
        );
        tracing::info!(
            patient_id = %patient_id,
            counselor_id = %counselor_id,
            failed = report.failed,
            "Assignment notifications enqueued"
        );
        report
    }

    pub fn spawn_message_notifications(&self, message_id: impl Into<String>) -> JoinHandle<FanOutReport> {
        let service = self.clone();
        let message_id = message_id.into();
        tokio::spawn(async move { service.enqueue_message_notifications(&message_id).await })
    }

    pub fn spawn_assignment_notifications(
        &self,
        patient_id: impl Into<String>,
        counselor_id: impl Into<String>,
        assigned_by: Option<String>,
    ) -> JoinHandle<FanOutReport> {
        let service = self.clone();
        let patient_id = patient_id.into();
        let counselor_id = counselor_id.into();
        tokio::spawn(async move {
            service
                .enqueue_patient_assignment_notifications(
                    &patient_id,
                    &counselor_id,
                    assigned_by.as_deref(),
                )
                .await
        })
    }

    /// Profile display name; `None` when unset, blank or unreadable.
    async fn display_name(&self, user_id: &str) -> Option<String> {
        match self.store().find_profile(user_id).await {
            Ok(profile) => profile
                .and_then(|p| p.full_name)
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            Err(e) => {
                StoreMetrics::record_error("find_profile");
                tracing::warn!(user_id = %user_id, error = %e, "Failed to load display name");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::notification::DeliveryStatus;
    use crate::store::{ChatRecord, MemoryStore, MessageRecord, UserProfile};
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use std::sync::Arc;

    fn metadata_str(value: Option<&Value>) -> Option<&str> {
        value.and_then(Value::as_str)
    }

    fn setup() -> (Arc<MemoryStore>, NotificationService) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 5, 30, 12, 0, 0).unwrap(),
        ));
        (store.clone(), NotificationService::new(store, clock))
    }

    #[test]
    fn test_message_preview() {
        assert_eq!(message_preview("short"), "short");

        let exact = "a".repeat(MESSAGE_PREVIEW_CHARS);
        assert_eq!(message_preview(&exact), exact);

        let long = "é".repeat(MESSAGE_PREVIEW_CHARS + 10);
        let preview = message_preview(&long);
        assert_eq!(preview.chars().count(), MESSAGE_PREVIEW_CHARS + 1);
        assert!(preview.ends_with('…'));
    }

    #[tokio::test]
    async fn test_message_fan_out_skips_sender() {
        let (store, service) = setup();
        store.put_profile(UserProfile::new("alice").with_name("Alice"));
        store.put_chat(ChatRecord {
            id: "c-1".into(),
            participant_ids: vec!["alice".into(), "bob".into(), "carol".into()],
        });
        store.put_message(MessageRecord {
            id: "m-1".into(),
            chat_id: "c-1".into(),
            sender_id: "alice".into(),
            content: "x".repeat(200),
        });

        let report = service.enqueue_message_notifications("m-1").await;
        assert_eq!(report.recipients, 2);
        assert_eq!(report.persisted, 2);
        assert!(store.notifications_for("alice").is_empty());

        let bob = store.notifications_for("bob").pop().unwrap();
        assert_eq!(bob.title, "New message from Alice");
        assert_eq!(bob.priority, Priority::High);
        assert_eq!(bob.type_key.as_deref(), Some(MESSAGE_RECEIVED_TYPE));
        assert_eq!(bob.message.chars().count(), MESSAGE_PREVIEW_CHARS + 1);
        assert_eq!(metadata_str(bob.metadata.get("messageId")), Some("m-1"));
        assert_eq!(metadata_str(bob.metadata.get("chatId")), Some("c-1"));
        assert_eq!(metadata_str(bob.metadata.get("senderId")), Some("alice"));
    }

    #[tokio::test]
    async fn test_unknown_message_is_a_no_op() {
        let (store, service) = setup();
        let report = service.enqueue_message_notifications("missing").await;
        assert_eq!(report.recipients, 0);
        assert_eq!(store.notification_count(), 0);
    }

    #[tokio::test]
    async fn test_assignment_notifies_both_sides() {
        let (store, service) = setup();
        store.put_profile(UserProfile::new("p-1").with_name("Pat"));
        store.put_profile(
            UserProfile::new("c-1").with_notification_preference("newPatientAssignments", false),
        );

        let report = service
            .enqueue_patient_assignment_notifications("p-1", "c-1", Some("admin-1"))
            .await;
        assert_eq!(report.persisted, 2);

        let counselor = store.notifications_for("c-1").pop().unwrap();
        assert_eq!(counselor.priority, Priority::High);
        assert_eq!(counselor.message, "Pat has been assigned to you.");
        // Opted out, still recorded for audit
        assert_eq!(counselor.delivery_status, DeliveryStatus::Cancelled);
        assert_eq!(metadata_str(counselor.metadata.get("assignedBy")), Some("admin-1"));

        let patient = store.notifications_for("p-1").pop().unwrap();
        assert_eq!(patient.priority, Priority::Normal);
        assert_eq!(patient.message, "You have been matched with your counselor.");
        assert_eq!(patient.delivery_status, DeliveryStatus::Pending);
        assert_eq!(metadata_str(patient.metadata.get("counselorId")), Some("c-1"));
    }
}
