// Submission interface for scheduled emails

use crate::clock::Clock;
use crate::db::EventStore;
use crate::errors::{StoreError, SubmissionError, ValidationError};
use crate::models::Event;
use crate::recipients::validate_recipients;
use crate::telemetry;
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Longest subject the event table accepts
pub const MAX_SUBJECT_LEN: usize = 120;

/// Request to schedule an email
#[derive(Debug, Clone)]
pub struct CreateEvent {
    pub subject: String,
    pub body: String,
    /// Comma-separated recipient addresses
    pub recipients: String,
    pub expected_sent_at: Option<DateTime<FixedOffset>>,
}

/// Entry point for submitting, reading and soft-deleting events
#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
}

impl EventService {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Validate and persist a new pending event
    ///
    /// Nothing is stored when validation fails.
    #[instrument(skip(self, request), fields(subject_len = request.subject.len()))]
    pub async fn create_event(&self, request: CreateEvent) -> Result<Uuid, SubmissionError> {
        let event = self.validate(request)?;
        self.store.insert(&event).await?;
        telemetry::record_email_scheduled();

        info!(
            event_id = %event.id,
            expected_sent_at = %event.expected_sent_at,
            "Email scheduled"
        );
        Ok(event.id)
    }

    fn validate(&self, request: CreateEvent) -> Result<Event, ValidationError> {
        validate_recipients(&request.recipients)?;

        if request.subject.trim().is_empty() {
            return Err(ValidationError::MissingField("email_subject".to_string()));
        }
        if request.subject.chars().count() > MAX_SUBJECT_LEN {
            return Err(ValidationError::InvalidFieldValue {
                field: "email_subject".to_string(),
                reason: format!("must be at most {} characters", MAX_SUBJECT_LEN),
            });
        }
        if request.body.trim().is_empty() {
            return Err(ValidationError::MissingField("email_content".to_string()));
        }
        let expected_sent_at = request
            .expected_sent_at
            .ok_or_else(|| ValidationError::MissingField("expected_sent_at".to_string()))?;

        Ok(Event::pending(
            request.subject,
            request.body,
            request.recipients.trim(),
            expected_sent_at.with_timezone(&Utc),
            self.clock.now(),
        ))
    }

    pub async fn get_event(&self, id: Uuid) -> Result<Event, StoreError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("event {}", id)))
    }

    pub async fn list_events(&self, include_deleted: bool) -> Result<Vec<Event>, StoreError> {
        self.store.list(include_deleted).await
    }

    /// Soft-delete an event; deleting twice is not an error
    #[instrument(skip(self))]
    pub async fn delete_event(&self, id: Uuid) -> Result<(), StoreError> {
        if self.store.soft_delete(id, self.clock.now()).await? {
            info!(event_id = %id, "Event soft-deleted");
            return Ok(());
        }
        // Either already deleted or unknown
        self.get_event(id).await.map(|_| ())
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.store.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::InMemoryEventStore;
    use chrono::{Duration, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 10, 0, 0).unwrap()
    }

    fn service() -> (EventService, Arc<InMemoryEventStore>) {
        let store = Arc::new(InMemoryEventStore::new());
        let clock = Arc::new(ManualClock::new(fixed_now()));
        (EventService::new(store.clone(), clock), store)
    }

    fn request(recipients: &str) -> CreateEvent {
        CreateEvent {
            subject: "Test Subject".to_string(),
            body: "Test Content".to_string(),
            recipients: recipients.to_string(),
            expected_sent_at: Some(
                FixedOffset::east_opt(8 * 3600)
                    .unwrap()
                    .with_ymd_and_hms(2024, 8, 1, 19, 0, 0)
                    .unwrap(),
            ),
        }
    }

    #[tokio::test]
    async fn test_create_event_persists_pending_event() {
        let (service, _store) = service();
        let id = service.create_event(request("test@example.com")).await.unwrap();

        let event = service.get_event(id).await.unwrap();
        assert!(event.is_pending());
        assert_eq!(event.created_at, fixed_now());
        assert_eq!(event.updated_at, fixed_now());
        assert_eq!(event.expected_sent_at, fixed_now() + Duration::hours(1));
        assert_eq!(event.recipients, "test@example.com");
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_listed_and_nothing_stored() {
        let (service, store) = service();
        let err = service
            .create_event(request("a@b.com, not-an-email"))
            .await
            .unwrap_err();

        match err {
            SubmissionError::Validation(ValidationError::InvalidRecipients(msg)) => {
                assert!(msg.contains("not-an-email"));
                assert!(!msg.contains("a@b.com"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_send_time_is_rejected() {
        let (service, store) = service();
        let mut req = request("test@example.com");
        req.expected_sent_at = None;

        let err = service.create_event(req).await.unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::Validation(ValidationError::MissingField(ref f))
                if f == "expected_sent_at"
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_blank_subject_and_long_subject_are_rejected() {
        let (service, _store) = service();

        let mut blank = request("test@example.com");
        blank.subject = "   ".to_string();
        assert!(service.create_event(blank).await.is_err());

        let mut long = request("test@example.com");
        long.subject = "x".repeat(MAX_SUBJECT_LEN + 1);
        assert!(matches!(
            service.create_event(long).await,
            Err(SubmissionError::Validation(ValidationError::InvalidFieldValue { .. }))
        ));
    }

    #[tokio::test]
    async fn test_delete_event_is_idempotent_and_reports_unknown() {
        let (service, _store) = service();
        let id = service.create_event(request("test@example.com")).await.unwrap();

        service.delete_event(id).await.unwrap();
        service.delete_event(id).await.unwrap();
        assert!(service.get_event(id).await.unwrap().deleted_at.is_some());
        assert!(service.list_events(false).await.unwrap().is_empty());

        assert!(matches!(
            service.delete_event(Uuid::new_v4()).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
