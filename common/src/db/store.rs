// EventStore contract shared by the Postgres and in-memory stores

use crate::errors::StoreError;
use crate::models::Event;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Durable storage of scheduled events
///
/// Outcome writes are conditional on the event still being pending and
/// report whether a transition happened, so a terminal event can never be
/// overwritten.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist a new pending event
    async fn insert(&self, event: &Event) -> Result<(), StoreError>;

    /// Pending, non-deleted events with `expected_sent_at <= now`
    async fn select_due(&self, now: DateTime<Utc>) -> Result<Vec<Event>, StoreError>;

    /// Mark a pending event as sent
    async fn record_success(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Mark a pending event as failed with the transport's description
    async fn record_failure(
        &self,
        id: Uuid,
        failed_at: DateTime<Utc>,
        message: &str,
    ) -> Result<bool, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    /// All events, latest `expected_sent_at` first
    async fn list(&self, include_deleted: bool) -> Result<Vec<Event>, StoreError>;

    /// Set `deleted_at` on an event that is not deleted yet
    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Reject anything but a well-formed pending event on insert
pub(crate) fn ensure_insertable(event: &Event) -> Result<(), StoreError> {
    if !event.is_pending() {
        return Err(StoreError::InvariantViolation(format!(
            "event {} must be inserted in the pending state",
            event.id
        )));
    }
    event.check_invariants().map_err(StoreError::InvariantViolation)
}
