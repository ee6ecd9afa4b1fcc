// Process-local EventStore for tests and local runs

use crate::db::store::{ensure_insertable, EventStore};
use crate::errors::StoreError;
use crate::models::Event;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Ephemeral in-memory event table
///
/// Every write takes the table lock once, so a row is never observed half
/// updated.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: RwLock<HashMap<Uuid, Event>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events, deleted ones included
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    /// Apply `update` to a pending event; `false` if missing or terminal
    async fn transition<F>(&self, id: Uuid, update: F) -> bool
    where
        F: FnOnce(&mut Event) + Send,
    {
        let mut events = self.events.write().await;
        match events.get_mut(&id) {
            Some(event) if event.is_pending() => {
                update(event);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn insert(&self, event: &Event) -> Result<(), StoreError> {
        ensure_insertable(event)?;

        let mut events = self.events.write().await;
        if events.contains_key(&event.id) {
            return Err(StoreError::DuplicateKey(event.id.to_string()));
        }
        events.insert(event.id, event.clone());
        Ok(())
    }

    async fn select_due(&self, now: DateTime<Utc>) -> Result<Vec<Event>, StoreError> {
        let events = self.events.read().await;
        let mut due: Vec<Event> = events.values().filter(|e| e.is_due(now)).cloned().collect();
        due.sort_by_key(|e| e.expected_sent_at);
        Ok(due)
    }

    async fn record_success(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(self
            .transition(id, |event| {
                event.is_sent = true;
                event.exactly_sent_at = Some(sent_at);
                event.updated_at = sent_at;
            })
            .await)
    }

    async fn record_failure(
        &self,
        id: Uuid,
        failed_at: DateTime<Utc>,
        message: &str,
    ) -> Result<bool, StoreError> {
        let message = message.to_string();
        Ok(self
            .transition(id, move |event| {
                event.is_failed = true;
                event.error_message = Some(message);
                event.updated_at = failed_at;
            })
            .await)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.events.read().await.get(&id).cloned())
    }

    async fn list(&self, include_deleted: bool) -> Result<Vec<Event>, StoreError> {
        let events = self.events.read().await;
        let mut listed: Vec<Event> = events
            .values()
            .filter(|e| include_deleted || e.deleted_at.is_none())
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.expected_sent_at.cmp(&a.expected_sent_at));
        Ok(listed)
    }

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut events = self.events.write().await;
        match events.get_mut(&id) {
            Some(event) if event.deleted_at.is_none() => {
                event.deleted_at = Some(at);
                event.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event_due_in(now: DateTime<Utc>, offset: Duration) -> Event {
        Event::pending("Subject", "Body", "a@example.com", now + offset, now)
    }

    #[tokio::test]
    async fn test_select_due_filters_future_and_terminal_events() {
        let store = InMemoryEventStore::new();
        let now = Utc::now();

        let due = event_due_in(now, Duration::minutes(-1));
        let exactly_now = event_due_in(now, Duration::zero());
        let future = event_due_in(now, Duration::hours(1));
        let sent = event_due_in(now, Duration::minutes(-5));
        let deleted = event_due_in(now, Duration::minutes(-5));
        for event in [&due, &exactly_now, &future, &sent, &deleted] {
            store.insert(event).await.unwrap();
        }
        store.record_success(sent.id, now).await.unwrap();
        store.soft_delete(deleted.id, now).await.unwrap();

        let selected: Vec<Uuid> = store
            .select_due(now)
            .await
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(selected.len(), 2);
        assert!(selected.contains(&due.id));
        assert!(selected.contains(&exactly_now.id));
    }

    #[tokio::test]
    async fn test_record_success_sets_all_fields() {
        let store = InMemoryEventStore::new();
        let now = Utc::now();
        let event = event_due_in(now, Duration::minutes(-1));
        store.insert(&event).await.unwrap();

        let sent_at = now + Duration::seconds(3);
        assert!(store.record_success(event.id, sent_at).await.unwrap());

        let stored = store.find_by_id(event.id).await.unwrap().unwrap();
        assert!(stored.is_sent);
        assert!(!stored.is_failed);
        assert_eq!(stored.exactly_sent_at, Some(sent_at));
        assert_eq!(stored.updated_at, sent_at);
        assert_eq!(stored.created_at, now);
        assert!(stored.error_message.is_none());
    }

    #[tokio::test]
    async fn test_terminal_event_is_never_overwritten() {
        let store = InMemoryEventStore::new();
        let now = Utc::now();
        let event = event_due_in(now, Duration::minutes(-1));
        store.insert(&event).await.unwrap();

        assert!(store.record_failure(event.id, now, "refused").await.unwrap());
        assert!(!store.record_success(event.id, now).await.unwrap());
        assert!(!store.record_failure(event.id, now, "again").await.unwrap());

        let stored = store.find_by_id(event.id).await.unwrap().unwrap();
        assert!(stored.is_failed);
        assert!(!stored.is_sent);
        assert_eq!(stored.error_message.as_deref(), Some("refused"));
        assert!(stored.check_invariants().is_ok());
    }

    #[tokio::test]
    async fn test_outcome_on_unknown_event_is_noop() {
        let store = InMemoryEventStore::new();
        assert!(!store.record_success(Uuid::new_v4(), Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates_and_non_pending() {
        let store = InMemoryEventStore::new();
        let now = Utc::now();
        let event = event_due_in(now, Duration::minutes(1));
        store.insert(&event).await.unwrap();
        assert!(matches!(
            store.insert(&event).await,
            Err(StoreError::DuplicateKey(_))
        ));

        let mut sent = event_due_in(now, Duration::minutes(1));
        sent.is_sent = true;
        sent.exactly_sent_at = Some(now);
        assert!(matches!(
            store.insert(&sent).await,
            Err(StoreError::InvariantViolation(_))
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_orders_latest_first_and_hides_deleted() {
        let store = InMemoryEventStore::new();
        let now = Utc::now();
        let early = event_due_in(now, Duration::hours(1));
        let late = event_due_in(now, Duration::hours(2));
        let deleted = event_due_in(now, Duration::hours(3));
        for event in [&early, &late, &deleted] {
            store.insert(event).await.unwrap();
        }
        store.soft_delete(deleted.id, now).await.unwrap();

        let ids: Vec<Uuid> = store.list(false).await.unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![late.id, early.id]);

        let all = store.list(true).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, deleted.id);
    }
}
