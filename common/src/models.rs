use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Event Models
// ============================================================================

/// A scheduled email.
///
/// Created once in the pending state and mutated at most once afterwards,
/// either to sent or to failed. Soft deletion only sets `deleted_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub subject: String,
    pub body: String,
    /// Raw validated comma-separated recipient list
    pub recipients: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub expected_sent_at: DateTime<Utc>,
    pub exactly_sent_at: Option<DateTime<Utc>>,
    pub is_sent: bool,
    pub is_failed: bool,
    pub error_message: Option<String>,
}

impl Event {
    /// Build a new pending event stamped with `now`
    pub fn pending(
        subject: impl Into<String>,
        body: impl Into<String>,
        recipients: impl Into<String>,
        expected_sent_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject: subject.into(),
            body: body.into(),
            recipients: recipients.into(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            expected_sent_at,
            exactly_sent_at: None,
            is_sent: false,
            is_failed: false,
            error_message: None,
        }
    }

    /// Derived lifecycle status
    pub fn status(&self) -> EventStatus {
        if self.deleted_at.is_some() {
            EventStatus::Deleted
        } else if self.is_sent {
            EventStatus::Sent
        } else if self.is_failed {
            EventStatus::Failed
        } else {
            EventStatus::Pending
        }
    }

    /// Neither sent nor failed, and not soft-deleted
    pub fn is_pending(&self) -> bool {
        !self.is_sent && !self.is_failed && self.deleted_at.is_none()
    }

    /// Pending and scheduled at or before `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.expected_sent_at <= now
    }

    /// Split the stored recipient string into individual addresses
    pub fn recipient_list(&self) -> Vec<String> {
        split_recipients(&self.recipients)
    }

    /// Check the terminal-state invariants
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.is_sent && self.is_failed {
            return Err(format!("event {} is both sent and failed", self.id));
        }
        if self.is_sent != self.exactly_sent_at.is_some() {
            return Err(format!(
                "event {} has is_sent={} but exactly_sent_at={:?}",
                self.id, self.is_sent, self.exactly_sent_at
            ));
        }
        if self.is_failed != self.error_message.is_some() {
            return Err(format!(
                "event {} has is_failed={} but error_message={:?}",
                self.id, self.is_failed, self.error_message
            ));
        }
        Ok(())
    }
}

/// Split a comma-separated recipient string, trimming whitespace and
/// dropping empty entries
pub fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// EventStatus is the read-side view of an event's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Sent,
    Failed,
    Deleted,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Pending => write!(f, "pending"),
            EventStatus::Sent => write!(f, "sent"),
            EventStatus::Failed => write!(f, "failed"),
            EventStatus::Deleted => write!(f, "deleted"),
        }
    }
}
