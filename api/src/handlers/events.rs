use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;
use common::errors::ApiError;
use common::models::{Event, EventStatus};
use common::recipients::validate_recipients;
use common::schedule::parse_send_time;
use common::service::CreateEvent;

/// Request to schedule an email
///
/// Fields are optional so that missing ones get a 400 with our own message
/// instead of the extractor's rejection.
#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub email_subject: Option<String>,
    pub email_content: Option<String>,
    pub recipients: Option<String>,
    /// ISO 8601, with or without offset
    pub expected_sent_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateEventResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub event_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListEventsQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

/// Event as exposed over HTTP
#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub id: Uuid,
    pub email_subject: String,
    pub email_content: String,
    pub recipients: String,
    pub status: EventStatus,
    pub expected_sent_at: DateTime<Utc>,
    pub exactly_sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        Self {
            status: event.status(),
            id: event.id,
            email_subject: event.subject,
            email_content: event.body,
            recipients: event.recipients,
            expected_sent_at: event.expected_sent_at,
            exactly_sent_at: event.exactly_sent_at,
            error_message: event.error_message,
            created_at: event.created_at,
            updated_at: event.updated_at,
            deleted_at: event.deleted_at,
        }
    }
}

/// Schedule a new email
///
/// Recipients are checked first, then the remaining fields must be present
/// and non-empty.
#[tracing::instrument(skip(state, req))]
pub async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<CreateEventResponse>), ErrorResponse> {
    let recipients = req.recipients.unwrap_or_default();
    validate_recipients(&recipients)?;

    let subject = non_empty(req.email_subject);
    let body = non_empty(req.email_content);
    let raw_time = non_empty(req.expected_sent_at);
    let missing: Vec<&str> = [
        ("email_subject", subject.is_none()),
        ("email_content", body.is_none()),
        ("expected_sent_at", raw_time.is_none()),
    ]
    .into_iter()
    .filter(|(_, absent)| *absent)
    .map(|(name, _)| name)
    .collect();

    let (Some(subject), Some(body), Some(raw_time)) = (subject, body, raw_time) else {
        return Err(ApiError::new("validation_error", "Missing required fields.")
            .with_details(serde_json::json!({ "missing": missing }))
            .into());
    };

    let expected_sent_at = parse_send_time(&raw_time, state.timezone)?;

    let event_id = state
        .events
        .create_event(CreateEvent {
            subject,
            body,
            recipients,
            expected_sent_at: Some(expected_sent_at),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateEventResponse {
            status: "success",
            message: "Email scheduled successfully.",
            event_id,
        }),
    ))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// List events, latest send time first
#[tracing::instrument(skip(state))]
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> Result<SuccessResponse<Vec<EventResponse>>, ErrorResponse> {
    let events = state.events.list_events(query.include_deleted).await?;
    Ok(SuccessResponse::new(
        events.into_iter().map(EventResponse::from).collect(),
    ))
}

#[tracing::instrument(skip(state))]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<SuccessResponse<EventResponse>, ErrorResponse> {
    let event = state.events.get_event(id).await?;
    Ok(SuccessResponse::new(event.into()))
}

/// Soft-delete an event so it is never dispatched
#[tracing::instrument(skip(state))]
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<SuccessResponse<serde_json::Value>, ErrorResponse> {
    state.events.delete_event(id).await?;
    Ok(SuccessResponse::new(serde_json::json!({
        "event_id": id,
        "deleted": true,
    })))
}
