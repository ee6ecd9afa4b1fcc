use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the main application router with all routes and middleware
#[tracing::instrument(skip(state))]
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let event_routes = Router::new()
        .route(
            "/api/events",
            get(handlers::events::list_events).post(handlers::events::create_event),
        )
        .route(
            "/api/events/:id",
            get(handlers::events::get_event).delete(handlers::events::delete_event),
        );

    // Health and metrics for probes and Prometheus scraping
    let ops_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics_handler));

    Router::new()
        .merge(event_routes)
        .merge(ops_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use common::clock::ManualClock;
    use common::db::InMemoryEventStore;
    use common::service::EventService;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> (Router, EventService) {
        let store = Arc::new(InMemoryEventStore::new());
        let clock = Arc::new(
            ManualClock::new(Utc.with_ymd_and_hms(2024, 8, 1, 10, 0, 0).unwrap())
                .with_timezone(chrono_tz::Asia::Singapore),
        );
        let events = EventService::new(store, clock);
        (create_router(AppState::new(events.clone(), None)), events)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_event(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/events")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn valid_payload() -> Value {
        json!({
            "email_subject": "Test Subject",
            "email_content": "Test Content",
            "recipients": "test@example.com, other@example.com",
            "expected_sent_at": "2024-08-01T19:00:00"
        })
    }

    #[tokio::test]
    async fn test_create_event_resolves_naive_time_in_reference_zone() {
        let (app, events) = app();
        let (status, body) = send(app, post_event(valid_payload())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "success");
        let id: uuid::Uuid = body["event_id"].as_str().unwrap().parse().unwrap();

        let event = events.get_event(id).await.unwrap();
        // 19:00 in Singapore is 11:00 UTC
        assert_eq!(
            event.expected_sent_at,
            Utc.with_ymd_and_hms(2024, 8, 1, 11, 0, 0).unwrap()
        );
        assert!(event.is_pending());
    }

    #[tokio::test]
    async fn test_create_event_keeps_explicit_offset() {
        let (app, events) = app();
        let mut payload = valid_payload();
        payload["expected_sent_at"] = json!("2024-08-01T19:00:00+02:00");

        let (status, body) = send(app, post_event(payload)).await;
        assert_eq!(status, StatusCode::CREATED);
        let id: uuid::Uuid = body["event_id"].as_str().unwrap().parse().unwrap();
        assert_eq!(
            events.get_event(id).await.unwrap().expected_sent_at,
            Utc.with_ymd_and_hms(2024, 8, 1, 17, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_create_event_rejects_missing_fields() {
        let (app, events) = app();
        let (status, body) = send(
            app,
            post_event(json!({
                "email_subject": "Only a subject",
                "recipients": "test@example.com"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["message"], "Missing required fields.");
        assert_eq!(
            body["details"]["missing"],
            json!(["email_content", "expected_sent_at"])
        );
        assert!(events.list_events(true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_event_treats_empty_strings_as_missing() {
        for field in ["email_subject", "email_content", "expected_sent_at"] {
            let (app, events) = app();
            let mut payload = valid_payload();
            payload[field] = json!("");

            let (status, body) = send(app, post_event(payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "field {}", field);
            assert_eq!(body["message"], "Missing required fields.");
            assert_eq!(body["details"]["missing"], json!([field]));
            assert!(events.list_events(true).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_create_event_checks_recipients_first() {
        let (app, _events) = app();
        let (status, body) = send(
            app.clone(),
            post_event(json!({ "email_subject": "Only a subject" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Recipients are required.");

        let mut payload = valid_payload();
        payload["recipients"] = json!("");
        payload["email_content"] = json!("");
        let (status, body) = send(app, post_event(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Recipients are required.");
    }

    #[tokio::test]
    async fn test_create_event_rejects_bad_datetime() {
        let (app, _events) = app();
        let mut payload = valid_payload();
        payload["expected_sent_at"] = json!("next tuesday");

        let (status, body) = send(app, post_event(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Invalid datetime format. Use ISO 8601 format."
        );
    }

    #[tokio::test]
    async fn test_create_event_lists_invalid_recipients() {
        let (app, events) = app();
        let mut payload = valid_payload();
        payload["recipients"] = json!("a@b.com, not-an-email");

        let (status, body) = send(app, post_event(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid emails: not-an-email");
        assert!(events.list_events(true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_list_and_delete_event() {
        let (app, _events) = app();
        let (_, created) = send(app.clone(), post_event(valid_payload())).await;
        let id = created["event_id"].as_str().unwrap().to_string();

        let (status, body) = send(app.clone(), get(&format!("/api/events/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "pending");
        assert_eq!(body["data"]["email_subject"], "Test Subject");

        let delete = Request::builder()
            .method("DELETE")
            .uri(format!("/api/events/{}", id))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app.clone(), delete).await;
        assert_eq!(status, StatusCode::OK);

        let (_, listed) = send(app.clone(), get("/api/events")).await;
        assert_eq!(listed["data"].as_array().unwrap().len(), 0);

        let (_, listed) = send(app, get("/api/events?include_deleted=true")).await;
        let listed = listed["data"].as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["status"], "deleted");
    }

    #[tokio::test]
    async fn test_unknown_event_is_404() {
        let (app, _events) = app();
        let (status, body) = send(
            app,
            get(&format!("/api/events/{}", uuid::Uuid::new_v4())),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_health_reports_ok_for_in_memory_store() {
        let (app, _events) = app();
        let (status, body) = send(app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
