use chrono_tz::Tz;
use metrics_exporter_prometheus::PrometheusHandle;

use common::clock::Clock;
use common::service::EventService;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub events: EventService,
    /// Zone used to resolve submission times given without an offset
    pub timezone: Tz,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new AppState instance
    pub fn new(events: EventService, metrics_handle: Option<PrometheusHandle>) -> Self {
        let timezone = events.clock().timezone();
        Self {
            events,
            timezone,
            metrics_handle,
        }
    }
}
