// Dispatcher - sends one event and records its outcome

use crate::clock::Clock;
use crate::db::EventStore;
use crate::errors::{StoreError, TransportError};
use crate::mail::{MailSender, OutboundMessage};
use crate::models::Event;
use crate::telemetry;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Result of one dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Failed(String),
    /// The event stopped being pending before the outcome was written
    Skipped,
}

/// Dispatcher owns the send-then-record step for a single event
pub struct Dispatcher {
    store: Arc<dyn EventStore>,
    sender: Arc<dyn MailSender>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn EventStore>,
        sender: Arc<dyn MailSender>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sender,
            clock,
        }
    }

    /// Send `event` and record the outcome
    ///
    /// Transport errors are recorded on the event and never returned. Only a
    /// failed outcome write surfaces as `Err`, since the event's state is
    /// then unknown.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn dispatch(&self, event: &Event) -> Result<DispatchOutcome, StoreError> {
        let message = OutboundMessage::from(event);
        let started = Instant::now();
        let result = self.sender.send(&message).await;
        telemetry::record_dispatch_duration(started.elapsed().as_secs_f64());

        // Outcome time is taken after the send returns
        let now = self.clock.now();

        match result {
            Ok(()) => {
                if !self.store.record_success(event.id, now).await.map_err(|e| {
                    error!(error = %e, "Email sent but recording success failed");
                    e
                })? {
                    warn!("Email sent but event was no longer pending");
                    return Ok(DispatchOutcome::Skipped);
                }
                telemetry::record_email_sent();
                info!(recipients = message.to.len(), sent_at = %now, "Email sent");
                Ok(DispatchOutcome::Sent)
            }
            Err(transport_error) => {
                let description = transport_error.to_string();
                if !self
                    .store
                    .record_failure(event.id, now, &description)
                    .await
                    .map_err(|e| {
                        error!(error = %e, "Recording send failure failed");
                        e
                    })?
                {
                    warn!("Send failed but event was no longer pending");
                    return Ok(DispatchOutcome::Skipped);
                }
                telemetry::record_email_failed(transport_error_kind(&transport_error));
                warn!(error = %description, "Email send failed");
                Ok(DispatchOutcome::Failed(description))
            }
        }
    }
}

fn transport_error_kind(err: &TransportError) -> &'static str {
    match err {
        TransportError::InvalidAddress { .. } => "invalid_address",
        TransportError::MessageBuild(_) => "message_build",
        TransportError::Smtp(_) => "smtp",
    }
}
