// Outbound mail capability

pub mod smtp;

pub use smtp::SmtpMailSender;

use crate::errors::TransportError;
use crate::models::Event;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Message handed to a `MailSender`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl From<&Event> for OutboundMessage {
    fn from(event: &Event) -> Self {
        Self {
            to: event.recipient_list(),
            subject: event.subject.clone(),
            body: event.body.clone(),
        }
    }
}

/// MailSender delivers one message or reports why it could not
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;
}
