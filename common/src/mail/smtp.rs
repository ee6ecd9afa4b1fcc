// SMTP implementation of MailSender

use super::{MailSender, OutboundMessage};
use crate::config::MailConfig;
use crate::errors::TransportError;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Sends mail through an SMTP relay
pub struct SmtpMailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailSender {
    /// Build a sender from configuration
    ///
    /// `use_ssl` selects implicit TLS, `use_tls` selects required STARTTLS and
    /// neither yields a plaintext connection for local relays.
    pub fn new(config: &MailConfig) -> Result<Self, TransportError> {
        let from = parse_mailbox(&config.default_sender)?;

        let builder = if config.use_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_seconds)));

        if let Some(username) = &config.username {
            // App passwords are often pasted with spaces
            let password: String = config
                .password
                .as_deref()
                .unwrap_or_default()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            builder = builder.credentials(Credentials::new(username.trim().to_string(), password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    /// Check that the relay accepts connections
    #[instrument(skip(self))]
    pub async fn test_connection(&self) -> bool {
        match self.transport.test_connection().await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "SMTP connection test failed");
                false
            }
        }
    }

    fn build_message(&self, message: &OutboundMessage) -> Result<Message, TransportError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN);

        for address in &message.to {
            builder = builder.to(parse_mailbox(address)?);
        }

        Ok(builder.body(message.body.clone())?)
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| TransportError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl MailSender for SmtpMailSender {
    #[instrument(skip(self, message), fields(recipients = message.to.len()))]
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let email = self.build_message(message)?;
        self.transport.send(email).await?;
        debug!("Message accepted by SMTP relay");
        Ok(())
    }
}
