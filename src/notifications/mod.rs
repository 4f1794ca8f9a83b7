//! Outbound customer email: order confirmations and invoice notifications.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::errors::ServiceError;

pub mod templates;

/// A rendered plain-text email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), ServiceError>;
}

/// Sends mail through an SMTP relay
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        username: Option<String>,
        password: Option<String>,
        from: &str,
    ) -> Result<Self, ServiceError> {
        let from: Mailbox = from
            .parse()
            .map_err(|e| ServiceError::MailError(format!("Invalid from address: {}", e)))?;

        let transport = if let (Some(user), Some(pass)) = (username, password) {
            SmtpTransport::relay(host)
                .map_err(|e| ServiceError::MailError(format!("SMTP relay error: {}", e)))?
                .credentials(Credentials::new(user, pass))
                .build()
        } else {
            SmtpTransport::builder_dangerous(host).build()
        };

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, message), fields(to = %message.to))]
    async fn send(&self, message: MailMessage) -> Result<(), ServiceError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| ServiceError::ValidationError(format!("Invalid recipient address: {}", e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| ServiceError::MailError(format!("Failed to build email: {}", e)))?;

        // lettre's SMTP transport is blocking
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| ServiceError::InternalError(format!("mail task failed: {}", e)))?
            .map_err(|e| {
                counter!("storefront_mail.failed", 1);
                ServiceError::MailError(format!("Failed to send email: {}", e))
            })?;

        counter!("storefront_mail.sent", 1);
        info!("email sent");
        Ok(())
    }
}

/// Writes mail to the log instead of sending it; used when SMTP is not configured
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), ServiceError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "SMTP not configured; email not delivered"
        );
        Ok(())
    }
}

/// Keeps every message in memory
#[derive(Debug, Default, Clone)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<MailMessage>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .map_err(|_| ServiceError::InternalError("mail recorder poisoned".to_string()))?
            .push(message);
        Ok(())
    }
}

/// Picks the SMTP mailer when configured, otherwise the logging one
pub fn mailer_from_config(config: &AppConfig) -> Result<Arc<dyn Mailer>, ServiceError> {
    match &config.smtp {
        Some(smtp) => Ok(Arc::new(SmtpMailer::new(
            &smtp.host,
            smtp.username.clone(),
            smtp.password.clone(),
            &config.mail_from,
        )?)),
        None => Ok(Arc::new(LogMailer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_mailer_keeps_messages() {
        let mailer = RecordingMailer::new();
        mailer
            .send(MailMessage {
                to: "a@example.com".into(),
                subject: "Hi".into(),
                body: "Body".into(),
            })
            .await
            .unwrap();
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(mailer.sent()[0].subject, "Hi");
    }

    #[test]
    fn smtp_mailer_rejects_bad_sender() {
        assert!(matches!(
            SmtpMailer::new("localhost", None, None, "not an address"),
            Err(ServiceError::MailError(_))
        ));
    }
}
