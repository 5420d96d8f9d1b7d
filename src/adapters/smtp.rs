use crate::domain::ports::Mailer;
use crate::utils::error::{IdeaFilterError, Result};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

/// 以 STARTTLS 連線寄送 HTML 報告
pub struct SmtpMailer {
    settings: SmtpSettings,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    pub fn build_message(&self, recipient: &str, subject: &str, html_body: &str) -> Result<Message> {
        let from: Mailbox = self.settings.sender.parse().map_err(|e| IdeaFilterError::MailError {
            message: format!("invalid sender address '{}': {}", self.settings.sender, e),
        })?;
        let to: Mailbox = recipient.parse().map_err(|e| IdeaFilterError::MailError {
            message: format!("invalid recipient address '{}': {}", recipient, e),
        })?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| IdeaFilterError::MailError {
                message: format!("failed to build email message: {}", e),
            })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<()> {
        if self.settings.username.is_empty() || self.settings.password.is_empty() {
            return Err(IdeaFilterError::MailError {
                message: "SMTP username or password is not configured".to_string(),
            });
        }

        let message = self.build_message(recipient, subject, html_body)?;

        let creds = Credentials::new(self.settings.username.clone(), self.settings.password.clone());
        let transport: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.host)
                .map_err(|e| IdeaFilterError::MailError {
                    message: format!("failed to create SMTP transport: {}", e),
                })?
                .port(self.settings.port)
                .credentials(creds)
                .timeout(Some(self.settings.timeout))
                .build();

        transport.send(message).await.map_err(|e| IdeaFilterError::MailError {
            message: format!("failed to send email via SMTP: {}", e),
        })?;

        tracing::debug!(host = %self.settings.host, to = recipient, "SMTP transaction completed");
        Ok(())
    }
}
