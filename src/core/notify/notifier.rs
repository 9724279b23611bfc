use async_trait::async_trait;
use thiserror::Error;

/// A plain-text email ready to hand to a mail transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Missing required email field: {0}")]
    MissingField(&'static str),

    #[error("Failed to build email: {0}")]
    InvalidMessage(String),

    #[error("Failed to authenticate with the mail service: {0}")]
    Auth(String),

    #[error("Mail service request failed: {0}")]
    Request(String),

    #[error("Mail service rejected the message: {0}")]
    Rejected(String),
}

/// Transport that actually delivers the message (Gmail API in production).
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError>;
}

/// Subject line for a birthday email.
pub fn birthday_subject(name: &str) -> String {
    format!("Happy Birthday, {}!", name)
}

/// Validates and sends one email as the configured sender. No retries.
pub struct Notifier<M: MailSender> {
    sender: M,
    from: String,
}

impl<M: MailSender> Notifier<M> {
    pub fn new(sender: M, from: impl Into<String>) -> Self {
        Self {
            sender,
            from: from.into(),
        }
    }

    pub async fn notify(&self, to: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let email = OutgoingEmail {
            from: require("sender", &self.from)?,
            to: require("recipient", to)?,
            subject: require("subject", subject)?,
            body: require("body", body)?,
        };

        match self.sender.send(&email).await {
            Ok(()) => {
                tracing::info!("Email sent to {}", email.to);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to send email to {}: {}", email.to, e);
                Err(e)
            }
        }
    }
}

fn require(field: &'static str, value: &str) -> Result<String, DeliveryError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DeliveryError::MissingField(field));
    }
    Ok(value.to_string())
}
