// =============================================================================
// GMAIL CLIENT
// =============================================================================
//
// Sends mail through the Gmail API as the authenticated user ("me").
// See: https://developers.google.com/gmail/api/reference/rest/v1/users.messages/send
//
// The API takes the complete RFC 2822 message, base64url-encoded, in the `raw`
// field. `lettre` builds the MIME message; nothing here speaks SMTP.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use lettre::message::{header::ContentType, Mailbox, Mailboxes};
use lettre::Message;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;

use crate::core::notify::{DeliveryError, MailSender, OutgoingEmail};
use crate::infra::google_auth::AccessTokenProvider;

const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

#[derive(Debug, Serialize)]
struct SendMessageRequest {
    raw: String,
}

/// Builds a plain-text MIME message and returns it base64url-encoded.
pub fn encode_raw_message(email: &OutgoingEmail) -> Result<String, DeliveryError> {
    let from: Mailbox = email
        .from
        .parse()
        .map_err(|e| DeliveryError::InvalidMessage(format!("Invalid from address: {}", e)))?;
    // The sheet cell may list several comma-separated addresses.
    let to: Mailboxes = email
        .to
        .parse()
        .map_err(|e| DeliveryError::InvalidMessage(format!("Invalid to address: {}", e)))?;

    let mut builder = Message::builder().from(from);
    for mailbox in to {
        builder = builder.to(mailbox);
    }

    let message = builder
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|e| DeliveryError::InvalidMessage(e.to_string()))?;

    Ok(URL_SAFE.encode(message.formatted()))
}

pub struct GmailClient {
    client: Client,
    auth: Arc<dyn AccessTokenProvider>,
}

impl GmailClient {
    pub fn new(auth: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            client: Client::new(),
            auth,
        }
    }
}

#[async_trait]
impl MailSender for GmailClient {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        let request = SendMessageRequest {
            raw: encode_raw_message(email)?,
        };

        let token = self
            .auth
            .obtain()
            .await
            .map_err(|e| DeliveryError::Auth(e.to_string()))?;

        tracing::debug!("Sending email to {} via Gmail API", email.to);

        let response = self
            .client
            .post(GMAIL_SEND_URL)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected(format!(
                "Gmail API error ({}): {}",
                status, text
            )));
        }

        Ok(())
    }
}
