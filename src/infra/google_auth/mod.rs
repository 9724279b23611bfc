// =============================================================================
// GOOGLE AUTH MODULE
// =============================================================================
//
// Access tokens for the Sheets and Gmail APIs.
//
// Both API clients share one `AccessTokenProvider` by default, so its
// credentials must carry both `spreadsheets.readonly` and `gmail.send`. A
// Sheets-only `token.json` gets 403 from Gmail; point `GOOGLE_GMAIL_TOKEN_PATH`
// at a second token file to give Gmail its own provider. A provider owns its
// credentials and is the only thing that ever refreshes or persists a token;
// the clients just call `obtain()` before each request.
//
// **Supported credentials:**
// 1. **Service account** (cloud function): JWT bearer grant. Sending mail as
//    a user additionally needs domain-wide delegation (`GOOGLE_DELEGATED_USER`).
// 2. **Authorized user** (local runs): OAuth client id/secret plus a refresh
//    token, optionally backed by a `token.json` file that is rewritten after
//    each refresh.

pub mod authorized_user;
pub mod service_account;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::config::GoogleCredentials;

pub use authorized_user::AuthorizedUserAuth;
pub use service_account::{ServiceAccountAuth, ServiceAccountKey};

pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
pub const GMAIL_SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";

/// Scopes requested by the job.
pub const BIRTHDAY_BOT_SCOPES: &[&str] = &[SHEETS_READONLY_SCOPE, GMAIL_SEND_SCOPE];

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to read credentials: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid credentials JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to sign JWT: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Token request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Token exchange failed ({status}): {body}")]
    TokenExchange { status: u16, body: String },
}

/// Hands out a valid bearer token, refreshing behind the scenes when needed.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn obtain(&self) -> Result<String, AuthError>;
}

/// Response from Google's token endpoint (both grant types).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Only present when Google rotates the refresh token.
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.expires_in.unwrap_or(3600))
    }
}

/// Cached access token with expiration.
#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + Duration::seconds(EXPIRY_MARGIN_SECS)
    }
}

/// Posts a token request and decodes the response, mapping non-2xx to `TokenExchange`.
async fn exchange_token(
    client: &reqwest::Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, AuthError> {
    let response = client.post(token_uri).form(form).send().await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await?;
        return Err(AuthError::TokenExchange { status, body });
    }

    Ok(response.json().await?)
}

/// Builds the provider matching the configured credentials.
pub async fn provider_from_credentials(
    credentials: GoogleCredentials,
    delegated_user: Option<String>,
) -> Result<Arc<dyn AccessTokenProvider>, AuthError> {
    let provider: Arc<dyn AccessTokenProvider> = match credentials {
        GoogleCredentials::ServiceAccountFile(path) => {
            let key = ServiceAccountKey::from_file(&path).await?;
            tracing::info!("Using service account {}", key.client_email());
            Arc::new(ServiceAccountAuth::new(key, BIRTHDAY_BOT_SCOPES, delegated_user))
        }
        GoogleCredentials::ServiceAccountJson(json) => {
            let key = ServiceAccountKey::from_json(json.expose_secret())?;
            tracing::info!("Using service account {}", key.client_email());
            Arc::new(ServiceAccountAuth::new(key, BIRTHDAY_BOT_SCOPES, delegated_user))
        }
        GoogleCredentials::ServiceAccountFields {
            client_email,
            private_key,
        } => {
            let key = ServiceAccountKey::from_fields(client_email, private_key);
            tracing::info!("Using service account {}", key.client_email());
            Arc::new(ServiceAccountAuth::new(key, BIRTHDAY_BOT_SCOPES, delegated_user))
        }
        GoogleCredentials::AuthorizedUserFile(path) => {
            tracing::info!("Using authorized user token file {}", path.display());
            Arc::new(AuthorizedUserAuth::from_file(path).await?)
        }
        GoogleCredentials::RefreshToken {
            client_id,
            client_secret,
            refresh_token,
        } => {
            tracing::info!("Using OAuth refresh token for client {}", client_id);
            Arc::new(AuthorizedUserAuth::from_refresh_token(
                client_id,
                client_secret,
                refresh_token,
            ))
        }
    };

    Ok(provider)
}

/// Gmail's provider: its own token file when one is configured, otherwise the
/// shared provider.
pub async fn gmail_provider(
    shared: Arc<dyn AccessTokenProvider>,
    gmail_token_path: Option<PathBuf>,
) -> Result<Arc<dyn AccessTokenProvider>, AuthError> {
    match gmail_token_path {
        Some(path) => {
            tracing::info!("Using separate Gmail token file {}", path.display());
            Ok(Arc::new(AuthorizedUserAuth::from_file(path).await?))
        }
        None => Ok(shared),
    }
}
