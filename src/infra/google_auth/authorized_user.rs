// Authorized-user credentials: an OAuth client plus a refresh token obtained
// once through the browser consent screen (that flow is not part of this job).
//
// When loaded from a token file, the refreshed access token and its expiry are
// written back so the next run can reuse it without a round trip.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;

use super::{exchange_token, AccessTokenProvider, AuthError, CachedToken, DEFAULT_TOKEN_URI};

/// On-disk format of an authorized-user token file, compatible with the JSON
/// written by Google's client libraries. Unknown keys are preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry: Option<DateTime<Utc>>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl TokenFile {
    fn cached_token(&self) -> Option<CachedToken> {
        Some(CachedToken {
            token: self.token.clone()?,
            expires_at: self.expiry?,
        })
    }
}

pub struct AuthorizedUserAuth {
    state: RwLock<TokenFile>,
    /// Where to persist refreshed tokens, if anywhere.
    path: Option<PathBuf>,
    client: Client,
}

impl AuthorizedUserAuth {
    pub async fn from_file(path: PathBuf) -> Result<Self, AuthError> {
        let content = tokio::fs::read_to_string(&path).await?;
        let file: TokenFile = serde_json::from_str(&content)?;

        Ok(Self {
            state: RwLock::new(file),
            path: Some(path),
            client: Client::new(),
        })
    }

    pub fn from_refresh_token(
        client_id: String,
        client_secret: SecretString,
        refresh_token: SecretString,
    ) -> Self {
        let file = TokenFile {
            client_id,
            client_secret: client_secret.expose_secret().to_string(),
            refresh_token: refresh_token.expose_secret().to_string(),
            token_uri: default_token_uri(),
            token: None,
            expiry: None,
            extra: serde_json::Map::new(),
        };

        Self {
            state: RwLock::new(file),
            path: None,
            client: Client::new(),
        }
    }

    async fn refresh(&self) -> Result<CachedToken, AuthError> {
        let (token_uri, client_id, client_secret, refresh_token) = {
            let state = self.state.read().await;
            (
                state.token_uri.clone(),
                state.client_id.clone(),
                state.client_secret.clone(),
                state.refresh_token.clone(),
            )
        };

        let now = Utc::now();
        let response = exchange_token(
            &self.client,
            &token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", &client_id),
                ("client_secret", &client_secret),
                ("refresh_token", &refresh_token),
            ],
        )
        .await?;

        tracing::debug!("Refreshed OAuth access token for client {}", client_id);

        let fresh = CachedToken {
            expires_at: response.expires_at(now),
            token: response.access_token,
        };
        self.store(&fresh, response.refresh_token).await;

        Ok(fresh)
    }

    /// Records a new token in memory and, when file-backed, on disk.
    /// A failed write only costs us an extra refresh next run, so it is logged
    /// rather than returned.
    async fn store(&self, fresh: &CachedToken, rotated_refresh_token: Option<String>) {
        let snapshot = {
            let mut state = self.state.write().await;
            state.token = Some(fresh.token.clone());
            state.expiry = Some(fresh.expires_at);
            if let Some(refresh_token) = rotated_refresh_token {
                state.refresh_token = refresh_token;
            }
            state.clone()
        };

        let Some(path) = &self.path else {
            return;
        };

        let result = match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => tokio::fs::write(path, json).await.map_err(AuthError::from),
            Err(e) => Err(AuthError::from(e)),
        };

        if let Err(e) = result {
            tracing::warn!("Failed to persist refreshed token to {}: {}", path.display(), e);
        }
    }
}

#[async_trait]
impl AccessTokenProvider for AuthorizedUserAuth {
    async fn obtain(&self) -> Result<String, AuthError> {
        let cached = self.state.read().await.cached_token();
        if let Some(token) = cached {
            if token.is_fresh(Utc::now()) {
                return Ok(token.token);
            }
        }

        Ok(self.refresh().await?.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn token_file(token: Option<&str>, expiry: Option<DateTime<Utc>>) -> NamedTempFile {
        let mut json = serde_json::json!({
            "client_id": "client-id.apps.googleusercontent.com",
            "client_secret": "shh",
            "refresh_token": "1//refresh",
            "token_uri": "https://oauth2.googleapis.com/token",
            "scopes": ["https://www.googleapis.com/auth/gmail.send"],
            "universe_domain": "googleapis.com"
        });
        if let Some(token) = token {
            json["token"] = token.into();
        }
        if let Some(expiry) = expiry {
            json["expiry"] = expiry.to_rfc3339().into();
        }

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", json).unwrap();
        file
    }

    #[tokio::test]
    async fn test_reuses_unexpired_token_from_file() {
        let file = token_file(Some("ya29.cached"), Some(Utc::now() + Duration::minutes(30)));
        let auth = AuthorizedUserAuth::from_file(file.path().to_path_buf())
            .await
            .unwrap();

        assert_eq!(auth.obtain().await.unwrap(), "ya29.cached");
    }

    #[tokio::test]
    async fn test_reads_google_library_expiry_format() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"{"client_id":"id","client_secret":"s","refresh_token":"r",
                "token":"ya29.old","expiry":"2024-05-04T12:00:00.123456Z"}"#,
        )
        .unwrap();

        let auth = AuthorizedUserAuth::from_file(file.path().to_path_buf())
            .await
            .unwrap();
        let cached = auth.state.read().await.cached_token().unwrap();

        assert_eq!(cached.token, "ya29.old");
        assert_eq!(cached.expires_at.to_rfc3339(), "2024-05-04T12:00:00.123456+00:00");
        assert_eq!(auth.state.read().await.token_uri, DEFAULT_TOKEN_URI);
    }

    #[tokio::test]
    async fn test_store_persists_token_and_keeps_unknown_keys() {
        let file = token_file(None, None);
        let auth = AuthorizedUserAuth::from_file(file.path().to_path_buf())
            .await
            .unwrap();
        let expires_at = Utc::now() + Duration::hours(1);

        auth.store(
            &CachedToken {
                token: "ya29.new".to_string(),
                expires_at,
            },
            Some("1//rotated".to_string()),
        )
        .await;

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(written["token"], "ya29.new");
        assert_eq!(written["refresh_token"], "1//rotated");
        assert_eq!(written["universe_domain"], "googleapis.com");
        assert_eq!(written["scopes"][0], "https://www.googleapis.com/auth/gmail.send");

        assert_eq!(auth.obtain().await.unwrap(), "ya29.new");
    }

    #[tokio::test]
    async fn test_env_credentials_are_not_persisted() {
        let auth = AuthorizedUserAuth::from_refresh_token(
            "id".to_string(),
            SecretString::from("secret".to_string()),
            SecretString::from("refresh".to_string()),
        );

        auth.store(
            &CachedToken {
                token: "ya29.memory".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
            },
            None,
        )
        .await;

        assert!(auth.path.is_none());
        assert_eq!(auth.obtain().await.unwrap(), "ya29.memory");
        assert_eq!(auth.state.read().await.refresh_token, "refresh");
    }
}
