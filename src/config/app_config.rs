// Start-up configuration.
//
// Everything the job needs from its environment is read here, once, and handed
// to the components through their constructors. The entry point supplies the
// lookup; only `main` touches the process environment.

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use secrecy::SecretString;
use thiserror::Error;

pub const DEFAULT_SHEET_RANGE: &str = "Hoja1!A:E";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-preview-05-20";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error(
        "No Google credentials configured. Set GOOGLE_SERVICE_ACCOUNT_KEY, \
         GOOGLE_SERVICE_ACCOUNT_JSON, CLIENT_EMAIL + PRIVATE_KEY, GOOGLE_TOKEN_PATH, \
         or GOOGLE_CLIENT_ID + GOOGLE_CLIENT_SECRET + GOOGLE_REFRESH_TOKEN"
    )]
    MissingCredentials,
}

/// How we authenticate against Google APIs (Sheets and Gmail).
#[derive(Debug)]
pub enum GoogleCredentials {
    /// Path to a service account JSON key.
    ServiceAccountFile(PathBuf),
    /// Service account JSON key content.
    ServiceAccountJson(SecretString),
    /// Service account key split across variables, as cloud function secrets
    /// usually are.
    ServiceAccountFields {
        client_email: String,
        private_key: SecretString,
    },
    /// Authorized-user token file (`token.json`); refreshed tokens are written back.
    AuthorizedUserFile(PathBuf),
    /// OAuth client plus a long-lived refresh token.
    RefreshToken {
        client_id: String,
        client_secret: SecretString,
        refresh_token: SecretString,
    },
}

#[derive(Debug)]
pub struct AppConfig {
    pub spreadsheet_id: String,
    pub sheet_range: String,
    pub sender_email: String,
    pub gemini_api_key: SecretString,
    pub gemini_model: String,
    pub timezone: Tz,
    pub credentials: GoogleCredentials,
    /// Mailbox to impersonate when a service account has domain-wide delegation.
    pub delegated_user: Option<String>,
    /// Separate authorized-user token file for Gmail, for setups that keep a
    /// Sheets-only `token.json` next to a `token_gmail.json`.
    pub gmail_token_path: Option<PathBuf>,
}

impl AppConfig {
    /// Builds the config from any key/value source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigError::MissingEnvVar(key));

        let timezone = match get("BIRTHDAY_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "BIRTHDAY_TIMEZONE",
                    message: e.to_string(),
                })?,
            None => chrono_tz::UTC,
        };

        Ok(Self {
            spreadsheet_id: require("SPREADSHEET_ID")?,
            sheet_range: get("SHEET_RANGE").unwrap_or_else(|| DEFAULT_SHEET_RANGE.to_string()),
            sender_email: require("YOUR_EMAIL")?,
            gemini_api_key: SecretString::from(require("GEMINI_API_KEY")?),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            timezone,
            credentials: google_credentials(&get)?,
            delegated_user: get("GOOGLE_DELEGATED_USER"),
            gmail_token_path: get("GOOGLE_GMAIL_TOKEN_PATH").map(PathBuf::from),
        })
    }

    /// The calendar date right now in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }
}

fn google_credentials<F>(get: &F) -> Result<GoogleCredentials, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = get("GOOGLE_SERVICE_ACCOUNT_KEY") {
        return Ok(GoogleCredentials::ServiceAccountFile(path.into()));
    }

    if let Some(json) = get("GOOGLE_SERVICE_ACCOUNT_JSON") {
        return Ok(GoogleCredentials::ServiceAccountJson(json.into()));
    }

    if let (Some(client_email), Some(private_key)) = (get("CLIENT_EMAIL"), get("PRIVATE_KEY")) {
        return Ok(GoogleCredentials::ServiceAccountFields {
            client_email,
            private_key: private_key.into(),
        });
    }

    if let Some(path) = get("GOOGLE_TOKEN_PATH") {
        return Ok(GoogleCredentials::AuthorizedUserFile(path.into()));
    }

    match (
        get("GOOGLE_CLIENT_ID"),
        get("GOOGLE_CLIENT_SECRET"),
        get("GOOGLE_REFRESH_TOKEN"),
    ) {
        (Some(client_id), Some(client_secret), Some(refresh_token)) => {
            Ok(GoogleCredentials::RefreshToken {
                client_id,
                client_secret: client_secret.into(),
                refresh_token: refresh_token.into(),
            })
        }
        _ => Err(ConfigError::MissingCredentials),
    }
}
