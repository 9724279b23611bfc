// =============================================================================
// GOOGLE SHEETS CLIENT
// =============================================================================
//
// Reads the roster with the Sheets API v4 `spreadsheets.values.get` call.
// See: https://developers.google.com/sheets/api/reference/rest/v4/spreadsheets.values/get
//
// The response is a ragged grid of strings: Google drops trailing empty cells
// from each row and omits `values` entirely for an empty range. Turning that
// into records is the core layer's job (`Roster::from_grid`).

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::sync::Arc;

use crate::core::roster::{Roster, RosterError, RosterSource};
use crate::infra::google_auth::AccessTokenProvider;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl ValueRange {
    /// Flattens cells to strings. We ask for formatted values, but numbers can
    /// still sneak through as JSON numbers.
    fn into_grid(self) -> Vec<Vec<String>> {
        self.values
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect()
    }
}

pub struct GoogleSheetsClient {
    client: Client,
    auth: Arc<dyn AccessTokenProvider>,
    spreadsheet_id: String,
    range: String,
}

impl GoogleSheetsClient {
    pub fn new(auth: Arc<dyn AccessTokenProvider>, spreadsheet_id: String, range: String) -> Self {
        Self {
            client: Client::new(),
            auth,
            spreadsheet_id,
            range,
        }
    }

    /// Builds the `values.get` URL. The range (e.g. `Hoja1!A:E`) goes in the
    /// path, so it has to be percent-encoded as a single segment.
    fn values_url(&self) -> Result<Url, RosterError> {
        let mut url = Url::parse(SHEETS_API_BASE)
            .map_err(|e| RosterError::Request(format!("Invalid Sheets API URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| RosterError::Request("Sheets API URL cannot be a base".to_string()))?
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&self.range);

        url.query_pairs_mut()
            .append_pair("valueRenderOption", "FORMATTED_VALUE");

        Ok(url)
    }
}

#[async_trait]
impl RosterSource for GoogleSheetsClient {
    async fn fetch_roster(&self) -> Result<Roster, RosterError> {
        let token = self
            .auth
            .obtain()
            .await
            .map_err(|e| RosterError::Auth(e.to_string()))?;

        let url = self.values_url()?;
        tracing::debug!("Fetching roster range {} from {}", self.range, self.spreadsheet_id);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| RosterError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RosterError::Request(format!(
                "Sheets API error ({}): {}. \
                 Make sure the spreadsheet is shared with the authenticated account.",
                status, text
            )));
        }

        let value_range: ValueRange = response
            .json()
            .await
            .map_err(|e| RosterError::Malformed(e.to_string()))?;

        let roster = Roster::from_grid(value_range.into_grid());
        tracing::debug!(
            "Roster has {} column(s) and {} row(s)",
            roster.headers.len(),
            roster.len()
        );

        Ok(roster)
    }
}
