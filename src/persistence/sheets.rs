use super::{LogError, SignalLog, SignalRow};
use crate::models::SignalRecord;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
const DEFAULT_RANGE: &str = "Sheet1!A1";

#[derive(Debug, Serialize)]
struct AppendRequest {
    values: Vec<Vec<String>>,
}

/// Signal journal appended to a Google Sheet through the Sheets v4 API
///
/// Authenticates with an OAuth access token for an account that can edit the
/// sheet.
#[derive(Clone)]
pub struct GoogleSheetsLog {
    client: Client,
    base_url: String,
    sheet_id: String,
    range: String,
    access_token: String,
}

impl GoogleSheetsLog {
    pub fn new(sheet_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: SHEETS_API_BASE.to_string(),
            sheet_id: sheet_id.into(),
            range: DEFAULT_RANGE.to_string(),
            access_token: access_token.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = range.into();
        self
    }

    /// `values:append` endpoint with the sheet id and range percent-encoded
    fn append_url(&self) -> Result<Url, LogError> {
        let range = format!("{}:append", self.range);
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| LogError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| LogError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.sheet_id.as_str(),
                "values",
                range.as_str(),
            ]);

        Ok(url)
    }
}

#[async_trait]
impl SignalLog for GoogleSheetsLog {
    fn name(&self) -> &str {
        "google-sheets"
    }

    async fn append(&self, record: &SignalRecord) -> Result<(), LogError> {
        let url = self.append_url()?;
        let body = AppendRequest {
            values: vec![SignalRow::from_record(record).into_values()],
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LogError::Rejected { status, detail });
        }

        tracing::info!(symbol = %record.symbol, decision = %record.decision(), "Logged signal to Google Sheets");
        Ok(())
    }
}
