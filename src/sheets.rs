//! Google Sheets API client.
//!
//! Reads cell values and merge geometry of one sheet using service account JWT
//! authentication. Read-only: the calendar never writes back.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::grid::{Grid, SheetGrid};
use crate::merges::MergeRectangle;
use crate::sources::{ConnectionStatus, GridSource};

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const METADATA_FIELDS: &str = "properties.title,sheets(properties(sheetId,title),merges)";
/// Columns fetched per sheet.
const VALUE_COLUMNS: &str = "A:ZZ";

/// Google Sheets grid source authenticated as a service account.
#[derive(Clone)]
pub struct GoogleSheetsSource {
    client: Client,
    sa_key: ServiceAccountKey,
    /// Cached OAuth2 access token.
    token_cache: Arc<Mutex<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: u64,
}

#[derive(Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    properties: SpreadsheetProperties,
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct SpreadsheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
    #[serde(default)]
    merges: Vec<GridRange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    #[serde(default)]
    title: String,
}

/// Zero-valued indices are omitted by the API, hence the defaults.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridRange {
    #[serde(default)]
    start_row_index: usize,
    #[serde(default)]
    end_row_index: usize,
    #[serde(default)]
    start_column_index: usize,
    #[serde(default)]
    end_column_index: usize,
}

impl From<&GridRange> for MergeRectangle {
    fn from(r: &GridRange) -> Self {
        MergeRectangle::new(
            r.start_row_index,
            r.end_row_index,
            r.start_column_index,
            r.end_column_index,
        )
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl GoogleSheetsSource {
    /// Load the service account key JSON from `path`.
    pub fn from_key_file(path: &str) -> Result<Self> {
        let key_json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read service account key: {}", path))?;
        let sa_key: ServiceAccountKey =
            serde_json::from_str(&key_json).context("Failed to parse service account key")?;
        info!("Authenticated using service account {}", sa_key.client_email);

        Ok(Self {
            client: Client::new(),
            sa_key,
            token_cache: Arc::new(Mutex::new(None)),
        })
    }

    fn token_uri(&self) -> &str {
        self.sa_key.token_uri.as_deref().unwrap_or(TOKEN_URI)
    }

    /// Get a valid OAuth2 access token, refreshing if expired.
    async fn get_access_token(&self) -> Result<String> {
        {
            let cache = self.token_cache.lock().unwrap();
            if let Some(ref cached) = *cache {
                if now_secs() < cached.expires_at.saturating_sub(60) {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let now = now_secs();
        let claims = serde_json::json!({
            "iss": self.sa_key.client_email,
            "scope": SHEETS_SCOPE,
            "aud": self.token_uri(),
            "iat": now,
            "exp": now + 3600,
        });

        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        let encoding_key =
            jsonwebtoken::EncodingKey::from_rsa_pem(self.sa_key.private_key.as_bytes())
                .context("Invalid RSA private key in service account JSON")?;
        let jwt = jsonwebtoken::encode(&header, &claims, &encoding_key)
            .context("Failed to encode JWT")?;

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: u64,
        }

        let resp: TokenResponse = self
            .client
            .post(self.token_uri())
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await
            .context("Token exchange request failed")?
            .error_for_status()
            .context("Token exchange returned error")?
            .json()
            .await
            .context("Failed to parse token response")?;

        let token = resp.access_token.clone();
        {
            let mut cache = self.token_cache.lock().unwrap();
            *cache = Some(CachedToken {
                access_token: resp.access_token,
                expires_at: now + resp.expires_in,
            });
        }
        debug!("Refreshed Google access token");

        Ok(token)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
        let token = self.get_access_token().await?;
        self.client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", what))?
            .error_for_status()
            .with_context(|| format!("Google returned an error for {}", what))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {}", what))
    }

    async fn spreadsheet_metadata(&self, spreadsheet_id: &str) -> Result<SpreadsheetMeta> {
        let mut url = spreadsheet_url(spreadsheet_id, &[])?;
        url.query_pairs_mut().append_pair("fields", METADATA_FIELDS);
        self.get_json(url, "spreadsheet metadata").await
    }

    async fn sheet_values(&self, spreadsheet_id: &str, sheet_title: &str) -> Result<Vec<Vec<String>>> {
        let range = a1_range(sheet_title);
        let url = spreadsheet_url(spreadsheet_id, &["values", &range])?;
        let values: ValueRange = self.get_json(url, "sheet values").await?;
        Ok(values
            .values
            .iter()
            .map(|row| row.iter().map(value_to_string).collect())
            .collect())
    }
}

#[async_trait::async_trait]
impl GridSource for GoogleSheetsSource {
    fn name(&self) -> &str {
        "google_sheets"
    }

    async fn fetch(&self, location: &str, sheet_name: Option<&str>) -> Result<SheetGrid> {
        let meta = self.spreadsheet_metadata(location).await?;
        let sheet = select_sheet(&meta, sheet_name)?;
        debug!(
            "Selected sheet '{}' (id {}) with {} merges",
            sheet.properties.title,
            sheet.properties.sheet_id,
            sheet.merges.len()
        );

        let rows = self.sheet_values(location, &sheet.properties.title).await?;
        if rows.is_empty() {
            anyhow::bail!("No data found in sheet '{}'", sheet.properties.title);
        }

        info!(
            "Fetched sheet '{}' from '{}': {} rows",
            sheet.properties.title,
            meta.properties.title,
            rows.len()
        );
        Ok(SheetGrid {
            title: sheet.properties.title.clone(),
            grid: Grid::new(rows),
            merges: sheet.merges.iter().map(MergeRectangle::from).collect(),
        })
    }

    async fn check(&self, location: Option<&str>) -> ConnectionStatus {
        let mut status = ConnectionStatus::default();

        if let Err(e) = self.get_access_token().await {
            warn!("Connection check error: {:#}", e);
            status.message = format!("Connection check failed: {}", e);
            status.error = Some(format!("{:#}", e));
            return status;
        }
        status.authenticated = true;
        status.connected = true;
        status.message = "Successfully authenticated with Google Sheets API".to_string();

        let Some(spreadsheet_id) = location else {
            return status;
        };

        match self.spreadsheet_metadata(spreadsheet_id).await {
            Ok(meta) => {
                status.spreadsheet_accessible = Some(true);
                status.message = format!(
                    "Successfully connected. Access to spreadsheet '{}' confirmed.",
                    meta.properties.title
                );
                status.spreadsheet_title = Some(meta.properties.title);
            }
            Err(e) => {
                status.spreadsheet_accessible = Some(false);
                let http_status = e
                    .downcast_ref::<reqwest::Error>()
                    .and_then(|re| re.status());
                let (error, message) = match http_status {
                    Some(StatusCode::NOT_FOUND) => (
                        format!("Spreadsheet not found (ID: {})", spreadsheet_id),
                        "Authenticated, but spreadsheet not found. Check the spreadsheet ID."
                            .to_string(),
                    ),
                    Some(StatusCode::FORBIDDEN) => (
                        "Permission denied".to_string(),
                        "Authenticated, but no access to this spreadsheet. Make sure the service account has access."
                            .to_string(),
                    ),
                    _ => (
                        format!("{:#}", e),
                        format!("Authenticated, but error accessing spreadsheet: {}", e),
                    ),
                };
                status.error = Some(error);
                status.message = message;
            }
        }

        status
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// `{SHEETS_API}/{id}/{segments...}` with each segment percent-encoded.
fn spreadsheet_url(spreadsheet_id: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(SHEETS_API).context("Invalid Sheets API base URL")?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Sheets API base URL cannot hold path segments"))?
        .push(spreadsheet_id)
        .extend(segments);
    Ok(url)
}

/// Quoted A1 range covering the fetched columns of one sheet.
fn a1_range(sheet_title: &str) -> String {
    format!("'{}'!{}", sheet_title.replace('\'', "''"), VALUE_COLUMNS)
}

/// The named sheet, or the first one when no name is given.
fn select_sheet<'a>(meta: &'a SpreadsheetMeta, sheet_name: Option<&str>) -> Result<&'a SheetMeta> {
    match sheet_name {
        Some(name) => meta
            .sheets
            .iter()
            .find(|s| s.properties.title == name)
            .ok_or_else(|| anyhow!("Sheet '{}' not found", name)),
        None => meta
            .sheets
            .first()
            .ok_or_else(|| anyhow!("Spreadsheet has no sheets")),
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> SpreadsheetMeta {
        serde_json::from_value(serde_json::json!({
            "properties": { "title": "Hotel" },
            "sheets": [
                { "properties": { "sheetId": 0, "title": "Ноябрь" } },
                {
                    "properties": { "sheetId": 42, "title": "Декабрь" },
                    "merges": [
                        { "startRowIndex": 5, "endRowIndex": 8, "startColumnIndex": 3, "endColumnIndex": 5 },
                        { "endRowIndex": 1, "endColumnIndex": 2 }
                    ]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_select_sheet() {
        let meta = sample_meta();
        assert_eq!(select_sheet(&meta, None).unwrap().properties.title, "Ноябрь");

        let december = select_sheet(&meta, Some("Декабрь")).unwrap();
        assert_eq!(december.properties.sheet_id, 42);
        assert!(select_sheet(&meta, Some("Январь")).is_err());
    }

    #[test]
    fn test_merges_from_api_ranges() {
        let meta = sample_meta();
        let sheet = select_sheet(&meta, Some("Декабрь")).unwrap();
        let merges: Vec<MergeRectangle> = sheet.merges.iter().map(MergeRectangle::from).collect();
        assert_eq!(
            merges,
            vec![MergeRectangle::new(5, 8, 3, 5), MergeRectangle::new(0, 1, 0, 2)]
        );
    }

    #[test]
    fn test_values_url_encoding() {
        let url = spreadsheet_url("abc123", &["values", &a1_range("My Sheet")]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/'My%20Sheet'!A:ZZ"
        );
        assert_eq!(a1_range("O'Hara"), "'O''Hara'!A:ZZ");
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&serde_json::json!("Guest")), "Guest");
        assert_eq!(value_to_string(&serde_json::json!(12)), "12");
        assert_eq!(value_to_string(&serde_json::Value::Null), "");
    }

    #[test]
    fn test_missing_key_file() {
        assert!(GoogleSheetsSource::from_key_file("/definitely/not/here.json").is_err());
    }
}
