//! Server configuration.
//!
//! Values come from the environment (a `.env` file is loaded first by `main`).
//! The calendar fields are defaults for load requests that omit them.

use tracing::{info, warn};

use crate::sheets::GoogleSheetsSource;
use crate::sources::{GridSource, WorkbookDirSource};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub spreadsheet_id: Option<String>,
    pub sheet_name: Option<String>,
    pub date_start_cell: Option<String>,
    pub date_start: Option<String>,
    pub google_credentials_path: Option<String>,
    pub workbook_dir: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            spreadsheet_id: get("SPREADSHEET_ID"),
            sheet_name: get("SHEET_NAME"),
            date_start_cell: get("DATE_START_CELL"),
            date_start: get("DATE_START"),
            google_credentials_path: get("GOOGLE_CREDENTIALS_PATH"),
            workbook_dir: get("WORKBOOK_DIR"),
        }
    }

    /// Pick the grid source: Google Sheets when credentials load, otherwise
    /// the workbook directory, otherwise none.
    pub fn grid_source(&self) -> Option<Box<dyn GridSource>> {
        if let Some(path) = &self.google_credentials_path {
            match GoogleSheetsSource::from_key_file(path) {
                Ok(source) => return Some(Box::new(source)),
                Err(e) => warn!("Google Sheets disabled: {:#}", e),
            }
        }

        if let Some(dir) = &self.workbook_dir {
            match WorkbookDirSource::new(dir) {
                Ok(source) => {
                    info!("Reading workbooks from {}", dir);
                    return Some(Box::new(source));
                }
                Err(e) => warn!("Workbook directory disabled: {:#}", e),
            }
        }

        warn!("No grid source configured, only uploads can load a calendar");
        None
    }
}
