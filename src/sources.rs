//! Grid source abstraction.
//!
//! Defines the [`GridSource`] trait so the calendar can be read from Google
//! Sheets or from workbook files on disk through the same load path.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::grid::SheetGrid;
use crate::sheet_parser;

/// Outcome of a connectivity probe against a source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub authenticated: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheet_accessible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheet_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Async trait implemented by each grid backend.
///
/// `location` identifies the spreadsheet within the backend: a spreadsheet ID
/// for Google Sheets, a file name for a workbook directory.
#[async_trait::async_trait]
pub trait GridSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self, location: &str, sheet_name: Option<&str>) -> Result<SheetGrid>;
    async fn check(&self, location: Option<&str>) -> ConnectionStatus;
}

/// Workbook files (.xlsx/.xlsm/.csv) under a fixed directory.
#[derive(Debug, Clone)]
pub struct WorkbookDirSource {
    root: PathBuf,
}

impl WorkbookDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            anyhow::bail!("Workbook directory does not exist: {:?}", root);
        }
        Ok(Self { root })
    }

    /// Resolve a file name inside the root, refusing anything that walks out of it.
    fn resolve(&self, location: &str) -> Result<PathBuf> {
        let relative = Path::new(location);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if location.is_empty() || !plain {
            anyhow::bail!("Invalid workbook name: {:?}", location);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait::async_trait]
impl GridSource for WorkbookDirSource {
    fn name(&self) -> &str {
        "workbook_dir"
    }

    async fn fetch(&self, location: &str, sheet_name: Option<&str>) -> Result<SheetGrid> {
        let path = self.resolve(location)?;
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read workbook: {:?}", path))?;
        info!("Read workbook {:?} ({} bytes)", path, data.len());
        sheet_parser::parse_file(location, &data, sheet_name)
    }

    async fn check(&self, location: Option<&str>) -> ConnectionStatus {
        let mut status = ConnectionStatus {
            connected: true,
            authenticated: true,
            message: format!("Reading workbooks from {:?}", self.root),
            ..Default::default()
        };

        if let Some(location) = location {
            let exists = match self.resolve(location) {
                Ok(path) => tokio::fs::metadata(&path)
                    .await
                    .map(|m| m.is_file())
                    .unwrap_or(false),
                Err(_) => false,
            };
            status.spreadsheet_accessible = Some(exists);
            if exists {
                status.spreadsheet_title = Some(location.to_string());
                status.message = format!("Workbook '{}' is readable", location);
            } else {
                status.error = Some(format!("Workbook not found: {}", location));
                status.message = "Workbook directory available, but workbook not found".to_string();
            }
        }

        status
    }
}
