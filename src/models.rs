//! Request and response bodies for the HTTP API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::availability::RoomAvailability;
use crate::calendar::CalendarSummary;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub source: Option<String>,
    pub calendar_loaded: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConnectionCheckQuery {
    pub spreadsheet_id: Option<String>,
}

/// Omitted fields fall back to the server's configured defaults.
#[derive(Debug, Default, Deserialize)]
pub struct LoadCalendarRequest {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub sheet_name: Option<String>,
    #[serde(default)]
    pub date_start_cell: Option<String>,
    #[serde(default)]
    pub date_start: Option<String>,
}

/// Query string of a workbook upload.
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub sheet_name: Option<String>,
    pub date_start_cell: Option<String>,
    pub date_start: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoadCalendarResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_info: Option<CalendarInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
}

/// Calendar summary as shown to clients: row numbers are 1-based like the
/// sheet's own row labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarInfo {
    pub total_dates: usize,
    pub date_range: DateRange,
    pub years: Vec<i32>,
    pub header_row: usize,
    pub data_start_row: usize,
    pub sample_dates: Vec<NaiveDate>,
}

impl From<CalendarSummary> for CalendarInfo {
    fn from(summary: CalendarSummary) -> Self {
        Self {
            total_dates: summary.total_dates,
            date_range: DateRange {
                min_date: summary.min_date,
                max_date: summary.max_date,
            },
            years: summary.years,
            header_row: summary.header_row + 1,
            data_start_row: summary.data_start_row + 1,
            sample_dates: summary.sample_dates,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    /// Empty or "ALL" searches every category.
    #[serde(default)]
    pub category_filter: String,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available_rooms: Vec<RoomAvailability>,
    pub count: usize,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_filter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoomCheckRequest {
    pub room_number: String,
    #[serde(rename = "date", alias = "check_date")]
    pub check_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct RoomCheckResponse {
    pub room_number: String,
    #[serde(rename = "date")]
    pub check_date: NaiveDate,
    pub available: bool,
}

#[derive(Debug, Deserialize)]
pub struct CategoriesRequest {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}
