//! Errors raised by the calendar core.
//!
//! Glue code (grid sources, config, the HTTP layer) uses `anyhow`; everything
//! that resolves or queries a calendar reports one of these variants.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Invalid cell reference: {0}")]
    InvalidReference(String),

    #[error("Anchor cell {reference} is outside the grid ({rows} rows)")]
    OutOfBounds { reference: String, rows: usize },

    #[error("Could not determine start date from cell {0} or the configured start date")]
    UnresolvableStartDate(String),

    #[error("Unparseable date: {0:?}")]
    UnparseableDate(String),

    #[error("Could not find a date header row")]
    NoHeaderFound,

    #[error("No dates found in the header row")]
    NoDatesFound,

    #[error("check_out ({check_out}) must be greater than or equal to check_in ({check_in})")]
    InvalidRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("Calendar not loaded. Load a calendar first.")]
    NotLoaded,
}

pub type Result<T> = std::result::Result<T, CalendarError>;
