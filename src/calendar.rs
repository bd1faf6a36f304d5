//! Loaded calendar state and the slot that holds the current one.

use std::collections::BTreeSet;

use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, info};

use crate::date_parser::DateTokenParser;
use crate::error::{CalendarError, Result};
use crate::grid::Grid;
use crate::header::{resolver_for, DateColumnIndex};
use crate::merges::{AnchorMap, MergeRectangle};

/// Number of dates echoed back in a summary.
const SAMPLE_DATES: usize = 10;

/// Everything a query needs, resolved once per load and read-only afterwards.
#[derive(Debug, Clone)]
pub struct CalendarState {
    pub(crate) grid: Grid,
    pub(crate) anchors: AnchorMap,
    pub(crate) date_index: DateColumnIndex,
    pub(crate) header_row: usize,
}

impl CalendarState {
    /// Resolve a calendar from a fetched grid. `anchor` selects the sequential
    /// header strategy; without it the header layout is auto-detected.
    pub fn load(
        grid: Grid,
        merges: &[MergeRectangle],
        anchor: Option<&str>,
        start_date: Option<&str>,
    ) -> Result<Self> {
        Self::load_at(grid, merges, anchor, start_date, Local::now().date_naive())
    }

    /// Same as [`CalendarState::load`] with a fixed "today" for the default
    /// year/month heuristics.
    pub fn load_at(
        grid: Grid,
        merges: &[MergeRectangle],
        anchor: Option<&str>,
        start_date: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self> {
        let anchors = AnchorMap::build(merges);
        let resolver = resolver_for(anchor, start_date, DateTokenParser::new(today));
        info!("Using {} header strategy", resolver.name());

        let header = resolver.resolve(&grid)?;
        info!(
            "Header row {}, data starts at row {}",
            header.header_row + 1,
            header.data_start_row() + 1
        );
        if anchors.is_empty() {
            debug!("Sheet has no merged cells");
        } else {
            debug!("{} cells covered by merges", anchors.len());
        }

        let state = Self {
            grid,
            anchors,
            date_index: header.date_index,
            header_row: header.header_row,
        };

        let summary = state.summary();
        info!(
            "Loaded calendar: {} dates ({:?} to {:?})",
            summary.total_dates, summary.min_date, summary.max_date
        );
        Ok(state)
    }

    pub fn header_row(&self) -> usize {
        self.header_row
    }

    pub fn data_start_row(&self) -> usize {
        self.header_row() + 1
    }

    pub fn summary(&self) -> CalendarSummary {
        let dates: Vec<NaiveDate> = self.date_index.keys().copied().collect();
        let years: BTreeSet<i32> = dates.iter().map(|d| d.year()).collect();
        CalendarSummary {
            total_dates: dates.len(),
            min_date: dates.first().copied(),
            max_date: dates.last().copied(),
            years: years.into_iter().collect(),
            header_row: self.header_row(),
            data_start_row: self.data_start_row(),
            sample_dates: dates.into_iter().take(SAMPLE_DATES).collect(),
        }
    }
}

/// Read-only aggregate over the date index. Row indices are zero-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarSummary {
    pub total_dates: usize,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub years: Vec<i32>,
    pub header_row: usize,
    pub data_start_row: usize,
    pub sample_dates: Vec<NaiveDate>,
}

/// Holder for the current calendar, empty until the first successful load.
///
/// Loads replace the state wholesale; a failed load never touches it.
#[derive(Debug, Default)]
pub struct CalendarSlot {
    state: Option<CalendarState>,
}

impl CalendarSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, state: CalendarState) {
        self.state = Some(state);
    }

    pub fn clear(&mut self) {
        self.state = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    pub fn get(&self) -> Result<&CalendarState> {
        self.state.as_ref().ok_or(CalendarError::NotLoaded)
    }

    pub fn summary(&self) -> Option<CalendarSummary> {
        self.state.as_ref().map(CalendarState::summary)
    }
}
