//! Free-text cell → calendar date.
//!
//! Tries fixed numeric layouts first, then "month name + day" text, then a bare
//! day number combined with a default month and year. Whatever is missing from
//! the text comes from `today`, which the caller fixes once per load.

use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;

use crate::error::{CalendarError, Result};
use crate::lexicon::{first_number, month_from_name};

/// Numeric layouts, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumericLayout {
    /// 24.11.2025
    DotDmy,
    /// 24/11/2025
    SlashDmy,
    /// 2025-11-24
    IsoYmd,
    /// 24.11
    DotDm,
    /// 24/11
    SlashDm,
}

const LAYOUTS: [NumericLayout; 5] = [
    NumericLayout::DotDmy,
    NumericLayout::SlashDmy,
    NumericLayout::IsoYmd,
    NumericLayout::DotDm,
    NumericLayout::SlashDm,
];

static DOT_DMY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").unwrap());
static SLASH_DMY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());
static ISO_YMD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap());
static DOT_DM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})$").unwrap());
static SLASH_DM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})$").unwrap());

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{L}+").unwrap());
// Digit runs are delimited by non-digits only, so "24ноября" still yields 24.
static SHORT_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d{1,2})(?:\D|$)").unwrap());
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d{4})(?:\D|$)").unwrap());

impl NumericLayout {
    /// Returns (year, month, day) when the text has this exact shape.
    fn capture(self, text: &str, default_year: i32) -> Option<(i32, u32, u32)> {
        let num = |s: &str| s.parse::<u32>().ok();
        match self {
            NumericLayout::DotDmy | NumericLayout::SlashDmy => {
                let re = if self == NumericLayout::DotDmy { &DOT_DMY_RE } else { &SLASH_DMY_RE };
                let caps = re.captures(text)?;
                Some((caps[3].parse().ok()?, num(&caps[2])?, num(&caps[1])?))
            }
            NumericLayout::IsoYmd => {
                let caps = ISO_YMD_RE.captures(text)?;
                Some((caps[1].parse().ok()?, num(&caps[2])?, num(&caps[3])?))
            }
            NumericLayout::DotDm | NumericLayout::SlashDm => {
                let re = if self == NumericLayout::DotDm { &DOT_DM_RE } else { &SLASH_DM_RE };
                let caps = re.captures(text)?;
                Some((default_year, num(&caps[2])?, num(&caps[1])?))
            }
        }
    }
}

/// Build a date, rejecting day values outside 1..=31 instead of clamping.
fn make_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if !(1..=31).contains(&day) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

#[derive(Debug, Clone, Copy)]
pub struct DateTokenParser {
    today: NaiveDate,
}

impl Default for DateTokenParser {
    fn default() -> Self {
        Self::new(Local::now().date_naive())
    }
}

impl DateTokenParser {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Parse `text` into a date. `default_month`/`default_year` fill in what the
    /// text leaves out; both fall back to the current month and year.
    pub fn parse(
        &self,
        text: &str,
        default_month: Option<u32>,
        default_year: Option<i32>,
    ) -> Result<NaiveDate> {
        let text = text.trim();
        let default_year = default_year.unwrap_or(self.today.year());

        if text.is_empty() {
            return Err(CalendarError::UnparseableDate(text.to_string()));
        }

        for layout in LAYOUTS {
            if let Some((year, month, day)) = layout.capture(text, default_year) {
                if let Some(date) = make_date(year, month, day) {
                    return Ok(date);
                }
            }
        }

        if let Some(date) = self.parse_textual(text, default_year) {
            return Ok(date);
        }

        let month = default_month.unwrap_or(self.today.month());
        first_number(text)
            .and_then(|day| make_date(default_year, month, day))
            .ok_or_else(|| CalendarError::UnparseableDate(text.to_string()))
    }

    /// "24 ноября", "Nov 3 2025", "3 aug".
    fn parse_textual(&self, text: &str, default_year: i32) -> Option<NaiveDate> {
        let month = WORD_RE
            .find_iter(text)
            .find_map(|word| month_from_name(word.as_str()))?;
        let day = SHORT_NUMBER_RE
            .captures(text)
            .and_then(|caps| caps[1].parse::<u32>().ok())?;
        let year = YEAR_RE
            .captures(text)
            .and_then(|caps| caps[1].parse::<i32>().ok())
            .unwrap_or(default_year);
        make_date(year, month, day)
    }
}
