//! Date header resolution: which grid row holds the calendar days, and which
//! column each date lives in.
//!
//! Two strategies share the lexicon and date parser:
//! - [`SequentialResolver`]: a configured anchor cell plus a start date; dates
//!   are generated one per column walking right.
//! - [`AutoDetectResolver`]: finds a month-name row and a day-number row on its
//!   own and infers month boundaries and year rollover.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, warn};

use crate::cell_ref::{index_to_column_letter, indices_to_reference, reference_to_indices};
use crate::date_parser::DateTokenParser;
use crate::error::{CalendarError, Result};
use crate::grid::Grid;
use crate::lexicon::{classify, CellKind};

/// Calendar date -> zero-based grid column, ordered by date.
pub type DateColumnIndex = BTreeMap<NaiveDate, usize>;

/// Date columns start at C; A and B hold category and room number.
const FIRST_DATE_COL: usize = 2;
/// Rows searched for a month-name row.
const MONTH_ROW_SCAN_ROWS: usize = 15;
/// Rows searched for a bare day-number row when no month row exists.
const DAY_ROW_SCAN_ROWS: usize = 20;
/// Columns inspected while classifying a candidate row.
const ROW_SCAN_COLS: usize = 100;
/// Columns inspected when probing below a month row.
const PROBE_COLS: usize = 50;
const MIN_MONTH_HITS: usize = 2;
const MIN_DAY_HITS: usize = 5;
/// Hard cap on header columns walked.
const MAX_HEADER_COLS: usize = 500;
/// How far left to look for the month label governing a column.
const MONTH_LOOKBACK_COLS: usize = 100;

/// Outcome of header resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHeader {
    pub header_row: usize,
    pub date_index: DateColumnIndex,
}

impl ResolvedHeader {
    pub fn data_start_row(&self) -> usize {
        self.header_row + 1
    }
}

pub trait HeaderResolver {
    fn name(&self) -> &'static str;
    fn resolve(&self, grid: &Grid) -> Result<ResolvedHeader>;
}

/// Pick the strategy: an anchor reference means sequential generation,
/// otherwise auto-detection.
pub fn resolver_for(
    anchor: Option<&str>,
    start_date: Option<&str>,
    parser: DateTokenParser,
) -> Box<dyn HeaderResolver> {
    match anchor.map(str::trim).filter(|a| !a.is_empty()) {
        Some(anchor) => Box::new(SequentialResolver::new(anchor, start_date, parser)),
        None => Box::new(AutoDetectResolver::new(parser)),
    }
}

// ============================================================================
// Strategy A: explicit anchor
// ============================================================================

#[derive(Debug, Clone)]
pub struct SequentialResolver {
    anchor: String,
    start_date: Option<String>,
    parser: DateTokenParser,
}

impl SequentialResolver {
    pub fn new(anchor: &str, start_date: Option<&str>, parser: DateTokenParser) -> Self {
        Self {
            anchor: anchor.to_string(),
            start_date: start_date
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            parser,
        }
    }

    fn start_date(&self, grid: &Grid, row: usize, col: usize) -> Result<NaiveDate> {
        if let Some(ref explicit) = self.start_date {
            match self.parser.parse(explicit, None, None) {
                Ok(date) => return Ok(date),
                Err(e) => warn!("Could not parse configured start date: {}", e),
            }
        }

        match self.parser.parse(grid.cell(row, col), None, None) {
            Ok(date) => {
                info!("Parsed start date from cell {}: {}", self.anchor, date);
                Ok(date)
            }
            Err(_) => Err(CalendarError::UnresolvableStartDate(self.anchor.clone())),
        }
    }
}

impl HeaderResolver for SequentialResolver {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn resolve(&self, grid: &Grid) -> Result<ResolvedHeader> {
        let (start_row, start_col) = reference_to_indices(&self.anchor)?;
        if start_row >= grid.len() {
            return Err(CalendarError::OutOfBounds {
                reference: self.anchor.clone(),
                rows: grid.len(),
            });
        }

        let mut current = self.start_date(grid, start_row, start_col)?;
        info!(
            "Starting date parsing from cell {} with date {}",
            self.anchor, current
        );

        let mut date_index = DateColumnIndex::new();
        for col in start_col..grid.row_len(start_row) {
            match classify(grid.cell(start_row, col)) {
                CellKind::Empty => {
                    info!(
                        "Stopped at empty cell {}",
                        indices_to_reference(start_row, col)
                    );
                    break;
                }
                CellKind::WeekdayLabel => continue,
                _ => {
                    date_index.insert(current, col);
                    match current.succ_opt() {
                        Some(next) => current = next,
                        None => break,
                    }
                }
            }
        }

        if date_index.is_empty() {
            return Err(CalendarError::NoDatesFound);
        }

        info!(
            "Parsed {} dates starting from {}",
            date_index.len(),
            self.anchor
        );
        Ok(ResolvedHeader {
            header_row: start_row,
            date_index,
        })
    }
}

// ============================================================================
// Strategy B: auto-detection
// ============================================================================

#[derive(Debug, Clone)]
pub struct AutoDetectResolver {
    parser: DateTokenParser,
}

/// Rows chosen by the layout search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeaderRows {
    month_row: Option<usize>,
    day_row: usize,
}

impl AutoDetectResolver {
    pub fn new(parser: DateTokenParser) -> Self {
        Self { parser }
    }

    fn locate_rows(grid: &Grid) -> Option<HeaderRows> {
        Self::rows_from_month_row(grid).or_else(|| Self::rows_from_day_row(grid))
    }

    /// A row with several month names, with day numbers one or two rows below.
    fn rows_from_month_row(grid: &Grid) -> Option<HeaderRows> {
        let month_row = (0..grid.len().min(MONTH_ROW_SCAN_ROWS)).find(|&row| {
            grid.row_len(row) >= 3
                && count_kinds(grid, row, ROW_SCAN_COLS, |k| k.month().is_some()) >= MIN_MONTH_HITS
        })?;
        debug!("Found month row at index {}", month_row);

        let probe = month_row + 2;
        if probe < grid.len()
            && count_kinds(grid, probe, PROBE_COLS, |k| k.day().is_some()) >= MIN_DAY_HITS
        {
            return Some(HeaderRows {
                month_row: Some(month_row),
                day_row: probe,
            });
        }

        if month_row + 1 < grid.len() {
            return Some(HeaderRows {
                month_row: Some(month_row),
                day_row: month_row + 1,
            });
        }

        None
    }

    /// A row dominated by bare day numbers; the row above is taken as the month row.
    fn rows_from_day_row(grid: &Grid) -> Option<HeaderRows> {
        debug!("Month row not found, searching for day row directly");
        (0..grid.len().min(DAY_ROW_SCAN_ROWS))
            .find(|&row| {
                if grid.row_len(row) < 3 {
                    return false;
                }
                let days = count_kinds(grid, row, ROW_SCAN_COLS, |k| k.day().is_some());
                let weekdays =
                    count_kinds(grid, row, ROW_SCAN_COLS, |k| k == CellKind::WeekdayLabel);
                days >= MIN_DAY_HITS && weekdays < days
            })
            .map(|row| HeaderRows {
                month_row: row.checked_sub(1),
                day_row: row,
            })
    }
}

fn count_kinds(grid: &Grid, row: usize, max_cols: usize, pred: impl Fn(CellKind) -> bool) -> usize {
    (FIRST_DATE_COL..grid.row_len(row).min(max_cols))
        .filter(|&col| pred(classify(grid.cell(row, col))))
        .count()
}

/// Month labelling a header column: the month-row cell above it, or the
/// nearest month name to its left.
fn month_for_column(grid: &Grid, month_row: Option<usize>, col: usize) -> Option<u32> {
    let month_row = month_row?;
    let month_at = |c: usize| classify(grid.cell(month_row, c)).month();

    if let Some(month) = month_at(col) {
        return Some(month);
    }
    let lower = col.saturating_sub(MONTH_LOOKBACK_COLS).max(1) + 1;
    (lower..col).rev().find_map(month_at)
}

impl HeaderResolver for AutoDetectResolver {
    fn name(&self) -> &'static str {
        "auto-detect"
    }

    fn resolve(&self, grid: &Grid) -> Result<ResolvedHeader> {
        let Some(rows) = Self::locate_rows(grid) else {
            warn!("Could not find day row");
            return Err(CalendarError::NoHeaderFound);
        };
        info!(
            "Header row at index {} (month row: {:?})",
            rows.day_row, rows.month_row
        );

        let today = self.parser.today();
        let mut year = today.year();
        let mut current_month: Option<u32> = None;
        let mut last_day: Option<u32> = None;
        let mut date_index = DateColumnIndex::new();

        let end = grid.row_len(rows.day_row).min(MAX_HEADER_COLS);
        for col in FIRST_DATE_COL..end {
            let Some(day) = classify(grid.cell(rows.day_row, col)).day() else {
                continue;
            };

            // A month label wins over the day-reset heuristic.
            if let Some(month) = month_for_column(grid, rows.month_row, col) {
                current_month = Some(month);
            } else if day == 1 && last_day.is_some_and(|d| d >= 28) {
                if let Some(month) = current_month {
                    let next = month % 12 + 1;
                    if next == 1 {
                        year += 1;
                    }
                    debug!(
                        "Month rollover at column {}: {} -> {} ({})",
                        index_to_column_letter(col),
                        month,
                        next,
                        year
                    );
                    current_month = Some(next);
                }
            }

            let month = *current_month.get_or_insert(today.month());
            match NaiveDate::from_ymd_opt(year, month, day) {
                Some(date) => {
                    date_index.insert(date, col);
                    last_day = Some(day);
                }
                None => debug!(
                    "Skipping impossible date {}-{:02}-{:02} at column {}",
                    year,
                    month,
                    day,
                    index_to_column_letter(col)
                ),
            }
        }

        if date_index.is_empty() {
            return Err(CalendarError::NoDatesFound);
        }

        info!("Successfully parsed {} dates", date_index.len());
        Ok(ResolvedHeader {
            header_row: rows.day_row,
            date_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn parser(today: NaiveDate) -> DateTokenParser {
        DateTokenParser::new(today)
    }

    fn grid(rows: Vec<Vec<&str>>) -> Grid {
        rows.into_iter().collect()
    }

    fn padded(mut rows: Vec<Vec<&'static str>>, header_at: usize) -> Vec<Vec<&'static str>> {
        while rows.len() < header_at {
            rows.insert(0, vec![]);
        }
        rows
    }

    #[test]
    fn test_sequential_stops_at_empty_cell() {
        let g = grid(padded(
            vec![vec!["", "", "24.11.2025", "25.11.2025", "", "X"]],
            7,
        ));
        let resolver =
            SequentialResolver::new("C7", Some("24.11.2025"), parser(ymd(2026, 1, 1)));
        let header = resolver.resolve(&g).unwrap();

        assert_eq!(header.header_row, 6);
        assert_eq!(header.data_start_row(), 7);
        let expected: DateColumnIndex = [(ymd(2025, 11, 24), 2), (ymd(2025, 11, 25), 3)].into();
        assert_eq!(header.date_index, expected);
    }

    #[test]
    fn test_sequential_skips_weekday_labels() {
        let g = grid(vec![vec!["Category", "Room", "01.08.2024", "пн", "x", "Sat", "y"]]);
        let resolver = SequentialResolver::new("c1", None, parser(ymd(2026, 1, 1)));
        let header = resolver.resolve(&g).unwrap();

        let expected: DateColumnIndex = [
            (ymd(2024, 8, 1), 2),
            (ymd(2024, 8, 2), 4),
            (ymd(2024, 8, 3), 6),
        ]
        .into();
        assert_eq!(header.date_index, expected);
        assert_eq!(header.header_row, 0);
    }

    #[test]
    fn test_sequential_bad_start_date_falls_back_to_cell() {
        let g = grid(vec![vec!["", "", "2024-08-01", "2"]]);
        let resolver = SequentialResolver::new("C1", Some("not a date"), parser(ymd(2026, 1, 1)));
        let header = resolver.resolve(&g).unwrap();
        assert_eq!(header.date_index.get(&ymd(2024, 8, 2)), Some(&3));
    }

    #[test]
    fn test_sequential_errors() {
        let today = parser(ymd(2026, 1, 1));
        let g = grid(vec![vec!["", "", "Guest", "x"], vec!["", "", "", "x"]]);

        assert!(matches!(
            SequentialResolver::new("C9", None, today).resolve(&g),
            Err(CalendarError::OutOfBounds { rows: 2, .. })
        ));
        assert!(matches!(
            SequentialResolver::new("C1", None, today).resolve(&g),
            Err(CalendarError::UnresolvableStartDate(_))
        ));
        assert!(matches!(
            SequentialResolver::new("C2", Some("01.01.2025"), today).resolve(&g),
            Err(CalendarError::NoDatesFound)
        ));
        assert!(matches!(
            SequentialResolver::new("2C", None, today).resolve(&g),
            Err(CalendarError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_auto_detect_month_row_with_labels() {
        let g = grid(vec![
            vec!["Отель"],
            vec!["", "", "Август", "", "Сентябрь", "", ""],
            vec!["Категория", "№ комнаты", "30", "31", "1", "2", "3"],
            vec!["Deluxe", "A-101", "", "Guest", "", "", ""],
        ]);
        let header = AutoDetectResolver::new(parser(ymd(2024, 6, 10)))
            .resolve(&g)
            .unwrap();

        assert_eq!(header.header_row, 2);
        let expected: DateColumnIndex = [
            (ymd(2024, 8, 30), 2),
            (ymd(2024, 8, 31), 3),
            (ymd(2024, 9, 1), 4),
            (ymd(2024, 9, 2), 5),
            (ymd(2024, 9, 3), 6),
        ]
        .into();
        assert_eq!(header.date_index, expected);
    }

    #[test]
    fn test_auto_detect_day_row_two_below_month_row() {
        let g = grid(vec![
            vec!["", "", "November", "", "", "December", ""],
            vec!["", "", "fri", "sat", "sun", "mon", "tue"],
            vec!["", "", "28", "29", "30", "1", "2"],
        ]);
        let header = AutoDetectResolver::new(parser(ymd(2025, 10, 1)))
            .resolve(&g)
            .unwrap();

        assert_eq!(header.header_row, 2);
        assert_eq!(header.date_index.len(), 5);
        assert_eq!(header.date_index[&ymd(2025, 11, 28)], 2);
        assert_eq!(header.date_index[&ymd(2025, 12, 1)], 5);
    }

    #[test]
    fn test_auto_detect_rollover_without_month_labels() {
        let g = grid(vec![
            vec!["Title"],
            vec!["", "", "пн", "вт", "ср", "чт", "пт", "сб"],
            vec!["", "", "29", "30", "31", "1", "2", "3"],
        ]);
        let header = AutoDetectResolver::new(parser(ymd(2025, 12, 10)))
            .resolve(&g)
            .unwrap();

        assert_eq!(header.header_row, 2);
        let expected: DateColumnIndex = [
            (ymd(2025, 12, 29), 2),
            (ymd(2025, 12, 30), 3),
            (ymd(2025, 12, 31), 4),
            (ymd(2026, 1, 1), 5),
            (ymd(2026, 1, 2), 6),
            (ymd(2026, 1, 3), 7),
        ]
        .into();
        assert_eq!(header.date_index, expected);
    }

    #[test]
    fn test_auto_detect_failures() {
        let today = parser(ymd(2025, 1, 1));
        let no_header = grid(vec![
            vec!["Deluxe", "A-101", "Guest"],
            vec!["Deluxe", "A-102", "", "7"],
        ]);
        assert_eq!(
            AutoDetectResolver::new(today).resolve(&no_header),
            Err(CalendarError::NoHeaderFound)
        );

        let no_dates = grid(vec![vec!["", "", "Jan", "Feb"], vec!["", "", "x", "y"]]);
        assert_eq!(
            AutoDetectResolver::new(today).resolve(&no_dates),
            Err(CalendarError::NoDatesFound)
        );
    }

    #[test]
    fn test_auto_detect_skips_impossible_dates() {
        let today = parser(ymd(2025, 2, 10));

        let labelled = grid(vec![
            vec!["", "", "Февраль"],
            vec!["", "", "27", "28", "29", "30", "1", "2"],
        ]);
        let header = AutoDetectResolver::new(today).resolve(&labelled).unwrap();
        let expected: DateColumnIndex = [
            (ymd(2025, 2, 27), 2),
            (ymd(2025, 2, 28), 3),
            (ymd(2025, 2, 1), 6),
            (ymd(2025, 2, 2), 7),
        ]
        .into();
        assert_eq!(header.date_index, expected);

        // A skipped 31 must not count as the last day seen, so 1 is no rollover.
        let unlabelled = grid(vec![
            vec!["Title"],
            vec!["", "", "26", "27", "31", "1", "2"],
        ]);
        let header = AutoDetectResolver::new(today).resolve(&unlabelled).unwrap();
        let expected: DateColumnIndex = [
            (ymd(2025, 2, 26), 2),
            (ymd(2025, 2, 27), 3),
            (ymd(2025, 2, 1), 5),
            (ymd(2025, 2, 2), 6),
        ]
        .into();
        assert_eq!(header.date_index, expected);
    }

    #[test]
    fn test_month_lookback_bounds() {
        let mut row = vec![""; 111];
        row[1] = "Март";
        row[10] = "Май";
        let g = grid(vec![row]);

        // Column 1 is never a month label source.
        assert_eq!(month_for_column(&g, Some(0), 5), None);
        assert_eq!(month_for_column(&g, Some(0), 11), Some(5));
        // Lookback reaches back to col - 99.
        assert_eq!(month_for_column(&g, Some(0), 109), Some(5));
        assert_eq!(month_for_column(&g, Some(0), 110), None);
        assert_eq!(month_for_column(&g, Some(0), 10), Some(5));
        assert_eq!(month_for_column(&g, None, 10), None);
    }

    #[test]
    fn test_auto_detect_caps_header_columns() {
        let mut days = vec!["", ""];
        days.extend(std::iter::repeat("5").take(598));
        let g = grid(vec![days]);

        let header = AutoDetectResolver::new(parser(ymd(2025, 3, 1)))
            .resolve(&g)
            .unwrap();
        // Every column is the 5th; the last one kept is the cap's last column.
        assert_eq!(header.date_index.len(), 1);
        assert_eq!(header.date_index[&ymd(2025, 3, 5)], MAX_HEADER_COLS - 1);
    }

    #[test]
    fn test_month_row_on_last_row_falls_back_to_day_row() {
        let g = grid(vec![
            vec!["", "", "1", "2", "3", "4", "5"],
            vec!["", "", "Январь", "Февраль"],
        ]);
        assert_eq!(AutoDetectResolver::rows_from_month_row(&g), None);
        assert_eq!(
            AutoDetectResolver::locate_rows(&g),
            Some(HeaderRows {
                month_row: None,
                day_row: 0
            })
        );

        let header = AutoDetectResolver::new(parser(ymd(2025, 3, 10)))
            .resolve(&g)
            .unwrap();
        assert_eq!(header.header_row, 0);
        assert_eq!(header.date_index.len(), 5);
        assert_eq!(header.date_index[&ymd(2025, 3, 1)], 2);
    }

    #[test]
    fn test_resolver_selection() {
        let p = parser(ymd(2025, 1, 1));
        assert_eq!(resolver_for(Some("C7"), None, p).name(), "sequential");
        assert_eq!(resolver_for(Some("  "), None, p).name(), "auto-detect");
        assert_eq!(resolver_for(None, Some("01.01.2025"), p).name(), "auto-detect");
    }
}
