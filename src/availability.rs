//! Room availability queries over a loaded [`CalendarState`].
//!
//! A room/date cell is occupied when its merge-anchor text is non-empty after
//! trimming. Requested dates missing from the header are gaps: they are left
//! out of the check rather than failing the query.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::calendar::CalendarState;
use crate::error::{CalendarError, Result};

/// Category filter value meaning "every category".
const ALL_CATEGORIES: &str = "ALL";

/// Legend/header labels that can sit in the category or room column.
const LEGEND_KEYWORDS: &[&str] = &["legend", "легенда", "категория", "category"];
const CATEGORY_LABELS: &[&str] = &["категория", "category"];
const ROOM_LABELS: &[&str] = &["№ комнаты", "room", "room number", "room #"];

/// A bookable room with its category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomAvailability {
    pub category: String,
    pub room: String,
}

pub fn is_occupied(text: &str) -> bool {
    !text.trim().is_empty()
}

/// Legend rows and the "Category | Room" header line are not rooms.
fn is_label_row(category: &str, room: &str) -> bool {
    let category = category.to_lowercase();
    let room = room.to_lowercase();
    LEGEND_KEYWORDS.contains(&room.as_str())
        || matches!(category.as_str(), "legend" | "легенда")
        || (CATEGORY_LABELS.contains(&category.as_str()) && ROOM_LABELS.contains(&room.as_str()))
}

/// `None` when the filter is empty or "ALL" (any case).
fn normalize_filter(filter: &str) -> Option<String> {
    let filter = filter.trim();
    if filter.is_empty() || filter.eq_ignore_ascii_case(ALL_CATEGORIES) {
        None
    } else {
        Some(filter.to_lowercase())
    }
}

impl CalendarState {
    /// Column for `target`: the exact date, or else the same month/day from the
    /// year closest to the target. Ties go to the first candidate in date order.
    pub fn resolve_date(&self, target: NaiveDate) -> Option<usize> {
        if let Some(&col) = self.date_index.get(&target) {
            return Some(col);
        }

        let mut best: Option<(i32, usize)> = None;
        for (date, &col) in &self.date_index {
            if date.month() != target.month() || date.day() != target.day() {
                continue;
            }
            let distance = (date.year() - target.year()).abs();
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, col));
            }
        }
        best.map(|(_, col)| col)
    }

    /// Trimmed text at the merge anchor of `(row, col)`, `""` if out of bounds.
    pub fn get_cell_text(&self, row: usize, col: usize) -> &str {
        let (anchor_row, anchor_col) = self.anchors.resolve(row, col);
        self.grid.cell(anchor_row, anchor_col).trim()
    }

    /// Room rows `(row index, category, room)` from the data start onwards.
    fn room_rows(&self) -> impl Iterator<Item = (usize, &str, &str)> + '_ {
        (self.data_start_row()..self.grid.len()).filter_map(move |row| {
            let category = self.grid.cell(row, 0).trim();
            let room = self.grid.cell(row, 1).trim();
            if category.is_empty() || room.is_empty() || is_label_row(category, room) {
                return None;
            }
            Some((row, category, room))
        })
    }

    /// Rooms free on every resolvable day of `check_in..=check_out`, in sheet
    /// order. `category_filter` of `""` or `"ALL"` disables filtering.
    pub fn list_available_rooms(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
        category_filter: &str,
    ) -> Result<Vec<RoomAvailability>> {
        if check_out < check_in {
            return Err(CalendarError::InvalidRange {
                check_in,
                check_out,
            });
        }

        let mut columns = Vec::new();
        let mut missing = Vec::new();
        for day in check_in.iter_days().take_while(|d| *d <= check_out) {
            match self.resolve_date(day) {
                Some(col) => columns.push((day, col)),
                None => missing.push(day),
            }
        }

        if !missing.is_empty() {
            warn!(
                "Some dates not found in calendar: {:?}{}",
                &missing[..missing.len().min(5)],
                if missing.len() > 5 { "..." } else { "" }
            );
        }
        if columns.is_empty() {
            warn!("No dates from requested range found in calendar");
            return Ok(Vec::new());
        }

        let filter = normalize_filter(category_filter);
        let mut available = Vec::new();
        let mut checked = 0usize;

        for (row, category, room) in self.room_rows() {
            if let Some(ref wanted) = filter {
                if category.to_lowercase() != *wanted {
                    continue;
                }
            }
            checked += 1;

            let occupied_on = columns
                .iter()
                .find(|&&(_, col)| is_occupied(self.get_cell_text(row, col)));

            match occupied_on {
                Some((day, col)) => debug!(
                    "Room {} ({}) occupied on {} (row {}, col {}): '{}'",
                    room,
                    category,
                    day,
                    row,
                    col,
                    self.get_cell_text(row, *col).chars().take(50).collect::<String>()
                ),
                None => available.push(RoomAvailability {
                    category: category.to_string(),
                    room: room.to_string(),
                }),
            }
        }

        info!(
            "Found {} available rooms out of {} checked ({} of {} dates in calendar)",
            available.len(),
            checked,
            columns.len(),
            columns.len() + missing.len()
        );
        Ok(available)
    }

    /// Whether `room_number` (case-insensitive) is free on `date`. Unknown
    /// dates and unknown rooms both answer `false`.
    pub fn check_room(&self, room_number: &str, date: NaiveDate) -> bool {
        let Some(col) = self.resolve_date(date) else {
            debug!("Date {} not found in calendar", date);
            return false;
        };

        let wanted = room_number.trim().to_lowercase();
        (self.data_start_row()..self.grid.len())
            .find(|&row| self.grid.cell(row, 1).trim().to_lowercase() == wanted)
            .map(|row| !is_occupied(self.get_cell_text(row, col)))
            .unwrap_or(false)
    }

    /// Categories with at least one room free over the whole range, sorted.
    pub fn available_categories(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<String>> {
        let categories: BTreeSet<String> = self
            .list_available_rooms(check_in, check_out, "")?
            .into_iter()
            .map(|r| r.category)
            .collect();
        Ok(categories.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::merges::MergeRectangle;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn load(rows: Vec<Vec<&str>>, merges: &[MergeRectangle]) -> CalendarState {
        let grid: Grid = rows.into_iter().collect();
        CalendarState::load_at(grid, merges, Some("C1"), None, ymd(2026, 1, 1)).unwrap()
    }

    /// Header maps Aug 1-5 2024 to columns 2-6.
    fn august() -> CalendarState {
        load(
            vec![
                vec!["Категория", "№ комнаты", "01.08.2024", "02.08", "03.08", "04.08", "05.08"],
                vec!["Deluxe", "A-101", "", "", "Guest", "", ""],
                vec!["Deluxe Suite", "A-201", "", "", "", "", ""],
                vec!["Standard", "B-101", "x", "", "", "", ""],
                vec!["", "", "", "", "", "", ""],
                vec!["Legend", "Occupied", "X"],
                vec!["deluxe", "A-102"],
            ],
            &[],
        )
    }

    fn rooms(list: &[RoomAvailability]) -> Vec<&str> {
        list.iter().map(|r| r.room.as_str()).collect()
    }

    #[test]
    fn test_end_to_end_availability() {
        let cal = august();

        let short = cal
            .list_available_rooms(ymd(2024, 8, 1), ymd(2024, 8, 2), "")
            .unwrap();
        assert_eq!(rooms(&short), vec!["A-101", "A-201", "A-102"]);

        let full = cal
            .list_available_rooms(ymd(2024, 8, 1), ymd(2024, 8, 5), "")
            .unwrap();
        assert_eq!(rooms(&full), vec!["A-201", "A-102"]);
    }

    #[test]
    fn test_listing_is_idempotent() {
        let cal = august();
        let first = cal
            .list_available_rooms(ymd(2024, 8, 1), ymd(2024, 8, 5), "ALL")
            .unwrap();
        let second = cal
            .list_available_rooms(ymd(2024, 8, 1), ymd(2024, 8, 5), "ALL")
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_category_filter() {
        let cal = august();
        let range = (ymd(2024, 8, 1), ymd(2024, 8, 2));

        let all = cal.list_available_rooms(range.0, range.1, "ALL").unwrap();
        let all_lower = cal.list_available_rooms(range.0, range.1, "all").unwrap();
        let empty = cal.list_available_rooms(range.0, range.1, "").unwrap();
        assert_eq!(all, empty);
        assert_eq!(all_lower, empty);

        let deluxe = cal.list_available_rooms(range.0, range.1, "deluxe").unwrap();
        assert_eq!(rooms(&deluxe), vec!["A-101", "A-102"]);
        assert!(deluxe.iter().all(|r| r.category != "Deluxe Suite"));

        let standard = cal.list_available_rooms(range.0, range.1, "Standard").unwrap();
        assert!(standard.is_empty());
    }

    #[test]
    fn test_invalid_range() {
        let cal = august();
        assert!(matches!(
            cal.list_available_rooms(ymd(2024, 8, 3), ymd(2024, 8, 1), ""),
            Err(CalendarError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_gaps_are_skipped() {
        let cal = august();
        // Aug 4-10: only Aug 4-5 exist in the header.
        let partial = cal
            .list_available_rooms(ymd(2024, 8, 4), ymd(2024, 8, 10), "")
            .unwrap();
        assert_eq!(rooms(&partial), vec!["A-101", "A-201", "B-101", "A-102"]);

        let none = cal
            .list_available_rooms(ymd(2024, 9, 1), ymd(2024, 9, 3), "")
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_year_agnostic_fallback() {
        let mut cal = august();
        cal.date_index = [(ymd(2024, 8, 1), 5)].into();
        assert_eq!(cal.resolve_date(ymd(2024, 8, 1)), Some(5));
        assert_eq!(cal.resolve_date(ymd(2025, 8, 1)), Some(5));
        assert_eq!(cal.resolve_date(ymd(2025, 8, 2)), None);
    }

    #[test]
    fn test_closest_year_wins() {
        let mut cal = august();
        cal.date_index = [
            (ymd(2022, 8, 1), 2),
            (ymd(2024, 8, 1), 3),
            (ymd(2028, 8, 1), 4),
        ]
        .into();
        assert_eq!(cal.resolve_date(ymd(2025, 8, 1)), Some(3));
        assert_eq!(cal.resolve_date(ymd(2027, 8, 1)), Some(4));
        assert_eq!(cal.resolve_date(ymd(2028, 8, 1)), Some(4));
        // 2026 is two years from both 2024 and 2028; the earlier one is seen first.
        assert_eq!(cal.resolve_date(ymd(2026, 8, 1)), Some(3));
    }

    #[test]
    fn test_merged_cells_read_anchor_text() {
        let mut rows: Vec<Vec<&str>> = vec![vec!["", "", "01.08.2024", "02.08.2024", "03.08.2024"]];
        rows.extend(std::iter::repeat(vec![]).take(4));
        rows.push(vec!["Deluxe", "A-101", "", "Smith", ""]);
        rows.push(vec!["Deluxe", "A-102"]);
        rows.push(vec!["Deluxe", "A-103"]);
        let cal = load(rows, &[MergeRectangle::new(5, 8, 3, 5)]);

        assert_eq!(cal.get_cell_text(5, 3), "Smith");
        assert_eq!(cal.get_cell_text(6, 3), "Smith");
        assert_eq!(cal.get_cell_text(6, 4), "Smith");
        assert_eq!(cal.get_cell_text(7, 3), "Smith");
        assert_eq!(cal.get_cell_text(6, 2), "");
        assert_eq!(cal.get_cell_text(40, 40), "");

        assert!(!cal.check_room("A-102", ymd(2024, 8, 2)));
        assert!(cal.check_room("A-102", ymd(2024, 8, 1)));
        let free = cal
            .list_available_rooms(ymd(2024, 8, 3), ymd(2024, 8, 3), "")
            .unwrap();
        assert!(free.is_empty());
    }

    #[test]
    fn test_check_room() {
        let cal = august();
        assert!(cal.check_room("a-101", ymd(2024, 8, 1)));
        assert!(!cal.check_room("a-101", ymd(2024, 8, 3)));
        assert!(cal.check_room("A-101", ymd(2025, 8, 1)));
        assert!(!cal.check_room("A-101", ymd(2024, 9, 1)));
        assert!(!cal.check_room("Z-999", ymd(2024, 8, 1)));
    }

    #[test]
    fn test_available_categories_sorted_and_distinct() {
        let cal = august();
        let categories = cal
            .available_categories(ymd(2024, 8, 1), ymd(2024, 8, 2))
            .unwrap();
        assert_eq!(categories, vec!["Deluxe", "Deluxe Suite", "deluxe"]);

        let later = cal
            .available_categories(ymd(2024, 8, 2), ymd(2024, 8, 5))
            .unwrap();
        assert_eq!(later, vec!["Deluxe Suite", "Standard", "deluxe"]);
    }

    #[test]
    fn test_label_rows() {
        assert!(is_label_row("Категория", "№ комнаты"));
        assert!(is_label_row("Category", "Room Number"));
        assert!(is_label_row("Legend", "Occupied"));
        assert!(is_label_row("Deluxe", "Legend"));
        assert!(!is_label_row("Category", "A-101"));
        assert!(!is_label_row("Deluxe", "A-101"));
    }
}
