//! Bilingual (Russian/English) month and weekday vocabulary, plus the single
//! cell classifier both header strategies consume.

use std::sync::LazyLock;

use regex::Regex;

const MONTHS_RU: &[(&str, u32)] = &[
    ("январь", 1),
    ("янв", 1),
    ("января", 1),
    ("февраль", 2),
    ("фев", 2),
    ("февраля", 2),
    ("март", 3),
    ("мар", 3),
    ("марта", 3),
    ("апрель", 4),
    ("апр", 4),
    ("апреля", 4),
    ("май", 5),
    ("мая", 5),
    ("июнь", 6),
    ("июн", 6),
    ("июня", 6),
    ("июль", 7),
    ("июл", 7),
    ("июля", 7),
    ("август", 8),
    ("авг", 8),
    ("августа", 8),
    ("сентябрь", 9),
    ("сен", 9),
    ("сент", 9),
    ("сентября", 9),
    ("октябрь", 10),
    ("окт", 10),
    ("октября", 10),
    ("ноябрь", 11),
    ("ноя", 11),
    ("ноября", 11),
    ("декабрь", 12),
    ("дек", 12),
    ("декабря", 12),
];

const MONTHS_EN: &[(&str, u32)] = &[
    ("january", 1),
    ("jan", 1),
    ("february", 2),
    ("feb", 2),
    ("march", 3),
    ("mar", 3),
    ("april", 4),
    ("apr", 4),
    ("may", 5),
    ("june", 6),
    ("jun", 6),
    ("july", 7),
    ("jul", 7),
    ("august", 8),
    ("aug", 8),
    ("september", 9),
    ("sep", 9),
    ("sept", 9),
    ("october", 10),
    ("oct", 10),
    ("november", 11),
    ("nov", 11),
    ("december", 12),
    ("dec", 12),
];

const WEEKDAYS: &[&str] = &[
    "пн", "вт", "ср", "чт", "пт", "сб", "вс", "mon", "tue", "wed", "thu", "fri", "sat", "sun",
];

static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Month number (1-12) for a whole-cell month name or abbreviation.
pub fn month_from_name(text: &str) -> Option<u32> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    MONTHS_RU
        .iter()
        .chain(MONTHS_EN)
        .find(|(name, _)| *name == needle)
        .map(|&(_, month)| month)
}

/// True for weekday labels like "пн" or "Sat" that sit in date header rows.
pub fn is_weekday_abbrev(text: &str) -> bool {
    let needle = text.trim().to_lowercase();
    WEEKDAYS.contains(&needle.as_str())
}

/// First run of ASCII digits in `text`, if it fits in a `u32`.
pub fn first_number(text: &str) -> Option<u32> {
    DIGITS_RE
        .find(text)
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// What a header cell holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Empty,
    WeekdayLabel,
    DayNumber(u32),
    MonthName(u32),
    Other,
}

impl CellKind {
    pub fn day(self) -> Option<u32> {
        match self {
            CellKind::DayNumber(day) => Some(day),
            _ => None,
        }
    }

    pub fn month(self) -> Option<u32> {
        match self {
            CellKind::MonthName(month) => Some(month),
            _ => None,
        }
    }
}

/// Classify a raw cell. A day number is the first digit run when it falls in
/// 1..=31; larger or zero values classify as `Other`.
pub fn classify(text: &str) -> CellKind {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return CellKind::Empty;
    }
    if is_weekday_abbrev(trimmed) {
        return CellKind::WeekdayLabel;
    }
    if let Some(month) = month_from_name(trimmed) {
        return CellKind::MonthName(month);
    }
    match first_number(trimmed) {
        Some(day @ 1..=31) => CellKind::DayNumber(day),
        _ => CellKind::Other,
    }
}
