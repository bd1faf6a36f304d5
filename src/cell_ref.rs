//! A1-style cell references ("C7", "AA10") to zero-based (row, col) and back.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CalendarError, Result};

static A1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?<letters>[A-Z]+)(?<numbers>[0-9]+)$").unwrap());

/// Decode a reference such as `"C7"` into `(row, col)`, both zero-based.
///
/// Input is upper-cased first, so `"c7"` is accepted too. Column letters are
/// bijective base-26 (`A` = 1 per digit); the row number is 1-based.
pub fn reference_to_indices(reference: &str) -> Result<(usize, usize)> {
    let normalized = reference.trim().to_uppercase();
    let invalid = || CalendarError::InvalidReference(reference.to_string());

    let caps = A1_RE.captures(&normalized).ok_or_else(invalid)?;

    let mut col_acc = 0usize;
    for c in caps["letters"].bytes() {
        let digit = (c - b'A') as usize + 1;
        col_acc = col_acc
            .checked_mul(26)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(invalid)?;
    }
    let col = col_acc - 1;

    let row = caps["numbers"]
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .ok_or_else(invalid)?;

    Ok((row, col))
}

/// Convert a zero-based column index to its letter form (0 -> A, 26 -> AA).
pub fn index_to_column_letter(col: usize) -> String {
    let mut letters = Vec::new();
    let mut n = col as u128 + 1;
    while n > 0 {
        n -= 1;
        letters.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

/// Format zero-based indices back into A1 notation.
pub fn indices_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", index_to_column_letter(col), row + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_to_indices() {
        assert_eq!(reference_to_indices("A1").unwrap(), (0, 0));
        assert_eq!(reference_to_indices("C7").unwrap(), (6, 2));
        assert_eq!(reference_to_indices("Z1").unwrap(), (0, 25));
        assert_eq!(reference_to_indices("AA10").unwrap(), (9, 26));
        assert_eq!(reference_to_indices("c7").unwrap(), (6, 2));
    }

    #[test]
    fn test_invalid_references() {
        for bad in ["", "7C", "C", "7", "C0", "C-1", "C 7", "Ж5"] {
            assert!(
                matches!(reference_to_indices(bad), Err(CalendarError::InvalidReference(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(index_to_column_letter(0), "A");
        assert_eq!(index_to_column_letter(25), "Z");
        assert_eq!(index_to_column_letter(26), "AA");
        assert_eq!(index_to_column_letter(701), "ZZ");
        assert_eq!(index_to_column_letter(702), "AAA");
        assert_eq!(indices_to_reference(6, 2), "C7");
    }

    #[test]
    fn test_round_trip() {
        for col in (0..2000).step_by(7) {
            for row in [0usize, 1, 41, 999] {
                let reference = format!("{}{}", index_to_column_letter(col), row + 1);
                assert_eq!(reference_to_indices(&reference).unwrap(), (row, col));
            }
        }
    }
}
