//! Raw cell grid as handed over by a grid source.

use crate::merges::MergeRectangle;

/// Ragged rows of cell text. Anything past the end of a row reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_len(&self, row: usize) -> usize {
        self.rows.get(row).map_or(0, |r| r.len())
    }

    /// Raw (untrimmed) cell text, `""` when out of bounds.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map_or("", |s| s.as_str())
    }
}

impl<S: Into<String>> FromIterator<Vec<S>> for Grid {
    fn from_iter<I: IntoIterator<Item = Vec<S>>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        )
    }
}

/// One fetched sheet: its cells plus merge geometry.
#[derive(Debug, Clone, Default)]
pub struct SheetGrid {
    pub title: String,
    pub grid: Grid,
    pub merges: Vec<MergeRectangle>,
}
