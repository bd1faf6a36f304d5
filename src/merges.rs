//! Merged-cell canonicalization.
//!
//! Every cell covered by a merge reads its text from the merge's top-left
//! anchor. The map is built once per load and never patched afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Half-open, zero-based merge rectangle as reported by the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRectangle {
    pub start_row: usize,
    pub end_row: usize,
    pub start_col: usize,
    pub end_col: usize,
}

impl MergeRectangle {
    pub fn new(start_row: usize, end_row: usize, start_col: usize, end_col: usize) -> Self {
        Self {
            start_row,
            end_row,
            start_col,
            end_col,
        }
    }

    pub fn anchor(&self) -> (usize, usize) {
        (self.start_row, self.start_col)
    }
}

/// `(row, col) -> (anchor_row, anchor_col)`; cells not present map to themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorMap {
    anchors: HashMap<(usize, usize), (usize, usize)>,
}

impl AnchorMap {
    /// Build from a full merge list. Overlapping rectangles are last-write-wins.
    pub fn build(merges: &[MergeRectangle]) -> Self {
        let mut anchors = HashMap::new();
        for merge in merges {
            for row in merge.start_row..merge.end_row {
                for col in merge.start_col..merge.end_col {
                    anchors.insert((row, col), merge.anchor());
                }
            }
        }
        tracing::debug!(
            "Anchor map: {} merges covering {} cells",
            merges.len(),
            anchors.len()
        );
        Self { anchors }
    }

    pub fn resolve(&self, row: usize, col: usize) -> (usize, usize) {
        self.anchors.get(&(row, col)).copied().unwrap_or((row, col))
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}
