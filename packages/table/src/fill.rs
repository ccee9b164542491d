//! Selection snapshots and batch fill.
//!
//! The fill flow hands a snapshot of selected cells to an external
//! generator and applies the suggestions it returns in one transaction,
//! so collaborators either see the whole fill or none of it. Suggestions
//! address cells by the coordinates of the snapshot; a coordinate that no
//! longer resolves (the row or column was deleted meanwhile) is skipped
//! rather than failing the batch.

use serde::{Deserialize, Serialize};
use tracing::debug;
use yrs::{Map, Transact};

use crate::document::TableDocument;
use crate::read;
use crate::value::CellValue;

/// A (row, column) position in the current display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellCoord {
    pub row_index: u32,
    pub col_index: u32,
}

impl CellCoord {
    pub fn new(row_index: u32, col_index: u32) -> Self {
        Self {
            row_index,
            col_index,
        }
    }
}

/// A selected cell as handed to the generator: its position, the header
/// it sits under, and its current value rendered as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSnapshot {
    pub row_index: u32,
    pub col_index: u32,
    pub header: String,
    pub value: String,
}

/// A generated value for one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSuggestion {
    pub row_index: u32,
    pub col_index: u32,
    pub suggestion: String,
}

impl TableDocument {
    /// Capture the named coordinates for a generator request. Coordinates
    /// that do not resolve are dropped from the snapshot.
    pub fn snapshot_at(&self, coords: &[CellCoord]) -> Vec<CellSnapshot> {
        let txn = self.doc.transact();
        let columns = self.columns(&txn);
        coords
            .iter()
            .filter_map(|coord| {
                let (col_id, header) = columns.get(coord.col_index as usize)?;
                let row_id = read::string_at(&txn, &self.row_order, coord.row_index)?;
                let value = read::nested_map(&txn, &self.row_data, &row_id)
                    .and_then(|m| m.get(&txn, col_id.as_str()))
                    .map(|out| CellValue::from_out(&out))
                    .unwrap_or(CellValue::Empty);
                Some(CellSnapshot {
                    row_index: coord.row_index,
                    col_index: coord.col_index,
                    header: header.clone(),
                    value: value.render(),
                })
            })
            .collect()
    }

    /// Apply generated values in a single transaction. Unresolvable
    /// coordinates are skipped. Returns the number of cells written;
    /// subscribers are notified once, not per cell.
    pub fn apply_suggestions(&mut self, suggestions: &[CellSuggestion]) -> usize {
        let written: Vec<(u32, u32, CellValue)> = suggestions
            .iter()
            .map(|s| {
                (
                    s.row_index,
                    s.col_index,
                    CellValue::from(s.suggestion.as_str()),
                )
            })
            .collect();
        self.update_cells(&written)
    }

    /// Write a batch of coordinate-addressed values atomically. Returns
    /// the number of cells actually written.
    pub fn update_cells(&mut self, cells: &[(u32, u32, CellValue)]) -> usize {
        if cells.is_empty() {
            debug!("update_cells: empty batch ignored");
            return 0;
        }
        let written = {
            let mut txn = self.doc.transact_mut();
            let columns = self.columns(&txn);
            let mut written = 0;
            for (row_index, col_index, value) in cells {
                let Some((col_id, _)) = columns.get(*col_index as usize) else {
                    debug!(col_index, "update_cells: column out of range, skipped");
                    continue;
                };
                if self.write_cell(&mut txn, *row_index, col_id, value) {
                    written += 1;
                } else {
                    debug!(row_index, "update_cells: row out of range, skipped");
                }
            }
            written
        };
        if written > 0 {
            self.committed();
        }
        written
    }

    /// Fill targets for a whole-row fill anchored at `anchor`: every cell
    /// in the anchor's row except the anchor itself.
    pub fn row_fill_targets(&self, anchor: CellCoord) -> Vec<CellCoord> {
        let cols = self.column_count();
        if anchor.row_index >= self.row_count() || anchor.col_index >= cols {
            return Vec::new();
        }
        (0..cols)
            .filter(|c| *c != anchor.col_index)
            .map(|c| CellCoord::new(anchor.row_index, c))
            .collect()
    }

    /// Fill targets for a whole-column fill anchored at `anchor`: every
    /// cell in the anchor's column except the anchor itself.
    pub fn column_fill_targets(&self, anchor: CellCoord) -> Vec<CellCoord> {
        let rows = self.row_count();
        if anchor.row_index >= rows || anchor.col_index >= self.column_count() {
            return Vec::new();
        }
        (0..rows)
            .filter(|r| *r != anchor.row_index)
            .map(|r| CellCoord::new(r, anchor.col_index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;
    use crate::document::ColumnSpec;
    use std::collections::HashMap;

    fn doc() -> TableDocument {
        let mut doc = TableDocument::new(TableConfig::default());
        doc.insert_columns(0, &[ColumnSpec::new("Name"), ColumnSpec::new("Role")]);
        doc.insert_rows(
            0,
            &[
                [("Name".to_string(), CellValue::from("Ada"))]
                    .into_iter()
                    .collect(),
                HashMap::new(),
            ],
        );
        doc
    }

    #[test]
    fn test_snapshot_carries_headers_and_rendered_values() {
        let doc = doc();
        let snaps = doc.snapshot_at(&[CellCoord::new(0, 0), CellCoord::new(0, 1)]);
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].header, "Name");
        assert_eq!(snaps[0].value, "Ada");
        assert_eq!(snaps[1].header, "Role");
        assert_eq!(snaps[1].value, "");
    }

    #[test]
    fn test_snapshot_drops_unresolvable_coords() {
        let doc = doc();
        let snaps = doc.snapshot_at(&[CellCoord::new(9, 0), CellCoord::new(0, 9)]);
        assert!(snaps.is_empty());
    }

    #[test]
    fn test_suggestions_apply_in_one_notification() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let mut doc = doc();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        doc.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let written = doc.apply_suggestions(&[
            CellSuggestion {
                row_index: 0,
                col_index: 1,
                suggestion: "Mathematician".to_string(),
            },
            CellSuggestion {
                row_index: 1,
                col_index: 0,
                suggestion: "Grace".to_string(),
            },
        ]);

        assert_eq!(written, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(doc.cell(0, "Role"), Some(CellValue::from("Mathematician")));
        assert_eq!(doc.cell(1, "Name"), Some(CellValue::from("Grace")));
    }

    #[test]
    fn test_stale_suggestions_are_skipped() {
        let mut doc = doc();
        let written = doc.apply_suggestions(&[
            CellSuggestion {
                row_index: 7,
                col_index: 0,
                suggestion: "lost".to_string(),
            },
            CellSuggestion {
                row_index: 0,
                col_index: 1,
                suggestion: "kept".to_string(),
            },
        ]);
        assert_eq!(written, 1);
        assert_eq!(doc.cell(0, "Role"), Some(CellValue::from("kept")));
    }

    #[test]
    fn test_fill_targets_exclude_anchor() {
        let doc = doc();
        let row_targets = doc.row_fill_targets(CellCoord::new(0, 0));
        assert_eq!(row_targets, vec![CellCoord::new(0, 1)]);

        let col_targets = doc.column_fill_targets(CellCoord::new(0, 1));
        assert_eq!(col_targets, vec![CellCoord::new(1, 1)]);

        assert!(doc.row_fill_targets(CellCoord::new(9, 0)).is_empty());
    }
}
