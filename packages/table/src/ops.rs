//! Serializable structural operations.
//!
//! `TableOp` is the wire form of every table mutation: front ends submit
//! ops, the undo stack records them, and `inverse` derives the op that
//! puts the document back. Inverses are computed against the document
//! state *before* the op is applied.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use yrs::Transact;

use crate::document::{ColumnSpec, TableDocument};
use crate::fill::CellSuggestion;
use crate::value::CellValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TableOp {
    InsertRows {
        at: u32,
        rows: Vec<HashMap<String, CellValue>>,
    },
    DeleteRows {
        indices: Vec<u32>,
    },
    /// Re-insert previously captured rows at their old indices.
    RestoreRows {
        entries: Vec<(u32, HashMap<String, CellValue>)>,
    },
    InsertColumns {
        at: u32,
        columns: Vec<ColumnSpec>,
    },
    DeleteColumns {
        indices: Vec<u32>,
    },
    /// Re-insert previously captured columns at their old indices.
    RestoreColumns {
        entries: Vec<(u32, ColumnSpec)>,
    },
    EditHeader {
        index: u32,
        name: String,
    },
    SetColumnWidth {
        name: String,
        width: f64,
    },
    ReorderColumn {
        from: u32,
        to: u32,
    },
    ReorderRow {
        from: u32,
        to: u32,
    },
    UpdateCell {
        row_index: u32,
        column: String,
        value: CellValue,
    },
    /// Write previously captured cell values back, column addressed by id.
    RestoreCells {
        entries: Vec<(u32, String, CellValue)>,
    },
    ApplyFill {
        suggestions: Vec<CellSuggestion>,
    },
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OpOutcome {
    Applied { count: usize },
    Noop { reason: String },
}

impl OpOutcome {
    fn applied(count: usize) -> Self {
        OpOutcome::Applied { count }
    }

    fn noop(reason: &str) -> Self {
        OpOutcome::Noop {
            reason: reason.to_string(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, OpOutcome::Applied { .. })
    }
}

fn counted(count: usize, reason: &str) -> OpOutcome {
    if count > 0 {
        OpOutcome::applied(count)
    } else {
        OpOutcome::noop(reason)
    }
}

impl TableOp {
    /// The op that reverts this one, derived from current document state.
    /// `None` means the op will not change anything, so there is nothing
    /// to revert.
    pub fn inverse(&self, doc: &TableDocument) -> Option<TableOp> {
        match self {
            TableOp::InsertRows { at, rows } => {
                if rows.is_empty() {
                    return None;
                }
                let at = (*at).min(doc.row_count());
                Some(TableOp::DeleteRows {
                    indices: (at..at + rows.len() as u32).collect(),
                })
            }
            TableOp::DeleteRows { indices } => {
                let entries = ordered_valid(indices, doc.row_count())
                    .into_iter()
                    .filter_map(|i| Some((i, doc.row_record(i)?)))
                    .collect::<Vec<_>>();
                if entries.is_empty() {
                    return None;
                }
                Some(TableOp::RestoreRows { entries })
            }
            TableOp::RestoreRows { entries } => {
                if entries.is_empty() {
                    return None;
                }
                Some(TableOp::DeleteRows {
                    indices: restored_positions(entries.iter().map(|(i, _)| *i), doc.row_count()),
                })
            }
            TableOp::InsertColumns { at, columns } => {
                if columns.is_empty() {
                    return None;
                }
                let at = (*at).min(doc.column_count());
                Some(TableOp::DeleteColumns {
                    indices: (at..at + columns.len() as u32).collect(),
                })
            }
            TableOp::DeleteColumns { indices } => {
                let entries = ordered_valid(indices, doc.column_count())
                    .into_iter()
                    .filter_map(|i| Some((i, doc.column_spec_at(i)?)))
                    .collect::<Vec<_>>();
                if entries.is_empty() {
                    return None;
                }
                Some(TableOp::RestoreColumns { entries })
            }
            TableOp::RestoreColumns { entries } => {
                if entries.is_empty() {
                    return None;
                }
                Some(TableOp::DeleteColumns {
                    indices: restored_positions(
                        entries.iter().map(|(i, _)| *i),
                        doc.column_count(),
                    ),
                })
            }
            TableOp::EditHeader { index, name: _ } => {
                let old = doc.header_at(*index)?;
                Some(TableOp::EditHeader {
                    index: *index,
                    name: old,
                })
            }
            TableOp::SetColumnWidth { name, width: _ } => {
                let old = doc.column_width_by_name(name)?;
                Some(TableOp::SetColumnWidth {
                    name: name.clone(),
                    width: old,
                })
            }
            TableOp::ReorderColumn { from, to } => {
                let len = doc.column_count();
                if from == to || *from >= len || *to >= len {
                    return None;
                }
                Some(TableOp::ReorderColumn {
                    from: *to,
                    to: *from,
                })
            }
            TableOp::ReorderRow { from, to } => {
                let len = doc.row_count();
                if from == to || *from >= len || *to >= len {
                    return None;
                }
                Some(TableOp::ReorderRow {
                    from: *to,
                    to: *from,
                })
            }
            TableOp::UpdateCell {
                row_index,
                column,
                value: _,
            } => {
                let txn = doc.doc.transact();
                let col_id = doc.resolve_column_key(&txn, column)?;
                drop(txn);
                let old = doc.cell(*row_index, &col_id)?;
                Some(TableOp::RestoreCells {
                    entries: vec![(*row_index, col_id, old)],
                })
            }
            TableOp::RestoreCells { entries } => {
                let old: Vec<(u32, String, CellValue)> = entries
                    .iter()
                    .filter_map(|(row, col_id, _)| {
                        Some((*row, col_id.clone(), doc.cell(*row, col_id)?))
                    })
                    .collect();
                if old.is_empty() {
                    return None;
                }
                Some(TableOp::RestoreCells { entries: old })
            }
            TableOp::ApplyFill { suggestions } => {
                let txn = doc.doc.transact();
                let columns = doc.columns(&txn);
                drop(txn);
                let old: Vec<(u32, String, CellValue)> = suggestions
                    .iter()
                    .filter_map(|s| {
                        let (col_id, _) = columns.get(s.col_index as usize)?;
                        Some((s.row_index, col_id.clone(), doc.cell(s.row_index, col_id)?))
                    })
                    .collect();
                if old.is_empty() {
                    return None;
                }
                Some(TableOp::RestoreCells { entries: old })
            }
        }
    }
}

/// Ascending, deduplicated indices below `len`.
fn ordered_valid(indices: &[u32], len: u32) -> Vec<u32> {
    let mut out: Vec<u32> = indices.iter().copied().filter(|i| *i < len).collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Positions a batch of restores will land at, replaying the clamping the
/// inserts themselves perform.
fn restored_positions(indices: impl Iterator<Item = u32>, mut len: u32) -> Vec<u32> {
    let mut out = Vec::new();
    for index in indices {
        let pos = index.min(len);
        out.push(pos);
        len += 1;
    }
    out
}

impl TableDocument {
    /// Apply a structural operation. Invalid targets degrade to no-ops,
    /// mirroring the direct methods.
    pub fn apply(&mut self, op: &TableOp) -> OpOutcome {
        match op {
            TableOp::InsertRows { at, rows } => {
                counted(self.insert_rows(*at, rows), "no rows to insert")
            }
            TableOp::DeleteRows { indices } => {
                counted(self.delete_rows(indices), "no rows matched")
            }
            TableOp::RestoreRows { entries } => {
                let mut count = 0;
                for (index, record) in entries {
                    count += self.insert_rows(*index, std::slice::from_ref(record));
                }
                counted(count, "no rows to restore")
            }
            TableOp::InsertColumns { at, columns } => {
                counted(self.insert_columns(*at, columns), "no columns to insert")
            }
            TableOp::DeleteColumns { indices } => {
                counted(self.delete_columns(indices), "no columns matched")
            }
            TableOp::RestoreColumns { entries } => {
                let mut count = 0;
                for (index, spec) in entries {
                    count += self.insert_columns(*index, std::slice::from_ref(spec));
                }
                counted(count, "no columns to restore")
            }
            TableOp::EditHeader { index, name } => {
                if self.edit_header(*index, name) {
                    OpOutcome::applied(1)
                } else {
                    OpOutcome::noop("no column at index")
                }
            }
            TableOp::SetColumnWidth { name, width } => {
                if self.update_column_width(name, *width) {
                    OpOutcome::applied(1)
                } else {
                    OpOutcome::noop("no column with name")
                }
            }
            TableOp::ReorderColumn { from, to } => {
                if self.reorder_column(*from, *to) {
                    OpOutcome::applied(1)
                } else {
                    OpOutcome::noop("reorder out of range or trivial")
                }
            }
            TableOp::ReorderRow { from, to } => {
                if self.reorder_row(*from, *to) {
                    OpOutcome::applied(1)
                } else {
                    OpOutcome::noop("reorder out of range or trivial")
                }
            }
            TableOp::UpdateCell {
                row_index,
                column,
                value,
            } => {
                if self.update_cell(*row_index, column, value.clone()) {
                    OpOutcome::applied(1)
                } else {
                    OpOutcome::noop("cell target unresolved")
                }
            }
            TableOp::RestoreCells { entries } => {
                let written = {
                    let mut txn = self.doc.transact_mut();
                    let mut written = 0;
                    for (row_index, col_id, value) in entries {
                        if self.write_cell(&mut txn, *row_index, col_id, value) {
                            written += 1;
                        }
                    }
                    written
                };
                if written > 0 {
                    self.committed();
                }
                counted(written, "no cells restored")
            }
            TableOp::ApplyFill { suggestions } => {
                counted(self.apply_suggestions(suggestions), "no suggestions applied")
            }
        }
    }
}
