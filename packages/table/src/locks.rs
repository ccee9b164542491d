//! Advisory cell locks.
//!
//! Locks live in their own root map keyed by `"row:col"` coordinate, so
//! they replicate with the document but never touch cell data. They are
//! advisory only: the document happily writes through a locked cell, and
//! it is the presentation layer's job to warn. Locks deliberately track
//! coordinates, not identities, so a lock stays on "the third cell down"
//! even as rows shuffle around it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use yrs::{Any, Map, Out, Transact};

use crate::document::TableDocument;
use crate::read;

/// Annotation carried by a single lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub who: Option<String>,
    /// Unix millis when the lock was taken.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when_ms: Option<i64>,
}

fn lock_key(row: u32, col: u32) -> String {
    format!("{row}:{col}")
}

fn parse_lock_key(key: &str) -> Option<(u32, u32)> {
    let (row, col) = key.split_once(':')?;
    Some((row.parse().ok()?, col.parse().ok()?))
}

impl TableDocument {
    /// Lock the given coordinates, annotating each with an optional note,
    /// the configured actor, and the current time. Re-locking an already
    /// locked cell overwrites its annotation. Returns the lock count.
    pub fn lock_cells(&mut self, coords: &[(u32, u32)], note: Option<&str>) -> usize {
        if coords.is_empty() {
            debug!("lock_cells: empty selection ignored");
            return 0;
        }
        {
            let mut txn = self.doc.transact_mut();
            let when = chrono::Utc::now().timestamp_millis();
            for (row, col) in coords {
                let mut annotation: HashMap<String, Any> = HashMap::new();
                if let Some(note) = note {
                    annotation.insert("note".to_string(), Any::String(note.into()));
                }
                if let Some(actor) = &self.config.actor {
                    annotation.insert("who".to_string(), Any::String(actor.as_str().into()));
                }
                annotation.insert("when".to_string(), Any::BigInt(when));
                self.locks.insert(
                    &mut txn,
                    lock_key(*row, *col),
                    Any::Map(Arc::new(annotation)),
                );
            }
        }
        self.committed();
        coords.len()
    }

    /// Remove locks at the given coordinates. Unlocked coordinates are
    /// skipped. Returns the number removed.
    pub fn unlock_cells(&mut self, coords: &[(u32, u32)]) -> usize {
        let mut removed = 0;
        {
            let mut txn = self.doc.transact_mut();
            for (row, col) in coords {
                if self.locks.remove(&mut txn, &lock_key(*row, *col)).is_some() {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            self.committed();
        } else {
            debug!("unlock_cells: nothing to unlock");
        }
        removed
    }

    /// Remove every lock in the document. Returns the number removed.
    pub fn unlock_all(&mut self) -> usize {
        let removed = {
            let mut txn = self.doc.transact_mut();
            let keys: Vec<String> = self.locks.keys(&txn).map(|k| k.to_string()).collect();
            for key in &keys {
                self.locks.remove(&mut txn, key);
            }
            keys.len()
        };
        if removed > 0 {
            self.committed();
        }
        removed
    }

    pub fn is_locked(&self, row: u32, col: u32) -> bool {
        let txn = self.doc.transact();
        self.locks.contains_key(&txn, &lock_key(row, col))
    }

    /// Annotation of the lock at a coordinate, if any.
    pub fn lock_info(&self, row: u32, col: u32) -> Option<LockInfo> {
        let txn = self.doc.transact();
        let out = self.locks.get(&txn, &lock_key(row, col))?;
        let (note, who, when_ms) = match &out {
            Out::Any(Any::Map(entries)) => (
                entries.get("note").and_then(|v| match v {
                    Any::String(s) => Some(s.to_string()),
                    _ => None,
                }),
                entries.get("who").and_then(|v| match v {
                    Any::String(s) => Some(s.to_string()),
                    _ => None,
                }),
                entries.get("when").and_then(read::any_i64),
            ),
            _ => (None, None, None),
        };
        Some(LockInfo { note, who, when_ms })
    }

    /// Every locked coordinate, unordered. Keys that do not parse as a
    /// coordinate (written by a buggy peer) are skipped.
    pub fn locked_coords(&self) -> Vec<(u32, u32)> {
        let txn = self.doc.transact();
        self.locks
            .keys(&txn)
            .filter_map(parse_lock_key)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;
    use crate::document::ColumnSpec;
    use crate::value::CellValue;

    fn doc() -> TableDocument {
        let mut doc = TableDocument::new(TableConfig::default().with_actor("alice"));
        doc.insert_columns(0, &[ColumnSpec::new("Name")]);
        doc.insert_rows(0, &[HashMap::new(), HashMap::new()]);
        doc
    }

    #[test]
    fn test_lock_and_unlock() {
        let mut doc = doc();
        assert_eq!(doc.lock_cells(&[(0, 0), (1, 0)], Some("reviewing")), 2);
        assert!(doc.is_locked(0, 0));
        assert!(doc.is_locked(1, 0));
        assert!(!doc.is_locked(0, 1));

        assert_eq!(doc.unlock_cells(&[(0, 0), (5, 5)]), 1);
        assert!(!doc.is_locked(0, 0));
        assert!(doc.is_locked(1, 0));
    }

    #[test]
    fn test_lock_annotation() {
        let mut doc = doc();
        doc.lock_cells(&[(0, 0)], Some("don't touch"));

        let info = doc.lock_info(0, 0).unwrap();
        assert_eq!(info.note.as_deref(), Some("don't touch"));
        assert_eq!(info.who.as_deref(), Some("alice"));
        assert!(info.when_ms.is_some());
    }

    #[test]
    fn test_unlock_all() {
        let mut doc = doc();
        doc.lock_cells(&[(0, 0), (1, 0)], None);
        assert_eq!(doc.unlock_all(), 2);
        assert!(doc.locked_coords().is_empty());
    }

    #[test]
    fn test_locks_do_not_block_writes() {
        let mut doc = doc();
        doc.lock_cells(&[(0, 0)], None);
        assert!(doc.update_cell(0, "Name", CellValue::from("written anyway")));
        assert_eq!(doc.cell(0, "Name"), Some(CellValue::from("written anyway")));
        assert!(doc.is_locked(0, 0));
    }

    #[test]
    fn test_locks_track_coordinates_not_rows() {
        let mut doc = doc();
        doc.update_cell(0, "Name", CellValue::from("first"));
        doc.update_cell(1, "Name", CellValue::from("second"));
        doc.lock_cells(&[(1, 0)], None);

        // deleting the row above leaves the lock at coordinate (1, 0),
        // now pointing past the data it was taken on
        doc.delete_rows(&[0]);
        assert!(doc.is_locked(1, 0));
        assert_eq!(doc.cell(0, "Name"), Some(CellValue::from("second")));
    }

    #[test]
    fn test_locks_replicate() {
        let mut a = doc();
        a.lock_cells(&[(0, 0)], Some("mine"));

        let b = TableDocument::from_state(&a.encode_state(), TableConfig::default()).unwrap();
        assert!(b.is_locked(0, 0));
        assert_eq!(b.lock_info(0, 0).unwrap().note.as_deref(), Some("mine"));
    }
}
