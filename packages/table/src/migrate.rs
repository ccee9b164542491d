//! One-shot schema upgrade.
//!
//! The original table format stored a plain `headers` array, a name-keyed
//! `colWidths` map, and a `rows` array of name-keyed records. Positional
//! addressing made concurrent structural edits collide, so the current
//! format keys everything by opaque ids. Any doc still carrying legacy
//! roots is upgraded in a single transaction when it is first wrapped.

use tracing::info;
use yrs::{Any, Array, Map, MapPrelim, Transact};

use crate::document::TableDocument;
use crate::ids::{ColumnId, RowId};
use crate::read;
use crate::value::CellValue;

pub(crate) const SCHEMA_VERSION: i64 = 2;

impl TableDocument {
    /// Upgrade legacy content into the id-keyed schema. Idempotent: a doc
    /// already stamped with the current schema version is left untouched,
    /// and a fresh doc is just stamped.
    pub(crate) fn migrate_if_needed(&mut self) {
        {
            let mut txn = self.doc.transact_mut();

            if read::map_i64(&txn, &self.meta, "schemaVersion") == Some(SCHEMA_VERSION) {
                return;
            }

            let headers = read::array_strings(&txn, &self.legacy_headers);
            let legacy_row_count = self.legacy_rows.len(&txn);

            let mut column_ids = Vec::with_capacity(headers.len());
            for name in &headers {
                let col_id = ColumnId::generate();
                let def = self
                    .column_defs
                    .insert(&mut txn, col_id.as_str(), MapPrelim::default());
                def.insert(&mut txn, "id", Any::String(col_id.as_str().into()));
                def.insert(&mut txn, "name", Any::String(name.as_str().into()));
                let width = read::map_f64(&txn, &self.legacy_widths, name)
                    .unwrap_or(self.config.default_column_width);
                def.insert(&mut txn, "width", Any::Number(width));
                self.column_order
                    .push_back(&mut txn, Any::String(col_id.as_str().into()));
                column_ids.push((col_id, name.clone()));
            }

            for i in 0..legacy_row_count {
                let record = self
                    .legacy_rows
                    .get(&txn, i)
                    .map(|out| read::value_record(&txn, out))
                    .unwrap_or_default();
                let row_id = RowId::generate();
                let row_map = self
                    .row_data
                    .insert(&mut txn, row_id.as_str(), MapPrelim::default());
                for (col_id, name) in &column_ids {
                    let value = record.get(name).cloned().unwrap_or(CellValue::Empty);
                    row_map.insert(&mut txn, col_id.as_str(), value.to_any());
                }
                self.row_order
                    .push_back(&mut txn, Any::String(row_id.as_str().into()));
            }

            self.meta
                .insert(&mut txn, "schemaVersion", Any::BigInt(SCHEMA_VERSION));

            if !headers.is_empty() || legacy_row_count > 0 {
                info!(
                    columns = headers.len(),
                    rows = legacy_row_count,
                    "migrated legacy table schema"
                );
            }
        }
        // even on a fresh doc the stamp itself is a write, so the dirty
        // flag and version counter must see it
        self.committed();
    }

    /// Drop the legacy roots once every peer is known to run the current
    /// schema. Kept separate from migration so mixed fleets keep reading
    /// their old roots until the operator opts in.
    pub fn clear_legacy(&mut self) {
        let cleared = {
            let mut txn = self.doc.transact_mut();
            let mut cleared = false;
            let len = self.legacy_headers.len(&txn);
            if len > 0 {
                self.legacy_headers.remove_range(&mut txn, 0, len);
                cleared = true;
            }
            let len = self.legacy_rows.len(&txn);
            if len > 0 {
                self.legacy_rows.remove_range(&mut txn, 0, len);
                cleared = true;
            }
            let keys: Vec<String> = self
                .legacy_widths
                .keys(&txn)
                .map(|k| k.to_string())
                .collect();
            for key in keys {
                self.legacy_widths.remove(&mut txn, &key);
                cleared = true;
            }
            cleared
        };
        if cleared {
            self.committed();
        }
    }
}

/// Write table content in the pre-migration shape. Test and import
/// tooling use this to reproduce docs written by old peers.
pub fn seed_legacy(
    doc: &yrs::Doc,
    headers: &[&str],
    widths: &[(&str, f64)],
    rows: &[Vec<(&str, CellValue)>],
) {
    use std::collections::HashMap;
    use std::sync::Arc;

    let legacy_headers = doc.get_or_insert_array(crate::document::LEGACY_HEADERS);
    let legacy_widths = doc.get_or_insert_map(crate::document::LEGACY_WIDTHS);
    let legacy_rows = doc.get_or_insert_array(crate::document::LEGACY_ROWS);

    let mut txn = doc.transact_mut();
    for header in headers {
        legacy_headers.push_back(&mut txn, Any::String((*header).into()));
    }
    for (name, width) in widths {
        legacy_widths.insert(&mut txn, *name, Any::Number(*width));
    }
    for row in rows {
        let record: HashMap<String, Any> = row
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_any()))
            .collect();
        legacy_rows.push_back(&mut txn, Any::Map(Arc::new(record)));
    }
}
