//! Read projection.
//!
//! Display-ready state is recomputed in full from the CRDT structures on
//! every transaction commit; there is no incremental cache that could
//! drift. Two replicas holding the same CRDT state therefore always project
//! the same view, with no handshake beyond receiving that state.

use std::collections::HashMap;

use serde::Serialize;
use yrs::{Array, ArrayRef, Map, MapRef, ReadTxn};

use crate::read;
use crate::value::CellValue;

/// Display-ready projection of the table: ordered headers, a name-keyed
/// width map, and ordered row records keyed by column display name. Any
/// absent cell appears as an empty value, never null.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    pub headers: Vec<String>,
    pub widths: HashMap<String, f64>,
    pub rows: Vec<HashMap<String, CellValue>>,
}

impl TableView {
    pub(crate) fn capture<T: ReadTxn>(
        txn: &T,
        column_order: &ArrayRef,
        column_defs: &MapRef,
        row_order: &ArrayRef,
        row_data: &MapRef,
        default_width: f64,
    ) -> Self {
        let mut headers = Vec::new();
        let mut widths = HashMap::new();
        // (id, display name) in current order
        let mut columns: Vec<(String, String)> = Vec::new();

        for i in 0..column_order.len(txn) {
            let Some(id) = read::string_at(txn, column_order, i) else {
                continue;
            };
            let Some(def) = read::nested_map(txn, column_defs, &id) else {
                continue;
            };
            let name = read::map_string(txn, &def, "name").unwrap_or_default();
            let width = read::map_f64(txn, &def, "width").unwrap_or(default_width);
            headers.push(name.clone());
            widths.insert(name.clone(), width);
            columns.push((id, name));
        }

        let mut rows = Vec::new();
        for i in 0..row_order.len(txn) {
            let Some(row_id) = read::string_at(txn, row_order, i) else {
                continue;
            };
            let row_map = read::nested_map(txn, row_data, &row_id);
            let mut record = HashMap::with_capacity(columns.len());
            for (col_id, name) in &columns {
                let value = row_map
                    .as_ref()
                    .and_then(|m| m.get(txn, col_id.as_str()))
                    .map(|out| CellValue::from_out(&out))
                    .unwrap_or(CellValue::Empty);
                record.insert(name.clone(), value);
            }
            rows.push(record);
        }

        TableView {
            headers,
            widths,
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Value at a coordinate, empty when out of range.
    pub fn cell(&self, row_index: usize, col_index: usize) -> CellValue {
        let Some(header) = self.headers.get(col_index) else {
            return CellValue::Empty;
        };
        self.rows
            .get(row_index)
            .and_then(|record| record.get(header))
            .cloned()
            .unwrap_or(CellValue::Empty)
    }
}
