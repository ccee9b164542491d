//! Replicated table document.
//!
//! Each table is backed by a shared doc holding six root structures:
//! column definitions (id-keyed), column order, row data (id-keyed),
//! row order, document meta, and the advisory lock store. Every public
//! operation runs inside a single transaction, so remote peers observe
//! each operation atomically.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{
    Any, Array, ArrayRef, Doc, Map, MapPrelim, MapRef, ReadTxn, StateVector, Transact,
    TransactionMut, Update,
};

use crate::config::TableConfig;
use crate::error::{InvariantViolation, TableError};
use crate::ids::{ColumnId, RowId};
use crate::projection::TableView;
use crate::read;
use crate::value::CellValue;

pub(crate) const ROOT_COLUMN_DEFS: &str = "columnDefinitions";
pub(crate) const ROOT_COLUMN_ORDER: &str = "columnOrder";
pub(crate) const ROOT_ROW_DATA: &str = "rowData";
pub(crate) const ROOT_ROW_ORDER: &str = "rowOrder";
pub(crate) const ROOT_META: &str = "meta";
pub(crate) const ROOT_LOCKS: &str = "locks";

// Roots written by the pre-migration format.
pub(crate) const LEGACY_HEADERS: &str = "headers";
pub(crate) const LEGACY_WIDTHS: &str = "colWidths";
pub(crate) const LEGACY_ROWS: &str = "rows";

/// Definition of a column to insert: display name, optional explicit
/// width, and optional per-row seed values (positional, top to bottom).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default)]
    pub data: Vec<CellValue>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            width: None,
            data: Vec::new(),
        }
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_data(mut self, data: Vec<CellValue>) -> Self {
        self.data = data;
        self
    }
}

type ViewListener = Box<dyn Fn(&TableView) + Send + Sync>;

/// A CRDT-backed table session.
pub struct TableDocument {
    pub(crate) doc: Doc,
    pub(crate) column_defs: MapRef,
    pub(crate) column_order: ArrayRef,
    pub(crate) row_data: MapRef,
    pub(crate) row_order: ArrayRef,
    pub(crate) meta: MapRef,
    pub(crate) locks: MapRef,
    pub(crate) legacy_headers: ArrayRef,
    pub(crate) legacy_widths: MapRef,
    pub(crate) legacy_rows: ArrayRef,
    pub(crate) config: TableConfig,
    dirty: bool,
    version: u64,
    subscribers: Vec<(u64, ViewListener)>,
    next_subscriber: u64,
}

impl TableDocument {
    /// Create a new empty table document.
    pub fn new(config: TableConfig) -> Self {
        Self::wrap(Doc::new(), config)
    }

    /// Wrap an existing doc, upgrading its schema if it carries data in
    /// the pre-migration format.
    pub fn wrap(doc: Doc, config: TableConfig) -> Self {
        let column_defs = doc.get_or_insert_map(ROOT_COLUMN_DEFS);
        let column_order = doc.get_or_insert_array(ROOT_COLUMN_ORDER);
        let row_data = doc.get_or_insert_map(ROOT_ROW_DATA);
        let row_order = doc.get_or_insert_array(ROOT_ROW_ORDER);
        let meta = doc.get_or_insert_map(ROOT_META);
        let locks = doc.get_or_insert_map(ROOT_LOCKS);
        let legacy_headers = doc.get_or_insert_array(LEGACY_HEADERS);
        let legacy_widths = doc.get_or_insert_map(LEGACY_WIDTHS);
        let legacy_rows = doc.get_or_insert_array(LEGACY_ROWS);

        let mut document = Self {
            doc,
            column_defs,
            column_order,
            row_data,
            row_order,
            meta,
            locks,
            legacy_headers,
            legacy_widths,
            legacy_rows,
            config,
            dirty: false,
            version: 0,
            subscribers: Vec::new(),
            next_subscriber: 0,
        };
        document.migrate_if_needed();
        document
    }

    /// Create a document from a previously encoded full state.
    pub fn from_state(state: &[u8], config: TableConfig) -> Result<Self, TableError> {
        let doc = Doc::new();
        {
            let update =
                Update::decode_v1(state).map_err(|e| TableError::Decode(e.to_string()))?;
            let mut txn = doc.transact_mut();
            txn.apply_update(update)
                .map_err(|e| TableError::Apply(e.to_string()))?;
        }
        Ok(Self::wrap(doc, config))
    }

    // ---- sync surface ----

    /// Get the current state vector (for delta sync).
    pub fn state_vector(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.state_vector().encode_v1()
    }

    /// Encode the full document state.
    pub fn encode_state(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&Default::default())
    }

    /// Encode delta since a given state vector.
    pub fn encode_delta(&self, state_vector: &[u8]) -> Result<Vec<u8>, TableError> {
        let sv = StateVector::decode_v1(state_vector)
            .map_err(|e| TableError::Decode(e.to_string()))?;
        let txn = self.doc.transact();
        Ok(txn.encode_state_as_update_v1(&sv))
    }

    /// Apply an update from a peer.
    pub fn apply_update(&mut self, update: &[u8]) -> Result<(), TableError> {
        {
            let update =
                Update::decode_v1(update).map_err(|e| TableError::Decode(e.to_string()))?;
            let mut txn = self.doc.transact_mut();
            txn.apply_update(update)
                .map_err(|e| TableError::Apply(e.to_string()))?;
        }
        self.committed();
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    // ---- change notification ----

    /// Register a listener invoked with the freshly projected view after
    /// every committed transaction, local or remote. Returns a handle for
    /// `unsubscribe`.
    pub fn subscribe(&mut self, listener: impl Fn(&TableView) + Send + Sync + 'static) -> u64 {
        let id = self.next_subscriber;
        self.next_subscriber += 1;
        self.subscribers.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, handle: u64) {
        self.subscribers.retain(|(id, _)| *id != handle);
    }

    /// Project the current display state.
    pub fn view(&self) -> TableView {
        let txn = self.doc.transact();
        TableView::capture(
            &txn,
            &self.column_order,
            &self.column_defs,
            &self.row_order,
            &self.row_data,
            self.config.default_column_width,
        )
    }

    pub(crate) fn committed(&mut self) {
        self.dirty = true;
        self.version += 1;
        if self.subscribers.is_empty() {
            return;
        }
        let view = self.view();
        for (_, listener) in &self.subscribers {
            listener(&view);
        }
    }

    // ---- structural operations ----

    /// Insert rows at `at` (clamped to the row count). Record keys are
    /// matched against current column display names; keys naming no
    /// column are ignored and missing columns become empty cells.
    /// Returns the number of rows inserted.
    pub fn insert_rows(&mut self, at: u32, rows: &[HashMap<String, CellValue>]) -> usize {
        if rows.is_empty() {
            debug!("insert_rows: empty batch ignored");
            return 0;
        }
        {
            let mut txn = self.doc.transact_mut();
            let columns = self.columns(&txn);
            let at = at.min(self.row_order.len(&txn));
            for (offset, record) in rows.iter().enumerate() {
                let row_id = RowId::generate();
                let row_map = self
                    .row_data
                    .insert(&mut txn, row_id.as_str(), MapPrelim::default());
                for (col_id, name) in &columns {
                    let value = record.get(name).cloned().unwrap_or(CellValue::Empty);
                    row_map.insert(&mut txn, col_id.as_str(), value.to_any());
                }
                self.row_order.insert(
                    &mut txn,
                    at + offset as u32,
                    Any::String(row_id.as_str().into()),
                );
            }
        }
        self.committed();
        rows.len()
    }

    /// Delete the rows at the given indices. Indices are resolved to row
    /// ids before any removal, so the batch is immune to index shifting.
    /// Out-of-range indices are skipped. Returns the number deleted.
    pub fn delete_rows(&mut self, indices: &[u32]) -> usize {
        let mut deleted = 0;
        {
            let mut txn = self.doc.transact_mut();
            let mut targets: Vec<u32> = indices.to_vec();
            targets.sort_unstable();
            targets.dedup();
            let row_ids: Vec<String> = targets
                .into_iter()
                .filter_map(|i| read::string_at(&txn, &self.row_order, i))
                .collect();
            for row_id in row_ids {
                if let Some(pos) = read::position_of(&txn, &self.row_order, &row_id) {
                    self.row_order.remove(&mut txn, pos);
                    self.row_data.remove(&mut txn, &row_id);
                    deleted += 1;
                }
            }
        }
        if deleted > 0 {
            self.committed();
        } else {
            debug!("delete_rows: no rows matched");
        }
        deleted
    }

    /// Insert columns at `at` (clamped). Each definition gets a fresh id;
    /// seed data is written positionally into existing rows. Returns the
    /// number of columns inserted.
    pub fn insert_columns(&mut self, at: u32, specs: &[ColumnSpec]) -> usize {
        if specs.is_empty() {
            debug!("insert_columns: empty batch ignored");
            return 0;
        }
        {
            let mut txn = self.doc.transact_mut();
            let at = at.min(self.column_order.len(&txn));
            let row_ids = read::array_strings(&txn, &self.row_order);
            for (offset, spec) in specs.iter().enumerate() {
                let col_id = ColumnId::generate();
                let def = self
                    .column_defs
                    .insert(&mut txn, col_id.as_str(), MapPrelim::default());
                def.insert(&mut txn, "id", Any::String(col_id.as_str().into()));
                def.insert(&mut txn, "name", Any::String(spec.name.as_str().into()));
                let width = spec.width.unwrap_or(self.config.default_column_width);
                def.insert(&mut txn, "width", Any::Number(width));
                self.column_order.insert(
                    &mut txn,
                    at + offset as u32,
                    Any::String(col_id.as_str().into()),
                );
                for (row_index, row_id) in row_ids.iter().enumerate() {
                    let Some(value) = spec.data.get(row_index) else {
                        break;
                    };
                    if value.is_empty() {
                        continue;
                    }
                    let row_map = self.row_map_or_create(&mut txn, row_id);
                    row_map.insert(&mut txn, col_id.as_str(), value.to_any());
                }
            }
        }
        self.committed();
        specs.len()
    }

    /// Delete the columns at the given indices. Like row deletion this is
    /// identity-based: ids are resolved up front, then each id is removed
    /// from the order, the definitions, and every row. Returns the number
    /// deleted.
    pub fn delete_columns(&mut self, indices: &[u32]) -> usize {
        let mut deleted = 0;
        {
            let mut txn = self.doc.transact_mut();
            let mut targets: Vec<u32> = indices.to_vec();
            targets.sort_unstable();
            targets.dedup();
            let col_ids: Vec<String> = targets
                .into_iter()
                .filter_map(|i| read::string_at(&txn, &self.column_order, i))
                .collect();
            if col_ids.is_empty() {
                drop(txn);
                debug!("delete_columns: no columns matched");
                return 0;
            }
            let row_ids = read::array_strings(&txn, &self.row_order);
            for col_id in col_ids {
                if let Some(pos) = read::position_of(&txn, &self.column_order, &col_id) {
                    self.column_order.remove(&mut txn, pos);
                    self.column_defs.remove(&mut txn, &col_id);
                    for row_id in &row_ids {
                        if let Some(row_map) = read::nested_map(&txn, &self.row_data, row_id) {
                            row_map.remove(&mut txn, &col_id);
                        }
                    }
                    deleted += 1;
                }
            }
        }
        self.committed();
        deleted
    }

    /// Rename the column at `index`. Only the display name changes; the
    /// column id and every cell keyed by it are untouched.
    pub fn edit_header(&mut self, index: u32, name: &str) -> bool {
        let changed = {
            let mut txn = self.doc.transact_mut();
            match read::string_at(&txn, &self.column_order, index)
                .and_then(|id| read::nested_map(&txn, &self.column_defs, &id))
            {
                Some(def) => {
                    def.insert(&mut txn, "name", Any::String(name.into()));
                    true
                }
                None => false,
            }
        };
        if changed {
            self.committed();
        } else {
            debug!(index, "edit_header: no column at index");
        }
        changed
    }

    /// Set the width of the first column whose display name matches.
    pub fn update_column_width(&mut self, name: &str, width: f64) -> bool {
        if !width.is_finite() || width <= 0.0 {
            debug!(name, width, "update_column_width: invalid width ignored");
            return false;
        }
        let changed = {
            let mut txn = self.doc.transact_mut();
            match self.column_id_by_name(&txn, name) {
                Some(col_id) => {
                    if let Some(def) = read::nested_map(&txn, &self.column_defs, &col_id) {
                        def.insert(&mut txn, "width", Any::Number(width));
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };
        if changed {
            self.committed();
        } else {
            debug!(name, "update_column_width: no column with name");
        }
        changed
    }

    /// Move the column at `from` so it lands at `to` (positions in the
    /// sequence after removal, splice-style).
    pub fn reorder_column(&mut self, from: u32, to: u32) -> bool {
        let changed = {
            let mut txn = self.doc.transact_mut();
            let len = self.column_order.len(&txn);
            if from == to || from >= len || to >= len {
                false
            } else {
                match read::string_at(&txn, &self.column_order, from) {
                    Some(col_id) => {
                        self.column_order.remove(&mut txn, from);
                        self.column_order
                            .insert(&mut txn, to, Any::String(col_id.as_str().into()));
                        true
                    }
                    None => false,
                }
            }
        };
        if changed {
            self.committed();
        } else {
            debug!(from, to, "reorder_column: no-op");
        }
        changed
    }

    /// Move the row at `from` so it lands at `to`, splice-style like
    /// `reorder_column`.
    pub fn reorder_row(&mut self, from: u32, to: u32) -> bool {
        let changed = {
            let mut txn = self.doc.transact_mut();
            let len = self.row_order.len(&txn);
            if from == to || from >= len || to >= len {
                false
            } else {
                match read::string_at(&txn, &self.row_order, from) {
                    Some(row_id) => {
                        self.row_order.remove(&mut txn, from);
                        self.row_order
                            .insert(&mut txn, to, Any::String(row_id.as_str().into()));
                        true
                    }
                    None => false,
                }
            }
        };
        if changed {
            self.committed();
        } else {
            debug!(from, to, "reorder_row: no-op");
        }
        changed
    }

    /// Write a single cell. The column may be addressed by display name
    /// or by id.
    pub fn update_cell(&mut self, row_index: u32, column: &str, value: CellValue) -> bool {
        let changed = {
            let mut txn = self.doc.transact_mut();
            self.write_cell(&mut txn, row_index, column, &value)
        };
        if changed {
            self.committed();
        } else {
            debug!(row_index, column, "update_cell: unresolved target");
        }
        changed
    }

    /// Resolve the target and write, inside an already open transaction.
    /// Returns false when the row index or column cannot be resolved.
    pub(crate) fn write_cell(
        &self,
        txn: &mut TransactionMut<'_>,
        row_index: u32,
        column: &str,
        value: &CellValue,
    ) -> bool {
        let Some(row_id) = read::string_at(&*txn, &self.row_order, row_index) else {
            return false;
        };
        let Some(col_id) = self.resolve_column_key(&*txn, column) else {
            return false;
        };
        let row_map = self.row_map_or_create(txn, &row_id);
        row_map.insert(txn, col_id.as_str(), value.to_any());
        true
    }

    // ---- reads ----

    /// Value of a cell, or `None` when the coordinate cannot be resolved.
    /// A resolved cell that was never written reads as empty.
    pub fn cell(&self, row_index: u32, column: &str) -> Option<CellValue> {
        let txn = self.doc.transact();
        let row_id = read::string_at(&txn, &self.row_order, row_index)?;
        let col_id = self.resolve_column_key(&txn, column)?;
        let value = read::nested_map(&txn, &self.row_data, &row_id)
            .and_then(|m| m.get(&txn, &col_id))
            .map(|out| CellValue::from_out(&out))
            .unwrap_or(CellValue::Empty);
        Some(value)
    }

    /// The row at `index` as a display-name-keyed record.
    pub fn row_record(&self, index: u32) -> Option<HashMap<String, CellValue>> {
        let txn = self.doc.transact();
        let row_id = read::string_at(&txn, &self.row_order, index)?;
        let row_map = read::nested_map(&txn, &self.row_data, &row_id);
        let mut record = HashMap::new();
        for (col_id, name) in self.columns(&txn) {
            let value = row_map
                .as_ref()
                .and_then(|m| m.get(&txn, &col_id))
                .map(|out| CellValue::from_out(&out))
                .unwrap_or(CellValue::Empty);
            record.insert(name, value);
        }
        Some(record)
    }

    /// The column at `index` captured as an insertable definition,
    /// including its current per-row values.
    pub fn column_spec_at(&self, index: u32) -> Option<ColumnSpec> {
        let txn = self.doc.transact();
        let col_id = read::string_at(&txn, &self.column_order, index)?;
        let def = read::nested_map(&txn, &self.column_defs, &col_id)?;
        let name = read::map_string(&txn, &def, "name").unwrap_or_default();
        let width = read::map_f64(&txn, &def, "width");
        let data = read::array_strings(&txn, &self.row_order)
            .iter()
            .map(|row_id| {
                read::nested_map(&txn, &self.row_data, row_id)
                    .and_then(|m| m.get(&txn, &col_id))
                    .map(|out| CellValue::from_out(&out))
                    .unwrap_or(CellValue::Empty)
            })
            .collect();
        Some(ColumnSpec {
            name,
            width,
            data,
        })
    }

    pub fn header_at(&self, index: u32) -> Option<String> {
        let txn = self.doc.transact();
        let col_id = read::string_at(&txn, &self.column_order, index)?;
        let def = read::nested_map(&txn, &self.column_defs, &col_id)?;
        read::map_string(&txn, &def, "name")
    }

    pub fn headers(&self) -> Vec<String> {
        let txn = self.doc.transact();
        self.columns(&txn).into_iter().map(|(_, name)| name).collect()
    }

    pub fn column_width_by_name(&self, name: &str) -> Option<f64> {
        let txn = self.doc.transact();
        let col_id = self.column_id_by_name(&txn, name)?;
        let def = read::nested_map(&txn, &self.column_defs, &col_id)?;
        read::map_f64(&txn, &def, "width")
    }

    pub fn row_count(&self) -> u32 {
        let txn = self.doc.transact();
        self.row_order.len(&txn)
    }

    pub fn column_count(&self) -> u32 {
        let txn = self.doc.transact();
        self.column_order.len(&txn)
    }

    // ---- meta ----

    pub fn title(&self) -> Option<String> {
        let txn = self.doc.transact();
        read::map_string(&txn, &self.meta, "title")
    }

    pub fn set_title(&mut self, title: &str) {
        {
            let mut txn = self.doc.transact_mut();
            self.meta.insert(&mut txn, "title", Any::String(title.into()));
        }
        self.committed();
    }

    pub fn description(&self) -> Option<String> {
        let txn = self.doc.transact();
        read::map_string(&txn, &self.meta, "description")
    }

    pub fn set_description(&mut self, description: &str) {
        {
            let mut txn = self.doc.transact_mut();
            self.meta
                .insert(&mut txn, "description", Any::String(description.into()));
        }
        self.committed();
    }

    // ---- integrity ----

    /// Verify cross-structure consistency. A violation here means a
    /// transaction boundary was broken or the document is corrupt.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let txn = self.doc.transact();

        let col_ids = read::array_strings(&txn, &self.column_order);
        let mut seen = std::collections::HashSet::new();
        for col_id in &col_ids {
            if !seen.insert(col_id.clone()) {
                return Err(InvariantViolation(format!(
                    "column id {col_id} ordered more than once"
                )));
            }
            let def = read::nested_map(&txn, &self.column_defs, col_id).ok_or_else(|| {
                InvariantViolation(format!("ordered column {col_id} has no definition"))
            })?;
            if read::map_string(&txn, &def, "name").is_none() {
                return Err(InvariantViolation(format!(
                    "column {col_id} definition has no name"
                )));
            }
        }

        if self.column_defs.len(&txn) != col_ids.len() as u32 {
            return Err(InvariantViolation(format!(
                "{} ordered columns but {} definitions",
                col_ids.len(),
                self.column_defs.len(&txn)
            )));
        }

        let col_set: std::collections::HashSet<&str> =
            col_ids.iter().map(|id| id.as_str()).collect();
        let row_ids = read::array_strings(&txn, &self.row_order);
        let mut seen = std::collections::HashSet::new();
        for row_id in &row_ids {
            if !seen.insert(row_id.clone()) {
                return Err(InvariantViolation(format!(
                    "row id {row_id} ordered more than once"
                )));
            }
            let Some(row_map) = read::nested_map(&txn, &self.row_data, row_id) else {
                return Err(InvariantViolation(format!(
                    "ordered row {row_id} has no data map"
                )));
            };
            for key in row_map.keys(&txn) {
                if !col_set.contains(key) {
                    return Err(InvariantViolation(format!(
                        "row {row_id} holds a value for unknown column {key}"
                    )));
                }
            }
        }
        if self.row_data.len(&txn) != row_ids.len() as u32 {
            return Err(InvariantViolation(format!(
                "{} ordered rows but {} data maps",
                row_ids.len(),
                self.row_data.len(&txn)
            )));
        }

        if read::map_i64(&txn, &self.meta, "schemaVersion") != Some(crate::migrate::SCHEMA_VERSION)
        {
            return Err(InvariantViolation("schema version missing or stale".into()));
        }

        Ok(())
    }

    // ---- shared internals ----

    /// Ordered (id, display name) pairs.
    pub(crate) fn columns<T: ReadTxn>(&self, txn: &T) -> Vec<(String, String)> {
        read::array_strings(txn, &self.column_order)
            .into_iter()
            .map(|id| {
                let name = read::nested_map(txn, &self.column_defs, &id)
                    .and_then(|def| read::map_string(txn, &def, "name"))
                    .unwrap_or_default();
                (id, name)
            })
            .collect()
    }

    /// Column id for a key that is either already an id or a display
    /// name. Name lookups return the first match in column order.
    pub(crate) fn resolve_column_key<T: ReadTxn>(&self, txn: &T, key: &str) -> Option<String> {
        if read::nested_map(txn, &self.column_defs, key).is_some() {
            return Some(key.to_string());
        }
        self.column_id_by_name(txn, key)
    }

    pub(crate) fn column_id_by_name<T: ReadTxn>(&self, txn: &T, name: &str) -> Option<String> {
        self.columns(txn)
            .into_iter()
            .find(|(_, n)| n == name)
            .map(|(id, _)| id)
    }

    pub(crate) fn row_map_or_create(
        &self,
        txn: &mut TransactionMut<'_>,
        row_id: &str,
    ) -> MapRef {
        match read::nested_map(&*txn, &self.row_data, row_id) {
            Some(map) => map,
            None => self.row_data.insert(txn, row_id, MapPrelim::default()),
        }
    }
}
