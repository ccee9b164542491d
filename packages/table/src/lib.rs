//! Collaborative table documents.
//!
//! This crate provides the CRDT-backed data model for multi-user tables:
//! id-keyed columns and rows with ordered sequences, a one-shot upgrade
//! from the legacy positional schema, structural operations with derived
//! inverses, advisory cell locks, selection snapshots for generated
//! fills, and a pure display projection recomputed on every commit.
//!
//! All conflict resolution is delegated to the underlying shared types:
//! maps merge per key last-write-wins, sequences merge insertions at
//! stable positions, and deletions are by identity so concurrent edits
//! to different entities never collide.

mod config;
mod document;
mod error;
mod fill;
mod ids;
mod locks;
mod migrate;
mod ops;
mod projection;
mod read;
mod undo;
mod value;

pub use config::TableConfig;
pub use document::{ColumnSpec, TableDocument};
pub use error::{InvariantViolation, TableError};
pub use fill::{CellCoord, CellSnapshot, CellSuggestion};
pub use ids::{ColumnId, RowId};
pub use locks::LockInfo;
pub use migrate::seed_legacy;
pub use ops::{OpOutcome, TableOp};
pub use projection::TableView;
pub use undo::{OpBatch, UndoStack};
pub use value::CellValue;

#[cfg(test)]
mod tests_scenarios;
