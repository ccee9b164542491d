//! Error types for the table document.

use thiserror::Error;

/// Errors on the sync boundary. Structural operations never return these:
/// invalid indices and unknown names are silent no-ops by contract.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to decode: {0}")]
    Decode(String),

    #[error("Failed to apply update: {0}")]
    Apply(String),
}

/// Cross-structure inconsistency, e.g. an ordered id with no definition,
/// or a row value stored under a column id no longer in the order.
/// Surfaced by `TableDocument::check_invariants` and asserted in tests,
/// never caught in normal flow.
#[derive(Debug, Error)]
#[error("Invariant violated: {0}")]
pub struct InvariantViolation(pub String);
