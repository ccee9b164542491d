//! Generated-fill plumbing.
//!
//! The workspace does not call a generator itself; it builds the request
//! payload from a selection snapshot, parses whatever JSON comes back,
//! and applies accepted suggestions to the document in one batch. The
//! generator is free to answer with an error object instead of
//! suggestions, which surfaces as `SuggestError::Generator`.

use std::collections::HashMap;

use lattice_table::{CellCoord, CellSnapshot, CellSuggestion, CellValue, TableDocument};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("Malformed generator response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Generator failed: {0}")]
    Generator(String),
}

/// Payload handed to the generator: the table's context plus the
/// selected cells.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub headers: Vec<String>,
    /// Full table content, name-keyed per row, so the generator sees the
    /// surrounding data and not just the selection.
    pub rows: Vec<HashMap<String, CellValue>>,
    pub cells: Vec<CellSnapshot>,
}

impl SuggestionRequest {
    /// Snapshot the given coordinates along with the table context.
    pub fn capture(doc: &TableDocument, targets: &[CellCoord]) -> Self {
        let view = doc.view();
        Self {
            title: doc.title(),
            description: doc.description(),
            headers: view.headers,
            rows: view.rows,
            cells: doc.snapshot_at(targets),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawResponse {
    Failure { error: String },
    Success { suggestions: Vec<CellSuggestion> },
}

/// Parse a generator response body into suggestions.
pub fn parse_response(body: &str) -> Result<Vec<CellSuggestion>, SuggestError> {
    match serde_json::from_str(body)? {
        RawResponse::Success { suggestions } => Ok(suggestions),
        RawResponse::Failure { error } => Err(SuggestError::Generator(error)),
    }
}

/// Parse a response and apply it in a single batch. Returns the number
/// of cells written; suggestions for cells that no longer exist are
/// dropped with a warning.
pub fn apply_response(doc: &mut TableDocument, body: &str) -> Result<usize, SuggestError> {
    let suggestions = parse_response(body)?;
    let requested = suggestions.len();
    let written = doc.apply_suggestions(&suggestions);
    if written < requested {
        warn!(
            requested,
            written, "some suggestions targeted cells that no longer exist"
        );
    }
    Ok(written)
}
