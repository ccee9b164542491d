//! Table document configuration.

use std::time::Duration;

/// Policy knobs for a table document. Everything here used to be a
/// hard-coded constant in the legacy implementation.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Width in px for a column created without an explicit width.
    pub default_column_width: f64,

    /// Edits arriving within this window coalesce into one undo step.
    pub undo_capture_window: Duration,

    /// Label recorded as `who` on lock annotations created locally.
    pub actor: Option<String>,
}

impl TableConfig {
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            default_column_width: 150.0,
            undo_capture_window: Duration::from_millis(500),
            actor: None,
        }
    }
}
