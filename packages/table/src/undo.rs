//! Local undo/redo over structural operations.
//!
//! The stack records each applied op together with its inverse, computed
//! against the document before the op ran. Undo replays inverses in
//! reverse application order. Only ops that actually changed the
//! document are recorded, so no-ops never produce empty undo steps.
//! Lock and unlock actions are not ops and are never undoable.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::document::TableDocument;
use crate::ops::{OpOutcome, TableOp};

/// A group of ops undone and redone as one step.
#[derive(Debug, Clone, Default)]
pub struct OpBatch {
    pub ops: Vec<TableOp>,
    /// Inverses in reverse application order, ready to replay front to
    /// back.
    pub inverses: Vec<TableOp>,
    pub description: Option<String>,
}

impl OpBatch {
    fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn record(&mut self, op: TableOp, inverse: TableOp) {
        self.ops.push(op);
        self.inverses.insert(0, inverse);
    }
}

pub struct UndoStack {
    undo_stack: Vec<OpBatch>,
    redo_stack: Vec<OpBatch>,
    max_levels: usize,
    current_batch: Option<OpBatch>,
    capture_window: Duration,
    last_push: Option<Instant>,
}

impl UndoStack {
    pub fn new(capture_window: Duration) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels: 100,
            current_batch: None,
            capture_window,
            last_push: None,
        }
    }

    pub fn with_max_levels(mut self, max_levels: usize) -> Self {
        self.max_levels = max_levels;
        self
    }

    /// Apply an op through the stack, recording its inverse. Returns the
    /// op's outcome; no-ops are not recorded.
    pub fn apply(&mut self, doc: &mut TableDocument, op: TableOp) -> OpOutcome {
        let inverse = op.inverse(doc);
        let outcome = doc.apply(&op);
        if !outcome.is_applied() {
            return outcome;
        }
        let Some(inverse) = inverse else {
            debug!("applied op had no inverse, not recorded");
            return outcome;
        };

        if let Some(batch) = &mut self.current_batch {
            batch.record(op, inverse);
            return outcome;
        }

        let now = Instant::now();
        let coalesce = self
            .last_push
            .is_some_and(|at| now.duration_since(at) < self.capture_window);
        if coalesce {
            if let Some(last) = self.undo_stack.last_mut() {
                last.record(op, inverse);
                self.last_push = Some(now);
                self.redo_stack.clear();
                return outcome;
            }
        }

        let mut batch = OpBatch::default();
        batch.record(op, inverse);
        self.push_batch(batch);
        self.last_push = Some(now);
        outcome
    }

    /// Start grouping subsequent ops into one undo step.
    pub fn begin_batch(&mut self, description: Option<&str>) {
        self.current_batch = Some(OpBatch {
            description: description.map(str::to_string),
            ..Default::default()
        });
    }

    /// Close the open group. An empty group leaves the stacks untouched.
    pub fn end_batch(&mut self) {
        if let Some(batch) = self.current_batch.take() {
            if !batch.is_empty() {
                self.push_batch(batch);
                self.last_push = None;
            }
        }
    }

    fn push_batch(&mut self, batch: OpBatch) {
        self.undo_stack.push(batch);
        if self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    /// Revert the most recent step. Returns false when there is nothing
    /// to undo.
    pub fn undo(&mut self, doc: &mut TableDocument) -> bool {
        let Some(batch) = self.undo_stack.pop() else {
            return false;
        };
        for inverse in &batch.inverses {
            doc.apply(inverse);
        }
        self.redo_stack.push(batch);
        self.last_push = None;
        true
    }

    /// Reapply the most recently undone step. Returns false when there is
    /// nothing to redo.
    pub fn redo(&mut self, doc: &mut TableDocument) -> bool {
        let Some(batch) = self.redo_stack.pop() else {
            return false;
        };
        for op in &batch.ops {
            doc.apply(op);
        }
        self.undo_stack.push(batch);
        self.last_push = None;
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_batch = None;
        self.last_push = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;
    use crate::document::ColumnSpec;
    use crate::value::CellValue;

    fn doc() -> TableDocument {
        let mut doc = TableDocument::new(TableConfig::default());
        doc.insert_columns(0, &[ColumnSpec::new("Name")]);
        doc.insert_rows(
            0,
            &[[("Name".to_string(), CellValue::from("Ada"))]
                .into_iter()
                .collect()],
        );
        doc
    }

    fn set_cell(value: &str) -> TableOp {
        TableOp::UpdateCell {
            row_index: 0,
            column: "Name".to_string(),
            value: CellValue::from(value),
        }
    }

    #[test]
    fn test_undo_and_redo_single_edit() {
        let mut doc = doc();
        let mut stack = UndoStack::new(Duration::ZERO);

        assert!(stack.apply(&mut doc, set_cell("Grace")).is_applied());
        assert_eq!(doc.cell(0, "Name"), Some(CellValue::from("Grace")));

        assert!(stack.undo(&mut doc));
        assert_eq!(doc.cell(0, "Name"), Some(CellValue::from("Ada")));

        assert!(stack.redo(&mut doc));
        assert_eq!(doc.cell(0, "Name"), Some(CellValue::from("Grace")));
    }

    #[test]
    fn test_zero_window_keeps_edits_separate() {
        let mut doc = doc();
        let mut stack = UndoStack::new(Duration::ZERO);
        stack.apply(&mut doc, set_cell("one"));
        stack.apply(&mut doc, set_cell("two"));
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn test_rapid_edits_coalesce_into_one_step() {
        let mut doc = doc();
        let mut stack = UndoStack::new(Duration::from_secs(60));
        stack.apply(&mut doc, set_cell("one"));
        stack.apply(&mut doc, set_cell("two"));
        assert_eq!(stack.depth(), 1);

        assert!(stack.undo(&mut doc));
        assert_eq!(doc.cell(0, "Name"), Some(CellValue::from("Ada")));
    }

    #[test]
    fn test_explicit_batch_is_one_step() {
        let mut doc = doc();
        let mut stack = UndoStack::new(Duration::ZERO);

        stack.begin_batch(Some("structure edit"));
        stack.apply(
            &mut doc,
            TableOp::InsertColumns {
                at: 1,
                columns: vec![ColumnSpec::new("Age")],
            },
        );
        stack.apply(&mut doc, set_cell("Grace"));
        stack.end_batch();

        assert_eq!(stack.depth(), 1);
        assert!(stack.undo(&mut doc));
        assert_eq!(doc.headers(), vec!["Name"]);
        assert_eq!(doc.cell(0, "Name"), Some(CellValue::from("Ada")));
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut doc = doc();
        let mut stack = UndoStack::new(Duration::ZERO);
        stack.apply(&mut doc, set_cell("one"));
        stack.undo(&mut doc);
        assert!(stack.can_redo());

        stack.apply(&mut doc, set_cell("fresh"));
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_noops_are_not_recorded() {
        let mut doc = doc();
        let mut stack = UndoStack::new(Duration::ZERO);
        stack.apply(&mut doc, TableOp::DeleteRows { indices: vec![99] });
        assert!(!stack.can_undo());
    }

    #[test]
    fn test_max_levels_drops_oldest() {
        let mut doc = doc();
        let mut stack = UndoStack::new(Duration::ZERO).with_max_levels(2);
        stack.apply(&mut doc, set_cell("one"));
        stack.apply(&mut doc, set_cell("two"));
        stack.apply(&mut doc, set_cell("three"));
        assert_eq!(stack.depth(), 2);

        assert!(stack.undo(&mut doc));
        assert!(stack.undo(&mut doc));
        assert!(!stack.undo(&mut doc));
        // the oldest step fell off, so the first edit survives
        assert_eq!(doc.cell(0, "Name"), Some(CellValue::from("one")));
    }

    #[test]
    fn test_structural_undo_roundtrip() {
        let mut doc = doc();
        let mut stack = UndoStack::new(Duration::ZERO);
        let before = doc.view();

        stack.apply(
            &mut doc,
            TableOp::DeleteColumns {
                indices: vec![0],
            },
        );
        assert_eq!(doc.column_count(), 0);
        assert!(stack.undo(&mut doc));
        assert_eq!(doc.view(), before);
    }
}
