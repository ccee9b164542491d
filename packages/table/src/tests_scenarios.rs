//! End-to-end collaboration scenarios across two replicas.

use std::collections::HashMap;

use crate::{
    CellCoord, CellSuggestion, CellValue, ColumnSpec, TableConfig, TableDocument, TableOp,
};

fn record(entries: &[(&str, &str)]) -> HashMap<String, CellValue> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), CellValue::from(*v)))
        .collect()
}

fn people_table() -> TableDocument {
    let mut doc = TableDocument::new(TableConfig::default());
    doc.insert_columns(
        0,
        &[ColumnSpec::new("Name"), ColumnSpec::new("Field")],
    );
    doc.insert_rows(
        0,
        &[
            record(&[("Name", "Ada"), ("Field", "Mathematics")]),
            record(&[("Name", "Grace"), ("Field", "Computing")]),
            record(&[("Name", "Katherine"), ("Field", "Physics")]),
        ],
    );
    doc
}

fn replica_of(doc: &TableDocument) -> TableDocument {
    TableDocument::from_state(&doc.encode_state(), TableConfig::default()).unwrap()
}

fn sync(a: &mut TableDocument, b: &mut TableDocument) {
    let to_b = a.encode_delta(&b.state_vector()).unwrap();
    let to_a = b.encode_delta(&a.state_vector()).unwrap();
    b.apply_update(&to_b).unwrap();
    a.apply_update(&to_a).unwrap();
}

#[test]
fn test_concurrent_edits_to_different_cells_both_survive() {
    let mut a = people_table();
    let mut b = replica_of(&a);

    a.update_cell(0, "Field", CellValue::from("Analysis"));
    b.update_cell(1, "Field", CellValue::from("Compilers"));
    sync(&mut a, &mut b);

    assert_eq!(a.view(), b.view());
    assert_eq!(a.cell(0, "Field"), Some(CellValue::from("Analysis")));
    assert_eq!(a.cell(1, "Field"), Some(CellValue::from("Compilers")));
}

#[test]
fn test_concurrent_same_cell_converges_to_one_value() {
    let mut a = people_table();
    let mut b = replica_of(&a);

    a.update_cell(0, "Name", CellValue::from("from a"));
    b.update_cell(0, "Name", CellValue::from("from b"));
    sync(&mut a, &mut b);

    assert_eq!(a.view(), b.view());
    let winner = a.cell(0, "Name").unwrap();
    assert!(winner == CellValue::from("from a") || winner == CellValue::from("from b"));
}

#[test]
fn test_delete_concurrent_with_edit_does_not_resurrect_row() {
    let mut a = people_table();
    let mut b = replica_of(&a);

    // a deletes the Grace row while b edits it
    a.delete_rows(&[1]);
    b.update_cell(1, "Field", CellValue::from("Languages"));
    sync(&mut a, &mut b);

    assert_eq!(a.view(), b.view());
    assert_eq!(a.row_count(), 2);
    let names: Vec<CellValue> = (0..2).map(|i| a.cell(i, "Name").unwrap()).collect();
    assert!(!names.contains(&CellValue::from("Grace")));
}

#[test]
fn test_concurrent_inserts_at_same_position_keep_both_rows() {
    let mut a = people_table();
    let mut b = replica_of(&a);

    a.insert_rows(1, &[record(&[("Name", "inserted by a")])]);
    b.insert_rows(1, &[record(&[("Name", "inserted by b")])]);
    sync(&mut a, &mut b);

    assert_eq!(a.view(), b.view());
    assert_eq!(a.row_count(), 5);
    a.check_invariants().unwrap();
    b.check_invariants().unwrap();
}

#[test]
fn test_audit_flags_cell_written_into_concurrently_deleted_column() {
    let mut a = people_table();
    let mut b = replica_of(&a);

    // a drops the Field column while b writes a cell in it; the merged
    // row map keeps b's value under a column id no longer in the order
    a.delete_columns(&[1]);
    b.update_cell(0, "Field", CellValue::from("Topology"));
    sync(&mut a, &mut b);

    assert_eq!(a.view(), b.view());
    assert_eq!(a.headers(), vec!["Name"]);
    let err = a.check_invariants().unwrap_err();
    assert!(err.to_string().contains("unknown column"));
}

#[test]
fn test_rename_concurrent_with_reorder() {
    let mut a = people_table();
    let mut b = replica_of(&a);

    a.edit_header(1, "Discipline");
    b.reorder_column(1, 0);
    sync(&mut a, &mut b);

    assert_eq!(a.view(), b.view());
    // the renamed column moved, carrying its cells with it
    assert_eq!(a.headers(), vec!["Discipline", "Name"]);
    assert_eq!(a.cell(0, "Discipline"), Some(CellValue::from("Mathematics")));
}

#[test]
fn test_migration_then_collaboration() {
    let raw = yrs::Doc::new();
    crate::seed_legacy(
        &raw,
        &["Name", "Age"],
        &[("Age", 60.0)],
        &[vec![("Name", CellValue::from("Bob"))]],
    );
    let mut a = TableDocument::wrap(raw, TableConfig::default());
    a.check_invariants().unwrap();

    let mut b = replica_of(&a);
    b.update_cell(0, "Age", CellValue::Number(40.0));
    sync(&mut a, &mut b);

    let view = a.view();
    assert_eq!(view.headers, vec!["Name", "Age"]);
    assert_eq!(view.widths.get("Age"), Some(&60.0));
    assert_eq!(view.cell(0, 1), CellValue::Number(40.0));
}

#[test]
fn test_fill_batch_is_atomic_for_observers() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let mut doc = people_table();
    doc.insert_columns(2, &[ColumnSpec::new("Century")]);

    let partial_views = Arc::new(AtomicUsize::new(0));
    let seen = partial_views.clone();
    doc.subscribe(move |view| {
        // every notification must show all three fills or none
        let filled = (0..3)
            .filter(|r| !view.cell(*r, 2).is_empty())
            .count();
        if filled != 0 && filled != 3 {
            seen.fetch_add(1, Ordering::SeqCst);
        }
    });

    let anchor = CellCoord::new(0, 2);
    let targets = doc.column_fill_targets(anchor);
    assert_eq!(targets.len(), 2);

    doc.apply_suggestions(&[
        CellSuggestion {
            row_index: 0,
            col_index: 2,
            suggestion: "19th".to_string(),
        },
        CellSuggestion {
            row_index: 1,
            col_index: 2,
            suggestion: "20th".to_string(),
        },
        CellSuggestion {
            row_index: 2,
            col_index: 2,
            suggestion: "20th".to_string(),
        },
    ]);

    assert_eq!(partial_views.load(Ordering::SeqCst), 0);
    assert_eq!(doc.cell(2, "Century"), Some(CellValue::from("20th")));
}

#[test]
fn test_ops_replicate_like_direct_edits() {
    let mut a = people_table();
    let mut b = replica_of(&a);

    a.apply(&TableOp::InsertColumns {
        at: 2,
        columns: vec![ColumnSpec::new("Born").with_width(90.0)],
    });
    a.apply(&TableOp::UpdateCell {
        row_index: 0,
        column: "Born".to_string(),
        value: CellValue::Number(1815.0),
    });
    sync(&mut a, &mut b);

    assert_eq!(b.headers(), vec!["Name", "Field", "Born"]);
    assert_eq!(b.cell(0, "Born"), Some(CellValue::Number(1815.0)));
    assert_eq!(b.column_width_by_name("Born"), Some(90.0));
}

#[test]
fn test_invariants_hold_across_op_sequences() {
    let mut doc = people_table();
    let ops = [
        TableOp::InsertColumns {
            at: 0,
            columns: vec![ColumnSpec::new("Id")],
        },
        TableOp::ReorderColumn { from: 0, to: 2 },
        TableOp::DeleteRows { indices: vec![0, 2] },
        TableOp::EditHeader {
            index: 0,
            name: "Person".to_string(),
        },
        TableOp::InsertRows {
            at: 1,
            rows: vec![record(&[("Person", "Edsger")])],
        },
        TableOp::DeleteColumns { indices: vec![2] },
    ];
    for op in &ops {
        doc.apply(op);
        doc.check_invariants().unwrap();
    }
}

#[test]
fn test_view_serializes_for_the_wire() {
    let doc = people_table();
    let json = serde_json::to_value(doc.view()).unwrap();
    assert_eq!(json["headers"][0], "Name");
    assert_eq!(json["rows"][0]["Name"], "Ada");
    // widths are keyed by display name
    assert_eq!(json["widths"]["Name"], 150.0);
}
