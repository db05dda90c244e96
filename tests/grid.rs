//! Grid operation tests
//!
//! Structural column/row operations and worksheet operations, driven
//! through the edit session the way the runtime drives them.

mod common;

use std::collections::HashSet;

use common::{cells, parse, rows, serialize, session, ITEMS, ORDERS};
use xmlgrid::commands::{Cmd, Notice};
use xmlgrid::grid::{GridError, Placement};
use xmlgrid::messages::GridMsg;
use xmlgrid::EditSession;

fn rejected(outcome_cmds: &[Cmd]) -> Option<&GridError> {
    outcome_cmds.iter().find_map(|cmd| match cmd {
        Cmd::Notify(Notice::Rejected(err)) => Some(err),
        _ => None,
    })
}

fn row_keys(s: &EditSession) -> Vec<Vec<String>> {
    let table = s.active_table().unwrap();
    table
        .rows(s.tree())
        .unwrap()
        .iter()
        .map(|row| row.as_object().unwrap().keys().map(str::to_string).collect())
        .collect()
}

// ========================================================================
// Columns
// ========================================================================

#[test]
fn test_add_columns_keeps_table_identity() {
    let mut s = session(ITEMS);
    let before = s.active_table().unwrap().clone();
    let outcome = s.dispatch(GridMsg::AddColumns(1));
    assert!(outcome.sync);

    let after = s.active_table().unwrap();
    assert_eq!(after.name, before.name);
    assert_eq!(after.path, before.path);
    assert_eq!(
        cells(&s),
        rows(&[&["1", "2", ""], &["3", "4", ""]])
    );
    assert!(row_keys(&s).iter().all(|keys| keys.contains(&"NewColumn1".to_string())));
}

#[test]
fn test_column_order_has_no_duplicates_after_mixed_operations() {
    let mut s = session(ITEMS);
    s.dispatch(GridMsg::AddColumns(2));
    s.dispatch(GridMsg::RenameColumn {
        old: "NewColumn1".into(),
        new: "price".into(),
    });
    s.dispatch(GridMsg::MoveColumn {
        key: "price".into(),
        target: "a".into(),
        placement: Placement::Before,
    });
    s.dispatch(GridMsg::AddColumns(1));
    s.dispatch(GridMsg::MoveColumn {
        key: "b".into(),
        target: "NewColumn1".into(),
        placement: Placement::After,
    });

    let order = s.column_keys();
    let unique: HashSet<&String> = order.iter().collect();
    assert_eq!(unique.len(), order.len());
    for keys in row_keys(&s) {
        for key in keys {
            assert!(order.contains(&key), "{} missing from column order", key);
        }
    }
    // The renamed key's name was free again for the third column
    assert_eq!(order, vec!["price", "a", "NewColumn2", "NewColumn1", "b"]);
}

#[test]
fn test_move_column_rewrites_serialized_order() {
    let mut s = session(ITEMS);
    s.dispatch(GridMsg::MoveColumn {
        key: "b".into(),
        target: "a".into(),
        placement: Placement::Before,
    });
    let text = serialize(s.tree());
    let b = text.find("<b>").unwrap();
    let a = text.find("<a>").unwrap();
    assert!(b < a);
}

#[test]
fn test_rename_column_rejects_before_mutating() {
    let mut s = session(ITEMS);
    let tree = s.tree().clone();

    let outcome = s.dispatch(GridMsg::RenameColumn {
        old: "a".into(),
        new: "two words".into(),
    });
    assert!(matches!(rejected(&outcome.cmds), Some(GridError::Validation(_))));

    let outcome = s.dispatch(GridMsg::RenameColumn {
        old: "a".into(),
        new: "b".into(),
    });
    assert!(matches!(
        rejected(&outcome.cmds),
        Some(GridError::StructuralConflict(_))
    ));
    assert!(!outcome.sync);
    assert_eq!(s.tree(), &tree);
}

#[test]
fn test_invalid_rename_leaves_pending_edit_open() {
    let mut s = session(ITEMS);
    let tree = s.tree().clone();
    s.dispatch(GridMsg::StartEdit {
        row: 0,
        col: 0,
        initial: Some("x".into()),
    });

    let outcome = s.dispatch(GridMsg::RenameColumn {
        old: "a".into(),
        new: "".into(),
    });
    assert!(matches!(rejected(&outcome.cmds), Some(GridError::Validation(_))));
    assert!(!outcome.sync);
    assert_eq!(s.tree(), &tree);
    assert_eq!(s.edit_cursor().unwrap().buffer.text(), "x");
}

#[test]
fn test_conflicting_rename_still_syncs_committed_edit() {
    let mut s = session(ITEMS);
    s.dispatch(GridMsg::StartEdit {
        row: 0,
        col: 0,
        initial: Some("x".into()),
    });

    let outcome = s.dispatch(GridMsg::RenameColumn {
        old: "a".into(),
        new: "b".into(),
    });
    assert!(matches!(
        rejected(&outcome.cmds),
        Some(GridError::StructuralConflict(_))
    ));
    assert!(outcome.sync);
    assert!(!s.is_editing());
    assert_eq!(s.cell_text(0, 0), "x");
    assert_eq!(s.column_keys(), vec!["a", "b"]);
}

#[test]
fn test_rename_column_trims_new_name() {
    let mut s = session(ITEMS);
    s.dispatch(GridMsg::RenameColumn {
        old: "a".into(),
        new: "  alpha ".into(),
    });
    assert_eq!(s.column_keys(), vec!["alpha", "b"]);
}

#[test]
fn test_delete_unknown_column_is_conflict() {
    let mut s = session(ITEMS);
    let outcome = s.dispatch(GridMsg::DeleteColumn("zzz".into()));
    assert!(matches!(
        rejected(&outcome.cmds),
        Some(GridError::StructuralConflict(_))
    ));
}

#[test]
fn test_mixed_cell_keeps_attributes_on_write() {
    let mut s = session(
        "<R><I><a unit=\"kg\">5</a></I><I><a unit=\"g\">7</a></I></R>",
    );
    assert_eq!(s.cell_text(0, 0), "5");
    s.dispatch(GridMsg::SetCell {
        row: 0,
        col: 0,
        value: "6".into(),
    });
    let text = serialize(s.tree());
    assert!(text.contains("<a unit=\"kg\">6</a>"), "{}", text);
}

// ========================================================================
// Rows
// ========================================================================

#[test]
fn test_move_row_after_uses_original_index() {
    let mut s = session(
        "<R><I><v>0</v></I><I><v>1</v></I><I><v>2</v></I><I><v>3</v></I><I><v>4</v></I></R>",
    );
    s.dispatch(GridMsg::MoveRow {
        from: 0,
        target: 3,
        placement: Placement::After,
    });
    assert_eq!(cells(&s), rows(&[&["1"], &["2"], &["3"], &["0"], &["4"]]));
}

#[test]
fn test_add_rows_clone_first_row_keys() {
    let mut s = session(ITEMS);
    s.dispatch(GridMsg::AddRows(2));
    assert_eq!(s.row_count(), 4);
    assert_eq!(row_keys(&s)[3], vec!["a", "b"]);
}

#[test]
fn test_frozen_counts_are_view_only() {
    let mut s = session(ITEMS);
    let outcome = s.dispatch(GridMsg::SetFrozenRows(10));
    assert!(!outcome.sync);
    assert!(outcome.redraw);
    assert_eq!(s.view_state("Item").unwrap().frozen_rows, 2);
    s.dispatch(GridMsg::SetFrozenRows(0));
    assert_eq!(s.view_state("Item").unwrap().frozen_rows, 0);
}

// ========================================================================
// Worksheets
// ========================================================================

#[test]
fn test_rename_table_keeps_it_active() {
    let mut s = session(ORDERS);
    s.dispatch(GridMsg::SelectTable(1));
    s.dispatch(GridMsg::SetFrozenCols(1));
    let outcome = s.dispatch(GridMsg::RenameTable {
        index: 0,
        name: "Purchase".into(),
    });
    assert!(outcome.sync);
    assert_eq!(s.tables()[0].name, "Purchase");
    assert_eq!(s.active_table().unwrap().name, "Line");
    assert!(serialize(s.tree()).contains("<Purchase id=\"1\">"));
}

#[test]
fn test_rename_one_of_shared_tables_forks_view_state() {
    let mut s = session(ORDERS);
    s.dispatch(GridMsg::SelectTable(1));
    s.dispatch(GridMsg::SetFrozenCols(1));
    let outcome = s.dispatch(GridMsg::RenameTable {
        index: 1,
        name: "Item".into(),
    });
    assert!(outcome.sync);
    assert_eq!(s.active_table().unwrap().name, "Item");
    assert_eq!(s.view_state("Item").unwrap().frozen_cols, 1);

    s.dispatch(GridMsg::SetFrozenCols(0));
    assert_eq!(s.view_state("Item").unwrap().frozen_cols, 0);
    // The other order's lines keep their own state
    assert_eq!(s.view_state("Line").unwrap().frozen_cols, 1);
    assert!(s.tables().iter().any(|t| t.name == "Line"));
}

#[test]
fn test_rename_table_to_sibling_name_conflicts() {
    let mut s = session("<R><A><x>1</x></A><A><x>2</x></A><B><y>1</y></B><B><y>2</y></B></R>");
    let outcome = s.dispatch(GridMsg::RenameTable {
        index: 0,
        name: "B".into(),
    });
    assert!(matches!(
        rejected(&outcome.cmds),
        Some(GridError::StructuralConflict(_))
    ));
}

#[test]
fn test_delete_active_table_selects_previous() {
    let mut s = session("<R><A><x>1</x></A><A><x>2</x></A><B><y>1</y></B><B><y>2</y></B></R>");
    s.dispatch(GridMsg::SelectTable(1));
    s.dispatch(GridMsg::DeleteTable(1));
    assert_eq!(s.tables().len(), 1);
    assert_eq!(s.active_table().unwrap().name, "A");
}

#[test]
fn test_delete_table_removes_empty_container() {
    let mut s = session(
        "<R><Box><I><a>1</a></I><I><a>2</a></I></Box><J><b>1</b></J><J><b>2</b></J></R>",
    );
    s.dispatch(GridMsg::DeleteTable(0));
    let text = serialize(s.tree());
    assert!(!text.contains("Box"), "{}", text);
    assert_eq!(s.tables().len(), 1);
}

#[test]
fn test_add_table_becomes_active() {
    let mut s = session(ITEMS);
    let outcome = s.dispatch(GridMsg::AddTable {
        container: "People".into(),
        row_name: "Person".into(),
    });
    assert!(outcome.sync);
    let table = s.active_table().unwrap();
    assert_eq!(table.name, "Person");
    assert_eq!(table.path.to_string(), "Items/People/Person");
    assert_eq!(cells(&s), rows(&[&["Data"], &["Data"]]));

    let reparsed = parse(&serialize(s.tree()));
    assert_eq!(&reparsed, s.tree());
}

#[test]
fn test_add_table_existing_container_conflicts() {
    let mut s = session(ITEMS);
    let outcome = s.dispatch(GridMsg::AddTable {
        container: "Item".into(),
        row_name: "Row".into(),
    });
    assert!(matches!(
        rejected(&outcome.cmds),
        Some(GridError::StructuralConflict(_))
    ));
}
