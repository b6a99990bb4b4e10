use plate_table::table::{Grid, cell_node, row_node};
use plate_table::{
    Document, Editor, ElementNode, Node, Op, PluginRegistry, Point, Selection, Transaction,
};
use pretty_assertions::assert_eq;

fn table_editor(row: usize, cell: usize) -> Editor {
    // a a b
    // a a c
    // d e f
    let keyed = |key: &str, row_span, col_span| {
        cell_node(key, row_span, col_span, vec![Node::paragraph(key)])
    };
    let table = Node::Element(ElementNode {
        kind: "table".to_string(),
        attrs: Default::default(),
        children: vec![
            row_node(vec![keyed("a", 2, 2), keyed("b", 1, 1)]),
            row_node(vec![keyed("c", 1, 1)]),
            row_node(vec![keyed("d", 1, 1), keyed("e", 1, 1), keyed("f", 1, 1)]),
        ],
    });
    let doc = Document {
        children: vec![table, Node::paragraph("tail")],
    };
    Editor::new(
        doc,
        Selection::collapsed(Point::new(vec![0, row, cell, 0, 0], 0)),
        PluginRegistry::table(),
    )
}

/// Runs `id`, then checks that undo restores the document and selection and
/// that redo restores the edited state.
fn assert_round_trips(mut editor: Editor, id: &str, args: Option<serde_json::Value>) {
    let doc_before = editor.doc().clone();
    let selection_before = editor.selection().clone();

    editor.run_command(id, args).unwrap();
    assert!(editor.can_undo(), "{id} applied nothing");
    let doc_after = editor.doc().clone();
    let selection_after = editor.selection().clone();
    assert_ne!(doc_after, doc_before);

    assert!(editor.undo());
    assert_eq!(editor.doc(), &doc_before, "undo of {id}");
    assert_eq!(editor.selection(), &selection_before);
    assert!(!editor.can_undo());

    assert!(editor.redo());
    assert_eq!(editor.doc(), &doc_after, "redo of {id}");
    assert_eq!(editor.selection(), &selection_after);
    if let Some(table) = editor.doc().element(&[0]).filter(|el| el.kind == "table") {
        Grid::build(table).unwrap();
    }
}

#[test]
fn structural_commands_undo_and_redo() {
    for id in [
        "table.insert_row_above",
        "table.insert_row_below",
        "table.insert_col_left",
        "table.insert_col_right",
        "table.delete_row",
        "table.delete_col",
        "table.delete_table",
    ] {
        assert_round_trips(table_editor(0, 0), id, None);
        assert_round_trips(table_editor(1, 0), id, None);
    }
    assert_round_trips(table_editor(0, 0), "table.split", None);
}

#[test]
fn merge_undo_restores_moved_content() {
    assert_round_trips(
        table_editor(2, 0),
        "table.merge",
        Some(serde_json::json!({ "anchor": [2, 0], "focus": [2, 2] })),
    );
    assert_round_trips(
        table_editor(0, 0),
        "table.merge",
        Some(serde_json::json!({ "range": { "rows": [0, 3], "cols": [0, 3] } })),
    );
}

#[test]
fn table_insert_undoes_as_one_step() {
    let mut editor = Editor::with_table_plugins();
    editor.run_command("table.insert", None).unwrap();
    assert_eq!(editor.doc().children.len(), 3);

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("")]);
    assert_eq!(editor.selection().focus.path, vec![0, 0]);
}

#[test]
fn failed_transactions_leave_no_trace() {
    let mut editor = table_editor(0, 0);
    let doc_before = editor.doc().clone();

    let tx = Transaction::new(vec![
        Op::RemoveNode { path: vec![0, 2] },
        Op::RemoveNode {
            path: vec![0, 9, 9],
        },
    ])
    .source("test:broken");
    assert!(editor.apply(tx).is_err());
    assert_eq!(editor.doc(), &doc_before);
    assert!(!editor.can_undo());
}

#[test]
fn undo_redo_handles_multi_op_insert_order() {
    let doc = Document {
        children: vec![Node::paragraph("")],
    };
    let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
    let mut editor = Editor::new(doc, selection, PluginRegistry::core());

    let tx = Transaction::new(vec![
        Op::InsertText {
            path: vec![0, 0],
            offset: 0,
            text: "a".to_string(),
        },
        Op::InsertNode {
            path: vec![1],
            node: Node::paragraph("b"),
        },
    ])
    .selection_after(Selection::collapsed(Point::new(vec![1, 0], 1)))
    .source("test:multi_insert");

    editor.apply(tx).unwrap();
    assert_eq!(
        editor.doc().children,
        vec![Node::paragraph("a"), Node::paragraph("b")]
    );

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("")]);
    assert_eq!(editor.selection().focus.offset, 0);

    assert!(editor.redo());
    assert_eq!(editor.selection().focus, Point::new(vec![1, 0], 1));
}
