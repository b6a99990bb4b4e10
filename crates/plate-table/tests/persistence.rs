use plate_table::table::Grid;
use plate_table::{EditorConfig, PlateValue, ValueError};

fn text(s: &str) -> serde_json::Value {
    serde_json::json!({ "node": "element", "kind": "paragraph", "children": [{ "node": "text", "text": s }] })
}

/// A table saved with an overlong row span, an empty cell and a
/// duplicated key.
fn saved_broken() -> serde_json::Value {
    serde_json::json!({
        "schema": "plate-table",
        "document": { "children": [
            text("intro"),
            { "node": "element", "kind": "table", "children": [
                { "node": "element", "kind": "table_row", "children": [
                    { "node": "element", "kind": "table_cell",
                      "attrs": { "key": "a", "row_span": 3 }, "children": [text("a")] },
                    { "node": "element", "kind": "table_cell", "attrs": { "key": "b" } },
                ]},
                { "node": "element", "kind": "table_row", "children": [
                    { "node": "element", "kind": "table_cell",
                      "attrs": { "key": "a" }, "children": [text("copy")] },
                ]},
            ]},
        ]},
    })
}

#[test]
fn loading_repairs_saved_tables() {
    let value = PlateValue::from_json_str(&saved_broken().to_string()).unwrap();
    assert_eq!(value.version, 1);

    let editor = value.into_editor(EditorConfig::default());
    let grid = Grid::build(editor.doc().element(&[1]).unwrap()).unwrap();
    assert_eq!((grid.rows(), grid.cols()), (2, 2));
    assert_eq!(grid.cells().len(), 3);
    assert_eq!(grid.cell_by_key("a").unwrap().row_span, 2);
    assert_eq!(editor.doc().text_of(&[1]), "acopy");
    assert!(!editor.can_undo());
}

#[test]
fn saved_documents_load_back_unchanged() {
    let mut editor = PlateValue::from_json_str(&saved_broken().to_string())
        .unwrap()
        .into_editor(EditorConfig::default());
    editor
        .run_command("table.insert_row_below", Some(serde_json::json!({ "table": [1], "cell": [1, 0] })))
        .unwrap_or_else(|err| panic!("{}", err.message()));
    let grid = Grid::build(editor.doc().element(&[1]).unwrap()).unwrap();
    assert_eq!(grid.rows(), 3);

    let json = editor.to_value().to_json_pretty().unwrap();
    let reloaded = PlateValue::from_json_str(&json)
        .unwrap()
        .into_editor(EditorConfig::default());
    assert_eq!(reloaded.doc(), editor.doc());
}

#[test]
fn foreign_envelopes_are_rejected() {
    let err = PlateValue::from_json_str(r#"{ "schema": "slate", "document": {} }"#).unwrap_err();
    assert!(matches!(err, ValueError::Unsupported { ref schema, .. } if schema == "slate"));

    let err = PlateValue::from_json_str(
        r#"{ "schema": "plate-table", "version": 7, "document": {} }"#,
    )
    .unwrap_err();
    assert!(matches!(err, ValueError::Unsupported { version: 7, .. }));

    let err = PlateValue::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, ValueError::Json(_)));
}

#[test]
fn oversized_spans_are_clamped_on_load() {
    let cell = |key: &str, row_span: u64, col_span: u64| {
        serde_json::json!({
            "node": "element", "kind": "table_cell",
            "attrs": { "key": key, "row_span": row_span, "col_span": col_span },
            "children": [text(key)],
        })
    };
    let saved = serde_json::json!({
        "document": { "children": [
            text("intro"),
            { "node": "element", "kind": "table", "children": [
                { "node": "element", "kind": "table_row", "children": [
                    cell("a", 1, 1), cell("b", 1, u64::MAX),
                ]},
                { "node": "element", "kind": "table_row", "children": [
                    cell("c", u64::MAX, u64::MAX), cell("d", 1, 1),
                ]},
            ]},
        ]},
    });

    let editor = PlateValue::from_json_str(&saved.to_string())
        .unwrap()
        .into_editor(EditorConfig::default());
    let grid = Grid::build(editor.doc().element(&[1]).unwrap()).unwrap();
    assert!(grid.cols() <= grid.cells().len());
    assert_eq!(grid.rows(), 2);
    assert_eq!(grid.cell_by_key("c").unwrap().row_span, 1);
    assert_eq!(editor.doc().text_of(&[1]), "abcd");
}
