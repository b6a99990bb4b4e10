// Property tests for structural table edits.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::HashMap;

use plate_table::table::{Grid, GridCoord, cell_node, row_node};
use plate_table::{Document, Editor, ElementNode, Node, PluginRegistry, Point, Selection};
use proptest::prelude::*;

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

const COMMANDS: [&str; 9] = [
    "table.insert_row_above",
    "table.insert_row_below",
    "table.insert_col_left",
    "table.insert_col_right",
    "table.delete_row",
    "table.delete_col",
    "table.merge",
    "table.split",
    "table.merge",
];

/// One edit: a command index and four raw numbers folded into a range of
/// whatever grid the edit runs against.
type Step = (usize, u8, u8, u8, u8);

fn arb_step() -> impl Strategy<Value = Step> {
    (0..COMMANDS.len(), any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>())
}

fn editor(rows: usize, cols: usize) -> Editor {
    let table = Node::Element(ElementNode {
        kind: "table".to_string(),
        attrs: Default::default(),
        children: (0..rows)
            .map(|r| {
                row_node(
                    (0..cols)
                        .map(|c| {
                            let key = format!("r{r}c{c}");
                            cell_node(&key, 1, 1, vec![Node::paragraph(&key)])
                        })
                        .collect(),
                )
            })
            .collect(),
    });
    let doc = Document {
        children: vec![Node::paragraph("before"), table, Node::paragraph("after")],
    };
    Editor::new(
        doc,
        Selection::collapsed(Point::new(vec![1, 0, 0, 0, 0], 0)),
        PluginRegistry::table(),
    )
}

fn table_grid(editor: &Editor) -> Option<Grid> {
    let table = editor.doc().element(&[1]).filter(|el| el.kind == "table")?;
    Some(Grid::build(table).unwrap())
}

fn fold(len: usize, start: u8, extent: u8) -> [usize; 2] {
    let start = start as usize % len;
    [start, start + 1 + extent as usize % (len - start)]
}

fn range_args(grid: &Grid, step: Step) -> serde_json::Value {
    let (_, r0, r1, c0, c1) = step;
    serde_json::json!({
        "table": [1],
        "range": {
            "rows": fold(grid.rows(), r0, r1),
            "cols": fold(grid.cols(), c0, c1),
        }
    })
}

/// Runs the steps, stopping early if an edit removes the table.
fn run_steps(editor: &mut Editor, steps: &[Step]) {
    for step in steps {
        let Some(grid) = table_grid(editor) else {
            return;
        };
        let args = range_args(&grid, *step);
        editor.run_command(COMMANDS[step.0], Some(args)).unwrap();
    }
}

proptest! {
    #![proptest_config(config_256())]

    /// Every edit leaves a table the grid builder accepts, or no table.
    #[test]
    fn edits_keep_the_grid_rectangular(
        rows in 1usize..5,
        cols in 1usize..5,
        steps in prop::collection::vec(arb_step(), 0..12),
    ) {
        let mut editor = editor(rows, cols);
        for step in &steps {
            let Some(grid) = table_grid(&editor) else {
                prop_assert_eq!(editor.doc().element(&[1]).map(|el| el.kind.as_str()), Some("paragraph"));
                break;
            };
            let args = range_args(&grid, *step);
            editor.run_command(COMMANDS[step.0], Some(args)).unwrap();

            if let Some(grid) = table_grid(&editor) {
                let area: usize = grid.cells().iter().map(|c| c.row_span * c.col_span).sum();
                prop_assert_eq!(area, grid.rows() * grid.cols());
                prop_assert!(
                    (0..grid.rows()).all(|r| (0..grid.cols()).any(|c| {
                        grid.cell_at(GridCoord::new(r, c)).is_some_and(|cell| cell.origin.row == r)
                    })),
                    "a row holds no cell origin"
                );
            }
        }
    }

    /// Inserting a row shifts cells at or below the line, grows only the
    /// cells that cross it, and never touches column geometry.
    #[test]
    fn row_insert_only_grows_crossing_cells(
        rows in 1usize..5,
        cols in 1usize..5,
        setup in prop::collection::vec(arb_step(), 0..8),
        at in any::<u8>(),
    ) {
        let mut editor = editor(rows, cols);
        run_steps(&mut editor, &setup);
        let Some(before) = table_grid(&editor) else {
            return Ok(());
        };
        let line = at as usize % before.rows();

        editor
            .run_command(
                "table.insert_row_above",
                Some(serde_json::json!({
                    "table": [1],
                    "range": { "rows": [line, line + 1], "cols": [0, before.cols()] },
                })),
            )
            .unwrap();
        let after = table_grid(&editor).unwrap();
        let by_key: HashMap<&str, _> = after.cells().iter().map(|c| (c.key.as_str(), c)).collect();

        let crossing = |start: usize, span: usize| start < line && line < start + span;
        let all_cross = (0..before.cols()).all(|c| {
            before
                .cell_at(GridCoord::new(line, c))
                .is_some_and(|cell| crossing(cell.origin.row, cell.row_span))
        });
        if all_cross {
            prop_assert_eq!(after.rows(), before.rows());
            return Ok(());
        }
        prop_assert_eq!(after.rows(), before.rows() + 1);
        prop_assert_eq!(after.cols(), before.cols());

        for cell in before.cells() {
            let moved = by_key.get(cell.key.as_str()).copied();
            prop_assert!(moved.is_some(), "cell {} vanished", cell.key);
            let moved = moved.unwrap();
            prop_assert_eq!(moved.col_span, cell.col_span);
            prop_assert_eq!(moved.origin.col, cell.origin.col);
            let grew = crossing(cell.origin.row, cell.row_span) as usize;
            prop_assert_eq!(moved.row_span, cell.row_span + grew);
            let shifted = (cell.origin.row >= line) as usize;
            prop_assert_eq!(moved.origin.row, cell.origin.row + shifted);
        }
    }
}
