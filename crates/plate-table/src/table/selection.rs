//! Turning host selections into grid rectangles.

use serde_json::Value;

use crate::core::{Document, Selection};

use super::grid::{CellAddr, CellRange, Grid};
use super::path::TableLocation;

/// What the host says is selected inside one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSelection {
    /// The caret (or a collapsed selection) sits in one cell.
    Cell(CellAddr),
    /// A drag selection from one cell to another.
    Cells { anchor: CellAddr, focus: CellAddr },
    /// An explicit rectangle of grid slots.
    Range(CellRange),
}

impl TableSelection {
    /// Derives the table and cell selection from editor anchor/focus points.
    /// Both points have to be inside cells of the same table.
    pub fn from_editor(doc: &Document, selection: &Selection) -> Option<(TableLocation, Self)> {
        let focus = TableLocation::find(doc, &selection.focus.path)?;
        let focus_cell = focus.cell?;
        let anchor_cell = focus.cell_addr(doc, &selection.anchor.path)?;
        let table_selection = if anchor_cell == focus_cell {
            TableSelection::Cell(focus_cell)
        } else {
            TableSelection::Cells {
                anchor: anchor_cell,
                focus: focus_cell,
            }
        };
        Some((focus, table_selection))
    }

    /// Reads `{"anchor": [row, cell], "focus": [row, cell]}`, `{"cell": [row,
    /// cell]}` or `{"range": {"rows": [start, end], "cols": [start, end]}}`.
    pub fn from_args(args: &Value) -> Option<Self> {
        if let Some(range) = args.get("range") {
            let rows = parse_pair(range.get("rows")?)?;
            let cols = parse_pair(range.get("cols")?)?;
            return Some(TableSelection::Range(CellRange::new(
                rows.0..rows.1,
                cols.0..cols.1,
            )));
        }
        if let Some(cell) = args.get("cell") {
            let (row, cell) = parse_pair(cell)?;
            return Some(TableSelection::Cell(CellAddr::new(row, cell)));
        }
        let anchor = parse_pair(args.get("anchor")?)?;
        let focus = args
            .get("focus")
            .and_then(parse_pair)
            .unwrap_or(anchor);
        let anchor = CellAddr::new(anchor.0, anchor.1);
        let focus = CellAddr::new(focus.0, focus.1);
        Some(if anchor == focus {
            TableSelection::Cell(anchor)
        } else {
            TableSelection::Cells { anchor, focus }
        })
    }

    /// The cell a caret-driven command treats as "current".
    pub fn anchor_addr(&self, grid: &Grid) -> Option<CellAddr> {
        match self {
            TableSelection::Cell(addr) | TableSelection::Cells { anchor: addr, .. } => {
                grid.cell_at_addr(*addr).map(|cell| cell.addr)
            }
            TableSelection::Range(range) => grid.real_addr(range.top_left()),
        }
    }

    /// The smallest rectangle holding every selected cell. Explicit ranges are
    /// clamped to the grid. `None` when nothing selected exists.
    pub fn resolve(&self, grid: &Grid) -> Option<CellRange> {
        match self {
            TableSelection::Cell(addr) => grid.range_of(*addr),
            TableSelection::Cells { anchor, focus } => {
                let anchor = grid.range_of(*anchor)?;
                let focus = grid.range_of(*focus)?;
                Some(anchor.union(&focus))
            }
            TableSelection::Range(range) => {
                let rows = range.rows.start..range.rows.end.min(grid.rows());
                let cols = range.cols.start..range.cols.end.min(grid.cols());
                let clamped = CellRange::new(rows, cols);
                (!clamped.is_empty()).then_some(clamped)
            }
        }
    }
}

impl CellRange {
    /// Every cell touching the range lies entirely inside it, i.e. each row of
    /// the rectangle has the same columns fully and exclusively covered.
    pub fn is_exact(&self, grid: &Grid) -> bool {
        grid.cells_in(self)
            .all(|cell| self.contains_range(&cell.range()))
    }
}

/// Keys of every cell touching `range`, in tree order.
pub fn keys_in(grid: &Grid, range: &CellRange) -> Vec<String> {
    grid.cells_in(range).map(|cell| cell.key.clone()).collect()
}

fn parse_pair(value: &Value) -> Option<(usize, usize)> {
    let [a, b] = value.as_array()?.as_slice() else {
        return None;
    };
    Some((a.as_u64()? as usize, b.as_u64()? as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Node, Point};
    use crate::table::test_support::{cell, row, table};

    // a a b
    // c d b
    fn grid() -> Grid {
        Grid::build(&table(vec![
            row(vec![cell("a", 1, 2), cell("b", 2, 1)]),
            row(vec![cell("c", 1, 1), cell("d", 1, 1)]),
        ]))
        .unwrap()
    }

    #[test]
    fn drag_selection_resolves_to_bounding_rectangle() {
        let grid = grid();
        let selection = TableSelection::Cells {
            anchor: CellAddr::new(1, 0),
            focus: CellAddr::new(0, 1),
        };
        let range = selection.resolve(&grid).unwrap();
        assert_eq!(range, CellRange::new(0..2, 0..3));
        assert!(range.is_exact(&grid));
        assert_eq!(keys_in(&grid, &range), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn range_cutting_through_a_span_is_not_exact() {
        let grid = grid();
        let range = TableSelection::Range(CellRange::new(0..2, 0..1))
            .resolve(&grid)
            .unwrap();
        assert!(!range.is_exact(&grid));

        let clamped = TableSelection::Range(CellRange::new(1..9, 0..2))
            .resolve(&grid)
            .unwrap();
        assert_eq!(clamped, CellRange::new(1..2, 0..2));
        assert!(clamped.is_exact(&grid));
        assert_eq!(
            TableSelection::Range(CellRange::new(5..9, 0..2)).resolve(&grid),
            None
        );
    }

    #[test]
    fn args_are_parsed_in_all_shapes() {
        assert_eq!(
            TableSelection::from_args(&serde_json::json!({ "cell": [1, 0] })),
            Some(TableSelection::Cell(CellAddr::new(1, 0)))
        );
        assert_eq!(
            TableSelection::from_args(&serde_json::json!({ "anchor": [0, 0], "focus": [1, 1] })),
            Some(TableSelection::Cells {
                anchor: CellAddr::new(0, 0),
                focus: CellAddr::new(1, 1)
            })
        );
        assert_eq!(
            TableSelection::from_args(
                &serde_json::json!({ "range": { "rows": [0, 2], "cols": [1, 3] } })
            ),
            Some(TableSelection::Range(CellRange::new(0..2, 1..3)))
        );
        assert_eq!(
            TableSelection::from_args(&serde_json::json!({ "rows": 2 })),
            None
        );
    }

    #[test]
    fn editor_points_in_different_cells_become_a_drag_selection() {
        let doc = Document {
            children: vec![Node::Element(table(vec![
                row(vec![cell("a", 1, 2), cell("b", 2, 1)]),
                row(vec![cell("c", 1, 1), cell("d", 1, 1)]),
            ]))],
        };
        let selection = Selection {
            anchor: Point::new(vec![0, 0, 0, 0, 0], 0),
            focus: Point::new(vec![0, 1, 1, 0, 0], 0),
        };
        let (location, table_selection) = TableSelection::from_editor(&doc, &selection).unwrap();
        assert_eq!(location.table_path, vec![0]);
        assert_eq!(
            table_selection,
            TableSelection::Cells {
                anchor: CellAddr::new(0, 0),
                focus: CellAddr::new(1, 1)
            }
        );
    }
}
