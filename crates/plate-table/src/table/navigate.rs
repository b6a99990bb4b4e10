//! Up/down caret movement across cells.
//!
//! A caret in a tall cell leaves through the cell's top or bottom edge, not
//! through the next grid row, so moves are measured from the cell's rectangle.

use serde::{Deserialize, Serialize};

use crate::core::{Document, Point, Selection};
use crate::plugin::last_text_point;

use super::grid::{Grid, GridCoord, GridError};
use super::path::TableLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalDirection {
    Up,
    Down,
}

/// Where an up/down arrow press lands when the caret is in a table cell:
/// the end of the cell directly above or below, measured from the column the
/// caret's cell starts in. `None` when the caret is not in a table or the
/// move would leave it.
pub fn resolve_vertical_move(
    doc: &Document,
    selection: &Selection,
    direction: VerticalDirection,
) -> Result<Option<Point>, GridError> {
    let Some(location) = TableLocation::find(doc, &selection.focus.path) else {
        return Ok(None);
    };
    let (Some(addr), Some(table)) = (location.cell, location.table(doc)) else {
        return Ok(None);
    };
    let grid = Grid::build(table)?;
    let Some(cell) = grid.cell_at_addr(addr) else {
        return Ok(None);
    };

    let row = match direction {
        VerticalDirection::Up => cell.origin.row.checked_sub(1),
        VerticalDirection::Down => Some(cell.origin.row + cell.row_span),
    };
    let target = row
        .filter(|row| *row < grid.rows())
        .and_then(|row| grid.real_addr(GridCoord::new(row, cell.origin.col)));
    Ok(target.and_then(|addr| last_text_point(doc, &location.cell_path(addr))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Node;
    use crate::table::test_support::{cell, row, table};

    // a b
    // a c
    // d d
    fn doc() -> Document {
        Document {
            children: vec![Node::Element(table(vec![
                row(vec![cell("a", 2, 1), cell("b", 1, 1)]),
                row(vec![cell("c", 1, 1)]),
                row(vec![cell("dd", 1, 2)]),
            ]))],
        }
    }

    fn caret(path: Vec<usize>) -> Selection {
        Selection::collapsed(Point::new(path, 0))
    }

    #[test]
    fn moving_down_skips_the_rest_of_a_tall_cell() {
        let point = resolve_vertical_move(&doc(), &caret(vec![0, 0, 0, 0, 0]), VerticalDirection::Down)
            .unwrap()
            .unwrap();
        assert_eq!(point, Point::new(vec![0, 2, 0, 0, 0], 2));
    }

    #[test]
    fn moving_up_from_under_a_span_lands_in_its_owner() {
        let point = resolve_vertical_move(&doc(), &caret(vec![0, 2, 0, 0, 0]), VerticalDirection::Up)
            .unwrap()
            .unwrap();
        assert_eq!(point, Point::new(vec![0, 0, 0, 0, 0], 1));

        let point = resolve_vertical_move(&doc(), &caret(vec![0, 1, 0, 0, 0]), VerticalDirection::Up)
            .unwrap()
            .unwrap();
        assert_eq!(point, Point::new(vec![0, 0, 1, 0, 0], 1));
    }

    #[test]
    fn leaving_the_table_is_none() {
        let doc = doc();
        assert_eq!(
            resolve_vertical_move(&doc, &caret(vec![0, 0, 1, 0, 0]), VerticalDirection::Up),
            Ok(None)
        );
        assert_eq!(
            resolve_vertical_move(&doc, &caret(vec![0, 2, 0, 0, 0]), VerticalDirection::Down),
            Ok(None)
        );
    }
}
