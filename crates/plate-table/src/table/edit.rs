//! Structural table edits.
//!
//! Each edit returns the transaction to apply, or `None` when the selection
//! gives it nothing to do. A `GridError` means the table was already broken
//! when the edit started.

use crate::core::{Document, Node, Point, Selection};
use crate::ops::{Op, Path, Transaction};

use super::grid::{CellAddr, CellRange, Grid, GridCoord, GridError};
use super::layout::{Axis, Layout};
use super::path::TableLocation;
use super::{TableTarget, is_effectively_empty, table_node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Before,
    After,
}

fn prepare(doc: &Document, target: &TableTarget) -> Result<Option<(Grid, CellRange)>, GridError> {
    let Some(table) = target.location.table(doc) else {
        return Ok(None);
    };
    let grid = Grid::build(table)?;
    Ok(target.selection.resolve(&grid).map(|range| (grid, range)))
}

fn band(range: &CellRange, axis: Axis) -> std::ops::Range<usize> {
    match axis {
        Axis::Row => range.rows.clone(),
        Axis::Col => range.cols.clone(),
    }
}

/// A caret at the start of the cell; the editor settles it on the first text
/// leaf inside.
fn caret_in(location: &TableLocation, addr: CellAddr) -> Selection {
    Selection::collapsed(Point::new(location.cell_path(addr), 0))
}

fn insert_line(
    doc: &Document,
    target: &TableTarget,
    axis: Axis,
    side: Side,
    source: &str,
) -> Result<Option<Transaction>, GridError> {
    let Some((grid, range)) = prepare(doc, target)? else {
        return Ok(None);
    };
    let band = band(&range, axis);
    let (at, reference) = match side {
        Side::Before => (band.start, band.start),
        Side::After => (band.end, band.end - 1),
    };

    let mut layout = Layout::from_grid(&grid);
    let created = layout.insert_line(axis, at, reference);
    let Some(first) = created.first() else {
        return Ok(None);
    };
    layout.validate()?;

    let caret = layout.addr_of(first).map(|addr| caret_in(&target.location, addr));
    let ops = layout.into_ops(doc, &grid, &target.location);
    Ok(Some(finish(ops, caret, source)))
}

fn remove_band(
    doc: &Document,
    target: &TableTarget,
    axis: Axis,
    source: &str,
) -> Result<Option<Transaction>, GridError> {
    let Some((grid, range)) = prepare(doc, target)? else {
        return Ok(None);
    };
    let band = band(&range, axis);

    let mut layout = Layout::from_grid(&grid);
    layout.remove_band(axis, band.clone());
    layout.collapse();
    if layout.is_empty() {
        log::debug!("{source}: no cells left, removing the table");
        return Ok(Some(replace_table(&target.location, source)));
    }
    layout.validate()?;

    let last_row = layout.rows() - 1;
    let last_col = layout.cols() - 1;
    let coord = match axis {
        Axis::Row => GridCoord::new(band.start.min(last_row), range.cols.start.min(last_col)),
        Axis::Col => GridCoord::new(range.rows.start.min(last_row), band.start.min(last_col)),
    };
    let caret = layout
        .owner(coord)
        .and_then(|cell| layout.addr_of(&cell.key))
        .map(|addr| caret_in(&target.location, addr));
    let ops = layout.into_ops(doc, &grid, &target.location);
    Ok(Some(finish(ops, caret, source)))
}

fn finish(ops: Vec<Op>, caret: Option<Selection>, source: &str) -> Transaction {
    let tx = Transaction::new(ops).source(format!("command:{source}"));
    match caret {
        Some(caret) => tx.selection_after(caret),
        None => tx,
    }
}

fn replace_table(location: &TableLocation, source: &str) -> Transaction {
    let mut caret: Path = location.table_path.clone();
    caret.push(0);
    Transaction::new(vec![
        Op::RemoveNode {
            path: location.table_path.clone(),
        },
        Op::InsertNode {
            path: location.table_path.clone(),
            node: Node::paragraph(""),
        },
    ])
    .selection_after(Selection::collapsed(Point::new(caret, 0)))
    .source(format!("command:{source}"))
}

pub fn insert_row_above(
    doc: &Document,
    target: &TableTarget,
) -> Result<Option<Transaction>, GridError> {
    insert_line(doc, target, Axis::Row, Side::Before, "table.insert_row_above")
}

pub fn insert_row_below(
    doc: &Document,
    target: &TableTarget,
) -> Result<Option<Transaction>, GridError> {
    insert_line(doc, target, Axis::Row, Side::After, "table.insert_row_below")
}

pub fn insert_col_left(
    doc: &Document,
    target: &TableTarget,
) -> Result<Option<Transaction>, GridError> {
    insert_line(doc, target, Axis::Col, Side::Before, "table.insert_col_left")
}

pub fn insert_col_right(
    doc: &Document,
    target: &TableTarget,
) -> Result<Option<Transaction>, GridError> {
    insert_line(doc, target, Axis::Col, Side::After, "table.insert_col_right")
}

/// Removes every row the selection touches. Removing the last row removes
/// the table.
pub fn delete_row(doc: &Document, target: &TableTarget) -> Result<Option<Transaction>, GridError> {
    remove_band(doc, target, Axis::Row, "table.delete_row")
}

pub fn delete_col(doc: &Document, target: &TableTarget) -> Result<Option<Transaction>, GridError> {
    remove_band(doc, target, Axis::Col, "table.delete_col")
}

/// Merges the selected rectangle into its top-left cell. The rectangle must
/// not cut through any cell and must hold at least two cells.
pub fn merge_cells(
    doc: &Document,
    target: &TableTarget,
) -> Result<Option<Transaction>, GridError> {
    let Some((grid, range)) = prepare(doc, target)? else {
        return Ok(None);
    };
    if !range.is_exact(&grid) {
        log::debug!("table.merge: {range:?} cuts through a merged cell");
        return Ok(None);
    }
    let cells: Vec<_> = grid.cells_in(&range).collect();
    if cells.len() < 2 {
        return Ok(None);
    }
    let Some(anchor) = grid.cell_at(range.top_left()) else {
        return Ok(None);
    };

    let mut moved = Vec::new();
    for cell in cells.iter().filter(|cell| cell.key != anchor.key) {
        let Some(el) = doc.element(&target.location.cell_path(cell.addr)) else {
            continue;
        };
        if !is_effectively_empty(el) {
            moved.extend(el.children.iter().cloned());
        }
    }

    let mut layout = Layout::from_grid(&grid);
    layout.merge(&range, &anchor.key, moved);
    layout.collapse();
    layout.validate()?;

    let caret = layout
        .addr_of(&anchor.key)
        .map(|addr| caret_in(&target.location, addr));
    let ops = layout.into_ops(doc, &grid, &target.location);
    Ok(Some(finish(ops, caret, "table.merge")))
}

/// Splits every merged cell the selection touches into single cells. The
/// content stays in the top-left one.
pub fn split_cells(
    doc: &Document,
    target: &TableTarget,
) -> Result<Option<Transaction>, GridError> {
    let Some((grid, range)) = prepare(doc, target)? else {
        return Ok(None);
    };
    let merged: Vec<String> = grid
        .cells_in(&range)
        .filter(|cell| cell.is_merged())
        .map(|cell| cell.key.clone())
        .collect();
    let Some(first) = merged.first() else {
        return Ok(None);
    };

    let mut layout = Layout::from_grid(&grid);
    layout.split(&merged);
    layout.validate()?;

    let caret = layout
        .addr_of(first)
        .map(|addr| caret_in(&target.location, addr));
    let ops = layout.into_ops(doc, &grid, &target.location);
    Ok(Some(finish(ops, caret, "table.split")))
}

/// Inserts a `rows` x `cols` table after the block holding the caret, plus an
/// empty paragraph after it. `None` for an expanded selection or a caret that
/// is already inside a table.
pub fn insert_table(
    doc: &Document,
    selection: &Selection,
    rows: usize,
    cols: usize,
) -> Option<Transaction> {
    if !selection.is_collapsed() || TableLocation::find(doc, &selection.focus.path).is_some() {
        return None;
    }

    let block_path = selection
        .focus
        .path
        .split_last()
        .map_or(&[][..], |(_, block)| block);
    let (parent_path, insert_at) = match block_path.split_last() {
        Some((block_ix, parent)) => (parent.to_vec(), block_ix + 1),
        None => (Vec::new(), doc.children.len()),
    };

    let mut table_path = parent_path.clone();
    table_path.push(insert_at);
    let mut paragraph_path = parent_path;
    paragraph_path.push(insert_at + 1);

    let mut caret = table_path.clone();
    caret.extend([0, 0, 0, 0]);

    Some(
        Transaction::new(vec![
            Op::InsertNode {
                path: table_path,
                node: table_node(rows, cols),
            },
            Op::InsertNode {
                path: paragraph_path,
                node: Node::paragraph(""),
            },
        ])
        .selection_after(Selection::collapsed(Point::new(caret, 0)))
        .source("command:table.insert"),
    )
}

/// Replaces the table with an empty paragraph.
pub fn delete_table(location: &TableLocation) -> Transaction {
    replace_table(location, "table.delete_table")
}
