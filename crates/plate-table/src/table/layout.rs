//! Planning structural edits.
//!
//! A [`Layout`] is an editable copy of a [`Grid`]: every cell keeps its key,
//! where it came from in the tree and its rectangle. Edits move rectangles
//! around, and [`Layout::into_ops`] diffs the result against the grid it was
//! built from to produce the tree mutations.

use std::ops::Range;

use crate::core::{Document, Node};
use crate::ops::Op;

use super::grid::{CellAddr, CellRange, Grid, GridCoord, GridError};
use super::path::TableLocation;
use super::{cell_node, new_cell_key, row_node, span_patch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Row,
    Col,
}

impl Axis {
    fn cross(self) -> Axis {
        match self {
            Axis::Row => Axis::Col,
            Axis::Col => Axis::Row,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Existing(CellAddr),
    New,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlacedCell {
    source: Source,
    pub(crate) key: String,
    pub(crate) origin: GridCoord,
    pub(crate) row_span: usize,
    pub(crate) col_span: usize,
    /// Blocks to append to the cell's content.
    appended: Vec<Node>,
}

impl PlacedCell {
    fn new(origin: GridCoord, row_span: usize, col_span: usize) -> Self {
        Self {
            source: Source::New,
            key: new_cell_key(),
            origin,
            row_span,
            col_span,
            appended: Vec::new(),
        }
    }

    fn start(&self, axis: Axis) -> usize {
        match axis {
            Axis::Row => self.origin.row,
            Axis::Col => self.origin.col,
        }
    }

    fn span(&self, axis: Axis) -> usize {
        match axis {
            Axis::Row => self.row_span,
            Axis::Col => self.col_span,
        }
    }

    fn end(&self, axis: Axis) -> usize {
        self.start(axis) + self.span(axis)
    }

    fn start_mut(&mut self, axis: Axis) -> &mut usize {
        match axis {
            Axis::Row => &mut self.origin.row,
            Axis::Col => &mut self.origin.col,
        }
    }

    fn span_mut(&mut self, axis: Axis) -> &mut usize {
        match axis {
            Axis::Row => &mut self.row_span,
            Axis::Col => &mut self.col_span,
        }
    }

    /// Starts before `line` and ends after it.
    fn straddles(&self, axis: Axis, line: usize) -> bool {
        self.start(axis) < line && line < self.end(axis)
    }

    fn covers(&self, coord: GridCoord) -> bool {
        self.range().contains(coord)
    }

    fn range(&self) -> CellRange {
        CellRange::new(
            self.origin.row..self.origin.row + self.row_span,
            self.origin.col..self.origin.col + self.col_span,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Layout {
    /// Tree row each grid row came from; `None` for rows created by the edit.
    rows: Vec<Option<usize>>,
    cols: usize,
    cells: Vec<PlacedCell>,
}

impl Layout {
    pub(crate) fn from_grid(grid: &Grid) -> Self {
        Self {
            rows: (0..grid.rows()).map(Some).collect(),
            cols: grid.cols(),
            cells: grid
                .cells()
                .iter()
                .map(|cell| PlacedCell {
                    source: Source::Existing(cell.addr),
                    key: cell.key.clone(),
                    origin: cell.origin,
                    row_span: cell.row_span,
                    col_span: cell.col_span,
                    appended: Vec::new(),
                })
                .collect(),
        }
    }

    pub(crate) fn rows(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn cols(&self) -> usize {
        self.cols
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn len(&self, axis: Axis) -> usize {
        match axis {
            Axis::Row => self.rows.len(),
            Axis::Col => self.cols,
        }
    }

    fn coord(axis: Axis, line: usize, cross: usize) -> GridCoord {
        match axis {
            Axis::Row => GridCoord::new(line, cross),
            Axis::Col => GridCoord::new(cross, line),
        }
    }

    pub(crate) fn owner(&self, coord: GridCoord) -> Option<&PlacedCell> {
        self.cells.iter().find(|cell| cell.covers(coord))
    }

    pub(crate) fn cell(&self, key: &str) -> Option<&PlacedCell> {
        self.cells.iter().find(|cell| cell.key == key)
    }

    /// Opens a new line before `at`, shaped after line `reference`: cells
    /// straddling the boundary grow by one, every other cell of the reference
    /// line gets a fresh neighbour in the new line. Returns the keys of the
    /// new cells in cross-axis order.
    pub(crate) fn insert_line(&mut self, axis: Axis, at: usize, reference: usize) -> Vec<String> {
        let cross_axis = axis.cross();
        let mut created = Vec::new();
        let mut cross = 0;
        while cross < self.len(cross_axis) {
            let coord = Self::coord(axis, reference, cross);
            let Some(cell) = self.owner(coord) else {
                cross += 1;
                continue;
            };
            if !cell.straddles(axis, at) {
                let origin = Self::coord(axis, at, cell.start(cross_axis));
                let (row_span, col_span) = match axis {
                    Axis::Row => (1, cell.col_span),
                    Axis::Col => (cell.row_span, 1),
                };
                created.push(PlacedCell::new(origin, row_span, col_span));
            }
            cross = cell.end(cross_axis);
        }

        for cell in &mut self.cells {
            if cell.straddles(axis, at) {
                *cell.span_mut(axis) += 1;
            } else if cell.start(axis) >= at {
                *cell.start_mut(axis) += 1;
            }
        }
        match axis {
            Axis::Row => self.rows.insert(at, None),
            Axis::Col => self.cols += 1,
        }

        let keys = created.iter().map(|cell| cell.key.clone()).collect();
        self.cells.extend(created);
        keys
    }

    /// Deletes the lines in `band`. Cells reaching into the band from before
    /// it shrink; cells starting inside it and reaching past it leave an empty
    /// cell behind for the part that survives.
    pub(crate) fn remove_band(&mut self, axis: Axis, band: Range<usize>) {
        let removed = band.len();
        let mut remainders = Vec::new();
        self.cells.retain_mut(|cell| {
            let (start, end) = (cell.start(axis), cell.end(axis));
            if end <= band.start {
                true
            } else if start >= band.end {
                *cell.start_mut(axis) -= removed;
                true
            } else if start < band.start {
                *cell.span_mut(axis) -= end.min(band.end) - band.start;
                true
            } else {
                if end > band.end {
                    let mut rest = PlacedCell::new(cell.origin, cell.row_span, cell.col_span);
                    *rest.start_mut(axis) = band.start;
                    *rest.span_mut(axis) = end - band.end;
                    remainders.push(rest);
                }
                false
            }
        });
        self.cells.extend(remainders);
        match axis {
            Axis::Row => {
                self.rows.drain(band);
            }
            Axis::Col => self.cols -= removed,
        }
    }

    /// Turns `anchor` into the cell covering `range`, dropping every other
    /// cell inside it. `moved` is appended to the anchor's content.
    pub(crate) fn merge(&mut self, range: &CellRange, anchor: &str, moved: Vec<Node>) {
        self.cells
            .retain(|cell| cell.key == anchor || !range.contains_range(&cell.range()));
        if let Some(cell) = self.cells.iter_mut().find(|cell| cell.key == anchor) {
            cell.origin = range.top_left();
            cell.row_span = range.height();
            cell.col_span = range.width();
            cell.appended.extend(moved);
        }
    }

    /// Resets the spans of the keyed cells to 1, filling the freed slots
    /// with empty cells.
    pub(crate) fn split(&mut self, keys: &[String]) {
        let mut created = Vec::new();
        for cell in self.cells.iter_mut().filter(|cell| keys.contains(&cell.key)) {
            created.extend(
                cell.range()
                    .coords()
                    .filter(|coord| *coord != cell.origin)
                    .map(|coord| PlacedCell::new(coord, 1, 1)),
            );
            cell.row_span = 1;
            cell.col_span = 1;
        }
        self.cells.extend(created);
    }

    /// Removes rows and columns in which no cell starts, shrinking the cells
    /// that cross them.
    pub(crate) fn collapse(&mut self) {
        'outer: loop {
            for axis in [Axis::Row, Axis::Col] {
                let empty = (0..self.len(axis))
                    .find(|line| !self.cells.iter().any(|cell| cell.start(axis) == *line));
                if let Some(line) = empty {
                    log::trace!("collapsing {axis:?} {line}");
                    self.remove_band(axis, line..line + 1);
                    continue 'outer;
                }
            }
            break;
        }
    }

    /// Checks that every slot is owned by exactly one cell.
    pub(crate) fn validate(&self) -> Result<(), GridError> {
        let mut owners = vec![0usize; self.rows() * self.cols];
        for (ix, cell) in self.cells.iter().enumerate() {
            let range = cell.range();
            if range.rows.end > self.rows() || range.cols.end > self.cols || range.is_empty() {
                return Err(GridError::RowSpanOverflow {
                    row: cell.origin.row,
                    cell: ix,
                    row_span: cell.row_span,
                });
            }
            for coord in range.coords() {
                let slot = &mut owners[coord.row * self.cols + coord.col];
                *slot += 1;
                if *slot > 1 {
                    return Err(GridError::Overlap {
                        row: coord.row,
                        cell: ix,
                        col: coord.col,
                    });
                }
            }
        }
        match owners.iter().position(|count| *count == 0) {
            Some(ix) => Err(GridError::Uncovered {
                row: ix / self.cols,
                col: ix % self.cols,
            }),
            None => Ok(()),
        }
    }

    /// Cells whose origin is in `row`, left to right.
    fn row_cells(&self, row: usize) -> Vec<&PlacedCell> {
        let mut cells: Vec<&PlacedCell> = self
            .cells
            .iter()
            .filter(|cell| cell.origin.row == row)
            .collect();
        cells.sort_by_key(|cell| cell.origin.col);
        cells
    }

    /// Where the keyed cell will sit in the tree once the edit lands.
    pub(crate) fn addr_of(&self, key: &str) -> Option<CellAddr> {
        let cell = self.cell(key)?;
        let index = self
            .cells
            .iter()
            .filter(|other| {
                other.origin.row == cell.origin.row && other.origin.col < cell.origin.col
            })
            .count();
        Some(CellAddr::new(cell.origin.row, index))
    }

    /// Tree mutations turning the table `grid` was built from into this
    /// layout: attribute changes and appended content first, then removals
    /// bottom-up, then insertions top-down. Every path is valid at the point
    /// its op is applied.
    pub(crate) fn into_ops(self, doc: &Document, grid: &Grid, location: &TableLocation) -> Vec<Op> {
        let mut ops = Vec::new();

        for cell in &self.cells {
            let Source::Existing(addr) = cell.source else {
                continue;
            };
            let Some(before) = grid.cell_at_addr(addr) else {
                continue;
            };
            let path = location.cell_path(addr);
            if (before.row_span, before.col_span) != (cell.row_span, cell.col_span) {
                ops.push(Op::SetNodeAttrs {
                    path: path.clone(),
                    patch: span_patch(cell.row_span, cell.col_span),
                });
            }
            if !cell.appended.is_empty() {
                let existing = doc.element(&path).map_or(0, |el| el.children.len());
                for (offset, node) in cell.appended.iter().enumerate() {
                    let mut child_path = path.clone();
                    child_path.push(existing + offset);
                    ops.push(Op::InsertNode {
                        path: child_path,
                        node: node.clone(),
                    });
                }
            }
        }

        let mut removals: Vec<Vec<usize>> = Vec::new();
        for row in 0..grid.rows() {
            if !self.rows.contains(&Some(row)) {
                removals.push(location.row_path(row));
            }
        }
        for before in grid.cells() {
            let survives = self
                .cells
                .iter()
                .any(|cell| cell.source == Source::Existing(before.addr));
            if !survives && self.rows.contains(&Some(before.addr.row)) {
                removals.push(location.cell_path(before.addr));
            }
        }
        removals.sort_unstable_by(|a, b| b.cmp(a));
        ops.extend(removals.into_iter().map(|path| Op::RemoveNode { path }));

        for (row_ix, source_row) in self.rows.iter().enumerate() {
            let cells = self.row_cells(row_ix);
            match source_row {
                None => ops.push(Op::InsertNode {
                    path: location.row_path(row_ix),
                    node: row_node(cells.iter().map(|cell| new_cell(cell)).collect()),
                }),
                Some(_) => {
                    for (cell_ix, cell) in cells.iter().enumerate() {
                        if cell.source == Source::New {
                            ops.push(Op::InsertNode {
                                path: location.cell_path(CellAddr::new(row_ix, cell_ix)),
                                node: new_cell(cell),
                            });
                        }
                    }
                }
            }
        }

        ops
    }
}

fn new_cell(cell: &PlacedCell) -> Node {
    cell_node(
        cell.key.clone(),
        cell.row_span,
        cell.col_span,
        vec![Node::paragraph("")],
    )
}
