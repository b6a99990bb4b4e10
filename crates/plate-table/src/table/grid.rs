//! Dense grid reconstruction.
//!
//! A table is stored sparsely: rows hold only the cells that start in them,
//! and `row_span`/`col_span` attributes say how far each cell reaches. The
//! [`Grid`] resolves that into one owner per `(row, col)` slot using the
//! HTML table layout walk: columns still covered by a cell from an earlier
//! row are skipped, every other column takes the row's next real cell.
//!
//! A grid is derived state. Build it from the table node at the start of an
//! edit and drop it at the end.

use std::collections::HashSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{ElementNode, Node};

use super::{TABLE_CELL_KIND, TABLE_ROW_KIND, cell_key, cell_spans};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub row: usize,
    pub col: usize,
}

impl GridCoord {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Tree address of a cell inside its table: row index, then index of the
/// cell within that row's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddr {
    pub row: usize,
    pub cell: usize,
}

impl CellAddr {
    pub fn new(row: usize, cell: usize) -> Self {
        Self { row, cell }
    }
}

/// A rectangle of grid slots, half-open in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRange {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl CellRange {
    pub fn new(rows: Range<usize>, cols: Range<usize>) -> Self {
        Self { rows, cols }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.cols.is_empty()
    }

    pub fn top_left(&self) -> GridCoord {
        GridCoord::new(self.rows.start, self.cols.start)
    }

    pub fn contains(&self, coord: GridCoord) -> bool {
        self.rows.contains(&coord.row) && self.cols.contains(&coord.col)
    }

    pub fn contains_range(&self, other: &CellRange) -> bool {
        self.rows.start <= other.rows.start
            && other.rows.end <= self.rows.end
            && self.cols.start <= other.cols.start
            && other.cols.end <= self.cols.end
    }

    pub fn intersects(&self, other: &CellRange) -> bool {
        self.rows.start < other.rows.end
            && other.rows.start < self.rows.end
            && self.cols.start < other.cols.end
            && other.cols.start < self.cols.end
    }

    pub fn union(&self, other: &CellRange) -> CellRange {
        CellRange {
            rows: self.rows.start.min(other.rows.start)..self.rows.end.max(other.rows.end),
            cols: self.cols.start.min(other.cols.start)..self.cols.end.max(other.cols.end),
        }
    }

    /// Row-major iteration over every slot of the rectangle.
    pub fn coords(&self) -> impl Iterator<Item = GridCoord> + '_ {
        self.rows
            .clone()
            .flat_map(move |row| self.cols.clone().map(move |col| GridCoord::new(row, col)))
    }
}

/// A cell placed on the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridCell {
    pub key: String,
    pub addr: CellAddr,
    pub origin: GridCoord,
    pub row_span: usize,
    pub col_span: usize,
}

impl GridCell {
    pub fn range(&self) -> CellRange {
        CellRange {
            rows: self.origin.row..self.origin.row + self.row_span,
            cols: self.origin.col..self.origin.col + self.col_span,
        }
    }

    pub fn is_merged(&self) -> bool {
        self.row_span > 1 || self.col_span > 1
    }
}

/// One slot of the grid: the cell that owns it, and whether the slot is
/// that cell's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSlot<'a> {
    pub cell: &'a GridCell,
    pub is_origin: bool,
}

impl<'a> GridSlot<'a> {
    pub fn key(&self) -> &'a str {
        &self.cell.key
    }

    pub fn origin(&self) -> GridCoord {
        self.cell.origin
    }

    pub fn addr(&self) -> CellAddr {
        self.cell.addr
    }
}

/// The table tree and its spans disagree. Every variant is a broken
/// document, not a user mistake.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("table has no rows")]
    EmptyTable,
    #[error("child {index} of the table is not a table row")]
    NotARow { index: usize },
    #[error("child {cell} of row {row} is not a table cell")]
    NotACell { row: usize, cell: usize },
    #[error("cell {cell} of row {row} has no key")]
    MissingKey { row: usize, cell: usize },
    #[error("cell key {key:?} is used more than once")]
    DuplicateKey { key: String },
    #[error("row {row} covers {width} columns, expected {expected}")]
    RowWidthMismatch {
        row: usize,
        width: usize,
        expected: usize,
    },
    #[error("cell {cell} of row {row} overlaps column {col}")]
    Overlap { row: usize, cell: usize, col: usize },
    #[error("cell {cell} of row {row} spans {row_span} rows past the end of the table")]
    RowSpanOverflow {
        row: usize,
        cell: usize,
        row_span: usize,
    },
    #[error("cell {cell} of row {row} spans {col_span} columns but the table holds {cells} cells")]
    SpanTooWide {
        row: usize,
        cell: usize,
        col_span: usize,
        cells: usize,
    },
    #[error("slot ({row}, {col}) is not covered by any cell")]
    Uncovered { row: usize, col: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    /// Cells in tree order, which is also row-major origin order.
    cells: Vec<GridCell>,
    /// Row-major owner index into `cells` for every slot.
    slots: Vec<usize>,
}

impl Grid {
    pub fn build(table: &ElementNode) -> Result<Grid, GridError> {
        let rows = collect_rows(table)?;
        let row_count = rows.len();
        // Every column needs an origin, so no span exceeds the cell count.
        let cell_count: usize = rows.iter().map(Vec::len).sum();
        for (row_ix, row) in rows.iter().enumerate() {
            for (cell_ix, cell) in row.iter().enumerate() {
                let col_span = cell_spans(cell).1;
                if col_span > cell_count {
                    return Err(GridError::SpanTooWide {
                        row: row_ix,
                        cell: cell_ix,
                        col_span,
                        cells: cell_count,
                    });
                }
            }
        }
        let cols: usize = rows[0].iter().map(|cell| cell_spans(cell).1).sum();
        if cols == 0 {
            return Err(GridError::EmptyTable);
        }

        let mut cells: Vec<GridCell> = Vec::new();
        let mut keys: HashSet<&str> = HashSet::new();
        let mut slots: Vec<Option<usize>> = vec![None; row_count * cols];
        // Rows still covered in each column, counting the current row.
        let mut remaining: Vec<usize> = vec![0; cols];

        for (row_ix, row) in rows.iter().enumerate() {
            let carried = remaining.iter().filter(|r| **r > 0).count();
            let width = carried + row.iter().map(|cell| cell_spans(cell).1).sum::<usize>();
            if width != cols {
                return Err(GridError::RowWidthMismatch {
                    row: row_ix,
                    width,
                    expected: cols,
                });
            }

            let mut col = 0usize;
            for (cell_ix, cell) in row.iter().enumerate() {
                let key = cell_key(cell).ok_or(GridError::MissingKey {
                    row: row_ix,
                    cell: cell_ix,
                })?;
                if !keys.insert(key) {
                    return Err(GridError::DuplicateKey {
                        key: key.to_string(),
                    });
                }
                let (row_span, col_span) = cell_spans(cell);

                while col < cols && remaining[col] > 0 {
                    col += 1;
                }
                for c in col..col + col_span {
                    if c >= cols || remaining[c] > 0 {
                        return Err(GridError::Overlap {
                            row: row_ix,
                            cell: cell_ix,
                            col: c,
                        });
                    }
                }
                if row_span > row_count - row_ix {
                    return Err(GridError::RowSpanOverflow {
                        row: row_ix,
                        cell: cell_ix,
                        row_span,
                    });
                }

                let owner = cells.len();
                for r in row_ix..row_ix + row_span {
                    for c in col..col + col_span {
                        slots[r * cols + c] = Some(owner);
                    }
                }
                for slot in &mut remaining[col..col + col_span] {
                    *slot = row_span;
                }
                cells.push(GridCell {
                    key: key.to_string(),
                    addr: CellAddr::new(row_ix, cell_ix),
                    origin: GridCoord::new(row_ix, col),
                    row_span,
                    col_span,
                });
                col += col_span;
            }

            for slot in &mut remaining {
                *slot = slot.saturating_sub(1);
            }
        }

        let slots = slots
            .into_iter()
            .enumerate()
            .map(|(ix, owner)| {
                owner.ok_or(GridError::Uncovered {
                    row: ix / cols,
                    col: ix % cols,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Grid {
            rows: row_count,
            cols,
            cells,
            slots,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn bounds(&self) -> CellRange {
        CellRange::new(0..self.rows, 0..self.cols)
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn slot(&self, coord: GridCoord) -> Option<GridSlot<'_>> {
        if coord.row >= self.rows || coord.col >= self.cols {
            return None;
        }
        let cell = &self.cells[self.slots[coord.row * self.cols + coord.col]];
        Some(GridSlot {
            cell,
            is_origin: cell.origin == coord,
        })
    }

    pub fn cell_at(&self, coord: GridCoord) -> Option<&GridCell> {
        self.slot(coord).map(|slot| slot.cell)
    }

    /// Every slot in row-major order.
    pub fn slots(&self) -> impl Iterator<Item = (GridCoord, GridSlot<'_>)> + '_ {
        self.slots.iter().enumerate().map(move |(ix, &owner)| {
            let coord = GridCoord::new(ix / self.cols, ix % self.cols);
            let cell = &self.cells[owner];
            (
                coord,
                GridSlot {
                    cell,
                    is_origin: cell.origin == coord,
                },
            )
        })
    }
}

fn collect_rows(table: &ElementNode) -> Result<Vec<Vec<&ElementNode>>, GridError> {
    if table.children.is_empty() {
        return Err(GridError::EmptyTable);
    }
    table
        .children
        .iter()
        .enumerate()
        .map(|(row_ix, node)| {
            let Node::Element(row) = node else {
                return Err(GridError::NotARow { index: row_ix });
            };
            if row.kind != TABLE_ROW_KIND {
                return Err(GridError::NotARow { index: row_ix });
            }
            row.children
                .iter()
                .enumerate()
                .map(|(cell_ix, node)| match node {
                    Node::Element(cell) if cell.kind == TABLE_CELL_KIND => Ok(cell),
                    _ => Err(GridError::NotACell {
                        row: row_ix,
                        cell: cell_ix,
                    }),
                })
                .collect()
        })
        .collect()
}
