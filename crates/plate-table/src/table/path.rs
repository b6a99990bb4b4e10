//! Translation between document paths, tree addresses and grid coordinates.

use crate::core::{Document, ElementNode, Node};
use crate::ops::Path;

use super::grid::{CellAddr, CellRange, Grid, GridCell, GridCoord};
use super::{TABLE_CELL_KIND, TABLE_KIND, TABLE_ROW_KIND};

impl Grid {
    /// Tree address of the cell owning `coord`, following spanned slots back
    /// to their origin.
    pub fn real_addr(&self, coord: GridCoord) -> Option<CellAddr> {
        self.cell_at(coord).map(|cell| cell.addr)
    }

    /// The rectangle owned by the cell at tree address `addr`.
    pub fn range_of(&self, addr: CellAddr) -> Option<CellRange> {
        self.cell_at_addr(addr).map(GridCell::range)
    }

    pub fn cell_at_addr(&self, addr: CellAddr) -> Option<&GridCell> {
        // Cells are stored in tree order, so a binary search on the address works.
        self.cells()
            .binary_search_by(|cell| cell.addr.cmp(&addr))
            .ok()
            .map(|ix| &self.cells()[ix])
    }

    pub fn cell_by_key(&self, key: &str) -> Option<&GridCell> {
        self.cells().iter().find(|cell| cell.key == key)
    }

    /// Cells whose rectangle intersects `range`, in tree order.
    pub fn cells_in<'a>(&'a self, range: &'a CellRange) -> impl Iterator<Item = &'a GridCell> + 'a {
        self.cells()
            .iter()
            .filter(move |cell| cell.range().intersects(range))
    }
}

/// Where a table lives in the document, and optionally which of its cells a
/// path points into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLocation {
    pub table_path: Path,
    pub cell: Option<CellAddr>,
}

impl TableLocation {
    /// The innermost table containing (or at) `path`.
    pub fn find(doc: &Document, path: &[usize]) -> Option<TableLocation> {
        for len in (1..=path.len()).rev() {
            let candidate = &path[..len];
            let Some(Node::Element(el)) = doc.node(candidate) else {
                continue;
            };
            if el.kind != TABLE_KIND {
                continue;
            }
            let location = TableLocation {
                table_path: candidate.to_vec(),
                cell: None,
            };
            let cell = location.cell_addr(doc, path);
            return Some(TableLocation { cell, ..location });
        }
        None
    }

    /// A location for the table at `table_path`, if that node is a table.
    pub fn at(doc: &Document, table_path: &[usize]) -> Option<TableLocation> {
        let el = doc.element(table_path)?;
        (el.kind == TABLE_KIND).then(|| TableLocation {
            table_path: table_path.to_vec(),
            cell: None,
        })
    }

    pub fn table<'a>(&self, doc: &'a Document) -> Option<&'a ElementNode> {
        doc.element(&self.table_path)
            .filter(|el| el.kind == TABLE_KIND)
    }

    pub fn row_path(&self, row: usize) -> Path {
        let mut path = self.table_path.clone();
        path.push(row);
        path
    }

    pub fn cell_path(&self, addr: CellAddr) -> Path {
        let mut path = self.row_path(addr.row);
        path.push(addr.cell);
        path
    }

    /// Tree address of the cell of this table that `path` points into.
    pub fn cell_addr(&self, doc: &Document, path: &[usize]) -> Option<CellAddr> {
        let rest = path.strip_prefix(self.table_path.as_slice())?;
        let [row, cell, ..] = *rest else {
            return None;
        };
        let addr = CellAddr::new(row, cell);
        let row_ok = doc
            .node(&self.row_path(row))
            .is_some_and(|n| n.is_element_kind(TABLE_ROW_KIND));
        let cell_ok = doc
            .node(&self.cell_path(addr))
            .is_some_and(|n| n.is_element_kind(TABLE_CELL_KIND));
        (row_ok && cell_ok).then_some(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::test_support::{cell, row, table};

    fn doc() -> Document {
        Document {
            children: vec![
                Node::paragraph("before"),
                Node::Element(table(vec![
                    row(vec![cell("a", 2, 1), cell("b", 1, 1)]),
                    row(vec![cell("c", 1, 1)]),
                ])),
            ],
        }
    }

    #[test]
    fn find_resolves_table_and_cell_from_a_text_path() {
        let doc = doc();
        let location = TableLocation::find(&doc, &[1, 1, 0, 0, 0]).unwrap();
        assert_eq!(location.table_path, vec![1]);
        assert_eq!(location.cell, Some(CellAddr::new(1, 0)));
        assert_eq!(location.cell_path(CellAddr::new(1, 0)), vec![1, 1, 0]);

        assert!(TableLocation::find(&doc, &[0, 0]).is_none());
        assert_eq!(TableLocation::find(&doc, &[1]).unwrap().cell, None);
    }

    #[test]
    fn spanned_slot_resolves_to_origin_address() {
        let doc = doc();
        let location = TableLocation::find(&doc, &[1]).unwrap();
        let grid = Grid::build(location.table(&doc).unwrap()).unwrap();

        assert_eq!(
            grid.real_addr(GridCoord::new(1, 0)),
            Some(CellAddr::new(0, 0))
        );
        assert_eq!(
            grid.real_addr(GridCoord::new(1, 1)),
            Some(CellAddr::new(1, 0))
        );
        assert_eq!(
            grid.range_of(CellAddr::new(0, 0)),
            Some(CellRange::new(0..2, 0..1))
        );
        assert_eq!(grid.range_of(CellAddr::new(1, 1)), None);
        assert_eq!(grid.cell_by_key("c").unwrap().origin, GridCoord::new(1, 1));
    }
}
