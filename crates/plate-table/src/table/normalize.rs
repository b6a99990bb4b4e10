//! Load-time and post-edit repair of table structure.

use std::collections::HashSet;

use serde_json::Value;

use crate::core::{AttrPatch, Document, ElementNode, Node};
use crate::ops::{Op, Path};
use crate::plugin::{NormalizePass, PluginRegistry};

use super::{
    KEY_ATTR, TABLE_CELL_KIND, TABLE_KIND, TABLE_ROW_KIND, cell_key, cell_spans, empty_cell_node,
    new_cell_key, span_patch, table_row_node,
};

/// Repairs tables the grid builder would reject. Emits one group of repairs
/// for the first broken table it finds; the registry runs it again until the
/// document is clean.
pub(crate) struct NormalizeTableStructure;

impl NormalizePass for NormalizeTableStructure {
    fn id(&self) -> &'static str {
        "table.normalize_structure"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        for (node, path) in doc.query_nodes(&[], |n| n.is_element_kind(TABLE_KIND)) {
            let Some(table) = node.as_element() else {
                continue;
            };
            let ops = repair(table, &path);
            if !ops.is_empty() {
                log::warn!("repairing table at {path:?} ({} ops)", ops.len());
                return ops;
            }
        }
        Vec::new()
    }
}

fn child_path(parent: &[usize], ix: usize) -> Path {
    let mut path = parent.to_vec();
    path.push(ix);
    path
}

fn repair(table: &ElementNode, path: &[usize]) -> Vec<Op> {
    if table.children.is_empty() {
        return vec![Op::InsertNode {
            path: child_path(path, 0),
            node: table_row_node(1),
        }];
    }

    let strays = remove_strays(table, path);
    if !strays.is_empty() {
        return strays;
    }

    let rows: Vec<&ElementNode> = table.children.iter().filter_map(Node::as_element).collect();
    if rows.iter().all(|row| row.children.is_empty()) {
        return vec![Op::InsertNode {
            path: child_path(&child_path(path, 0), 0),
            node: empty_cell_node(1, 1),
        }];
    }

    let mut ops = Vec::new();
    rekey(&rows, path, &mut ops);
    fill_empty_cells(&rows, path, &mut ops);
    fix_geometry(&rows, path, &mut ops);
    ops
}

/// Children of the table that are not rows, and children of rows that are
/// not cells, removed bottom-up.
fn remove_strays(table: &ElementNode, path: &[usize]) -> Vec<Op> {
    let mut strays: Vec<Path> = Vec::new();
    for (row_ix, node) in table.children.iter().enumerate() {
        let row_path = child_path(path, row_ix);
        let Some(row) = node.as_element().filter(|row| row.kind == TABLE_ROW_KIND) else {
            strays.push(row_path);
            continue;
        };
        for (cell_ix, cell) in row.children.iter().enumerate() {
            if !cell.is_element_kind(TABLE_CELL_KIND) {
                strays.push(child_path(&row_path, cell_ix));
            }
        }
    }
    strays.sort_unstable_by(|a, b| b.cmp(a));
    strays
        .into_iter()
        .map(|path| Op::RemoveNode { path })
        .collect()
}

fn cells<'a>(rows: &'a [&'a ElementNode]) -> impl Iterator<Item = (usize, usize, &'a ElementNode)> {
    rows.iter().enumerate().flat_map(|(row_ix, row)| {
        row.children
            .iter()
            .filter_map(Node::as_element)
            .enumerate()
            .map(move |(cell_ix, cell)| (row_ix, cell_ix, cell))
    })
}

fn rekey(rows: &[&ElementNode], path: &[usize], ops: &mut Vec<Op>) {
    let mut seen: HashSet<&str> = HashSet::new();
    for (row_ix, cell_ix, cell) in cells(rows) {
        if let Some(key) = cell_key(cell) {
            if seen.insert(key) {
                continue;
            }
        }
        let mut patch = AttrPatch::default();
        patch
            .set
            .insert(KEY_ATTR.to_string(), Value::String(new_cell_key()));
        ops.push(Op::SetNodeAttrs {
            path: child_path(&child_path(path, row_ix), cell_ix),
            patch,
        });
    }
}

fn fill_empty_cells(rows: &[&ElementNode], path: &[usize], ops: &mut Vec<Op>) {
    for (row_ix, cell_ix, cell) in cells(rows) {
        if cell.children.is_empty() {
            ops.push(Op::InsertNode {
                path: child_path(&child_path(&child_path(path, row_ix), cell_ix), 0),
                node: Node::paragraph(""),
            });
        }
    }
}

/// Lays the rows out the way the grid builder does, but clamps spans that
/// run past the last row, into covered columns or wider than the table's
/// cell count instead of failing, then pads every row out to the widest one.
fn fix_geometry(rows: &[&ElementNode], path: &[usize], ops: &mut Vec<Op>) {
    let row_count = rows.len();
    let cell_count = cells(rows).count();
    let mut remaining: Vec<usize> = Vec::new();
    let mut occupied: Vec<usize> = Vec::with_capacity(row_count);

    for (row_ix, row) in rows.iter().enumerate() {
        let mut used = remaining.iter().filter(|r| **r > 0).count();
        let mut col = 0;
        for (cell_ix, node) in row.children.iter().enumerate() {
            let Some(cell) = node.as_element() else {
                continue;
            };
            let (row_span, col_span) = cell_spans(cell);
            while remaining.get(col).is_some_and(|r| *r > 0) {
                col += 1;
            }
            let end = col.saturating_add(col_span).min(cell_count.max(col + 1));
            let free = (col..end)
                .take_while(|c| remaining.get(*c).is_none_or(|r| *r == 0))
                .count()
                .max(1);
            let fitted = (row_span.min(row_count - row_ix), free);
            if fitted != (row_span, col_span) {
                ops.push(Op::SetNodeAttrs {
                    path: child_path(&child_path(path, row_ix), cell_ix),
                    patch: span_patch(fitted.0, fitted.1),
                });
            }

            if remaining.len() < col + fitted.1 {
                remaining.resize(col + fitted.1, 0);
            }
            for slot in &mut remaining[col..col + fitted.1] {
                *slot = fitted.0;
            }
            used += fitted.1;
            col += fitted.1;
        }
        occupied.push(used);
        for slot in &mut remaining {
            *slot = slot.saturating_sub(1);
        }
    }

    let cols = remaining.len();
    for (row_ix, (row, used)) in rows.iter().zip(occupied).enumerate() {
        for pad in 0..cols.saturating_sub(used) {
            ops.push(Op::InsertNode {
                path: child_path(&child_path(path, row_ix), row.children.len() + pad),
                node: empty_cell_node(1, 1),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Grid;
    use crate::table::test_support::{cell, row, table};

    fn normalized(node: ElementNode) -> ElementNode {
        let doc = Document {
            children: vec![Node::Element(node)],
        };
        let editor = crate::core::Editor::new(
            doc,
            crate::core::Selection::collapsed(crate::core::Point::new(vec![0], 0)),
            PluginRegistry::table(),
        );
        editor.doc().element(&[0]).cloned().unwrap()
    }

    #[test]
    fn short_rows_are_padded_to_the_widest_row() {
        let fixed = normalized(table(vec![
            row(vec![cell("a", 1, 1)]),
            row(vec![cell("b", 1, 1), cell("c", 1, 1), cell("d", 1, 1)]),
        ]));
        let grid = Grid::build(&fixed).unwrap();
        assert_eq!((grid.rows(), grid.cols()), (2, 3));
        assert_eq!(grid.cells().len(), 6);
    }

    #[test]
    fn overflowing_spans_are_clamped() {
        let fixed = normalized(table(vec![row(vec![cell("a", 3, 1), cell("b", 1, 1)])]));
        let grid = Grid::build(&fixed).unwrap();
        assert_eq!(grid.cell_by_key("a").unwrap().row_span, 1);

        // a b c
        // d d      (d runs into b's second row)
        let fixed = normalized(table(vec![
            row(vec![cell("a", 1, 1), cell("b", 2, 1), cell("c", 1, 1)]),
            row(vec![cell("d", 1, 2)]),
        ]));
        let grid = Grid::build(&fixed).unwrap();
        assert_eq!(grid.cell_by_key("d").unwrap().col_span, 1);
        assert_eq!((grid.rows(), grid.cols()), (2, 3));
        assert_eq!(grid.cells().len(), 5);
    }

    #[test]
    fn absurd_spans_are_clamped_to_the_cell_count() {
        let fixed = normalized(table(vec![
            row(vec![cell("a", 1, 1), cell("b", usize::MAX, usize::MAX)]),
            row(vec![cell("c", 1, usize::MAX)]),
        ]));
        let grid = Grid::build(&fixed).unwrap();
        assert_eq!((grid.rows(), grid.cols()), (2, 3));
        assert_eq!(grid.cell_by_key("b").unwrap().col_span, 2);
        assert_eq!(grid.cell_by_key("b").unwrap().row_span, 2);
        assert_eq!(grid.cell_by_key("c").unwrap().col_span, 1);
    }

    #[test]
    fn missing_and_duplicate_keys_are_replaced() {
        let keyless = Node::Element(ElementNode {
            kind: TABLE_CELL_KIND.to_string(),
            attrs: Default::default(),
            children: Vec::new(),
        });
        let fixed = normalized(table(vec![row(vec![
            cell("a", 1, 1),
            cell("a", 1, 1),
            keyless,
        ])]));
        let grid = Grid::build(&fixed).unwrap();
        assert_eq!(grid.cells().len(), 3);
        assert_eq!(grid.cells()[0].key, "a");
        assert_ne!(grid.cells()[1].key, "a");
        assert!(fixed.children[0].text().contains('a'));
    }

    #[test]
    fn stray_children_and_empty_tables_are_repaired() {
        let fixed = normalized(table(vec![Node::paragraph("stray")]));
        let grid = Grid::build(&fixed).unwrap();
        assert_eq!((grid.rows(), grid.cols()), (1, 1));

        let fixed = normalized(table(vec![row(vec![]), row(vec![])]));
        let grid = Grid::build(&fixed).unwrap();
        assert_eq!((grid.rows(), grid.cols()), (2, 1));
    }

    #[test]
    fn fully_carried_rows_are_left_alone() {
        let original = table(vec![row(vec![cell("a", 2, 1)]), row(vec![])]);
        assert_eq!(normalized(original.clone()), original);
    }
}
