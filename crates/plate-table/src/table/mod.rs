//! Span-aware table editing.
//!
//! Tables live in the document as `table > table_row > table_cell` elements.
//! Every command rebuilds a [`Grid`] from the table node, plans the edit on
//! it and hands the editor one [`Transaction`]. Nothing derived from a table
//! outlives the command that built it.

mod edit;
mod grid;
mod layout;
mod navigate;
mod normalize;
mod path;
mod selection;

use serde_json::Value;

use crate::core::{AttrPatch, Attrs, Document, Editor, ElementNode, Node};
use crate::ops::{Path, Transaction};
use crate::plugin::{
    ChildConstraint, CommandError, CommandSpec, NodeRole, NodeSpec, NormalizePass, PlatePlugin,
    QueryError, QuerySpec,
};

pub use edit::{
    delete_col, delete_row, delete_table, insert_col_left, insert_col_right, insert_row_above,
    insert_row_below, insert_table, merge_cells, split_cells,
};
pub use grid::{CellAddr, CellRange, Grid, GridCell, GridCoord, GridError, GridSlot};
pub use navigate::{VerticalDirection, resolve_vertical_move};
pub use path::TableLocation;
pub use selection::{TableSelection, keys_in};

pub const TABLE_KIND: &str = "table";
pub const TABLE_ROW_KIND: &str = "table_row";
pub const TABLE_CELL_KIND: &str = "table_cell";

pub const KEY_ATTR: &str = "key";
pub const ROW_SPAN_ATTR: &str = "row_span";
pub const COL_SPAN_ATTR: &str = "col_span";

pub fn cell_key(cell: &ElementNode) -> Option<&str> {
    cell.attrs.get(KEY_ATTR).and_then(Value::as_str)
}

/// `(row_span, col_span)` of a cell. Missing or zero spans read as 1.
pub fn cell_spans(cell: &ElementNode) -> (usize, usize) {
    let span = |attr: &str| {
        cell.attrs
            .get(attr)
            .and_then(Value::as_u64)
            .map_or(1, |v| (v as usize).max(1))
    };
    (span(ROW_SPAN_ATTR), span(COL_SPAN_ATTR))
}

pub fn new_cell_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn span_attrs(attrs: &mut Attrs, row_span: usize, col_span: usize) {
    if row_span > 1 {
        attrs.insert(ROW_SPAN_ATTR.to_string(), Value::from(row_span));
    }
    if col_span > 1 {
        attrs.insert(COL_SPAN_ATTR.to_string(), Value::from(col_span));
    }
}

/// Patch setting both spans; a span of 1 is stored by removing the attribute.
pub(crate) fn span_patch(row_span: usize, col_span: usize) -> AttrPatch {
    let mut patch = AttrPatch::default();
    for (attr, span) in [(ROW_SPAN_ATTR, row_span), (COL_SPAN_ATTR, col_span)] {
        if span > 1 {
            patch.set.insert(attr.to_string(), Value::from(span));
        } else {
            patch.remove.push(attr.to_string());
        }
    }
    patch
}

pub fn cell_node(
    key: impl Into<String>,
    row_span: usize,
    col_span: usize,
    children: Vec<Node>,
) -> Node {
    let mut attrs = Attrs::default();
    attrs.insert(KEY_ATTR.to_string(), Value::String(key.into()));
    span_attrs(&mut attrs, row_span, col_span);
    Node::Element(ElementNode {
        kind: TABLE_CELL_KIND.to_string(),
        attrs,
        children,
    })
}

/// A freshly keyed cell holding one empty paragraph.
pub fn empty_cell_node(row_span: usize, col_span: usize) -> Node {
    cell_node(new_cell_key(), row_span, col_span, vec![Node::paragraph("")])
}

pub fn row_node(cells: Vec<Node>) -> Node {
    Node::Element(ElementNode {
        kind: TABLE_ROW_KIND.to_string(),
        attrs: Attrs::default(),
        children: cells,
    })
}

pub fn table_row_node(cols: usize) -> Node {
    row_node((0..cols.max(1)).map(|_| empty_cell_node(1, 1)).collect())
}

pub fn table_node(rows: usize, cols: usize) -> Node {
    Node::Element(ElementNode {
        kind: TABLE_KIND.to_string(),
        attrs: Attrs::default(),
        children: (0..rows.max(1)).map(|_| table_row_node(cols)).collect(),
    })
}

/// No text anywhere and nothing but paragraphs inside.
pub(crate) fn is_effectively_empty(cell: &ElementNode) -> bool {
    cell.children
        .iter()
        .all(|child| child.is_element_kind("paragraph") && child.text().is_empty())
}

/// The table and cells a structural command acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub location: TableLocation,
    pub selection: TableSelection,
}

impl TableTarget {
    /// Resolves the target from command args when they name cells, else from
    /// the editor selection. Args may also carry `"table": [path...]`.
    pub fn from_editor(editor: &Editor, args: Option<&Value>) -> Option<TableTarget> {
        let doc = editor.doc();
        let explicit = args.and_then(TableSelection::from_args);
        let table_path = args.and_then(|args| parse_path(args.get("table")?));

        match (table_path, explicit) {
            (Some(path), Some(selection)) => Some(TableTarget {
                location: TableLocation::at(doc, &path)?,
                selection,
            }),
            (None, Some(selection)) => Some(TableTarget {
                location: TableLocation::find(doc, &editor.selection().focus.path)?,
                selection,
            }),
            (Some(_), None) => None,
            (None, None) => {
                let (location, selection) =
                    TableSelection::from_editor(doc, editor.selection())?;
                Some(TableTarget {
                    location,
                    selection,
                })
            }
        }
    }

    /// The resolved grid rectangle of the selection.
    pub fn range(&self, doc: &Document) -> Result<Option<CellRange>, GridError> {
        let Some(table) = self.location.table(doc) else {
            return Ok(None);
        };
        let grid = Grid::build(table)?;
        Ok(self.selection.resolve(&grid))
    }
}

fn parse_path(value: &Value) -> Option<Path> {
    value
        .as_array()?
        .iter()
        .map(|ix| ix.as_u64().map(|ix| ix as usize))
        .collect()
}

type StructuralEdit = fn(&Document, &TableTarget) -> Result<Option<Transaction>, GridError>;

fn run_structural(
    editor: &mut Editor,
    args: Option<Value>,
    id: &str,
    edit: StructuralEdit,
) -> Result<(), CommandError> {
    let Some(target) = TableTarget::from_editor(editor, args.as_ref()) else {
        log::debug!("{id}: selection is not inside a table");
        return Ok(());
    };
    match edit(editor.doc(), &target) {
        Ok(Some(tx)) => editor
            .apply(tx)
            .map_err(|e| CommandError::new(format!("Failed to apply {id}: {e}"))),
        Ok(None) => {
            log::debug!("{id}: nothing to do for {:?}", target.selection);
            Ok(())
        }
        Err(err) => Err(grid_failure(id, err)),
    }
}

fn grid_failure(id: &str, err: GridError) -> CommandError {
    log::error!("{id}: table structure is inconsistent: {err}");
    debug_assert!(false, "{id}: table structure is inconsistent: {err}");
    CommandError::new(format!("{id}: {err}"))
}

fn structural_command(
    id: &'static str,
    label: &'static str,
    edit: StructuralEdit,
) -> CommandSpec {
    CommandSpec::new(id, label, move |editor, args| {
        run_structural(editor, args, id, edit)
    })
}

fn move_command(id: &'static str, label: &'static str, direction: VerticalDirection) -> CommandSpec {
    CommandSpec::new(id, label, move |editor, _args| {
        match resolve_vertical_move(editor.doc(), editor.selection(), direction) {
            Ok(Some(point)) => {
                editor.set_selection(crate::core::Selection::collapsed(point));
                Ok(())
            }
            Ok(None) => {
                log::debug!("{id}: no cell {direction:?} of the caret");
                Ok(())
            }
            Err(err) => Err(grid_failure(id, err)),
        }
    })
}

pub struct TablePlugin;

impl PlatePlugin for TablePlugin {
    fn id(&self) -> &'static str {
        "table"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        [TABLE_KIND, TABLE_ROW_KIND, TABLE_CELL_KIND]
            .into_iter()
            .map(|kind| NodeSpec {
                kind: kind.to_string(),
                role: NodeRole::Block,
                is_void: false,
                children: ChildConstraint::BlockOnly,
            })
            .collect()
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(normalize::NormalizeTableStructure)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("table.insert", "Insert table", |editor, args| {
                let config = &editor.config().table;
                let size = |name: &str, default: usize, max: usize| {
                    args.as_ref()
                        .and_then(|v| v.get(name))
                        .and_then(Value::as_u64)
                        .map_or(default, |n| n as usize)
                        .clamp(1, max)
                };
                let rows = size("rows", config.default_rows, config.max_rows);
                let cols = size("cols", config.default_cols, config.max_cols);

                let Some(tx) = insert_table(editor.doc(), editor.selection(), rows, cols) else {
                    log::debug!("table.insert: selection is expanded or already in a table");
                    return Ok(());
                };
                editor
                    .apply(tx)
                    .map_err(|e| CommandError::new(format!("Failed to insert table: {e}")))
            })
            .description("Insert a table at the current selection.")
            .keywords(["table", "grid"])
            .args_example(serde_json::json!({ "rows": 3, "cols": 3 })),
            structural_command(
                "table.insert_row_above",
                "Insert row above",
                insert_row_above,
            )
            .description("Insert a new row above the selected cells.")
            .keywords(["table", "row", "insert"]),
            structural_command(
                "table.insert_row_below",
                "Insert row below",
                insert_row_below,
            )
            .description("Insert a new row below the selected cells.")
            .keywords(["table", "row", "insert"]),
            structural_command(
                "table.insert_col_left",
                "Insert column left",
                insert_col_left,
            )
            .description("Insert a new column to the left of the selected cells.")
            .keywords(["table", "column", "insert"]),
            structural_command(
                "table.insert_col_right",
                "Insert column right",
                insert_col_right,
            )
            .description("Insert a new column to the right of the selected cells.")
            .keywords(["table", "column", "insert"]),
            structural_command("table.delete_row", "Delete row", delete_row)
                .description("Delete every row the selection touches.")
                .keywords(["table", "row", "delete", "remove"]),
            structural_command("table.delete_col", "Delete column", delete_col)
                .description("Delete every column the selection touches.")
                .keywords(["table", "column", "delete", "remove"]),
            structural_command("table.merge", "Merge cells", merge_cells)
                .description("Merge the selected rectangle into its top-left cell.")
                .keywords(["table", "merge", "cells"])
                .args_example(serde_json::json!({ "anchor": [0, 0], "focus": [1, 1] })),
            structural_command("table.split", "Split cells", split_cells)
                .description("Split every merged cell in the selection back into single cells.")
                .keywords(["table", "split", "unmerge"]),
            CommandSpec::new("table.delete_table", "Delete table", |editor, args| {
                let Some(target) = TableTarget::from_editor(editor, args.as_ref()) else {
                    log::debug!("table.delete_table: selection is not inside a table");
                    return Ok(());
                };
                let tx = delete_table(&target.location);
                editor
                    .apply(tx)
                    .map_err(|e| CommandError::new(format!("Failed to delete table: {e}")))
            })
            .description("Delete the current table and replace it with a paragraph.")
            .keywords(["table", "delete", "remove"]),
            move_command("table.move_up", "Move to cell above", VerticalDirection::Up)
                .keywords(["table", "cursor", "up"])
                .hidden(true),
            move_command(
                "table.move_down",
                "Move to cell below",
                VerticalDirection::Down,
            )
            .keywords(["table", "cursor", "down"])
            .hidden(true),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("table.is_active", |editor, _args| {
                let is_active =
                    TableLocation::find(editor.doc(), &editor.selection().focus.path).is_some();
                Ok(Value::Bool(is_active))
            }),
            QuerySpec::new("table.cell_range", |editor, args| {
                let range = resolved_range(editor, args.as_ref())?;
                serde_json::to_value(range).map_err(|e| QueryError::new(e.to_string()))
            }),
            QuerySpec::new("table.can_merge", |editor, args| {
                let Some(target) = TableTarget::from_editor(editor, args.as_ref()) else {
                    return Ok(Value::Bool(false));
                };
                let can_merge = match merge_cells(editor.doc(), &target) {
                    Ok(tx) => tx.is_some(),
                    Err(err) => return Err(QueryError::new(err.to_string())),
                };
                Ok(Value::Bool(can_merge))
            }),
            QuerySpec::new("table.vertical_move", |editor, args| {
                let direction: VerticalDirection = args
                    .as_ref()
                    .and_then(|v| v.get("direction"))
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|e| QueryError::new(format!("Invalid direction: {e}")))?
                    .unwrap_or(VerticalDirection::Down);
                let point = resolve_vertical_move(editor.doc(), editor.selection(), direction)
                    .map_err(|e| QueryError::new(e.to_string()))?;
                serde_json::to_value(point).map_err(|e| QueryError::new(e.to_string()))
            }),
        ]
    }
}

fn resolved_range(editor: &Editor, args: Option<&Value>) -> Result<Option<CellRange>, QueryError> {
    let Some(target) = TableTarget::from_editor(editor, args) else {
        return Ok(None);
    };
    target
        .range(editor.doc())
        .map_err(|e| QueryError::new(e.to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::core::{ElementNode, Node};

    /// A cell keyed `key` whose only paragraph reads `key`.
    pub fn cell(key: &str, row_span: usize, col_span: usize) -> Node {
        super::cell_node(key, row_span, col_span, vec![Node::paragraph(key)])
    }

    pub fn row(cells: Vec<Node>) -> Node {
        super::row_node(cells)
    }

    pub fn table(rows: Vec<Node>) -> ElementNode {
        ElementNode {
            kind: super::TABLE_KIND.to_string(),
            attrs: Default::default(),
            children: rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_default_to_one_and_ones_are_not_stored() {
        let Node::Element(cell) = cell_node("k", 1, 3, Vec::new()) else {
            unreachable!()
        };
        assert_eq!(cell_spans(&cell), (1, 3));
        assert!(!cell.attrs.contains_key(ROW_SPAN_ATTR));
        assert_eq!(cell_key(&cell), Some("k"));

        let patch = span_patch(2, 1);
        assert_eq!(patch.set.get(ROW_SPAN_ATTR), Some(&Value::from(2)));
        assert_eq!(patch.remove, vec![COL_SPAN_ATTR.to_string()]);
    }

    #[test]
    fn fresh_tables_have_unique_keys() {
        let Node::Element(table) = table_node(2, 3) else {
            unreachable!()
        };
        let grid = Grid::build(&table).unwrap();
        assert_eq!((grid.rows(), grid.cols()), (2, 3));
        assert_eq!(grid.cells().len(), 6);
    }
}
