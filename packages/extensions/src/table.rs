//! Tables: insertion, row and column editing, header toggles

use luthor_document::{
    Block, DocumentError, DocumentHandle, EditorState, Inline, Mutation, MutationError, Selection, TableCell,
    TableRow, UpdateContext,
};
use luthor_runtime::{
    merge_config, Category, Cleanup, CommandDef, CommandError, ConfigurationError,
    Extension, ExtensionContext, NodeTypeSpec, Outcome, StateQuery, UiContribution,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::support::{inlines_contain, insertion_index, selected_range, start_of_block};

const ID: &str = "table";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    #[serde(default = "default_size")]
    pub rows: usize,
    #[serde(default = "default_size")]
    pub columns: usize,
    #[serde(default)]
    pub include_headers: bool,
}

fn default_size() -> usize {
    3
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            rows: default_size(),
            columns: default_size(),
            include_headers: false,
        }
    }
}

/// Position of the selection anchor inside a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellPosition {
    pub table: String,
    pub row: usize,
    pub column: usize,
}

pub fn cell_position(state: &EditorState) -> Option<CellPosition> {
    let anchor = &state.selection.as_ref()?.anchor.key;
    let Some(Block::Table { key, rows }) = state.tree.block(anchor) else {
        return None;
    };
    rows.iter().enumerate().find_map(|(row, table_row)| {
        table_row
            .cells
            .iter()
            .position(|cell| cell.key == *anchor || inlines_contain(&cell.children, anchor))
            .map(|column| CellPosition {
                table: key.clone(),
                row,
                column,
            })
    })
}

fn empty_cell(ctx: &mut UpdateContext<'_>, header: bool) -> TableCell {
    ctx.factory().table_cell(header, Vec::new())
}

fn cell_selection(cell: &TableCell) -> Selection {
    match cell.children.first() {
        Some(Inline::Text { key, .. }) => Selection::collapsed(key.clone(), 0),
        _ => Selection::collapsed(cell.key.clone(), 0),
    }
}

/// Insert a table after the anchor block and place the caret in its first cell
pub fn insert_table(document: &DocumentHandle, config: &TableConfig) -> Result<String, DocumentError> {
    document.update("table-insert", |ctx| {
        let index = insertion_index(ctx.state());
        let table = {
            let mut factory = ctx.factory();
            let rows = (0..config.rows)
                .map(|row| {
                    let header = config.include_headers && row == 0;
                    let cells = (0..config.columns)
                        .map(|_| factory.table_cell(header, Vec::new()))
                        .collect();
                    factory.table_row(cells)
                })
                .collect();
            factory.table(rows)
        };
        let key = table.key().to_string();
        let selection = match &table {
            Block::Table { rows, .. } => rows.first().and_then(|row| row.cells.first()).map(cell_selection),
            _ => None,
        };
        ctx.apply(Mutation::InsertBlock { index, block: table })?;
        if selection.is_some() {
            ctx.set_selection(selection);
        }
        Ok(key)
    })
}

/// Run `edit` on a copy of the anchor's table and write it back. Returns
/// `false` without committing when the anchor is not in a table.
fn edit_table<F>(document: &DocumentHandle, tag: &str, edit: F) -> Result<bool, DocumentError>
where
    F: FnOnce(&mut UpdateContext<'_>, &mut Vec<TableRow>, &CellPosition) -> Option<Selection>,
{
    let Some(position) = document.read(cell_position) else {
        return Ok(false);
    };
    document.update(tag, |ctx| {
        let Some(Block::Table { rows, .. }) = ctx.tree().block(&position.table).cloned() else {
            return Ok(false);
        };
        let mut rows = rows;
        let selection = edit(ctx, &mut rows, &position);

        if rows.is_empty() || rows.iter().all(|row| row.cells.is_empty()) {
            remove_table(ctx, &position.table)?;
            return Ok(true);
        }
        ctx.apply(Mutation::ReplaceBlock {
            node_id: position.table.clone(),
            block: Block::Table {
                key: position.table.clone(),
                rows,
            },
        })?;
        if selection.is_some() {
            ctx.set_selection(selection);
        }
        Ok(true)
    })
}

/// Remove a table, leaving an empty paragraph if the document would be empty
fn remove_table(ctx: &mut UpdateContext<'_>, key: &str) -> Result<(), MutationError> {
    let index = ctx.tree().block_index(key).unwrap_or(0);
    ctx.apply(Mutation::RemoveNode {
        node_id: key.to_string(),
    })?;
    if ctx.tree().children.is_empty() {
        let paragraph = ctx.factory().paragraph(Vec::new());
        ctx.apply(Mutation::InsertBlock {
            index: 0,
            block: paragraph,
        })?;
    }
    let next = index.min(ctx.tree().children.len() - 1);
    let selection = start_of_block(&ctx.tree().children[next]);
    ctx.set_selection(Some(selection));
    Ok(())
}

pub fn insert_row(document: &DocumentHandle, below: bool) -> Result<bool, DocumentError> {
    edit_table(document, "table-row", |ctx, rows, position| {
        let width = rows[position.row].cells.len();
        let cells = (0..width).map(|_| empty_cell(ctx, false)).collect();
        let row = ctx.factory().table_row(cells);
        let index = if below { position.row + 1 } else { position.row };
        let selection = row.cells.get(position.column).map(cell_selection);
        rows.insert(index, row);
        selection
    })
}

pub fn insert_column(document: &DocumentHandle, right: bool) -> Result<bool, DocumentError> {
    edit_table(document, "table-column", |ctx, rows, position| {
        let index = if right { position.column + 1 } else { position.column };
        for row in rows.iter_mut() {
            let header = !row.cells.is_empty() && row.cells.iter().all(|cell| cell.header);
            let cell = empty_cell(ctx, header);
            let at = index.min(row.cells.len());
            row.cells.insert(at, cell);
        }
        rows[position.row].cells.get(index).map(cell_selection)
    })
}

pub fn delete_row(document: &DocumentHandle) -> Result<bool, DocumentError> {
    edit_table(document, "table-row", |_, rows, position| {
        rows.remove(position.row);
        let next = position.row.min(rows.len().checked_sub(1)?);
        let row = &rows[next];
        row.cells
            .get(position.column.min(row.cells.len().checked_sub(1)?))
            .map(cell_selection)
    })
}

pub fn delete_column(document: &DocumentHandle) -> Result<bool, DocumentError> {
    edit_table(document, "table-column", |_, rows, position| {
        for row in rows.iter_mut() {
            if position.column < row.cells.len() {
                row.cells.remove(position.column);
            }
        }
        let row = &rows[position.row];
        row.cells
            .get(position.column.min(row.cells.len().checked_sub(1)?))
            .map(cell_selection)
    })
}

pub fn delete_table(document: &DocumentHandle) -> Result<bool, DocumentError> {
    let Some(position) = document.read(cell_position) else {
        return Ok(false);
    };
    document.update("table-delete", |ctx| {
        remove_table(ctx, &position.table)?;
        Ok(true)
    })
}

/// Flip the header flag of the anchor's row. A row that is entirely header
/// becomes body cells, anything else becomes header.
pub fn toggle_row_header(document: &DocumentHandle) -> Result<bool, DocumentError> {
    edit_table(document, "table-header", |_, rows, position| {
        let row = &mut rows[position.row];
        let header = !row.cells.iter().all(|cell| cell.header);
        for cell in &mut row.cells {
            cell.header = header;
        }
        None
    })
}

pub fn toggle_column_header(document: &DocumentHandle) -> Result<bool, DocumentError> {
    edit_table(document, "table-header", |_, rows, position| {
        let cells = || rows.iter().filter_map(|row| row.cells.get(position.column));
        let header = !cells().all(|cell| cell.header);
        for row in rows.iter_mut() {
            if let Some(cell) = row.cells.get_mut(position.column) {
                cell.header = header;
            }
        }
        None
    })
}

#[derive(Debug, Default)]
pub struct TableExtension {
    config: TableConfig,
}

impl TableExtension {
    pub fn new(config: TableConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }
}

fn table_command<F>(ctx: &ExtensionContext, name: &str, edit: F) -> CommandDef
where
    F: Fn(&DocumentHandle) -> Result<bool, DocumentError> + Send + Sync + 'static,
{
    let document = ctx.document.clone();
    CommandDef::new(name, move |_| Ok(Outcome::value(edit(&document)?))).fallback(json!(false))
}

impl Extension for TableExtension {
    fn id(&self) -> &str {
        ID
    }

    fn categories(&self) -> &[Category] {
        &[Category::Toolbar, Category::Floating]
    }

    fn configure(&mut self, partial: &Value) -> Result<(), ConfigurationError> {
        let config: TableConfig = merge_config(ID, &self.config, partial)?;
        if config.rows == 0 || config.columns == 0 {
            return Err(ConfigurationError::InvalidExtensionConfig {
                id: ID.to_string(),
                message: "tables need at least one row and one column".to_string(),
            });
        }
        self.config = config;
        Ok(())
    }

    fn register(&self, _document: &DocumentHandle) -> anyhow::Result<Cleanup> {
        Ok(Cleanup::noop())
    }

    fn node_types(&self) -> Vec<NodeTypeSpec> {
        vec![NodeTypeSpec::new("table")]
    }

    fn commands(&self, ctx: &ExtensionContext) -> Vec<CommandDef> {
        let document = ctx.document.clone();
        let defaults = self.config.clone();
        let insert = CommandDef::new("insertTable", move |args| {
            let config: TableConfig = match &args {
                Value::Null => defaults.clone(),
                args => merge_config(ID, &defaults, args)
                    .map_err(|e| CommandError::invalid_arguments("insertTable", e.to_string()))?,
            };
            if config.rows == 0 || config.columns == 0 {
                return Err(CommandError::invalid_arguments(
                    "insertTable",
                    "rows and columns must be at least 1",
                ));
            }
            Ok(Outcome::value(insert_table(&document, &config)?))
        })
        .fallback(Value::Null);

        let commands = vec![
            insert,
            table_command(ctx, "insertRowAbove", |d| insert_row(d, false)),
            table_command(ctx, "insertRowBelow", |d| insert_row(d, true)),
            table_command(ctx, "insertColumnLeft", |d| insert_column(d, false)),
            table_command(ctx, "insertColumnRight", |d| insert_column(d, true)),
            table_command(ctx, "deleteRow", delete_row),
            table_command(ctx, "deleteColumn", delete_column),
            table_command(ctx, "deleteTable", delete_table),
            table_command(ctx, "toggleRowHeader", toggle_row_header),
            table_command(ctx, "toggleColumnHeader", toggle_column_header),
        ];
        commands
            .into_iter()
            .map(|command| command.feature(ID).formatting())
            .collect()
    }

    fn state_queries(&self, _ctx: &ExtensionContext) -> Vec<StateQuery> {
        vec![
            StateQuery::sync("isInTableCell", |state| json!(cell_position(state).is_some())),
            StateQuery::sync("isTableSelected", |state| {
                let selected = selected_range(state).map_or(false, |range| {
                    state.tree.children[range]
                        .iter()
                        .any(|block| matches!(block, Block::Table { .. }))
                });
                json!(selected)
            }),
        ]
    }

    fn ui_contributions(&self) -> Vec<UiContribution> {
        vec![UiContribution::new("table", Category::Toolbar, "Table").command("insertTable")]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luthor_document::Document;

    fn table_rows(document: &DocumentHandle) -> Vec<TableRow> {
        document.read(|state| {
            state
                .tree
                .children
                .iter()
                .find_map(|block| match block {
                    Block::Table { rows, .. } => Some(rows.clone()),
                    _ => None,
                })
                .unwrap_or_default()
        })
    }

    #[test]
    fn test_insert_table_places_caret_in_first_cell() {
        let document = DocumentHandle::new(Document::new("tables"));
        let config = TableConfig {
            rows: 2,
            columns: 4,
            include_headers: true,
        };
        insert_table(&document, &config).unwrap();

        let rows = table_rows(&document);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].cells.iter().all(|cell| cell.header));
        assert!(rows[1].cells.iter().all(|cell| !cell.header));
        let position = document.read(cell_position).unwrap();
        assert_eq!((position.row, position.column), (0, 0));
    }

    #[test]
    fn test_rows_and_columns_grow_and_shrink() {
        let document = DocumentHandle::new(Document::new("tables"));
        insert_table(&document, &TableConfig::default()).unwrap();

        assert!(insert_row(&document, true).unwrap());
        assert!(insert_column(&document, true).unwrap());
        let rows = table_rows(&document);
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|row| row.cells.len() == 4));
        assert_eq!(document.read(cell_position).map(|p| (p.row, p.column)), Some((1, 1)));

        delete_row(&document).unwrap();
        delete_column(&document).unwrap();
        let rows = table_rows(&document);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.cells.len() == 3));
    }

    #[test]
    fn test_deleting_last_column_removes_table() {
        let document = DocumentHandle::new(Document::new("tables"));
        let config = TableConfig {
            rows: 1,
            columns: 1,
            include_headers: false,
        };
        insert_table(&document, &config).unwrap();
        delete_column(&document).unwrap();

        assert!(table_rows(&document).is_empty());
        assert!(document.read(|state| cell_position(state).is_none()));
    }

    #[test]
    fn test_header_toggles() {
        let document = DocumentHandle::new(Document::new("tables"));
        insert_table(&document, &TableConfig::default()).unwrap();

        toggle_row_header(&document).unwrap();
        assert!(table_rows(&document)[0].cells.iter().all(|cell| cell.header));
        toggle_row_header(&document).unwrap();
        assert!(table_rows(&document)[0].cells.iter().all(|cell| !cell.header));

        toggle_column_header(&document).unwrap();
        assert!(table_rows(&document).iter().all(|row| row.cells[0].header));
    }

    #[test]
    fn test_commands_outside_table_are_noops() {
        let document = DocumentHandle::new(Document::new("tables"));
        let version = document.version();
        assert!(!delete_row(&document).unwrap());
        assert!(!toggle_row_header(&document).unwrap());
        assert_eq!(document.version(), version);
    }

    #[test]
    fn test_configure_rejects_empty_tables() {
        let mut extension = TableExtension::default();
        assert!(extension.configure(&json!({"rows": 0})).is_err());
        extension.configure(&json!({"includeHeaders": true})).unwrap();
        assert!(extension.config().include_headers);
        assert_eq!(extension.config().rows, 3);
    }
}
