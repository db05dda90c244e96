//! Command-line argument parsing
//!
//! Each subcommand either queries the grid view of a document or turns into
//! grid messages that are run through the engine and written back.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::grid::{column_from_letter, column_letter, Placement};
use crate::messages::GridMsg;
use crate::session::EditSession;

/// Edit XML documents as spreadsheet grids
#[derive(Parser, Debug)]
#[command(name = "xmlgrid", version, about = "Edit XML documents as spreadsheet grids")]
pub struct CliArgs {
    /// XML document to open
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Table to operate on (defaults to the first table)
    #[arg(short, long, global = true, value_name = "NAME")]
    pub table: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List discovered tables as JSON
    Tables,
    /// Print a table as tab-separated values
    Show,
    /// Set one cell (row is 1-based; column is a key or a letter)
    Set {
        row: usize,
        column: String,
        value: String,
    },
    /// Append empty rows
    AddRows {
        #[arg(default_value_t = 1)]
        count: usize,
    },
    /// Append uniquely named columns
    AddColumns {
        #[arg(default_value_t = 1)]
        count: usize,
    },
    /// Delete a row (1-based)
    DeleteRow { row: usize },
    /// Delete a column from every row
    DeleteColumn { column: String },
    /// Rename a column in every row
    RenameColumn { old: String, new: String },
    /// Move a column before (or after) another
    MoveColumn {
        column: String,
        target: String,
        #[arg(long)]
        after: bool,
    },
    /// Move a row before (or after) another (1-based)
    MoveRow {
        from: usize,
        target: usize,
        #[arg(long)]
        after: bool,
    },
    /// Freeze leading rows and columns of the printed view
    Freeze {
        #[arg(long, default_value_t = 0)]
        rows: usize,
        #[arg(long, default_value_t = 0)]
        cols: usize,
    },
    /// Rename the selected table's row element
    RenameTable { name: String },
    /// Delete the selected table
    DeleteTable,
    /// Add a container holding a two-row sample table
    AddTable { container: String, row_name: String },
    /// Watch the file and print the table whenever it changes
    Watch,
}

impl Command {
    /// Whether running this command changes the document
    pub fn is_edit(&self) -> bool {
        !matches!(
            self,
            Command::Tables | Command::Show | Command::Freeze { .. } | Command::Watch
        )
    }
}

fn placement(after: bool) -> Placement {
    if after {
        Placement::After
    } else {
        Placement::Before
    }
}

/// Convert a 1-based row argument
fn row_index(row: usize) -> Result<usize, String> {
    row.checked_sub(1)
        .ok_or_else(|| "Rows are numbered from 1".to_string())
}

/// Resolve a column given as a key, or failing that as a letter
pub fn resolve_column(session: &EditSession, column: &str) -> Result<usize, String> {
    let keys = session.column_keys();
    if let Some(index) = keys.iter().position(|k| k == column) {
        return Ok(index);
    }
    match column_from_letter(column) {
        Some(index) if index < keys.len() => Ok(index),
        _ => Err(format!("Unknown column: {}", column)),
    }
}

fn column_key(session: &EditSession, column: &str) -> Result<String, String> {
    let index = resolve_column(session, column)?;
    Ok(session.column_keys()[index].clone())
}

/// Resolve the `--table` argument to a table index
pub fn resolve_table(session: &EditSession, table: Option<&str>) -> Result<usize, String> {
    match table {
        Some(name) => session
            .table_index(name)
            .ok_or_else(|| format!("No table named {}", name)),
        None if session.tables().is_empty() => Err("The document has no tables".to_string()),
        None => Ok(0),
    }
}

/// Grid messages that carry out an edit command on the active table
pub fn command_messages(command: &Command, session: &EditSession) -> Result<Vec<GridMsg>, String> {
    let index = session.active_index().unwrap_or(0);
    let msg = match command {
        Command::Tables | Command::Show | Command::Watch => return Ok(Vec::new()),
        Command::Freeze { rows, cols } => {
            return Ok(vec![GridMsg::SetFrozenRows(*rows), GridMsg::SetFrozenCols(*cols)])
        }
        Command::Set { row, column, value } => GridMsg::SetCell {
            row: row_index(*row)?,
            col: resolve_column(session, column)?,
            value: value.clone(),
        },
        Command::AddRows { count } => GridMsg::AddRows(*count),
        Command::AddColumns { count } => GridMsg::AddColumns(*count),
        Command::DeleteRow { row } => GridMsg::DeleteRow(row_index(*row)?),
        Command::DeleteColumn { column } => GridMsg::DeleteColumn(column_key(session, column)?),
        Command::RenameColumn { old, new } => GridMsg::RenameColumn {
            old: column_key(session, old)?,
            new: new.clone(),
        },
        Command::MoveColumn {
            column,
            target,
            after,
        } => GridMsg::MoveColumn {
            key: column_key(session, column)?,
            target: column_key(session, target)?,
            placement: placement(*after),
        },
        Command::MoveRow {
            from,
            target,
            after,
        } => GridMsg::MoveRow {
            from: row_index(*from)?,
            target: row_index(*target)?,
            placement: placement(*after),
        },
        Command::RenameTable { name } => GridMsg::RenameTable {
            index,
            name: name.clone(),
        },
        Command::DeleteTable => GridMsg::DeleteTable(index),
        Command::AddTable {
            container,
            row_name,
        } => GridMsg::AddTable {
            container: container.clone(),
            row_name: row_name.clone(),
        },
    };
    Ok(vec![msg])
}

/// Render the active table: a header of letters and keys, then the rows
///
/// Frozen rows are followed by a `--` line; frozen columns by an empty
/// field.
pub fn render_table(session: &EditSession) -> String {
    let keys = session.column_keys();
    let (frozen_rows, frozen_cols) = session
        .active_table()
        .and_then(|t| session.view_state(&t.name))
        .map_or((0, 0), |state| (state.frozen_rows, state.frozen_cols));

    let mut lines = Vec::with_capacity(session.row_count() + 3);
    if let Some(table) = session.active_table() {
        lines.push(format!("# {} ({})", table.name, table.path));
    }
    let split = |mut fields: Vec<String>| {
        if frozen_cols > 0 && frozen_cols < fields.len() {
            fields.insert(frozen_cols, String::new());
        }
        fields.join("\t")
    };
    let header: Vec<String> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| format!("{}:{}", column_letter(i), key))
        .collect();
    lines.push(split(header));
    for row in 0..session.row_count() {
        if frozen_rows > 0 && row == frozen_rows {
            lines.push("--".to_string());
        }
        let cells: Vec<String> = (0..keys.len())
            .map(|col| session.cell_text(row, col).replace('\n', "\\n"))
            .collect();
        lines.push(split(cells));
    }
    lines.join("\n")
}
