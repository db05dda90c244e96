//! Edit session over one open document
//!
//! Owns the parsed tree, the discovered tables and their view state, the
//! selection, the single active edit and the internal clipboard buffer.
//! Every grid command goes through [`EditSession::dispatch`], which returns
//! an [`Outcome`] telling the sync engine whether to write the document.

mod clipboard;
pub mod edit;
mod navigation;
pub mod selection;

use crate::commands::{ClipboardRequest, Cmd, Notice};
use crate::config::EngineConfig;
use crate::discovery::{discover, insert_placeholder, Discovery, Incompatibility, Table};
use crate::grid::{self, read_cell, GridError, GridState, Placement, TableGrid, ViewStates};
use crate::messages::GridMsg;
use crate::tree::{CellValue, Node, Path};

pub use edit::{EditBuffer, EditCursor};
pub use selection::{CellPosition, Selection};

/// Whether a cell edit is in progress
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditMode {
    #[default]
    Idle,
    Editing(EditCursor),
}

/// Whether the document can be edited as a grid
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DocumentStatus {
    #[default]
    Ready,
    Incompatible(Incompatibility),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ClipboardBuffer {
    text: String,
    from_cut: bool,
}

/// What the sync engine should do after a session operation
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// The tree changed and must be written
    pub sync: bool,
    pub redraw: bool,
    pub cmds: Vec<Cmd>,
}

impl Outcome {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn redraw() -> Self {
        Self {
            redraw: true,
            ..Self::default()
        }
    }

    pub fn sync() -> Self {
        Self {
            sync: true,
            redraw: true,
            cmds: Vec::new(),
        }
    }

    pub fn with(mut self, cmd: Cmd) -> Self {
        self.cmds.push(cmd);
        self
    }

    pub fn rejected(err: GridError) -> Self {
        Self::none().with(Cmd::Notify(Notice::Rejected(err)))
    }

    /// Fold another outcome into this one
    pub fn merge(&mut self, other: Outcome) {
        self.sync |= other.sync;
        self.redraw |= other.redraw;
        self.cmds.extend(other.cmds);
    }
}

/// Identity used to find the active table again after re-discovery
#[derive(Debug, Clone)]
struct Anchor {
    path: Path,
    name: String,
}

/// Session state for one open document
#[derive(Debug)]
pub struct EditSession {
    tree: Node,
    tables: Vec<Table>,
    views: ViewStates,
    status: DocumentStatus,
    active: Option<usize>,
    selection: Option<Selection>,
    mode: EditMode,
    clipboard: Option<ClipboardBuffer>,
    config: EngineConfig,
    next_request: u64,
}

impl EditSession {
    /// Start a session on a parsed tree
    ///
    /// The outcome asks for a write when a placeholder table was inserted.
    pub fn open(tree: Node, config: EngineConfig) -> (Self, Outcome) {
        let mut session = Self {
            tree: Node::empty_object(),
            tables: Vec::new(),
            views: ViewStates::default(),
            status: DocumentStatus::Ready,
            active: None,
            selection: None,
            mode: EditMode::Idle,
            clipboard: None,
            config,
            next_request: 1,
        };
        let outcome = session.reload(tree, false);
        (session, outcome)
    }

    // === Queries ===

    pub fn tree(&self) -> &Node {
        &self.tree
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn status(&self) -> &DocumentStatus {
        &self.status
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self.status, DocumentStatus::Incompatible(_))
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_table(&self) -> Option<&Table> {
        self.active.and_then(|i| self.tables.get(i))
    }

    pub fn table_index(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.name == name)
    }

    pub fn view_state(&self, table: &str) -> Option<&GridState> {
        self.views.get(table)
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn mode(&self) -> &EditMode {
        &self.mode
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, EditMode::Editing(_))
    }

    pub fn edit_cursor(&self) -> Option<&EditCursor> {
        match &self.mode {
            EditMode::Editing(edit) => Some(edit),
            EditMode::Idle => None,
        }
    }

    /// Text held in the internal clipboard buffer
    pub fn clipboard_text(&self) -> Option<&str> {
        self.clipboard.as_ref().map(|b| b.text.as_str())
    }

    fn active_rows(&self) -> Option<&[Node]> {
        self.active_table()?.rows(&self.tree)
    }

    fn active_state(&self) -> Option<&GridState> {
        self.views.get(&self.active_table()?.name)
    }

    pub fn row_count(&self) -> usize {
        self.active_rows().map_or(0, |rows| rows.len())
    }

    pub fn column_count(&self) -> usize {
        self.active_state().map_or(0, GridState::column_count)
    }

    /// Column keys of the active table in display order
    pub fn column_keys(&self) -> Vec<String> {
        self.active_state()
            .map(|state| state.column_order.clone())
            .unwrap_or_default()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<CellValue> {
        read_cell(self.active_rows()?, self.active_state()?, row, col)
    }

    pub fn cell_text(&self, row: usize, col: usize) -> String {
        self.cell(row, col)
            .map(|value| value.text().to_string())
            .unwrap_or_default()
    }

    // === Dispatch ===

    /// Apply one grid message
    pub fn dispatch(&mut self, msg: GridMsg) -> Outcome {
        if let DocumentStatus::Incompatible(incompatibility) = &self.status {
            if msg.is_navigation() {
                return Outcome::none();
            }
            let err = GridError::Blocked(incompatibility.message());
            tracing::warn!("Rejected {:?}: {}", msg, err);
            return Outcome::rejected(err);
        }

        let result = match msg.clone() {
            GridMsg::SelectTable(index) => self.select_table(index),
            GridMsg::RenameTable { index, name } => self.rename_table(index, &name),
            GridMsg::DeleteTable(index) => self.delete_table(index),
            GridMsg::AddTable {
                container,
                row_name,
            } => self.add_table(&container, &row_name),
            GridMsg::SelectCell { row, col } => self.select_cell(row, col),
            GridMsg::ExtendSelection { row, col } => self.extend_selection(row, col),
            GridMsg::Key(input) => self.handle_key(input),
            GridMsg::StartEdit { row, col, initial } => {
                Ok(self.start_edit(row, col, initial.as_deref()))
            }
            GridMsg::CommitEdit {
                move_row,
                move_col,
                skip_reenter,
            } => self.commit_edit(move_row, move_col, skip_reenter),
            GridMsg::CancelEdit => Ok(self.cancel_edit()),
            GridMsg::SetCell { row, col, value } => self.set_cell(row, col, &value),
            GridMsg::DeleteSelection => self.delete_selection(),
            GridMsg::Copy => Ok(self.copy()),
            GridMsg::Cut => self.cut(),
            GridMsg::Paste(text) => self.paste(text),
            GridMsg::PasteTransposed { row, col } => self.paste_transposed(row, col),
            GridMsg::AddRows(count) => self.structural(|grid, _| {
                grid.add_rows(count);
                Ok(())
            }),
            GridMsg::AddColumns(count) => self.structural(|grid, base| {
                grid.add_columns(count, base);
                Ok(())
            }),
            GridMsg::DeleteRow(row) => self.structural(|grid, _| grid.delete_row(row).map(|_| ())),
            GridMsg::DeleteColumn(key) => self.structural(|grid, _| grid.delete_column(&key)),
            GridMsg::RenameColumn { old, new } => grid::validate_name(new.trim())
                .and_then(|_| self.structural(|grid, _| grid.rename_column(&old, new.trim()))),
            GridMsg::MoveColumn {
                key,
                target,
                placement,
            } => self.structural(|grid, _| grid.move_column(&key, &target, placement)),
            GridMsg::MoveRow {
                from,
                target,
                placement,
            } => self.move_row(from, target, placement),
            GridMsg::SetFrozenRows(count) => self.view_change(|grid| {
                grid.set_frozen_rows(count);
            }),
            GridMsg::SetFrozenCols(count) => self.view_change(|grid| {
                grid.set_frozen_cols(count);
            }),
            GridMsg::SetColumnWidth { key, width } => {
                self.view_change(|grid| grid.set_column_width(&key, width))
            }
            GridMsg::SetRowHeight { row, height } => {
                self.view_change(|grid| grid.set_row_height(row, height))
            }
        };

        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("Rejected {:?}: {}", msg, err);
                Outcome::rejected(err)
            }
        }
    }

    // === Discovery ===

    fn current_anchor(&self) -> Option<Anchor> {
        self.active_table().map(|t| Anchor {
            path: t.path.clone(),
            name: t.name.clone(),
        })
    }

    /// Replace the tree with freshly parsed content
    ///
    /// With `preserve`, view state, selection and any in-flight edit survive
    /// and the active table is found again by name. Known tables that now
    /// parse as a single object are turned back into one-row arrays.
    /// Without it, all transient state is reset and an uncommitted edit is
    /// reported as discarded.
    pub fn reload(&mut self, mut tree: Node, preserve: bool) -> Outcome {
        let mut outcome = Outcome::redraw();
        let anchor = if preserve {
            for table in &self.tables {
                promote_single_row(&mut tree, &table.path);
            }
            self.current_anchor()
        } else {
            self.discard_edit(&mut outcome);
            self.views.clear();
            self.selection = None;
            self.active = None;
            None
        };

        self.tree = tree;
        self.refresh(anchor, &mut outcome);
        outcome
    }

    /// Drop the active edit, reporting it
    fn discard_edit(&mut self, outcome: &mut Outcome) {
        if let EditMode::Editing(edit) = std::mem::take(&mut self.mode) {
            let table = self
                .active_table()
                .map(|t| t.name.clone())
                .unwrap_or_default();
            tracing::info!("Discarding uncommitted edit at {:?}", edit.position);
            outcome.cmds.push(Cmd::Notify(Notice::EditDiscarded {
                table,
                position: edit.position,
                text: edit.buffer.text().to_string(),
            }));
        }
    }

    /// Re-run discovery on the current tree and re-anchor the active table
    fn refresh(&mut self, anchor: Option<Anchor>, outcome: &mut Outcome) {
        let mut tables = match discover(&self.tree) {
            Discovery::Incompatible(incompatibility) => {
                self.discard_edit(outcome);
                if !self.is_blocked() {
                    outcome.cmds.push(Cmd::Notify(Notice::Incompatible(
                        incompatibility.clone(),
                    )));
                }
                self.status = DocumentStatus::Incompatible(incompatibility);
                self.tables.clear();
                self.active = None;
                self.selection = None;
                return;
            }
            Discovery::Tables(tables) => tables,
        };
        self.status = DocumentStatus::Ready;

        if tables.is_empty() {
            let path = insert_placeholder(&mut self.tree, &self.config.placeholder);
            let name = path.last_key().unwrap_or_default().to_string();
            outcome.sync = true;
            outcome
                .cmds
                .push(Cmd::Notify(Notice::PlaceholderCreated(name)));
            if let Discovery::Tables(found) = discover(&self.tree) {
                tables = found;
            }
        }

        for table in &tables {
            self.views.entry(&table.name).reconcile(&table.columns);
        }
        self.tables = tables;

        let found = anchor.as_ref().and_then(|anchor| {
            self.tables
                .iter()
                .position(|t| t.path == anchor.path && t.name == anchor.name)
                .or_else(|| self.table_index(&anchor.name))
        });
        match found {
            Some(index) => {
                self.active = Some(index);
                self.clamp_to_active(outcome);
            }
            None => {
                if anchor.is_some() {
                    tracing::debug!("Active table disappeared; selecting the first table");
                    self.discard_edit(outcome);
                }
                self.active = if self.tables.is_empty() { None } else { Some(0) };
                self.reset_selection();
            }
        }
    }

    /// Keep selection and edit inside the active table's bounds
    fn clamp_to_active(&mut self, outcome: &mut Outcome) {
        let rows = self.row_count();
        let cols = self.column_count();
        self.selection = self.selection.and_then(|sel| sel.clamped(rows, cols));

        let out_of_bounds = self
            .edit_cursor()
            .is_some_and(|edit| edit.position.row >= rows || edit.position.col >= cols);
        if out_of_bounds {
            self.discard_edit(outcome);
        }
    }

    fn reset_selection(&mut self) {
        self.selection = (self.row_count() > 0 && self.column_count() > 0)
            .then(|| Selection::cell(CellPosition::default()));
    }

    /// Re-discover after a local mutation, keeping the active table
    fn refresh_local(&mut self, outcome: &mut Outcome) {
        let anchor = self.current_anchor();
        self.refresh(anchor, outcome);
    }

    // === Grid access ===

    fn table_grid(&mut self, index: usize) -> Result<TableGrid<'_>, GridError> {
        let table = self.tables.get(index).ok_or(GridError::NoActiveTable)?;
        let rows = self
            .tree
            .resolve_mut(&table.path)
            .and_then(Node::as_array_mut)
            .ok_or_else(|| {
                GridError::StructuralConflict(format!("Table {} no longer exists", table.name))
            })?;
        let state = self.views.entry(&table.name);
        Ok(TableGrid::new(rows, state))
    }

    fn active_grid(&mut self) -> Result<TableGrid<'_>, GridError> {
        let index = self.active.ok_or(GridError::NoActiveTable)?;
        self.table_grid(index)
    }

    /// Commit a pending edit in place before another command runs
    fn commit_pending(&mut self) -> Result<Outcome, GridError> {
        if self.is_editing() {
            self.commit_edit(0, 0, true)
        } else {
            Ok(Outcome::none())
        }
    }

    /// Commit a pending edit, then run `op`
    ///
    /// When `op` is rejected after the edit was committed, the commit is
    /// still reported so it gets written.
    fn after_commit<F>(&mut self, op: F) -> Result<Outcome, GridError>
    where
        F: FnOnce(&mut Self) -> Result<Outcome, GridError>,
    {
        let mut outcome = self.commit_pending()?;
        match op(self) {
            Ok(next) => {
                outcome.merge(next);
                Ok(outcome)
            }
            Err(err) if outcome.sync => {
                tracing::warn!("Rejected after committing the pending edit: {}", err);
                Ok(outcome.with(Cmd::Notify(Notice::Rejected(err))))
            }
            Err(err) => Err(err),
        }
    }

    /// Run a structural command on the active table and sync
    fn structural<F>(&mut self, op: F) -> Result<Outcome, GridError>
    where
        F: FnOnce(&mut TableGrid<'_>, &str) -> Result<(), GridError>,
    {
        self.after_commit(|session| {
            let base = session.config.new_column_base.clone();
            let mut grid = session.active_grid()?;
            op(&mut grid, &base)?;
            let mut outcome = Outcome::sync();
            session.refresh_local(&mut outcome);
            Ok(outcome)
        })
    }

    /// Change view state only; nothing is written
    fn view_change<F>(&mut self, op: F) -> Result<Outcome, GridError>
    where
        F: FnOnce(&mut TableGrid<'_>),
    {
        let mut grid = self.active_grid()?;
        op(&mut grid);
        Ok(Outcome::redraw())
    }

    // === Worksheets ===

    pub fn select_table(&mut self, index: usize) -> Result<Outcome, GridError> {
        if index >= self.tables.len() {
            return Err(GridError::StructuralConflict(format!(
                "Table {} does not exist",
                index
            )));
        }
        let mut outcome = self.commit_pending()?;
        self.active = Some(index);
        self.reset_selection();
        outcome.redraw = true;
        Ok(outcome)
    }

    /// Rename the element holding a table's rows
    ///
    /// Only this table instance is renamed. Other tables that shared its
    /// name keep their view state; the renamed one starts from a copy.
    pub fn rename_table(&mut self, index: usize, name: &str) -> Result<Outcome, GridError> {
        let name = name.trim();
        grid::validate_name(name)?;
        let table = self
            .tables
            .get(index)
            .cloned()
            .ok_or_else(|| GridError::StructuralConflict(format!("Table {} does not exist", index)))?;
        let shared = self.tables.iter().filter(|t| t.name == table.name).count() > 1;

        self.after_commit(|session| {
            let new_path = grid::rename_table(&mut session.tree, &table, name)?;
            if shared {
                session.views.fork(&table.name, name);
            } else {
                session.views.rename(&table.name, name);
            }

            let anchor = if session.active == Some(index) {
                Some(Anchor {
                    path: new_path,
                    name: name.to_string(),
                })
            } else {
                session.current_anchor()
            };
            let mut outcome = Outcome::sync();
            session.refresh(anchor, &mut outcome);
            Ok(outcome)
        })
    }

    pub fn delete_table(&mut self, index: usize) -> Result<Outcome, GridError> {
        let table = self
            .tables
            .get(index)
            .cloned()
            .ok_or_else(|| GridError::StructuralConflict(format!("Table {} does not exist", index)))?;

        self.after_commit(|session| {
            grid::delete_table(&mut session.tree, &table)?;
            if session.tables.iter().filter(|t| t.name == table.name).count() == 1 {
                session.views.remove(&table.name);
            }

            // Deleting the active table falls back to the one before it
            let anchor = if session.active == Some(index) {
                index
                    .checked_sub(1)
                    .and_then(|i| session.tables.get(i))
                    .map(|t| Anchor {
                        path: t.path.clone(),
                        name: t.name.clone(),
                    })
            } else {
                session.current_anchor()
            };
            let mut outcome = Outcome::sync();
            session.refresh(anchor, &mut outcome);
            Ok(outcome)
        })
    }

    pub fn add_table(&mut self, container: &str, row_name: &str) -> Result<Outcome, GridError> {
        let (container, row_name) = (container.trim(), row_name.trim());
        grid::validate_name(container)?;
        grid::validate_name(row_name)?;

        self.after_commit(|session| {
            let path = grid::add_table(
                &mut session.tree,
                container,
                row_name,
                &session.config.placeholder.root_element,
            )?;
            let anchor = Anchor {
                path,
                name: row_name.to_string(),
            };
            let mut outcome = Outcome::sync();
            session.refresh(Some(anchor), &mut outcome);
            session.reset_selection();
            Ok(outcome)
        })
    }

    // === Selection ===

    fn check_cell(&self, row: usize, col: usize) -> Result<(), GridError> {
        if row >= self.row_count() || col >= self.column_count() {
            return Err(GridError::StructuralConflict(format!(
                "Cell ({}, {}) is outside the table",
                row, col
            )));
        }
        Ok(())
    }

    pub fn select_cell(&mut self, row: usize, col: usize) -> Result<Outcome, GridError> {
        self.check_cell(row, col)?;
        let mut outcome = self.commit_pending()?;
        self.selection = Some(Selection::cell(CellPosition::new(row, col)));
        outcome.redraw = true;
        Ok(outcome)
    }

    pub fn extend_selection(&mut self, row: usize, col: usize) -> Result<Outcome, GridError> {
        self.check_cell(row, col)?;
        let mut outcome = self.commit_pending()?;
        let focus = CellPosition::new(row, col);
        self.selection = Some(match self.selection {
            Some(sel) => sel.extend_to(focus),
            None => Selection::cell(focus),
        });
        outcome.redraw = true;
        Ok(outcome)
    }

    // === Cell editing ===

    /// Open an edit on a cell; no-op while another edit is active or when
    /// the cell is out of bounds
    pub fn start_edit(&mut self, row: usize, col: usize, initial: Option<&str>) -> Outcome {
        if self.is_editing() || self.check_cell(row, col).is_err() {
            return Outcome::none();
        }
        let position = CellPosition::new(row, col);
        let original = self.cell_text(row, col);
        let edit = match initial {
            Some(text) => EditCursor::with_text(position, original, text),
            None => EditCursor::new(position, original),
        };
        tracing::debug!("Editing cell {:?}", position);
        self.mode = EditMode::Editing(edit);
        self.selection = Some(Selection::cell(position));
        Outcome::redraw()
    }

    /// Write the edit buffer and move the selection
    ///
    /// Moving down past the last row grows the table by one row first.
    pub fn commit_edit(
        &mut self,
        move_row: isize,
        move_col: isize,
        skip_reenter: bool,
    ) -> Result<Outcome, GridError> {
        // The edit stays open until the write succeeds
        let (position, text) = match &self.mode {
            EditMode::Editing(edit) => (edit.position, edit.buffer.text().to_string()),
            EditMode::Idle => return Ok(Outcome::none()),
        };

        let mut grid = self.active_grid()?;
        grid.set_cell(position.row, position.col, &text)?;
        if move_row == 1 && position.row + 1 >= grid.row_count() {
            grid.add_rows(1);
        }
        let rows = grid.row_count();
        let cols = grid.column_count();

        let dest_row = position.row as isize + move_row;
        let dest_col = position.col as isize + move_col;
        let in_bounds = dest_row >= 0
            && dest_col >= 0
            && (dest_row as usize) < rows
            && (dest_col as usize) < cols;
        let target = if in_bounds {
            CellPosition::new(dest_row as usize, dest_col as usize)
        } else {
            position.offset_clamped(move_row, move_col, rows, cols)
        };
        self.mode = EditMode::Idle;

        let mut outcome = Outcome::sync();
        self.refresh_local(&mut outcome);
        self.selection = Some(Selection::cell(target));
        tracing::debug!("Committed cell {:?}, moving to {:?}", position, target);

        if in_bounds && !skip_reenter && target != position {
            outcome.merge(self.start_edit(target.row, target.col, None));
        }
        Ok(outcome)
    }

    pub fn cancel_edit(&mut self) -> Outcome {
        match std::mem::take(&mut self.mode) {
            EditMode::Editing(edit) => {
                tracing::debug!("Cancelled edit at {:?}", edit.position);
                Outcome::redraw()
            }
            EditMode::Idle => Outcome::none(),
        }
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: &str) -> Result<Outcome, GridError> {
        self.check_cell(row, col)?;
        self.after_commit(|session| {
            session.active_grid()?.set_cell(row, col, value)?;
            let mut outcome = Outcome::sync();
            session.refresh_local(&mut outcome);
            Ok(outcome)
        })
    }

    /// Clear every cell in the selection with one write
    pub fn delete_selection(&mut self) -> Result<Outcome, GridError> {
        let Some(selection) = self.selection else {
            return Ok(Outcome::none());
        };
        self.after_commit(|session| {
            let mut grid = session.active_grid()?;
            for row in selection.rows() {
                for col in selection.cols() {
                    grid.set_cell(row, col, "")?;
                }
            }
            let mut outcome = Outcome::sync();
            session.refresh_local(&mut outcome);
            Ok(outcome)
        })
    }

    // === Clipboard ===

    fn selection_text(&self) -> Option<String> {
        let selection = self.selection?;
        let block: Vec<Vec<String>> = selection
            .rows()
            .map(|row| {
                selection
                    .cols()
                    .map(|col| self.cell_text(row, col))
                    .collect()
            })
            .collect();
        Some(clipboard::to_delimited(&block))
    }

    pub fn copy(&mut self) -> Outcome {
        let Some(text) = self.selection_text() else {
            return Outcome::none();
        };
        self.clipboard = Some(ClipboardBuffer {
            text: text.clone(),
            from_cut: false,
        });
        Outcome::none().with(Cmd::WriteClipboard(text))
    }

    pub fn cut(&mut self) -> Result<Outcome, GridError> {
        self.after_commit(|session| {
            let Some(text) = session.selection_text() else {
                return Ok(Outcome::none());
            };
            let mut outcome = session.delete_selection()?;
            session.clipboard = Some(ClipboardBuffer {
                text: text.clone(),
                from_cut: true,
            });
            outcome.cmds.push(Cmd::WriteClipboard(text));
            Ok(outcome)
        })
    }

    /// Paste text (or the internal buffer) at the selection
    ///
    /// A single value is broadcast over the whole selection; a block is
    /// written from the top-left corner, growing rows and clipping columns.
    pub fn paste(&mut self, text: Option<String>) -> Result<Outcome, GridError> {
        let (text, from_buffer) = match text {
            Some(text) => (text, false),
            None => match &self.clipboard {
                Some(buffer) => (buffer.text.clone(), true),
                None => return Ok(Outcome::none()),
            },
        };
        let Some(selection) = self.selection else {
            return Ok(Outcome::none());
        };

        self.after_commit(|session| session.paste_text(&text, selection, from_buffer))
    }

    fn paste_text(
        &mut self,
        text: &str,
        selection: Selection,
        from_buffer: bool,
    ) -> Result<Outcome, GridError> {
        let mut grid = self.active_grid()?;
        let new_selection = if clipboard::is_single_value(text) {
            let value = clipboard::single_value(text);
            for row in selection.rows() {
                for col in selection.cols() {
                    grid.set_cell(row, col, &value)?;
                }
            }
            selection
        } else {
            let block = clipboard::parse_delimited(text);
            let origin = selection.top_left();
            let cols = grid.column_count();
            grid.ensure_rows(origin.row + block.len());

            let mut widest = 1;
            for (i, line) in block.iter().enumerate() {
                for (j, value) in line.iter().enumerate() {
                    let col = origin.col + j;
                    if col >= cols {
                        break;
                    }
                    grid.set_cell(origin.row + i, col, value)?;
                    widest = widest.max(j + 1);
                }
            }
            Selection::cell(origin).extend_to(CellPosition::new(
                origin.row + block.len().saturating_sub(1),
                (origin.col + widest - 1).min(cols.saturating_sub(1)),
            ))
        };

        if from_buffer && self.clipboard.as_ref().is_some_and(|b| b.from_cut) {
            self.clipboard = None;
        }
        let mut outcome = Outcome::sync();
        self.refresh_local(&mut outcome);
        self.selection = new_selection.clamped(self.row_count(), self.column_count());
        Ok(outcome)
    }

    /// Ask the host for clipboard text to spread across a row
    pub fn paste_transposed(&mut self, row: usize, col: usize) -> Result<Outcome, GridError> {
        self.check_cell(row, col)?;
        let table = self
            .active_table()
            .map(|t| t.name.clone())
            .ok_or(GridError::NoActiveTable)?;
        let mut outcome = self.commit_pending()?;
        let request = ClipboardRequest {
            id: self.next_request,
            table,
            row,
            col,
        };
        self.next_request += 1;
        outcome.cmds.push(Cmd::ReadClipboard(request));
        Ok(outcome)
    }

    /// Apply clipboard text answering a transposed paste request
    ///
    /// Dropped when the table or row has gone away in the meantime.
    pub fn apply_transposed(
        &mut self,
        request: &ClipboardRequest,
        text: &str,
    ) -> Result<Outcome, GridError> {
        let Some(index) = self.table_index(&request.table) else {
            tracing::debug!("Dropping clipboard answer {}: table gone", request.id);
            return Ok(Outcome::none());
        };
        let values = clipboard::transposed_values(text);
        self.after_commit(|session| {
            // Commits can re-discover tables, so look the table up again
            let index = session.table_index(&request.table).unwrap_or(index);
            let mut grid = session.table_grid(index)?;
            if request.row >= grid.row_count() || values.is_empty() {
                tracing::debug!("Dropping clipboard answer {}: nothing to apply", request.id);
                return Ok(Outcome::none());
            }

            let cols = grid.column_count();
            for (offset, value) in values.iter().enumerate() {
                let col = request.col + offset;
                if col >= cols {
                    break;
                }
                grid.set_cell(request.row, col, value)?;
            }
            let mut outcome = Outcome::sync();
            session.refresh_local(&mut outcome);
            Ok(outcome)
        })
    }

    // === Structure ===

    fn move_row(
        &mut self,
        from: usize,
        target: usize,
        placement: Placement,
    ) -> Result<Outcome, GridError> {
        let outcome = self.structural(|grid, _| grid.move_row(from, target, placement))?;
        // Keep the moved row selected
        if let Some(sel) = self.selection {
            if sel.is_single_cell() && sel.anchor.row == from {
                let row = moved_row_index(from, target, placement);
                self.selection = Some(Selection::cell(CellPosition::new(row, sel.anchor.col)));
            }
        }
        Ok(outcome)
    }
}

fn moved_row_index(from: usize, target: usize, placement: Placement) -> usize {
    let target = if target > from { target - 1 } else { target };
    match placement {
        Placement::Before => target,
        Placement::After => target + 1,
    }
}

/// Turn a single object back into a one-row array at `path`
fn promote_single_row(tree: &mut Node, path: &Path) {
    if let Some(node) = tree.resolve_mut(path) {
        if matches!(node, Node::Object(_)) {
            let row = std::mem::replace(node, Node::Array(Vec::new()));
            *node = Node::Array(vec![row]);
            tracing::debug!("Promoted single row at {} back to a table", path);
        }
    }
}
