//! Message types for the Elm-style architecture
//!
//! All state changes flow through these message types.

use crate::commands::ClipboardRequest;
use crate::document::DocumentChange;
use crate::grid::Placement;

/// Keys the grid reacts to; shortcuts (copy, paste...) arrive as their own
/// messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Tab,
    Enter,
    Escape,
    Delete,
    Backspace,
    Home,
    End,
    Char(char),
}

/// A key press with the modifier the grid cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub shift: bool,
}

impl KeyInput {
    pub fn new(key: Key) -> Self {
        Self { key, shift: false }
    }

    pub fn shifted(key: Key) -> Self {
        Self { key, shift: true }
    }
}

impl From<Key> for KeyInput {
    fn from(key: Key) -> Self {
        Self::new(key)
    }
}

/// Grid editing messages (selection, cell edits, structure)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridMsg {
    // === Worksheets ===
    /// Switch the active table
    SelectTable(usize),
    /// Rename the element holding a table's rows
    RenameTable { index: usize, name: String },
    /// Remove a table (and its container when left empty)
    DeleteTable(usize),
    /// Add a container with a two-row sample table
    AddTable { container: String, row_name: String },

    // === Selection ===
    /// Select a single cell (mouse down)
    SelectCell { row: usize, col: usize },
    /// Extend the selection to a cell (drag, Shift+Click)
    ExtendSelection { row: usize, col: usize },
    /// Keyboard input routed by edit mode
    Key(KeyInput),

    // === Cell Editing ===
    /// Open an edit, optionally seeded with text (keystroke-to-edit)
    StartEdit {
        row: usize,
        col: usize,
        initial: Option<String>,
    },
    /// Commit the active edit and move the selection
    CommitEdit {
        move_row: isize,
        move_col: isize,
        skip_reenter: bool,
    },
    /// Discard the active edit
    CancelEdit,
    /// Write one cell directly
    SetCell { row: usize, col: usize, value: String },
    /// Clear every selected cell
    DeleteSelection,

    // === Clipboard ===
    Copy,
    Cut,
    /// Paste the given text, or the internal buffer when `None`
    Paste(Option<String>),
    /// Paste clipboard lines across the columns of one row
    PasteTransposed { row: usize, col: usize },

    // === Structure ===
    AddRows(usize),
    AddColumns(usize),
    DeleteRow(usize),
    DeleteColumn(String),
    RenameColumn { old: String, new: String },
    MoveColumn {
        key: String,
        target: String,
        placement: Placement,
    },
    MoveRow {
        from: usize,
        target: usize,
        placement: Placement,
    },

    // === View ===
    SetFrozenRows(usize),
    SetFrozenCols(usize),
    SetColumnWidth { key: String, width: u32 },
    SetRowHeight { row: usize, height: u32 },
}

impl GridMsg {
    /// Messages that only move the selection or open/close an edit
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            GridMsg::SelectTable(_)
                | GridMsg::SelectCell { .. }
                | GridMsg::ExtendSelection { .. }
                | GridMsg::Key(_)
                | GridMsg::StartEdit { .. }
                | GridMsg::CancelEdit
                | GridMsg::Copy
        )
    }
}

/// Document lifecycle messages from the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentMsg {
    /// The document was opened with this text
    Open(String),
    /// The document store reported new content
    Changed(DocumentChange),
    /// The editor became visible or hidden; carries the current text
    VisibilityChanged { visible: bool, text: String },
    /// Answer to `Cmd::ReadClipboard`
    ClipboardText {
        request: ClipboardRequest,
        text: Option<String>,
    },
    /// The document was closed
    Close,
}

/// Top-level message type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    Grid(GridMsg),
    Document(DocumentMsg),
}

impl From<GridMsg> for Msg {
    fn from(msg: GridMsg) -> Self {
        Msg::Grid(msg)
    }
}

impl From<DocumentMsg> for Msg {
    fn from(msg: DocumentMsg) -> Self {
        Msg::Document(msg)
    }
}
