//! Command types for the Elm-style architecture
//!
//! Commands represent side effects that the host runtime performs after an
//! update: writing the document, talking to the clipboard, telling the user.

use crate::discovery::Incompatibility;
use crate::grid::GridError;
use crate::session::CellPosition;
use crate::tree::ParseError;

/// Pending transposed paste; echoed back with the clipboard text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardRequest {
    pub id: u64,
    /// Name of the table the paste targets
    pub table: String,
    pub row: usize,
    pub col: usize,
}

/// User-facing notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The document is an office spreadsheet and is blocked from editing
    Incompatible(Incompatibility),
    /// A refresh could not parse the document; the last good state is kept
    ParseFailed(ParseError),
    /// A command was rejected and nothing was written
    Rejected(GridError),
    /// An external reload discarded an uncommitted edit
    EditDiscarded {
        table: String,
        position: CellPosition,
        text: String,
    },
    /// The document had no tables and a placeholder was added
    PlaceholderCreated(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Incompatible(incompatibility) => f.write_str(&incompatibility.message()),
            Notice::ParseFailed(err) => write!(f, "{}", err),
            Notice::Rejected(err) => write!(f, "{}", err),
            Notice::EditDiscarded {
                table,
                position,
                text,
            } => write!(
                f,
                "The document changed on disk; discarded edit {:?} in {} at row {}, column {}",
                text,
                table,
                position.row + 1,
                position.col + 1
            ),
            Notice::PlaceholderCreated(name) => {
                write!(f, "No tables found; created empty table {}", name)
            }
        }
    }
}

/// Commands returned by update functions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Cmd {
    /// No command - do nothing
    #[default]
    None,
    /// Grid state changed; redraw the presentation
    Redraw,
    /// Replace the whole document (fire-and-forget)
    WriteDocument { text: String, seq: u64 },
    /// Put text on the system clipboard
    WriteClipboard(String),
    /// Read the system clipboard; the answer comes back as
    /// `DocumentMsg::ClipboardText`
    ReadClipboard(ClipboardRequest),
    /// Show a notice to the user
    Notify(Notice),
    /// Execute multiple commands
    Batch(Vec<Cmd>),
}

impl Cmd {
    /// Create a batch of commands, dropping `None` and unwrapping single items
    pub fn batch(cmds: Vec<Cmd>) -> Self {
        let mut cmds: Vec<Cmd> = cmds.into_iter().filter(|c| *c != Cmd::None).collect();
        match cmds.len() {
            0 => Cmd::None,
            1 => cmds.remove(0),
            _ => Cmd::Batch(cmds),
        }
    }

    /// Check if this command requires a redraw
    pub fn needs_redraw(&self) -> bool {
        match self {
            Cmd::None => false,
            Cmd::Redraw => true,
            Cmd::WriteDocument { .. } => true,
            // Clipboard writes don't change what is shown
            Cmd::WriteClipboard(_) => false,
            // The answer arrives as a message that redraws on its own
            Cmd::ReadClipboard(_) => false,
            Cmd::Notify(_) => true,
            Cmd::Batch(cmds) => cmds.iter().any(|c| c.needs_redraw()),
        }
    }

    /// Flatten nested batches into a list of leaf commands
    pub fn into_vec(self) -> Vec<Cmd> {
        match self {
            Cmd::None => Vec::new(),
            Cmd::Batch(cmds) => cmds.into_iter().flat_map(Cmd::into_vec).collect(),
            other => vec![other],
        }
    }

    /// The document write carried by this command, if any
    pub fn document_write(&self) -> Option<(&str, u64)> {
        match self {
            Cmd::WriteDocument { text, seq } => Some((text, *seq)),
            Cmd::Batch(cmds) => cmds.iter().rev().find_map(Cmd::document_write),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_drops_none_and_unwraps_single() {
        assert_eq!(Cmd::batch(vec![Cmd::None, Cmd::Redraw]), Cmd::Redraw);
        assert_eq!(Cmd::batch(vec![Cmd::None]), Cmd::None);
    }

    #[test]
    fn test_needs_redraw_through_batch() {
        let cmd = Cmd::Batch(vec![Cmd::WriteClipboard("x".into()), Cmd::Redraw]);
        assert!(cmd.needs_redraw());
        assert!(!Cmd::WriteClipboard("x".into()).needs_redraw());
    }

    #[test]
    fn test_document_write_finds_nested() {
        let cmd = Cmd::Batch(vec![
            Cmd::Redraw,
            Cmd::WriteDocument {
                text: "<a></a>".into(),
                seq: 3,
            },
        ]);
        assert_eq!(cmd.document_write(), Some(("<a></a>", 3)));
        assert_eq!(cmd.into_vec().len(), 2);
    }
}
