//! Logging setup and state-transition diagnostics
//!
//! Configure via RUST_LOG environment variable:
//! - `RUST_LOG=debug` - all debug logs
//! - `RUST_LOG=sync=debug,session=debug` - scoped filtering
//! - `RUST_LOG=xmlgrid::sync=debug` - echo/external classification only
//!
//! # Log Files
//!
//! Logs are written to `~/.config/xmlgrid/logs/xmlgrid.log` with daily rotation,
//! always at debug level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::session::{CellPosition, EditSession};
use crate::sync::{SyncEngine, SyncState};
use crate::tree::TreeCodec;

/// Install the console (stderr) and rolling file subscribers
///
/// Console output defaults to `warn` so stdout stays clean for command output.
pub fn init() {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(console_filter);

    let file_layer = crate::config_paths::ensure_logs_dir()
        .map_err(|e| eprintln!("Warning: Could not initialize file logging: {}", e))
        .ok()
        .map(|logs_dir| {
            fmt::layer()
                .with_writer(tracing_appender::rolling::daily(logs_dir, "xmlgrid.log"))
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true)
                .with_filter(EnvFilter::new("debug"))
        });

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}

/// Lightweight snapshot of engine state for diffing across an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub awaiting_seq: Option<u64>,
    pub table: Option<String>,
    pub rows: usize,
    pub cols: usize,
    pub anchor: Option<CellPosition>,
    pub focus: Option<CellPosition>,
    pub editing: Option<CellPosition>,
}

impl SessionSnapshot {
    pub fn from_engine<C: TreeCodec>(engine: &SyncEngine<C>) -> Self {
        let awaiting_seq = match engine.state() {
            SyncState::AwaitingEcho { seq, .. } => Some(seq),
            SyncState::Idle => None,
        };
        match engine.session() {
            Some(session) => Self::from_session(session, awaiting_seq),
            None => Self {
                awaiting_seq,
                table: None,
                rows: 0,
                cols: 0,
                anchor: None,
                focus: None,
                editing: None,
            },
        }
    }

    fn from_session(session: &EditSession, awaiting_seq: Option<u64>) -> Self {
        let selection = session.selection();
        Self {
            awaiting_seq,
            table: session.active_table().map(|t| t.name.clone()),
            rows: session.row_count(),
            cols: session.column_count(),
            anchor: selection.map(|s| s.anchor),
            focus: selection.map(|s| s.focus),
            editing: session.edit_cursor().map(|e| e.position),
        }
    }

    /// Describe what changed between two snapshots
    pub fn diff(&self, other: &SessionSnapshot) -> Option<String> {
        let mut changes = Vec::new();
        if self.table != other.table {
            changes.push(format!("table: {:?} -> {:?}", self.table, other.table));
        }
        if (self.rows, self.cols) != (other.rows, other.cols) {
            changes.push(format!(
                "size: {}x{} -> {}x{}",
                self.rows, self.cols, other.rows, other.cols
            ));
        }
        if (self.anchor, self.focus) != (other.anchor, other.focus) {
            changes.push(format!("selection: {:?} -> {:?}", self.focus, other.focus));
        }
        if self.editing != other.editing {
            changes.push(match other.editing {
                Some(position) => format!("editing {:?}", position),
                None => "edit closed".to_string(),
            });
        }
        if self.awaiting_seq != other.awaiting_seq {
            changes.push(match other.awaiting_seq {
                Some(seq) => format!("awaiting echo {}", seq),
                None => "idle".to_string(),
            });
        }

        if changes.is_empty() {
            None
        } else {
            Some(changes.join("; "))
        }
    }
}
