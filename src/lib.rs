//! xmlgrid - edit XML documents as spreadsheet grids
//!
//! The document is parsed into a tree, repeated elements are discovered as
//! tables, and grid edits are written back to the tree and serialized. The
//! crate follows the Elm Architecture: messages go through `update`, side
//! effects come back as commands for the runtime to perform.

pub mod cli;
pub mod clipboard;
pub mod commands;
pub mod config;
pub mod config_paths;
pub mod discovery;
pub mod document;
pub mod grid;
pub mod messages;
pub mod runtime;
pub mod session;
pub mod sync;
pub mod tracing;
pub mod tree;
pub mod update;

// Re-export commonly used types
pub use commands::Cmd;
pub use config::EngineConfig;
pub use messages::Msg;
pub use session::EditSession;
pub use sync::SyncEngine;
