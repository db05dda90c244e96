//! Update function for the Elm-style architecture
//!
//! All state transformations flow through here.

use crate::commands::Cmd;
use crate::messages::{DocumentMsg, GridMsg, Msg};
use crate::sync::SyncEngine;
use crate::tree::TreeCodec;

#[cfg(debug_assertions)]
use crate::tracing::SessionSnapshot;
#[cfg(debug_assertions)]
use tracing::{debug, span, Level};

/// Main update function
///
/// In debug builds, this wraps with tracing instrumentation.
/// In release builds, it's a direct dispatch.
#[inline]
pub fn update<C: TreeCodec>(engine: &mut SyncEngine<C>, msg: Msg) -> Option<Cmd> {
    #[cfg(debug_assertions)]
    {
        update_traced(engine, msg)
    }
    #[cfg(not(debug_assertions))]
    {
        update_inner(engine, msg)
    }
}

fn update_inner<C: TreeCodec>(engine: &mut SyncEngine<C>, msg: Msg) -> Option<Cmd> {
    match engine.handle(msg) {
        Cmd::None => None,
        cmd => Some(cmd),
    }
}

/// Traced update wrapper (debug builds only)
///
/// Captures before/after session state and logs the difference.
#[cfg(debug_assertions)]
fn update_traced<C: TreeCodec>(engine: &mut SyncEngine<C>, msg: Msg) -> Option<Cmd> {
    let msg_name = msg_type_name(&msg);
    let _span = span!(Level::DEBUG, "update", msg = %msg_name).entered();

    let before = SessionSnapshot::from_engine(engine);
    debug!(target: "message", msg = %msg_name, "processing");

    let result = update_inner(engine, msg);

    let after = SessionSnapshot::from_engine(engine);
    if let Some(diff) = before.diff(&after) {
        debug!(target: "session", %diff, "state changed");
    }
    if let Some(cmd) = &result {
        debug!(
            target: "message",
            redraw = cmd.needs_redraw(),
            writes = cmd.document_write().is_some(),
            "result"
        );
    }
    result
}

/// Short message name for logs
pub fn msg_type_name(msg: &Msg) -> String {
    match msg {
        Msg::Grid(m) => format!("Grid::{}", grid_msg_name(m)),
        Msg::Document(m) => {
            let name = match m {
                DocumentMsg::Open(_) => "Open",
                DocumentMsg::Changed(_) => "Changed",
                DocumentMsg::VisibilityChanged { .. } => "VisibilityChanged",
                DocumentMsg::ClipboardText { .. } => "ClipboardText",
                DocumentMsg::Close => "Close",
            };
            format!("Document::{}", name)
        }
    }
}

fn grid_msg_name(msg: &GridMsg) -> String {
    match msg {
        GridMsg::Key(input) => format!("Key({:?})", input.key),
        // Variant name only; payloads can hold whole cell values
        other => {
            let debug = format!("{:?}", other);
            debug
                .split(|c: char| !c.is_alphanumeric())
                .next()
                .unwrap_or_default()
                .to_string()
        }
    }
}
