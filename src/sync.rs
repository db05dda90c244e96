//! Sync engine: keeps the edit session and the document text consistent
//!
//! Every tree mutation is serialized and handed to the host as a
//! `Cmd::WriteDocument`. The host later reports content changes, some of
//! which are echoes of our own writes. Echoes refresh the session while
//! keeping view state; anything else is an external edit and resets it.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::commands::{ClipboardRequest, Cmd, Notice};
use crate::config::{EchoDetection, EngineConfig};
use crate::document::DocumentChange;
use crate::grid::GridError;
use crate::messages::{DocumentMsg, GridMsg, Msg};
use crate::session::{EditSession, Outcome};
use crate::tree::{TreeCodec, XmlCodec};

/// Source of time for the echo grace window
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to; clones share the same time
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Whether a write of ours is still waiting for its change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    AwaitingEcho { seq: u64, since: Instant },
}

/// How a change notification is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Caused by our latest write
    Echo,
    /// Caused by an older write; the in-memory state is newer
    StaleEcho,
    /// Same text as our last write
    Unchanged,
    /// Someone else changed the document
    External,
}

pub struct SyncEngine<C: TreeCodec = XmlCodec> {
    codec: C,
    config: EngineConfig,
    clock: Box<dyn Clock>,
    state: SyncState,
    last_self_written: Option<String>,
    last_write_at: Option<Instant>,
    next_seq: u64,
    latest_seq: u64,
    session: Option<EditSession>,
}

impl SyncEngine<XmlCodec> {
    pub fn new(config: EngineConfig) -> Self {
        let codec = XmlCodec::new(config.indent.clone());
        Self::with_codec(codec, config)
    }
}

impl<C: TreeCodec> SyncEngine<C> {
    pub fn with_codec(codec: C, config: EngineConfig) -> Self {
        Self {
            codec,
            config,
            clock: Box::new(SystemClock),
            state: SyncState::Idle,
            last_self_written: None,
            last_write_at: None,
            next_seq: 1,
            latest_seq: 0,
            session: None,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut EditSession> {
        self.session.as_mut()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn last_self_written(&self) -> Option<&str> {
        self.last_self_written.as_deref()
    }

    /// Serialize the current tree, as it would be written
    pub fn serialize(&self) -> Option<String> {
        self.session
            .as_ref()
            .map(|session| self.codec.serialize(session.tree()))
    }

    /// Handle one message; the returned command is for the host to run
    pub fn handle(&mut self, msg: Msg) -> Cmd {
        match msg {
            Msg::Grid(msg) => self.dispatch(msg),
            Msg::Document(DocumentMsg::Open(text)) => self.open(&text),
            Msg::Document(DocumentMsg::Changed(change)) => self.on_document_changed(change),
            Msg::Document(DocumentMsg::VisibilityChanged { visible, text }) => {
                self.on_visibility_changed(visible, &text)
            }
            Msg::Document(DocumentMsg::ClipboardText { request, text }) => {
                self.on_clipboard_text(&request, text)
            }
            Msg::Document(DocumentMsg::Close) => {
                self.close();
                Cmd::Redraw
            }
        }
    }

    // === Lifecycle ===

    /// Parse `text` and start a session on it
    ///
    /// When parsing fails there is no session; a later change notification
    /// retries the open.
    pub fn open(&mut self, text: &str) -> Cmd {
        self.state = SyncState::Idle;
        self.last_self_written = Some(text.to_string());
        match self.codec.parse(text) {
            Ok(tree) => {
                let (session, outcome) = EditSession::open(tree, self.config.clone());
                tracing::info!("Opened document with {} tables", session.tables().len());
                self.session = Some(session);
                self.finish(outcome)
            }
            Err(err) => {
                tracing::warn!("Could not open document: {}", err);
                self.session = None;
                Cmd::Notify(Notice::ParseFailed(err))
            }
        }
    }

    pub fn close(&mut self) {
        tracing::info!("Closing document");
        self.session = None;
        self.state = SyncState::Idle;
        self.last_self_written = None;
        self.last_write_at = None;
    }

    // === Grid commands ===

    pub fn dispatch(&mut self, msg: GridMsg) -> Cmd {
        let Some(session) = self.session.as_mut() else {
            if msg.is_navigation() {
                return Cmd::None;
            }
            let err = GridError::Blocked("The document could not be parsed".to_string());
            return Cmd::Notify(Notice::Rejected(err));
        };
        let outcome = session.dispatch(msg);
        self.finish(outcome)
    }

    pub fn on_clipboard_text(&mut self, request: &ClipboardRequest, text: Option<String>) -> Cmd {
        let (Some(session), Some(text)) = (self.session.as_mut(), text) else {
            tracing::debug!("Clipboard request {} answered with nothing", request.id);
            return Cmd::None;
        };
        let outcome = match session.apply_transposed(request, &text) {
            Ok(outcome) => outcome,
            Err(err) => Outcome::rejected(err),
        };
        self.finish(outcome)
    }

    /// Turn a session outcome into host commands, writing the document if
    /// the tree changed
    fn finish(&mut self, outcome: Outcome) -> Cmd {
        let Outcome { sync, redraw, mut cmds } = outcome;
        if sync {
            if let Some(write) = self.write() {
                cmds.push(write);
            }
        }
        if redraw {
            cmds.push(Cmd::Redraw);
        }
        Cmd::batch(cmds)
    }

    fn write(&mut self) -> Option<Cmd> {
        let text = self.serialize()?;
        // No change notification would follow, so nothing to await
        if self.last_self_written.as_deref() == Some(text.as_str()) {
            tracing::debug!("Skipping write: document already holds this text");
            return None;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.latest_seq = seq;

        let now = self.clock.now();
        self.last_self_written = Some(text.clone());
        self.last_write_at = Some(now);
        self.state = SyncState::AwaitingEcho { seq, since: now };
        tracing::debug!("Writing document (seq {}, {} bytes)", seq, text.len());
        Some(Cmd::WriteDocument { text, seq })
    }

    // === Change notifications ===

    fn within_grace_window(&self) -> bool {
        let window = Duration::from_millis(self.config.echo_grace_ms);
        self.last_write_at
            .is_some_and(|at| self.clock.now().saturating_duration_since(at) <= window)
    }

    /// Decide how a change notification is treated
    pub fn classify(&self, change: &DocumentChange) -> ChangeKind {
        let unchanged = self.last_self_written.as_deref() == Some(change.text.as_str());
        match self.config.echo_detection {
            EchoDetection::Sequence => match change.seq {
                Some(seq) if seq < self.latest_seq => ChangeKind::StaleEcho,
                Some(_) => ChangeKind::Echo,
                None if unchanged => ChangeKind::Unchanged,
                None => ChangeKind::External,
            },
            EchoDetection::GraceWindow => {
                if matches!(self.state, SyncState::AwaitingEcho { .. }) {
                    ChangeKind::Echo
                } else if unchanged {
                    ChangeKind::Unchanged
                } else if self.within_grace_window() {
                    ChangeKind::Echo
                } else {
                    ChangeKind::External
                }
            }
        }
    }

    pub fn on_document_changed(&mut self, change: DocumentChange) -> Cmd {
        if self.session.is_none() {
            tracing::debug!("Retrying open after document change");
            return self.open(&change.text);
        }

        let kind = self.classify(&change);
        tracing::debug!("Document change (seq {:?}) classified as {:?}", change.seq, kind);
        match kind {
            ChangeKind::StaleEcho | ChangeKind::Unchanged => Cmd::None,
            ChangeKind::Echo => {
                let cmd = self.refresh(&change.text, true);
                if change.seq.map_or(true, |seq| seq >= self.latest_seq) {
                    self.state = SyncState::Idle;
                }
                cmd
            }
            ChangeKind::External => {
                tracing::info!("Document changed externally; resetting view state");
                self.state = SyncState::Idle;
                self.refresh(&change.text, false)
            }
        }
    }

    /// Silent refresh when the editor is shown again, unless a write is pending
    pub fn on_visibility_changed(&mut self, visible: bool, text: &str) -> Cmd {
        if !visible || self.session.is_none() || self.state != SyncState::Idle {
            return Cmd::None;
        }
        self.refresh(text, true)
    }

    /// Re-parse `text` into the session; the last good state is kept on failure
    fn refresh(&mut self, text: &str, preserve: bool) -> Cmd {
        let tree = match self.codec.parse(text) {
            Ok(tree) => tree,
            Err(err) => {
                tracing::warn!("Keeping last good state: {}", err);
                return Cmd::Notify(Notice::ParseFailed(err));
            }
        };
        let Some(session) = self.session.as_mut() else {
            return Cmd::None;
        };
        let outcome = session.reload(tree, preserve);
        self.last_self_written = Some(text.to_string());
        self.finish(outcome)
    }
}
