//! Runtime: runs commands against a document store and a clipboard
//!
//! Messages produced off the main thread (clipboard answers) come back
//! over an `mpsc` channel and are fed to `update` between operations.

use std::sync::mpsc::{self, Receiver, Sender};

use anyhow::Result;

use crate::clipboard::ClipboardProvider;
use crate::commands::{Cmd, Notice};
use crate::config::EngineConfig;
use crate::document::DocumentStore;
use crate::messages::{DocumentMsg, Msg};
use crate::sync::SyncEngine;
use crate::update::update;

pub struct Runtime<S: DocumentStore, K: ClipboardProvider> {
    engine: SyncEngine,
    store: S,
    clipboard: K,
    msg_tx: Sender<Msg>,
    msg_rx: Receiver<Msg>,
    notices: Vec<Notice>,
}

impl<S: DocumentStore, K: ClipboardProvider> Runtime<S, K> {
    pub fn new(config: EngineConfig, store: S, clipboard: K) -> Self {
        Self::with_engine(SyncEngine::new(config), store, clipboard)
    }

    pub fn with_engine(engine: SyncEngine, store: S, clipboard: K) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel();
        Self {
            engine,
            store,
            clipboard,
            msg_tx,
            msg_rx,
            notices: Vec::new(),
        }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Read the document from the store and open it
    pub fn open(&mut self) -> Result<bool> {
        let text = self.store.read()?;
        Ok(self.send(DocumentMsg::Open(text).into()))
    }

    /// Run one message through `update` and perform its commands
    ///
    /// Returns whether a redraw is needed.
    pub fn send(&mut self, msg: Msg) -> bool {
        match update(&mut self.engine, msg) {
            Some(cmd) => {
                let needs_redraw = cmd.needs_redraw();
                self.process_cmd(cmd);
                needs_redraw
            }
            None => false,
        }
    }

    fn process_cmd(&mut self, cmd: Cmd) {
        match cmd {
            Cmd::None | Cmd::Redraw => {}
            Cmd::WriteDocument { text, seq } => {
                if let Err(e) = self.store.replace(&text, seq) {
                    tracing::warn!("Document write {} failed: {}", seq, e);
                }
            }
            Cmd::WriteClipboard(text) => {
                if let Err(e) = self.clipboard.write_text(&text) {
                    tracing::warn!("{}", e);
                }
            }
            Cmd::ReadClipboard(request) => {
                let rx = self.clipboard.read_text();
                let tx = self.msg_tx.clone();
                std::thread::spawn(move || {
                    let text = rx.recv().ok().flatten();
                    let _ = tx.send(Msg::Document(DocumentMsg::ClipboardText { request, text }));
                });
            }
            Cmd::Notify(notice) => {
                tracing::info!("Notice: {}", notice);
                self.notices.push(notice);
            }
            Cmd::Batch(cmds) => {
                for cmd in cmds {
                    self.process_cmd(cmd);
                }
            }
        }
    }

    /// Feed queued store changes and async messages to `update`
    pub fn process_async_messages(&mut self) -> bool {
        let mut needs_redraw = false;
        for change in self.store.poll_changes() {
            needs_redraw |= self.send(DocumentMsg::Changed(change).into());
        }
        while let Ok(msg) = self.msg_rx.try_recv() {
            needs_redraw |= self.send(msg);
        }
        needs_redraw
    }

    /// Block until one async message arrives, then process it
    pub fn wait_for_message(&mut self) -> bool {
        match self.msg_rx.recv() {
            Ok(msg) => self.send(msg),
            Err(_) => false,
        }
    }

    /// Notices collected since the last call
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
