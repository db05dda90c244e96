//! Document stores: where the text lives and how changes are reported
//!
//! `FileDocument` watches a file on disk with the `notify` crate and
//! debounces events so an editor's save burst becomes one change.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use anyhow::Result;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind, Debouncer};

/// New document content reported by a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChange {
    pub text: String,
    /// Sequence number of our write that produced this content, when the
    /// store can tell
    pub seq: Option<u64>,
}

/// Document boundary: whole-content writes in, change notifications out
pub trait DocumentStore {
    fn read(&self) -> Result<String>;

    /// Replace the whole document; tagged so echoes can be correlated
    fn replace(&mut self, text: &str, seq: u64) -> Result<()>;

    /// Drain pending change notifications (non-blocking)
    fn poll_changes(&mut self) -> Vec<DocumentChange>;
}

/// In-memory store; every write comes back as a tagged change
#[derive(Debug, Default)]
pub struct MemoryDocument {
    text: String,
    pending: VecDeque<DocumentChange>,
}

impl MemoryDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pending: VecDeque::new(),
        }
    }

    /// Simulate another writer changing the document
    pub fn external_edit(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.pending.push_back(DocumentChange {
            text: self.text.clone(),
            seq: None,
        });
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl DocumentStore for MemoryDocument {
    fn read(&self) -> Result<String> {
        Ok(self.text.clone())
    }

    fn replace(&mut self, text: &str, seq: u64) -> Result<()> {
        self.text = text.to_string();
        self.pending.push_back(DocumentChange {
            text: self.text.clone(),
            seq: Some(seq),
        });
        Ok(())
    }

    fn poll_changes(&mut self) -> Vec<DocumentChange> {
        self.pending.drain(..).collect()
    }
}

type DebounceResult = std::result::Result<Vec<DebouncedEvent>, notify::Error>;

/// A document backed by a file, watched for changes
pub struct FileDocument {
    path: PathBuf,
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    rx: Receiver<DebounceResult>,
    /// Our most recent write, to tag its echo
    last_write: Option<(u64, String)>,
    /// Content of the last reported change
    last_seen: Option<String>,
}

impl FileDocument {
    /// Open and start watching `path`
    ///
    /// The parent directory is watched rather than the file, so saves that
    /// replace the file through a rename are still seen.
    pub fn open(path: impl Into<PathBuf>, debounce: Duration) -> Result<Self> {
        let path = path.into();
        let (tx, rx) = mpsc::channel();
        let mut debouncer = new_debouncer(debounce, tx)
            .map_err(|e| anyhow::anyhow!("Failed to create file watcher: {}", e))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        debouncer
            .watcher()
            .watch(&dir, notify::RecursiveMode::NonRecursive)
            .map_err(|e| anyhow::anyhow!("Failed to watch {}: {}", dir.display(), e))?;

        tracing::info!("Watching document: {}", path.display());
        let last_seen = fs::read_to_string(&path).ok();

        Ok(Self {
            path,
            _debouncer: debouncer,
            rx,
            last_write: None,
            last_seen,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_document(&self, event_path: &Path) -> bool {
        event_path.file_name().is_some() && event_path.file_name() == self.path.file_name()
    }

    fn drain_events(&self) -> bool {
        let mut touched = false;
        while let Ok(result) = self.rx.try_recv() {
            match result {
                Ok(events) => {
                    for event in events {
                        // Continuous events fire while a write is still going on
                        if matches!(event.kind, DebouncedEventKind::AnyContinuous) {
                            continue;
                        }
                        touched |= self.is_document(&event.path);
                    }
                }
                Err(e) => {
                    tracing::warn!("File watcher error: {:?}", e);
                }
            }
        }
        touched
    }

    /// Turn freshly read content into a change, if there is one to report
    ///
    /// Content matching our outstanding write is always reported as its echo,
    /// even when the bytes on disk did not change.
    fn change_for(&mut self, text: String) -> Option<DocumentChange> {
        let echo = self
            .last_write
            .as_ref()
            .is_some_and(|(_, written)| *written == text);
        if !echo && self.last_seen.as_deref() == Some(text.as_str()) {
            return None;
        }

        let seq = if echo {
            self.last_write.take().map(|(seq, _)| seq)
        } else {
            None
        };
        self.last_seen = Some(text.clone());
        Some(DocumentChange { text, seq })
    }
}

impl DocumentStore for FileDocument {
    fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", self.path.display(), e))
    }

    fn replace(&mut self, text: &str, seq: u64) -> Result<()> {
        fs::write(&self.path, text)
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", self.path.display(), e))?;
        tracing::debug!("Wrote {} (seq {})", self.path.display(), seq);
        self.last_write = Some((seq, text.to_string()));
        Ok(())
    }

    fn poll_changes(&mut self) -> Vec<DocumentChange> {
        if !self.drain_events() {
            return Vec::new();
        }

        let text = match self.read() {
            Ok(text) => text,
            Err(e) => {
                // Mid-rename saves can briefly leave no file behind
                tracing::debug!("Skipping change: {}", e);
                return Vec::new();
            }
        };
        self.change_for(text).into_iter().collect()
    }
}
