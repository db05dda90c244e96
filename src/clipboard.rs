//! Clipboard boundary
//!
//! Reads are deferred: the answer arrives on a channel so the caller never
//! blocks on the platform clipboard.

use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};

use anyhow::Result;

pub trait ClipboardProvider {
    /// Start reading the clipboard; `None` when it holds no text
    fn read_text(&self) -> Receiver<Option<String>>;

    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// The platform clipboard via `arboard`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl ClipboardProvider for SystemClipboard {
    fn read_text(&self) -> Receiver<Option<String>> {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let text = match arboard::Clipboard::new() {
                Ok(mut clipboard) => clipboard.get_text().ok(),
                Err(e) => {
                    tracing::warn!("Clipboard unavailable: {}", e);
                    None
                }
            };
            let _ = tx.send(text);
        });
        rx
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| anyhow::anyhow!("Failed to open clipboard: {}", e))?;
        clipboard
            .set_text(text)
            .map_err(|e| anyhow::anyhow!("Failed to write clipboard: {}", e))
    }
}

/// Process-local clipboard; clones share contents
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    text: Arc<Mutex<Option<String>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Arc::new(Mutex::new(Some(text.into()))),
        }
    }

    pub fn text(&self) -> Option<String> {
        self.text.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ClipboardProvider for MemoryClipboard {
    fn read_text(&self) -> Receiver<Option<String>> {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(self.text());
        rx
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        *self.text.lock().unwrap_or_else(|e| e.into_inner()) = Some(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_clipboard_shared_between_clones() {
        let mut writer = MemoryClipboard::new();
        let reader = writer.clone();
        assert_eq!(reader.read_text().recv().unwrap(), None);
        writer.write_text("a\tb").unwrap();
        assert_eq!(reader.read_text().recv().unwrap(), Some("a\tb".to_string()));
    }
}
