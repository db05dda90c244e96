//! In-cell edit buffer

use super::selection::CellPosition;

/// Text being typed into a cell, with a character cursor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditBuffer {
    text: String,
    /// Cursor position in characters
    cursor: usize,
}

impl EditBuffer {
    /// Buffer holding `text` with the cursor at the end
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            cursor: text.chars().count(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    fn len_chars(&self) -> usize {
        self.text.chars().count()
    }

    pub fn insert_char(&mut self, ch: char) {
        let at = self.byte_index(self.cursor);
        self.text.insert(at, ch);
        self.cursor += 1;
    }

    pub fn delete_backward(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.text.remove(at);
    }

    pub fn delete_forward(&mut self) {
        if self.cursor >= self.len_chars() {
            return;
        }
        let at = self.byte_index(self.cursor);
        self.text.remove(at);
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.len_chars());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.len_chars();
    }
}

/// The single active edit: which cell, what it held, what is typed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditCursor {
    pub position: CellPosition,
    pub buffer: EditBuffer,
    /// Value before editing (for cancel)
    pub original: String,
}

impl EditCursor {
    /// Edit starting from the cell's current value
    pub fn new(position: CellPosition, value: String) -> Self {
        Self {
            position,
            buffer: EditBuffer::new(&value),
            original: value,
        }
    }

    /// Edit whose buffer starts with `initial` instead of the cell value
    pub fn with_text(position: CellPosition, original: String, initial: &str) -> Self {
        Self {
            position,
            buffer: EditBuffer::new(initial),
            original,
        }
    }

    pub fn is_modified(&self) -> bool {
        self.buffer.text() != self.original
    }
}
