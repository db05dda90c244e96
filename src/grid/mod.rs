//! Grid model over discovered tables
//!
//! - `model` - row/column mutations applied to a table's rows
//! - `view` - per-table view state (column order, frozen panes, sizes)
//! - `sheets` - whole-table operations (rename, delete, add)

mod model;
mod sheets;
mod view;

pub use model::{read_cell, TableGrid, DEFAULT_COLUMN};
pub use sheets::{add_table, delete_table, rename_table};
pub use view::{GridState, ViewStates};

/// Where to insert relative to a target row or column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Before,
    After,
}

/// Rejected grid operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// Bad user input (empty names, names containing whitespace)
    #[error("{0}")]
    Validation(String),
    /// The operation conflicts with the current structure
    #[error("{0}")]
    StructuralConflict(String),
    #[error("No table is active")]
    NoActiveTable,
    /// The document is incompatible or failed to parse
    #[error("Editing is blocked: {0}")]
    Blocked(String),
}

/// Check a column or table name: non-empty and free of whitespace
pub fn validate_name(name: &str) -> Result<(), GridError> {
    if name.is_empty() {
        return Err(GridError::Validation("Name cannot be empty".to_string()));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(GridError::Validation(format!(
            "Name {:?} cannot contain whitespace",
            name
        )));
    }
    Ok(())
}

/// Spreadsheet-style column letter: 0 -> A, 25 -> Z, 26 -> AA
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Inverse of [`column_letter`]; `None` unless the input is all ASCII letters
pub fn column_from_letter(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    letters
        .chars()
        .try_fold(0usize, |acc, c| {
            let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
            acc.checked_mul(26)?.checked_add(digit)
        })
        .map(|n| n - 1)
}
