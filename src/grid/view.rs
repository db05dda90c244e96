//! Per-table view state
//!
//! View state is keyed by table name so it survives re-discovery after the
//! engine's own writes. It is dropped on external reloads.

use std::collections::HashMap;

/// View state of one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridState {
    /// Display order of column keys; a superset of the detected columns
    pub column_order: Vec<String>,
    pub frozen_rows: usize,
    pub frozen_cols: usize,
    /// Column widths in pixels, keyed by column name
    pub column_widths: HashMap<String, u32>,
    /// Row heights in pixels, keyed by row index
    pub row_heights: HashMap<usize, u32>,
}

impl GridState {
    /// Append newly detected columns without reordering known ones
    pub fn reconcile(&mut self, detected: &[String]) {
        for key in detected {
            if !self.column_order.contains(key) {
                self.column_order.push(key.clone());
            }
        }
    }

    pub fn column_count(&self) -> usize {
        self.column_order.len()
    }

    pub fn column_key(&self, col: usize) -> Option<&str> {
        self.column_order.get(col).map(String::as_str)
    }

    pub fn column_index(&self, key: &str) -> Option<usize> {
        self.column_order.iter().position(|k| k == key)
    }

    /// Re-key row heights after rows moved; rows mapped to `None` lose theirs
    pub(crate) fn remap_row_heights(&mut self, map: impl Fn(usize) -> Option<usize>) {
        self.row_heights = self
            .row_heights
            .drain()
            .filter_map(|(row, height)| map(row).map(|new_row| (new_row, height)))
            .collect();
    }
}

/// View states of all tables in a document
#[derive(Debug, Clone, Default)]
pub struct ViewStates {
    states: HashMap<String, GridState>,
}

impl ViewStates {
    pub fn get(&self, table: &str) -> Option<&GridState> {
        self.states.get(table)
    }

    pub fn entry(&mut self, table: &str) -> &mut GridState {
        self.states.entry(table.to_string()).or_default()
    }

    /// Move a table's state to a new name; a state already kept under the
    /// new name wins
    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(state) = self.states.remove(old) {
            self.states.entry(new.to_string()).or_insert(state);
        }
    }

    /// Seed `new` with a copy of `old`, leaving `old` to the other tables
    /// that still share that name
    pub fn fork(&mut self, old: &str, new: &str) {
        if let Some(state) = self.states.get(old).cloned() {
            self.states.entry(new.to_string()).or_insert(state);
        }
    }

    pub fn remove(&mut self, table: &str) {
        self.states.remove(table);
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
