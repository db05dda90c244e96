//! Row and column operations on one table
//!
//! A [`TableGrid`] borrows a table's row array out of the tree together with
//! the table's [`GridState`], so every mutation lands directly in the tree.

use super::{validate_name, GridError, GridState, Placement};
use crate::discovery::{detect_columns, unique_name};
use crate::tree::{write_cell, CellValue, Node, ObjectNode};

/// Column created when rows are added to a table that has none
pub const DEFAULT_COLUMN: &str = "NewColumn";

/// Read a cell through a table's column order; missing keys read as empty
pub fn read_cell(rows: &[Node], state: &GridState, row: usize, col: usize) -> Option<CellValue> {
    let key = state.column_key(col)?;
    let node = rows.get(row)?;
    let empty = || CellValue::Scalar(String::new());
    Some(match node.as_object() {
        Some(obj) => obj.get(key).map(CellValue::from_node).unwrap_or_else(empty),
        None => empty(),
    })
}

/// Mutable view of one table
pub struct TableGrid<'a> {
    rows: &'a mut Vec<Node>,
    state: &'a mut GridState,
}

impl<'a> TableGrid<'a> {
    pub fn new(rows: &'a mut Vec<Node>, state: &'a mut GridState) -> Self {
        state.reconcile(&detect_columns(rows.as_slice()));
        Self { rows, state }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.state.column_count()
    }

    pub fn state(&self) -> &GridState {
        &*self.state
    }

    pub fn rows(&self) -> &[Node] {
        self.rows.as_slice()
    }

    /// Cell at a display position; missing keys read as empty
    pub fn cell(&self, row: usize, col: usize) -> Option<CellValue> {
        read_cell(self.rows.as_slice(), &*self.state, row, col)
    }

    pub fn cell_text(&self, row: usize, col: usize) -> String {
        self.cell(row, col)
            .map(|value| value.text().to_string())
            .unwrap_or_default()
    }

    pub fn set_cell(&mut self, row: usize, col: usize, text: &str) -> Result<(), GridError> {
        let key = self
            .state
            .column_key(col)
            .ok_or_else(|| GridError::StructuralConflict(format!("Column {} does not exist", col)))?
            .to_string();
        let node = self
            .rows
            .get_mut(row)
            .ok_or_else(|| GridError::StructuralConflict(format!("Row {} does not exist", row)))?;
        write_cell(node.make_object(), &key, text);
        Ok(())
    }

    fn has_column(&self, key: &str) -> bool {
        self.state.column_index(key).is_some()
            || self
                .rows
                .iter()
                .filter_map(Node::as_object)
                .any(|obj| obj.contains_key(key))
    }

    /// Append `count` rows shaped like the first row
    pub fn add_rows(&mut self, count: usize) {
        let template = match self.rows.first().and_then(Node::as_object) {
            Some(first) => ObjectNode::from_scalars(first.column_keys().map(|k| (k, ""))),
            None => ObjectNode::from_scalars([(DEFAULT_COLUMN, "")]),
        };
        for _ in 0..count {
            self.rows.push(Node::Object(template.clone()));
        }
        self.state.reconcile(&detect_columns(self.rows.as_slice()));
    }

    /// Grow the table to at least `count` rows
    pub fn ensure_rows(&mut self, count: usize) {
        if count > self.rows.len() {
            self.add_rows(count - self.rows.len());
        }
    }

    /// Append `count` uniquely named columns to every row
    ///
    /// An empty table gets one row first so the columns exist in the tree.
    pub fn add_columns(&mut self, count: usize, base: &str) -> Vec<String> {
        if self.rows.is_empty() && count > 0 {
            self.rows.push(Node::empty_object());
        }

        let mut added = Vec::with_capacity(count);
        for _ in 0..count {
            let key = unique_name(base, |candidate| self.has_column(candidate));
            for row in self.rows.iter_mut() {
                row.make_object()
                    .insert(key.clone(), Node::Scalar(String::new()));
            }
            self.state.column_order.push(key.clone());
            added.push(key);
        }
        added
    }

    pub fn delete_row(&mut self, row: usize) -> Result<Node, GridError> {
        if row >= self.rows.len() {
            return Err(GridError::StructuralConflict(format!(
                "Row {} does not exist",
                row
            )));
        }
        let removed = self.rows.remove(row);
        self.state.remap_row_heights(|r| match r.cmp(&row) {
            std::cmp::Ordering::Less => Some(r),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(r - 1),
        });
        self.state.frozen_rows = self.state.frozen_rows.min(self.rows.len());
        Ok(removed)
    }

    pub fn delete_column(&mut self, key: &str) -> Result<(), GridError> {
        if !self.has_column(key) {
            return Err(GridError::StructuralConflict(format!(
                "Column {} does not exist",
                key
            )));
        }
        for row in self.rows.iter_mut() {
            if let Some(obj) = row.as_object_mut() {
                obj.remove(key);
            }
        }
        self.state.column_order.retain(|k| k != key);
        self.state.column_widths.remove(key);
        self.state.frozen_cols = self.state.frozen_cols.min(self.state.column_count());
        Ok(())
    }

    /// Rename a column in every row, keeping its position
    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<(), GridError> {
        validate_name(new)?;
        if old == new {
            return Ok(());
        }
        if !self.has_column(old) {
            return Err(GridError::StructuralConflict(format!(
                "Column {} does not exist",
                old
            )));
        }
        if self.has_column(new) {
            return Err(GridError::StructuralConflict(format!(
                "Column {} already exists",
                new
            )));
        }

        for row in self.rows.iter_mut() {
            if let Some(obj) = row.as_object_mut() {
                obj.rename_key(old, new);
            }
        }
        for key in self.state.column_order.iter_mut() {
            if key.as_str() == old {
                *key = new.to_string();
            }
        }
        if let Some(width) = self.state.column_widths.remove(old) {
            self.state.column_widths.insert(new.to_string(), width);
        }
        Ok(())
    }

    /// Move a column next to another one and rewrite every row in the new order
    pub fn move_column(
        &mut self,
        key: &str,
        target: &str,
        placement: Placement,
    ) -> Result<(), GridError> {
        if key == target {
            return Err(GridError::StructuralConflict(
                "Cannot move a column relative to itself".to_string(),
            ));
        }
        let from = self.state.column_index(key).ok_or_else(|| {
            GridError::StructuralConflict(format!("Column {} does not exist", key))
        })?;
        if self.state.column_index(target).is_none() {
            return Err(GridError::StructuralConflict(format!(
                "Column {} does not exist",
                target
            )));
        }

        let moved = self.state.column_order.remove(from);
        // Target index is looked up again after removal
        let target_index = self.state.column_index(target).unwrap_or(0);
        let insert_at = match placement {
            Placement::Before => target_index,
            Placement::After => target_index + 1,
        };
        self.state.column_order.insert(insert_at, moved);

        for row in self.rows.iter_mut() {
            if let Some(obj) = row.as_object_mut() {
                obj.reorder(&self.state.column_order);
            }
        }
        Ok(())
    }

    /// Move a row next to another one
    ///
    /// `target` is an index in the table as it was before the move.
    pub fn move_row(
        &mut self,
        from: usize,
        target: usize,
        placement: Placement,
    ) -> Result<(), GridError> {
        let len = self.rows.len();
        if from >= len || target >= len {
            return Err(GridError::StructuralConflict(format!(
                "Row {} or {} does not exist",
                from, target
            )));
        }
        if from == target {
            return Err(GridError::StructuralConflict(
                "Cannot move a row relative to itself".to_string(),
            ));
        }

        let row = self.rows.remove(from);
        let target_after_removal = if target > from { target - 1 } else { target };
        let insert_at = match placement {
            Placement::Before => target_after_removal,
            Placement::After => target_after_removal + 1,
        };
        self.rows.insert(insert_at, row);

        self.state.remap_row_heights(|r| {
            if r == from {
                return Some(insert_at);
            }
            let shifted = if r > from { r - 1 } else { r };
            Some(if shifted >= insert_at { shifted + 1 } else { shifted })
        });
        Ok(())
    }

    /// Freeze leading rows, clamped to the row count
    pub fn set_frozen_rows(&mut self, count: usize) -> usize {
        self.state.frozen_rows = count.min(self.rows.len());
        self.state.frozen_rows
    }

    /// Freeze leading columns, clamped to the column count
    pub fn set_frozen_cols(&mut self, count: usize) -> usize {
        self.state.frozen_cols = count.min(self.state.column_count());
        self.state.frozen_cols
    }

    pub fn set_column_width(&mut self, key: &str, width: u32) {
        self.state.column_widths.insert(key.to_string(), width);
    }

    pub fn set_row_height(&mut self, row: usize, height: u32) {
        self.state.row_heights.insert(row, height);
    }
}
