//! Cell positions and the rectangular selection

use std::ops::RangeInclusive;

/// Position of a cell in the grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellPosition {
    pub row: usize,
    pub col: usize,
}

impl CellPosition {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Offset by a signed delta, clamped to `rows` x `cols`
    pub fn offset_clamped(self, delta_row: isize, delta_col: isize, rows: usize, cols: usize) -> Self {
        let clamp = |value: usize, delta: isize, len: usize| -> usize {
            let max = len.saturating_sub(1) as isize;
            (value as isize + delta).clamp(0, max.max(0)) as usize
        };
        Self::new(clamp(self.row, delta_row, rows), clamp(self.col, delta_col, cols))
    }
}

/// Rectangle between an anchor and a focus cell (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: CellPosition,
    pub focus: CellPosition,
}

impl Selection {
    /// A single-cell selection
    pub fn cell(position: CellPosition) -> Self {
        Self {
            anchor: position,
            focus: position,
        }
    }

    pub fn extend_to(self, focus: CellPosition) -> Self {
        Self {
            anchor: self.anchor,
            focus,
        }
    }

    pub fn top_left(&self) -> CellPosition {
        CellPosition::new(
            self.anchor.row.min(self.focus.row),
            self.anchor.col.min(self.focus.col),
        )
    }

    pub fn bottom_right(&self) -> CellPosition {
        CellPosition::new(
            self.anchor.row.max(self.focus.row),
            self.anchor.col.max(self.focus.col),
        )
    }

    pub fn rows(&self) -> RangeInclusive<usize> {
        self.top_left().row..=self.bottom_right().row
    }

    pub fn cols(&self) -> RangeInclusive<usize> {
        self.top_left().col..=self.bottom_right().col
    }

    pub fn is_single_cell(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn contains(&self, position: CellPosition) -> bool {
        self.rows().contains(&position.row) && self.cols().contains(&position.col)
    }

    /// Clamp both corners into a `rows` x `cols` grid; `None` if the grid is empty
    pub fn clamped(&self, rows: usize, cols: usize) -> Option<Self> {
        if rows == 0 || cols == 0 {
            return None;
        }
        let clamp = |p: CellPosition| CellPosition::new(p.row.min(rows - 1), p.col.min(cols - 1));
        Some(Self {
            anchor: clamp(self.anchor),
            focus: clamp(self.focus),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_normalizes_corners() {
        let sel = Selection::cell(CellPosition::new(3, 4)).extend_to(CellPosition::new(1, 2));
        assert_eq!(sel.top_left(), CellPosition::new(1, 2));
        assert_eq!(sel.bottom_right(), CellPosition::new(3, 4));
        assert!(sel.contains(CellPosition::new(2, 3)));
        assert!(!sel.contains(CellPosition::new(0, 3)));
    }

    #[test]
    fn test_offset_clamped() {
        let p = CellPosition::new(0, 1);
        assert_eq!(p.offset_clamped(-1, 0, 5, 3), CellPosition::new(0, 1));
        assert_eq!(p.offset_clamped(10, 10, 5, 3), CellPosition::new(4, 2));
    }

    #[test]
    fn test_clamped_empty_grid() {
        let sel = Selection::cell(CellPosition::new(2, 2));
        assert_eq!(sel.clamped(0, 3), None);
        assert_eq!(
            sel.clamped(1, 1),
            Some(Selection::cell(CellPosition::new(0, 0)))
        );
    }
}
