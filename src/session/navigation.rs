//! Keyboard routing
//!
//! Keys mean different things depending on the edit mode: while idle they
//! move the selection, while editing they go to the edit buffer.

use super::{CellPosition, EditMode, EditSession, Outcome, Selection};
use crate::grid::GridError;
use crate::messages::{Key, KeyInput};

impl EditSession {
    pub(crate) fn handle_key(&mut self, input: KeyInput) -> Result<Outcome, GridError> {
        if self.is_editing() {
            self.handle_editing_key(input)
        } else {
            self.handle_idle_key(input)
        }
    }

    fn handle_idle_key(&mut self, input: KeyInput) -> Result<Outcome, GridError> {
        let rows = self.row_count();
        let cols = self.column_count();
        let Some(selection) = self.selection else {
            return Ok(Outcome::none());
        };
        let focus = selection.focus;

        let step = |dr: isize, dc: isize| focus.offset_clamped(dr, dc, rows, cols);
        match input.key {
            Key::Up => Ok(self.move_focus(step(-1, 0), input.shift)),
            Key::Down => Ok(self.move_focus(step(1, 0), input.shift)),
            Key::Left => Ok(self.move_focus(step(0, -1), input.shift)),
            Key::Right => Ok(self.move_focus(step(0, 1), input.shift)),
            Key::Tab => {
                let dc = if input.shift { -1 } else { 1 };
                Ok(self.move_focus(step(0, dc), false))
            }
            Key::Home => Ok(self.move_focus(CellPosition::new(focus.row, 0), input.shift)),
            Key::End => Ok(self.move_focus(
                CellPosition::new(focus.row, cols.saturating_sub(1)),
                input.shift,
            )),
            Key::Enter => Ok(self.start_edit(focus.row, focus.col, None)),
            Key::Delete | Key::Backspace => self.delete_selection(),
            // Typing over a cell replaces its content
            Key::Char(ch) => Ok(self.start_edit(focus.row, focus.col, Some(&ch.to_string()))),
            Key::Escape => {
                if selection.is_single_cell() {
                    Ok(Outcome::none())
                } else {
                    self.selection = Some(Selection::cell(focus));
                    Ok(Outcome::redraw())
                }
            }
        }
    }

    fn move_focus(&mut self, target: CellPosition, extend: bool) -> Outcome {
        let next = match (self.selection, extend) {
            (Some(sel), true) => sel.extend_to(target),
            _ => Selection::cell(target),
        };
        if self.selection == Some(next) {
            return Outcome::none();
        }
        self.selection = Some(next);
        Outcome::redraw()
    }

    fn handle_editing_key(&mut self, input: KeyInput) -> Result<Outcome, GridError> {
        match input.key {
            Key::Enter if input.shift => Ok(self.edit_buffer(|buf| buf.insert_char('\n'))),
            Key::Enter => self.commit_edit(1, 0, true),
            Key::Tab if input.shift => self.commit_edit(0, -1, false),
            Key::Tab => self.commit_edit(0, 1, false),
            Key::Escape => Ok(self.cancel_edit()),
            Key::Char(ch) => Ok(self.edit_buffer(|buf| buf.insert_char(ch))),
            Key::Backspace => Ok(self.edit_buffer(|buf| buf.delete_backward())),
            Key::Delete => Ok(self.edit_buffer(|buf| buf.delete_forward())),
            Key::Left => Ok(self.edit_buffer(|buf| buf.cursor_left())),
            Key::Right => Ok(self.edit_buffer(|buf| buf.cursor_right())),
            Key::Home | Key::Up => Ok(self.edit_buffer(|buf| buf.cursor_home())),
            Key::End | Key::Down => Ok(self.edit_buffer(|buf| buf.cursor_end())),
        }
    }

    fn edit_buffer(&mut self, op: impl FnOnce(&mut super::EditBuffer)) -> Outcome {
        match &mut self.mode {
            EditMode::Editing(edit) => {
                op(&mut edit.buffer);
                Outcome::redraw()
            }
            EditMode::Idle => Outcome::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::messages::{GridMsg, Key, KeyInput};
    use crate::session::{CellPosition, EditSession, Selection};
    use crate::tree::{TreeCodec, XmlCodec};

    fn session() -> EditSession {
        let tree = XmlCodec::default()
            .parse("<R><I><a>1</a><b>2</b></I><I><a>3</a><b>4</b></I></R>")
            .unwrap();
        EditSession::open(tree, EngineConfig::default()).0
    }

    fn press(s: &mut EditSession, input: impl Into<KeyInput>) {
        s.dispatch(GridMsg::Key(input.into()));
    }

    #[test]
    fn test_arrows_clamp_at_edges() {
        let mut s = session();
        press(&mut s, Key::Up);
        press(&mut s, Key::Left);
        assert_eq!(s.selection(), Some(Selection::cell(CellPosition::new(0, 0))));
        for _ in 0..5 {
            press(&mut s, Key::Down);
            press(&mut s, Key::Right);
        }
        assert_eq!(s.selection(), Some(Selection::cell(CellPosition::new(1, 1))));
    }

    #[test]
    fn test_shift_arrow_extends() {
        let mut s = session();
        press(&mut s, KeyInput::shifted(Key::Down));
        press(&mut s, KeyInput::shifted(Key::Right));
        let sel = s.selection().unwrap();
        assert_eq!(sel.anchor, CellPosition::new(0, 0));
        assert_eq!(sel.focus, CellPosition::new(1, 1));
    }

    #[test]
    fn test_typing_starts_edit_with_char() {
        let mut s = session();
        press(&mut s, Key::Char('x'));
        press(&mut s, Key::Char('y'));
        assert_eq!(s.edit_cursor().map(|e| e.buffer.text()), Some("xy"));
        press(&mut s, Key::Enter);
        assert!(!s.is_editing());
        assert_eq!(s.cell_text(0, 0), "xy");
        assert_eq!(s.selection(), Some(Selection::cell(CellPosition::new(1, 0))));
    }

    #[test]
    fn test_tab_commits_and_reenters() {
        let mut s = session();
        press(&mut s, Key::Enter);
        press(&mut s, Key::Char('!'));
        press(&mut s, Key::Tab);
        assert_eq!(s.cell_text(0, 0), "1!");
        assert_eq!(s.edit_cursor().map(|e| e.position), Some(CellPosition::new(0, 1)));
        press(&mut s, KeyInput::shifted(Key::Tab));
        assert_eq!(s.edit_cursor().map(|e| e.position), Some(CellPosition::new(0, 0)));
    }

    #[test]
    fn test_shift_enter_inserts_newline() {
        let mut s = session();
        press(&mut s, Key::Enter);
        press(&mut s, KeyInput::shifted(Key::Enter));
        press(&mut s, Key::Char('z'));
        assert_eq!(s.edit_cursor().map(|e| e.buffer.text()), Some("1\nz"));
    }

    #[test]
    fn test_escape_cancels_edit() {
        let mut s = session();
        press(&mut s, Key::Char('q'));
        press(&mut s, Key::Escape);
        assert!(!s.is_editing());
        assert_eq!(s.cell_text(0, 0), "1");
    }

    #[test]
    fn test_delete_clears_selection() {
        let mut s = session();
        press(&mut s, KeyInput::shifted(Key::Right));
        let outcome = s.dispatch(GridMsg::Key(Key::Delete.into()));
        assert!(outcome.sync);
        assert_eq!(s.cell_text(0, 0), "");
        assert_eq!(s.cell_text(0, 1), "");
        assert_eq!(s.cell_text(1, 0), "3");
    }
}
