use crossterm::event::KeyCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edit {
    /// The text changed and should be applied.
    Changed,
    /// Cursor moved or key ignored.
    Unchanged,
    /// Enter or Esc: leave the box.
    Done,
}

/// Single-line search box. `cursor` counts chars, not bytes.
#[derive(Clone, Debug, Default)]
pub struct SearchBox {
    pub text: String,
    pub cursor: usize,
}

impl SearchBox {
    pub fn handle_key(&mut self, key: KeyCode) -> Edit {
        let len = self.text.chars().count();
        match key {
            KeyCode::Enter | KeyCode::Esc => return Edit::Done,
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(len),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = len,
            KeyCode::Char(c) => {
                let at = self.byte_index(self.cursor);
                self.text.insert(at, c);
                self.cursor += 1;
                return Edit::Changed;
            }
            KeyCode::Backspace if self.cursor > 0 => {
                let at = self.byte_index(self.cursor - 1);
                self.text.remove(at);
                self.cursor -= 1;
                return Edit::Changed;
            }
            KeyCode::Delete if self.cursor < len => {
                let at = self.byte_index(self.cursor);
                self.text.remove(at);
                return Edit::Changed;
            }
            _ => {}
        }
        Edit::Unchanged
    }

    pub fn set(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.text.chars().count();
    }

    fn byte_index(&self, char_idx: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }
}
