//! Single-line prompt editor.
//!
//! The cursor is tracked as a character index and converted to a byte
//! offset only at the point of mutation, so multi-byte input behaves
//! the same as ASCII.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Modifier;
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::theme::Theme;

const SIGIL: &str = "❯ ";

/// Editable state of the prompt line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Prompt {
    text: String,
    cursor: usize,
}

impl Prompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Hand over the current line and reset the editor.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    pub fn insert(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.text.insert(at, c);
        self.cursor += 1;
    }

    /// Insert pasted text. Newlines collapse to spaces and other
    /// control characters are dropped, keeping the prompt single-line.
    pub fn insert_str(&mut self, pasted: &str) {
        let cleaned: String = pasted
            .chars()
            .filter_map(|c| match c {
                '\n' | '\r' | '\t' => Some(' '),
                c if c.is_control() => None,
                c => Some(c),
            })
            .collect();
        let at = self.byte_index(self.cursor);
        self.text.insert_str(at, &cleaned);
        self.cursor += cleaned.chars().count();
    }

    pub fn delete_back(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let end = self.byte_index(self.cursor);
        let start = self.byte_index(self.cursor - 1);
        self.text.replace_range(start..end, "");
        self.cursor -= 1;
    }

    pub fn delete_forward(&mut self) {
        let start = self.byte_index(self.cursor);
        if start >= self.text.len() {
            return;
        }
        let end = self.byte_index(self.cursor + 1);
        self.text.replace_range(start..end, "");
    }

    /// Delete back to the start of the previous word.
    pub fn delete_word(&mut self) {
        let mut target = self.cursor;
        let chars: Vec<char> = self.text.chars().collect();
        while target > 0 && chars[target - 1].is_whitespace() {
            target -= 1;
        }
        while target > 0 && !chars[target - 1].is_whitespace() {
            target -= 1;
        }
        let start = self.byte_index(target);
        let end = self.byte_index(self.cursor);
        self.text.replace_range(start..end, "");
        self.cursor = target;
    }

    pub fn kill(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.text.chars().count() {
            self.cursor += 1;
        }
    }

    pub fn move_start(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_index)
            .map(|(idx, _)| idx)
            .unwrap_or(self.text.len())
    }

    /// First visible character for a viewport `avail` columns wide,
    /// chosen so the cursor always stays on screen.
    fn window_start(&self, avail: usize) -> usize {
        let widths: Vec<usize> = self
            .text
            .chars()
            .map(|c| c.width().unwrap_or(0))
            .collect();
        let mut start = self.cursor.min(widths.len());
        // One column is reserved for the cursor cell itself.
        let mut used = 1usize;
        while start > 0 && used + widths[start - 1] <= avail {
            used += widths[start - 1];
            start -= 1;
        }
        start
    }
}

/// One-row widget drawing the sigil, the visible slice of the prompt
/// and a block cursor.
pub struct PromptView<'a> {
    prompt: &'a Prompt,
    theme: &'a Theme,
    busy: bool,
}

impl<'a> PromptView<'a> {
    pub fn new(prompt: &'a Prompt, theme: &'a Theme) -> Self {
        Self {
            prompt,
            theme,
            busy: false,
        }
    }

    /// Dim the sigil while a reply is in flight.
    pub fn busy(mut self, busy: bool) -> Self {
        self.busy = busy;
        self
    }
}

impl Widget for PromptView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let sigil_style = if self.busy {
            self.theme.faint
        } else {
            self.theme.sigil
        };
        let avail = (area.width as usize).saturating_sub(SIGIL.width());
        let start = self.prompt.window_start(avail.max(1));

        let mut before = String::new();
        let mut at_cursor = None;
        let mut after = String::new();
        let mut used = 1usize;
        for (i, c) in self.prompt.text.chars().enumerate().skip(start) {
            let w = c.width().unwrap_or(0);
            if used + w > avail {
                break;
            }
            used += w;
            if i < self.prompt.cursor {
                before.push(c);
            } else if i == self.prompt.cursor {
                at_cursor = Some(c);
            } else {
                after.push(c);
            }
        }

        let cursor_span = Span::styled(
            at_cursor.map(String::from).unwrap_or_else(|| " ".into()),
            self.theme.body.add_modifier(Modifier::REVERSED),
        );
        let line = Line::from(vec![
            Span::styled(SIGIL, sigil_style),
            Span::styled(before, self.theme.body),
            cursor_span,
            Span::styled(after, self.theme.body),
        ]);
        line.render(area, buf);
    }
}
