//! Conversation transcript rendering.
//!
//! [`transcript_lines`] turns the conversation into one flat list of
//! pre-wrapped lines; [`Transcript`] then just windows that list. Both
//! scrolling and height math read `lines.len()`, so the two can never
//! disagree about where the bottom is.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::{activity, markdown};
use crate::theme::Theme;

/// Columns reserved on the right edge for the scrollbar.
const GUTTER: u16 = 1;

/// Width the transcript will wrap text to inside `area_width` columns.
pub fn content_width(area_width: u16) -> u16 {
    area_width.saturating_sub(GUTTER)
}

/// Who a transcript entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
    /// Local output such as the welcome banner or command results.
    Notice,
}

impl Speaker {
    fn label(self) -> &'static str {
        match self {
            Speaker::User => "User",
            Speaker::Assistant => "AI",
            Speaker::Notice => "",
        }
    }
}

/// One block in the transcript.
#[derive(Debug, Clone)]
pub struct Entry {
    pub speaker: Speaker,
    /// Wall-clock label, absent on notices.
    pub stamp: Option<String>,
    pub body: String,
    /// A reply still being revealed gets a trailing cursor block.
    pub streaming: bool,
}

impl Entry {
    pub fn user(stamp: String, body: String) -> Self {
        Entry {
            speaker: Speaker::User,
            stamp: Some(stamp),
            body,
            streaming: false,
        }
    }

    pub fn reply(stamp: String, body: String, streaming: bool) -> Self {
        Entry {
            speaker: Speaker::Assistant,
            stamp: Some(stamp),
            body,
            streaming,
        }
    }

    pub fn notice(body: impl Into<String>) -> Self {
        Entry {
            speaker: Speaker::Notice,
            stamp: None,
            body: body.into(),
            streaming: false,
        }
    }
}

/// Build every line of the transcript, wrapped to `width` columns.
///
/// `typing` adds an animated indicator while the first delta is still
/// on its way; `banner` appends an error line at the bottom.
pub fn transcript_lines(
    entries: &[Entry],
    typing: bool,
    banner: Option<&str>,
    tick: u64,
    theme: &Theme,
    width: u16,
) -> Vec<Line<'static>> {
    let width = (width as usize).max(1);
    let mut lines: Vec<Line<'static>> = Vec::new();

    for entry in entries {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        match entry.speaker {
            Speaker::Notice => {
                lines.extend(plain_lines(&entry.body, theme.faint, width));
            }
            Speaker::User => {
                lines.push(heading(entry, theme.user_label, theme, width));
                lines.extend(plain_lines(&entry.body, theme.body, width));
            }
            Speaker::Assistant => {
                lines.push(heading(entry, theme.assistant_label, theme, width));
                let body = markdown::render(&entry.body, theme, width);
                if body.is_empty() {
                    lines.push(Line::default());
                } else {
                    for line in &body {
                        lines.extend(wrap_styled(line, width));
                    }
                }
                if entry.streaming {
                    if let Some(last) = lines.last_mut() {
                        last.spans.push(Span::styled("▌", theme.busy));
                    }
                }
            }
        }
    }

    if typing {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(
            Speaker::Assistant.label(),
            theme.assistant_label,
        )));
        lines.push(Line::from(Span::styled(
            activity::typing_dots(tick).to_string(),
            theme.busy,
        )));
    }

    if let Some(message) = banner {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        lines.extend(plain_lines(&format!("✖ {message}"), theme.alert, width));
    }

    lines
}

/// Sender heading. The stamp is dropped when it would not fit the width.
fn heading(entry: &Entry, label_style: Style, theme: &Theme, width: usize) -> Line<'static> {
    let label = entry.speaker.label();
    let mut spans = vec![Span::styled(label, label_style)];
    if let Some(stamp) = &entry.stamp {
        let stamp = format!(" · {stamp}");
        if UnicodeWidthStr::width(label) + UnicodeWidthStr::width(stamp.as_str()) <= width {
            spans.push(Span::styled(stamp, theme.faint));
        }
    }
    Line::from(spans)
}

/// Wrap unstyled text, preserving embedded newlines.
fn plain_lines(body: &str, style: Style, width: usize) -> Vec<Line<'static>> {
    let mut rows = Vec::new();
    for raw in body.split('\n') {
        if raw.is_empty() {
            rows.push(Line::default());
            continue;
        }
        for piece in textwrap::wrap(raw, width) {
            rows.push(Line::from(Span::styled(piece.into_owned(), style)));
        }
    }
    rows
}

/// Greedy word wrap that keeps span styles across line breaks. Words
/// wider than the viewport are split on character boundaries.
fn wrap_styled(line: &Line<'_>, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut rows: Vec<Line<'static>> = Vec::new();
    let mut row: Vec<Span<'static>> = Vec::new();
    let mut used = 0usize;

    for span in &line.spans {
        let style = span.style;
        for token in tokenize(&span.content) {
            let token_width = UnicodeWidthStr::width(token.as_str());
            if used + token_width > width {
                if !row.is_empty() {
                    rows.push(Line::from(std::mem::take(&mut row)));
                    used = 0;
                }
                if token.chars().all(char::is_whitespace) {
                    continue;
                }
            }
            if token_width > width {
                let mut chunk = String::new();
                let mut chunk_width = 0usize;
                for c in token.chars() {
                    let cw = c.width().unwrap_or(0);
                    if chunk_width + cw > width && !chunk.is_empty() {
                        rows.push(Line::from(Span::styled(
                            std::mem::take(&mut chunk),
                            style,
                        )));
                        chunk_width = 0;
                    }
                    chunk.push(c);
                    chunk_width += cw;
                }
                used = chunk_width;
                row.push(Span::styled(chunk, style));
            } else {
                used += token_width;
                row.push(Span::styled(token, style));
            }
        }
    }

    if !row.is_empty() {
        rows.push(Line::from(row));
    }
    if rows.is_empty() {
        rows.push(Line::default());
    }
    rows
}

/// Split text into alternating whitespace and word runs.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_space = None;
    for c in text.chars() {
        let space = c.is_whitespace();
        if in_space != Some(space) && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        in_space = Some(space);
        current.push(c);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Windows a prebuilt line list, pinned to the bottom unless scrolled.
pub struct Transcript<'a> {
    lines: &'a [Line<'static>],
    theme: &'a Theme,
    scroll_back: usize,
}

impl<'a> Transcript<'a> {
    pub fn new(lines: &'a [Line<'static>], theme: &'a Theme) -> Self {
        Self {
            lines,
            theme,
            scroll_back: 0,
        }
    }

    /// Lines scrolled up from the bottom; zero sticks to the newest.
    pub fn scroll_back(mut self, lines: usize) -> Self {
        self.scroll_back = lines;
        self
    }
}

impl Widget for Transcript<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width <= GUTTER || area.height == 0 {
            return;
        }
        let height = area.height as usize;
        let total = self.lines.len();
        let max_back = total.saturating_sub(height);
        let back = self.scroll_back.min(max_back);
        let top = total.saturating_sub(height + back);

        for (row, line) in self.lines.iter().skip(top).take(height).enumerate() {
            let slot = Rect::new(
                area.x,
                area.y + row as u16,
                area.width - GUTTER,
                1,
            );
            line.render(slot, buf);
        }

        if total > height {
            let mut state = ScrollbarState::new(max_back).position(top);
            StatefulWidget::render(
                Scrollbar::new(ScrollbarOrientation::VerticalRight)
                    .begin_symbol(None)
                    .end_symbol(None)
                    .style(self.theme.frame),
                area,
                buf,
                &mut state,
            );
        }
    }
}
