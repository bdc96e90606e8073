//! Markdown to styled terminal lines.
//!
//! Inline styles are kept on a stack so nested emphasis unwinds to the
//! enclosing style instead of resetting to the base. Block structure
//! (quotes, lists, fenced code) is tracked separately.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use crate::theme::Theme;

/// Render markdown source into styled lines. Code lines are truncated
/// to `width`; prose is left unwrapped for the caller to reflow.
pub fn render(source: &str, theme: &Theme, width: usize) -> Vec<Line<'static>> {
    Renderer::new(theme, width).run(source)
}

enum ListKind {
    Bullet,
    Numbered(u64),
}

struct Renderer<'t> {
    theme: &'t Theme,
    width: usize,
    out: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<ListKind>,
    quote_depth: usize,
    code: Option<String>,
    link: Option<(String, usize)>,
    // A list-item marker was just emitted; the next paragraph start
    // must continue that line rather than flush it.
    item_fresh: bool,
}

impl<'t> Renderer<'t> {
    fn new(theme: &'t Theme, width: usize) -> Self {
        Self {
            theme,
            width,
            out: Vec::new(),
            spans: Vec::new(),
            styles: vec![theme.body],
            lists: Vec::new(),
            quote_depth: 0,
            code: None,
            link: None,
            item_fresh: false,
        }
    }

    fn run(mut self, source: &str) -> Vec<Line<'static>> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        for event in Parser::new_ext(source, options) {
            self.on_event(event);
        }
        self.break_line();
        while self.out.last().is_some_and(line_is_blank) {
            self.out.pop();
        }
        self.out
    }

    fn on_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.on_start(tag),
            Event::End(tag) => self.on_end(tag),
            Event::Text(text) => {
                if let Some(buffer) = self.code.as_mut() {
                    buffer.push_str(&text);
                } else {
                    self.push_text(&text);
                }
            }
            Event::Code(code) => {
                self.spans
                    .push(Span::styled(code.into_string(), self.theme.code));
            }
            Event::SoftBreak => self.push_text(" "),
            Event::HardBreak => self.break_line(),
            Event::Rule => {
                self.break_line();
                self.out.push(Line::from(Span::styled(
                    "─".repeat(self.width.clamp(1, 40)),
                    self.theme.faint,
                )));
                self.blank_line();
            }
            Event::TaskListMarker(done) => {
                let mark = if done { "[x] " } else { "[ ] " };
                self.spans.push(Span::styled(mark, self.theme.faint));
            }
            _ => {}
        }
    }

    fn on_start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.item_fresh {
                    self.item_fresh = false;
                } else {
                    self.break_line();
                    self.push_quote_bars();
                }
            }
            Tag::Heading { level, .. } => {
                self.break_line();
                let hashes = "#".repeat(level as usize);
                self.spans
                    .push(Span::styled(format!("{hashes} "), self.theme.faint));
                let style = if level == HeadingLevel::H1 {
                    self.theme.body_bold().add_modifier(Modifier::UNDERLINED)
                } else {
                    self.theme.body_bold()
                };
                self.styles.push(style);
            }
            Tag::BlockQuote(_) => {
                self.break_line();
                self.quote_depth += 1;
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.break_line();
                }
                self.lists.push(match start {
                    Some(n) => ListKind::Numbered(n),
                    None => ListKind::Bullet,
                });
            }
            Tag::Item => {
                self.break_line();
                self.push_quote_bars();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(ListKind::Numbered(n)) => {
                        let current = *n;
                        *n += 1;
                        format!("{indent}{current}. ")
                    }
                    _ => format!("{indent}• "),
                };
                self.spans.push(Span::styled(marker, self.theme.faint));
                self.item_fresh = true;
            }
            Tag::CodeBlock(kind) => {
                self.break_line();
                if let CodeBlockKind::Fenced(lang) = &kind {
                    if !lang.is_empty() {
                        self.out.push(Line::from(Span::styled(
                            format!("┌ {lang}"),
                            self.theme.faint,
                        )));
                    }
                }
                self.code = Some(String::new());
            }
            Tag::Emphasis => self.push_style(Modifier::ITALIC),
            Tag::Strong => self.push_style(Modifier::BOLD),
            Tag::Strikethrough => self.push_style(Modifier::CROSSED_OUT),
            Tag::Link { dest_url, .. } => {
                self.link = Some((dest_url.into_string(), self.spans.len()));
                self.styles.push(self.theme.link);
            }
            _ => {}
        }
    }

    fn on_end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.break_line();
                self.blank_line();
            }
            TagEnd::Heading(_) => {
                self.styles.pop();
                self.break_line();
                self.blank_line();
            }
            TagEnd::BlockQuote(_) => {
                self.break_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                if self.quote_depth == 0 {
                    self.blank_line();
                }
            }
            TagEnd::List(_) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            TagEnd::Item => {
                self.item_fresh = false;
                self.break_line();
            }
            TagEnd::CodeBlock => {
                if let Some(buffer) = self.code.take() {
                    for code_line in buffer.lines() {
                        let rendered = self.code_line(code_line);
                        self.out.push(rendered);
                    }
                }
                self.blank_line();
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.styles.pop();
            }
            TagEnd::Link => {
                self.styles.pop();
                if let Some((url, from)) = self.link.take() {
                    let label: String = self.spans[from..]
                        .iter()
                        .map(|s| s.content.as_ref())
                        .collect();
                    if label != url {
                        self.spans
                            .push(Span::styled(format!(" ({url})"), self.theme.faint));
                    }
                }
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        self.item_fresh = false;
        let style = *self.styles.last().unwrap_or(&self.theme.body);
        self.spans.push(Span::styled(text.to_string(), style));
    }

    fn push_style(&mut self, modifier: Modifier) {
        let current = *self.styles.last().unwrap_or(&self.theme.body);
        self.styles.push(current.add_modifier(modifier));
    }

    fn push_quote_bars(&mut self) {
        if self.quote_depth > 0 {
            self.spans.push(Span::styled(
                "▌ ".repeat(self.quote_depth),
                self.theme.faint,
            ));
        }
    }

    /// A gutter-prefixed code line, truncated on a char boundary.
    fn code_line(&self, content: &str) -> Line<'static> {
        let avail = self.width.saturating_sub(3);
        let mut shown: String = content.chars().take(avail).collect();
        if shown.chars().count() < content.chars().count() {
            shown = content.chars().take(avail.saturating_sub(1)).collect();
            shown.push('…');
        }
        Line::from(vec![
            Span::styled("│ ", self.theme.faint),
            Span::styled(shown, self.theme.code),
        ])
    }

    fn break_line(&mut self) {
        if !self.spans.is_empty() {
            self.out.push(Line::from(std::mem::take(&mut self.spans)));
        }
    }

    fn blank_line(&mut self) {
        if !self.out.last().is_some_and(line_is_blank) && !self.out.is_empty() {
            self.out.push(Line::default());
        }
    }
}

fn line_is_blank(line: &Line<'_>) -> bool {
    line.spans.iter().all(|s| s.content.trim().is_empty())
}
