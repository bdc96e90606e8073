//! Styling for the chat screen.

use ratatui::style::{Color, Modifier, Style};

/// Resolved styles for every visual role on the chat screen.
///
/// Widgets take a `&Theme` and never mix their own colors, so the whole
/// palette can be swapped from the config file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Ordinary message text.
    pub body: Style,
    /// Timestamps, hints, separators.
    pub faint: Style,
    /// The speaker label on user messages.
    pub user_label: Style,
    /// The speaker label on assistant messages.
    pub assistant_label: Style,
    /// Typing indicator shown while a reply is pending.
    pub busy: Style,
    /// Error banners.
    pub alert: Style,
    /// Borders around the transcript and the input line.
    pub frame: Style,
    /// The sigil in front of the input line.
    pub sigil: Style,
    /// Inline and fenced code.
    pub code: Style,
    /// Link URLs.
    pub link: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    pub fn dark() -> Self {
        Theme {
            body: Style::default().fg(Color::White),
            faint: Style::default().fg(Color::DarkGray),
            user_label: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            assistant_label: Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
            busy: Style::default().fg(Color::Yellow),
            alert: Style::default().fg(Color::Red),
            frame: Style::default().fg(Color::DarkGray),
            sigil: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            code: Style::default().fg(Color::Magenta),
            link: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::UNDERLINED),
        }
    }

    pub fn light() -> Self {
        Theme {
            body: Style::default().fg(Color::Black),
            faint: Style::default().fg(Color::Gray),
            user_label: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            assistant_label: Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
            busy: Style::default().fg(Color::Rgb(180, 120, 0)),
            alert: Style::default().fg(Color::Red),
            frame: Style::default().fg(Color::Gray),
            sigil: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            code: Style::default().fg(Color::Magenta),
            link: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::UNDERLINED),
        }
    }

    /// Look up a theme by its config-file name. Unrecognized names fall
    /// back to the dark theme.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "light" => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Emphasized variant of the body style.
    pub fn body_bold(&self) -> Style {
        self.body.add_modifier(Modifier::BOLD)
    }
}
