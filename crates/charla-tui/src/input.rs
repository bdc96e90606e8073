//! Keyboard and mouse dispatch.
//!
//! Terminal events are folded into a flat [`Action`] enum so the chat
//! loop can match on intent instead of raw key codes.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};

/// Lines moved per mouse wheel notch.
const WHEEL_LINES: u16 = 3;

/// What the user asked the chat screen to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Insert a character at the cursor.
    Insert(char),
    /// Insert pasted text at the cursor.
    Paste(String),
    /// Send the prompt line.
    Submit,
    /// Delete the character before the cursor.
    DeleteBack,
    /// Delete the character under the cursor.
    DeleteForward,
    /// Delete the word before the cursor.
    DeleteWord,
    /// Discard the whole prompt line.
    KillLine,
    /// Move the cursor one character left.
    CursorLeft,
    /// Move the cursor one character right.
    CursorRight,
    /// Jump to the start of the prompt.
    LineStart,
    /// Jump to the end of the prompt.
    LineEnd,
    /// Scroll the transcript up by `n` lines.
    ScrollUp(u16),
    /// Scroll the transcript down by `n` lines.
    ScrollDown(u16),
    /// Scroll the transcript up by one screen.
    PageUp,
    /// Scroll the transcript down by one screen.
    PageDown,
    /// Esc: stop the reply in flight, otherwise do nothing.
    Cancel,
    /// Ctrl+C: stop the reply in flight, otherwise quit.
    Interrupt,
    /// Ctrl+D: quit on an empty prompt, delete forward otherwise.
    Eof,
    /// Ctrl+L: wipe the conversation.
    Clear,
    /// Ctrl+E: save the transcript to a file.
    Export,
    /// Ctrl+Q: leave unconditionally.
    Quit,
}

/// Key bindings shown in the welcome banner and `/help`.
pub const BINDINGS: &[(&str, &str)] = &[
    ("Enter", "send message"),
    ("Esc", "cancel the reply in flight"),
    ("Ctrl+L", "clear the conversation"),
    ("Ctrl+E", "export the transcript"),
    ("PgUp/PgDn", "scroll the transcript"),
    ("Ctrl+C", "quit (cancels first while replying)"),
];

/// Map a terminal event to an [`Action`], if it means anything to us.
pub fn action_for(event: &Event) -> Option<Action> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => key_action(*key),
        Event::Paste(text) => Some(Action::Paste(text.clone())),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => Some(Action::ScrollUp(WHEEL_LINES)),
            MouseEventKind::ScrollDown => Some(Action::ScrollDown(WHEEL_LINES)),
            _ => None,
        },
        _ => None,
    }
}

fn key_action(key: KeyEvent) -> Option<Action> {
    use KeyCode::*;

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    match key.code {
        Char(c) if ctrl => match c.to_ascii_lowercase() {
            'c' => Some(Action::Interrupt),
            'd' => Some(Action::Eof),
            'q' => Some(Action::Quit),
            'l' => Some(Action::Clear),
            'e' => Some(Action::Export),
            'u' => Some(Action::KillLine),
            'w' => Some(Action::DeleteWord),
            'a' => Some(Action::LineStart),
            _ => None,
        },
        _ if ctrl || alt => None,
        Char(c) => Some(Action::Insert(c)),
        Enter => Some(Action::Submit),
        Backspace => Some(Action::DeleteBack),
        Delete => Some(Action::DeleteForward),
        Left => Some(Action::CursorLeft),
        Right => Some(Action::CursorRight),
        Up => Some(Action::ScrollUp(1)),
        Down => Some(Action::ScrollDown(1)),
        Home => Some(Action::LineStart),
        End => Some(Action::LineEnd),
        PageUp => Some(Action::PageUp),
        PageDown => Some(Action::PageDown),
        Esc => Some(Action::Cancel),
        _ => None,
    }
}
