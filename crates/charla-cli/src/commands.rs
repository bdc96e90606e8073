//! Slash commands.
//!
//! Parsing is pure so both the chat screen and the line-mode REPL can
//! share it; execution lives with the caller, which owns the session.

use std::fmt::Write;
use std::path::PathBuf;

use charla_session::Conversation;

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Drop the whole conversation.
    Clear,
    /// Backend address, message counts and token usage.
    Status,
    /// Save the transcript as markdown, optionally to a given path.
    Export(Option<PathBuf>),
    Quit,
    /// Anything starting with `/` we do not recognize.
    Unknown(String),
}

impl Command {
    /// Parse user input. Returns `None` when the input is ordinary chat
    /// text rather than a command.
    pub fn parse(input: &str) -> Option<Command> {
        let rest = input.trim().strip_prefix('/')?;
        let (name, args) = match rest.split_once(' ') {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        Some(match name.to_ascii_lowercase().as_str() {
            "help" | "h" | "?" => Command::Help,
            "clear" | "c" => Command::Clear,
            "status" | "s" => Command::Status,
            "export" | "e" => Command::Export((!args.is_empty()).then(|| PathBuf::from(args))),
            "quit" | "exit" | "q" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        })
    }
}

/// Text shown by `/help`.
pub fn help_text() -> String {
    let mut out = String::from("Commands:\n");
    let commands = [
        ("/help, /h, /?", "show this help"),
        ("/status, /s", "backend address and token usage"),
        ("/export, /e [path]", "save the transcript as markdown"),
        ("/clear, /c", "clear the conversation"),
        ("/quit, /exit, /q", "leave"),
    ];
    for (name, what) in commands {
        let _ = writeln!(out, "  {name:<22}{what}");
    }
    out.push_str("\nKeys:\n");
    for (key, what) in charla_tui::input::BINDINGS {
        let _ = writeln!(out, "  {key:<22}{what}");
    }
    out.pop();
    out
}

/// Text shown by `/status`.
pub fn status_text(conversation: &Conversation, backend_url: &str) -> String {
    use charla_session::Sender;

    let from_user = conversation
        .messages
        .iter()
        .filter(|m| m.sender == Sender::User)
        .count();
    let from_ai = conversation.messages.len() - from_user;

    let mut out = String::new();
    let _ = writeln!(out, "backend     {backend_url}");
    let _ = writeln!(
        out,
        "messages    {} ({from_user} user / {from_ai} ai)",
        conversation.messages.len()
    );
    let _ = write!(out, "tokens      {}", format_tokens(conversation.total_tokens));
    if let Some(error) = &conversation.last_error {
        let _ = write!(out, "\nlast error  {error}");
    }
    out
}

fn format_tokens(n: u64) -> String {
    match n {
        0..=999 => n.to_string(),
        1_000..=999_999 => format!("{:.1}k", n as f64 / 1_000.0),
        _ => format!("{:.1}M", n as f64 / 1_000_000.0),
    }
}
