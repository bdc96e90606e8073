//! Plain stdin/stdout chat, for pipes, scripts and one-shot questions.
//!
//! No terminal takeover: replies stream to stdout as they are revealed,
//! errors go to stderr, and slash commands work the same as in the
//! full-screen UI.

use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use charla_session::export::write_markdown;
use charla_session::{Session, SessionEvent};

use crate::commands::{self, Command};
use crate::config::Settings;

/// Send one message, print the reply, exit. Used by `-c`.
pub async fn run_once(session: &mut Session, message: &str) -> Result<()> {
    stream_turn(session, message).await?;
    let tokens = session.conversation().total_tokens;
    if tokens > 0 && std::io::stdout().is_terminal() {
        eprintln!("[{tokens} tokens]");
    }
    Ok(())
}

/// Line-oriented chat loop on stdin. Exits on EOF or `/quit`.
pub async fn run_repl(session: &mut Session, settings: &Settings) -> Result<()> {
    println!("Connected to {}.", settings.backend_url);
    println!("Type a message, or /help for commands. Ctrl+D exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match Command::parse(line) {
            Some(Command::Help) => println!("{}", commands::help_text()),
            Some(Command::Clear) => {
                session.reset();
                println!("Conversation cleared.");
            }
            Some(Command::Status) => println!(
                "{}",
                commands::status_text(session.conversation(), &settings.backend_url)
            ),
            Some(Command::Export(path)) => export(session, path),
            Some(Command::Quit) => break,
            Some(Command::Unknown(name)) => {
                println!("Unknown command: /{name}. Try /help.");
            }
            None => {
                if let Err(e) = stream_turn(session, line).await {
                    tracing::debug!("turn failed: {e}");
                    report_failure(session);
                }
            }
        }
    }
    Ok(())
}

/// Drive one turn, echoing reply characters as they arrive. Ctrl+C
/// aborts the turn in place of killing the process, keeping the text
/// revealed so far.
async fn stream_turn(session: &mut Session, text: &str) -> charla_session::Result<()> {
    let mut events = session.subscribe();
    let handle = session.handle();
    let mut out = std::io::stdout();
    let mut last = None;

    let turn = session.submit(text);
    tokio::pin!(turn);

    let result = loop {
        tokio::select! {
            result = &mut turn => break result,
            event = events.recv() => match event {
                Ok(event) => print_event(&event, &mut out, &mut last),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("dropped {skipped} session events");
                }
                Err(RecvError::Closed) => {}
            },
            _ = tokio::signal::ctrl_c() => handle.abort(),
        }
    };

    // The turn can finish with a few events still queued behind it.
    while let Ok(event) = events.try_recv() {
        print_event(&event, &mut out, &mut last);
    }
    if last.is_some_and(|c| c != '\n') {
        let _ = writeln!(out);
    }
    let _ = out.flush();
    result
}

fn print_event(event: &SessionEvent, out: &mut impl Write, last: &mut Option<char>) {
    if let SessionEvent::ReplyDelta { delta, .. } = event {
        let _ = write!(out, "{delta}");
        let _ = out.flush();
        *last = Some(*delta);
    }
}

fn report_failure(session: &Session) {
    let reason = session
        .conversation()
        .last_error
        .clone()
        .unwrap_or_else(|| "turn failed".to_string());
    eprintln!("error: {reason}");
}

fn export(session: &Session, path: Option<PathBuf>) {
    let target = path.unwrap_or_else(|| PathBuf::from("."));
    match write_markdown(session.messages(), &target) {
        Ok(written) => println!("Exported to {}", written.display()),
        Err(e) => eprintln!("error: {e}"),
    }
}
