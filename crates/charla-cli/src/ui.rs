//! Full-screen chat UI.
//!
//! [`ChatView`] is a synchronous mirror of the session: events go in,
//! a frame comes out. All terminal I/O stays in [`run`] and
//! [`drive_turn`], which keeps the view testable against a buffer.
//!
//! The view's transcript mirror can fall behind if the event channel
//! overflows during a fast reply; every turn therefore ends with a
//! [`ChatView::resync`] from the conversation itself.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    EventStream,
};
use crossterm::execute;
use futures::StreamExt;
use ratatui::layout::{Constraint, Layout};
use ratatui::text::{Line, Span};
use ratatui::{DefaultTerminal, Frame};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::time::{Interval, MissedTickBehavior};

use charla_session::export::write_markdown;
use charla_session::{Conversation, ExportError, Sender, Session, SessionEvent};
use charla_tui::input::{BINDINGS, action_for};
use charla_tui::widgets::activity::spinner_frame;
use charla_tui::widgets::transcript::{content_width, transcript_lines};
use charla_tui::widgets::{Entry, Prompt, PromptView, Speaker, Transcript};
use charla_tui::{Action, Theme};

use crate::commands::{self, Command};
use crate::config::Settings;

/// Animation and redraw heartbeat.
const TICK: Duration = Duration::from_millis(100);

/// What a key press asks the outer loop to do.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AfterKey {
    /// Nothing beyond redrawing.
    Redraw,
    /// The prompt line was sent as a chat message.
    Submit(String),
    /// The prompt line was a slash command, or a key bound to one.
    Command(Command),
    /// The user asked to leave.
    Quit,
}

/// How a driven turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnExit {
    Finished,
    /// Quit was requested mid-reply.
    Quit,
    /// Clear was requested mid-reply. The turn was retired; the caller
    /// resets the session once the submit future has unwound.
    ClearPending,
}

/// Everything the chat screen needs to render one frame.
struct ChatView {
    theme: Theme,
    backend_url: String,
    prompt: Prompt,
    /// Mirror of the conversation transcript.
    messages: Vec<Entry>,
    /// Local output, each anchored to the message count at creation so
    /// it keeps its place as the transcript grows.
    notices: Vec<(usize, Entry)>,
    typing: bool,
    busy: bool,
    banner: Option<String>,
    tokens: u64,
    /// Lines scrolled up from the bottom; zero follows the newest.
    scroll_back: usize,
    tick: u64,
    /// Transcript viewport height from the last draw.
    page: u16,
    /// Upper bound for `scroll_back` from the last draw.
    max_back: usize,
}

impl ChatView {
    fn new(theme: Theme, backend_url: String) -> Self {
        let mut view = ChatView {
            theme,
            backend_url,
            prompt: Prompt::new(),
            messages: Vec::new(),
            notices: Vec::new(),
            typing: false,
            busy: false,
            banner: None,
            tokens: 0,
            scroll_back: 0,
            tick: 0,
            page: 0,
            max_back: 0,
        };
        view.notice(welcome_text());
        view
    }

    /// Fold one session event into the mirror.
    fn apply(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::TurnStarted { message } => {
                self.banner = None;
                self.typing = true;
                self.scroll_back = 0;
                self.messages
                    .push(Entry::user(message.time_label(), message.text.clone()));
            }
            SessionEvent::ReplyStarted { message } => {
                self.typing = false;
                self.messages
                    .push(Entry::reply(message.time_label(), String::new(), true));
            }
            SessionEvent::ReplyDelta { delta, .. } => {
                if let Some(last) = self.messages.last_mut() {
                    if last.speaker == Speaker::Assistant && last.streaming {
                        last.body.push(*delta);
                    }
                }
            }
            SessionEvent::UsageUpdated { total_tokens } => self.tokens = *total_tokens,
            SessionEvent::TurnEnded => {
                self.typing = false;
                if let Some(last) = self.messages.last_mut() {
                    last.streaming = false;
                }
            }
            SessionEvent::TurnFailed { message } => {
                self.typing = false;
                if let Some(last) = self.messages.last_mut() {
                    last.streaming = false;
                }
                self.banner = Some(message.clone());
            }
            SessionEvent::Cleared => {
                self.messages.clear();
                self.notices.clear();
                self.typing = false;
                self.banner = None;
                self.tokens = 0;
                self.scroll_back = 0;
                self.notice("Conversation cleared.");
            }
        }
    }

    /// Append local output at the current end of the transcript.
    fn notice(&mut self, text: impl Into<String>) {
        self.notices.push((self.messages.len(), Entry::notice(text)));
        self.scroll_back = 0;
    }

    /// Rebuild the transcript mirror from the conversation.
    fn resync(&mut self, conversation: &Conversation) {
        let open = conversation.open_reply_id();
        self.messages = conversation
            .messages
            .iter()
            .map(|m| match m.sender {
                Sender::User => Entry::user(m.time_label(), m.text.clone()),
                Sender::Assistant => {
                    Entry::reply(m.time_label(), m.text.clone(), Some(m.id) == open)
                }
            })
            .collect();
        self.typing = conversation.is_typing();
        self.tokens = conversation.total_tokens;
        self.banner = conversation.last_error.clone();
        let len = self.messages.len();
        for (anchor, _) in &mut self.notices {
            *anchor = (*anchor).min(len);
        }
    }

    /// Messages and notices in display order.
    fn entries(&self) -> Vec<Entry> {
        let mut merged = Vec::with_capacity(self.messages.len() + self.notices.len());
        let mut pending = self.notices.iter().peekable();
        for (i, message) in self.messages.iter().enumerate() {
            while let Some((_, notice)) = pending.next_if(|(anchor, _)| *anchor <= i) {
                merged.push(notice.clone());
            }
            merged.push(message.clone());
        }
        merged.extend(pending.map(|(_, notice)| notice.clone()));
        merged
    }

    fn on_key(&mut self, action: Action) -> AfterKey {
        match action {
            Action::Insert(c) => self.prompt.insert(c),
            Action::Paste(text) => self.prompt.insert_str(&text),
            Action::Submit => {
                let text = self.prompt.text().trim().to_string();
                if text.is_empty() {
                    return AfterKey::Redraw;
                }
                if self.busy {
                    // Keep the typed line; it can go out after the reply.
                    return AfterKey::Redraw;
                }
                self.prompt.take();
                self.scroll_back = 0;
                if let Some(command) = Command::parse(&text) {
                    return AfterKey::Command(command);
                }
                return AfterKey::Submit(text);
            }
            Action::DeleteBack => self.prompt.delete_back(),
            Action::DeleteForward => self.prompt.delete_forward(),
            Action::DeleteWord => self.prompt.delete_word(),
            Action::KillLine => self.prompt.kill(),
            Action::CursorLeft => self.prompt.move_left(),
            Action::CursorRight => self.prompt.move_right(),
            Action::LineStart => self.prompt.move_start(),
            Action::LineEnd => self.prompt.move_end(),
            Action::ScrollUp(n) => self.scroll_by(n as isize),
            Action::ScrollDown(n) => self.scroll_by(-(n as isize)),
            Action::PageUp => self.scroll_by(self.page as isize),
            Action::PageDown => self.scroll_by(-(self.page as isize)),
            // Esc only means something while a reply is in flight.
            Action::Cancel => {}
            Action::Interrupt => return AfterKey::Quit,
            Action::Eof => {
                if self.prompt.is_empty() {
                    return AfterKey::Quit;
                }
                self.prompt.delete_forward();
            }
            Action::Clear => return AfterKey::Command(Command::Clear),
            Action::Export => return AfterKey::Command(Command::Export(None)),
            Action::Quit => return AfterKey::Quit,
        }
        AfterKey::Redraw
    }

    fn scroll_by(&mut self, delta: isize) {
        if delta >= 0 {
            self.scroll_back = self
                .scroll_back
                .saturating_add(delta as usize)
                .min(self.max_back);
        } else {
            self.scroll_back = self.scroll_back.saturating_sub(delta.unsigned_abs());
        }
    }

    fn on_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    fn draw(&mut self, frame: &mut Frame) {
        let [transcript_area, status_area, prompt_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let entries = self.entries();
        let lines = transcript_lines(
            &entries,
            self.typing,
            self.banner.as_deref(),
            self.tick,
            &self.theme,
            content_width(transcript_area.width),
        );

        self.page = transcript_area.height;
        self.max_back = lines.len().saturating_sub(transcript_area.height as usize);
        self.scroll_back = self.scroll_back.min(self.max_back);

        frame.render_widget(
            Transcript::new(&lines, &self.theme).scroll_back(self.scroll_back),
            transcript_area,
        );
        frame.render_widget(self.status_line(status_area.width), status_area);
        frame.render_widget(
            PromptView::new(&self.prompt, &self.theme).busy(self.busy),
            prompt_area,
        );
    }

    fn status_line(&self, width: u16) -> Line<'static> {
        let left = if self.busy {
            vec![
                Span::styled(spinner_frame(self.tick).to_string(), self.theme.busy),
                Span::styled(" replying · Esc cancels", self.theme.faint),
            ]
        } else if self.scroll_back > 0 {
            vec![Span::styled(
                format!("↑ {} lines back", self.scroll_back),
                self.theme.faint,
            )]
        } else {
            vec![Span::styled("ready", self.theme.faint)]
        };

        let mut right = self.backend_url.clone();
        if self.tokens > 0 {
            right.push_str(&format!(" · {} tokens", self.tokens));
        }
        let right = Span::styled(right, self.theme.faint);

        let mut line = Line::from(left);
        let pad = (width as usize).saturating_sub(line.width() + right.width());
        line.spans.push(Span::raw(" ".repeat(pad)));
        line.spans.push(right);
        line
    }
}

fn welcome_text() -> String {
    let mut text = String::from("Welcome to charla.\n");
    for (keys, what) in BINDINGS {
        text.push_str(&format!("  {keys:<12} {what}\n"));
    }
    text.push_str("Slash commands work too; try /help.");
    text
}

/// Raw-mode terminal with mouse and paste reporting, restored on drop.
struct Screen {
    terminal: DefaultTerminal,
}

impl Screen {
    fn open() -> Result<Self> {
        let terminal = ratatui::init();
        execute!(
            std::io::stdout(),
            EnableMouseCapture,
            EnableBracketedPaste
        )?;
        Ok(Self { terminal })
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = execute!(
            std::io::stdout(),
            DisableBracketedPaste,
            DisableMouseCapture
        );
        ratatui::restore();
    }
}

/// Apply every event already queued, without blocking.
fn drain(view: &mut ChatView, events: &mut broadcast::Receiver<SessionEvent>) {
    loop {
        match events.try_recv() {
            Ok(event) => view.apply(&event),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!("view dropped {skipped} session events");
            }
            Err(_) => break,
        }
    }
}

/// Run the chat screen until the user leaves.
pub async fn run(session: &mut Session, settings: &Settings) -> Result<()> {
    let mut events = session.subscribe();
    let mut screen = Screen::open()?;
    let mut view = ChatView::new(settings.theme(), settings.backend_url.clone());
    let mut input = EventStream::new();
    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        screen.terminal.draw(|frame| view.draw(frame))?;

        let after = tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => view.apply(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("view dropped {skipped} session events");
                        view.resync(session.conversation());
                    }
                    Err(RecvError::Closed) => {}
                }
                AfterKey::Redraw
            }
            Some(event) = input.next() => match event {
                Ok(event) => match action_for(&event) {
                    Some(action) => view.on_key(action),
                    None => AfterKey::Redraw,
                },
                Err(e) => return Err(e.into()),
            },
            _ = ticker.tick() => {
                view.on_tick();
                AfterKey::Redraw
            }
        };

        match after {
            AfterKey::Redraw => {}
            AfterKey::Quit => break,
            AfterKey::Submit(text) => {
                let exit = drive_turn(
                    &mut screen.terminal,
                    session,
                    &mut view,
                    &mut events,
                    &mut input,
                    &mut ticker,
                    &text,
                )
                .await?;
                match exit {
                    TurnExit::Finished => {}
                    TurnExit::Quit => break,
                    TurnExit::ClearPending => {
                        session.reset();
                        drain(&mut view, &mut events);
                    }
                }
            }
            AfterKey::Command(command) => {
                if !run_command(session, &mut view, &mut events, settings, command) {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Drive one submitted message to completion while keeping the screen
/// live. Control keys are intercepted here because the session is
/// mutably borrowed by the turn; everything else falls through to the
/// view so editing and scrolling keep working.
async fn drive_turn(
    terminal: &mut DefaultTerminal,
    session: &mut Session,
    view: &mut ChatView,
    events: &mut broadcast::Receiver<SessionEvent>,
    input: &mut EventStream,
    ticker: &mut Interval,
    text: &str,
) -> Result<TurnExit> {
    let handle = session.handle();
    view.busy = true;
    let mut exit = TurnExit::Finished;

    let result = {
        let turn = session.submit(text);
        tokio::pin!(turn);
        loop {
            terminal.draw(|frame| view.draw(frame))?;

            tokio::select! {
                biased;
                result = &mut turn => break result,
                event = events.recv() => match event {
                    Ok(event) => view.apply(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("view dropped {skipped} session events");
                    }
                    Err(RecvError::Closed) => {}
                },
                Some(event) = input.next() => match event {
                    Ok(event) => {
                        if let Some(action) = action_for(&event) {
                            match action {
                                Action::Cancel | Action::Interrupt => handle.abort(),
                                Action::Quit => {
                                    handle.abort();
                                    exit = TurnExit::Quit;
                                }
                                Action::Eof if view.prompt.is_empty() => {
                                    handle.abort();
                                    exit = TurnExit::Quit;
                                }
                                Action::Clear => {
                                    handle.invalidate();
                                    exit = TurnExit::ClearPending;
                                }
                                Action::Export => {
                                    view.notice("Export is available once the reply finishes.");
                                }
                                action => {
                                    view.on_key(action);
                                }
                            }
                        }
                    }
                    Err(e) => return Err(e.into()),
                },
                _ = ticker.tick() => view.on_tick(),
            }

            // Coalesce bursts so one frame covers them all.
            drain(view, events);
        }
    };

    view.busy = false;
    if let Err(e) = result {
        // Already on screen as a failure banner.
        tracing::debug!("turn ended with error: {e}");
    }
    drain(view, events);
    view.resync(session.conversation());
    Ok(exit)
}

/// Returns false when the command asks to leave.
fn run_command(
    session: &mut Session,
    view: &mut ChatView,
    events: &mut broadcast::Receiver<SessionEvent>,
    settings: &Settings,
    command: Command,
) -> bool {
    match command {
        Command::Help => view.notice(commands::help_text()),
        Command::Clear => {
            session.reset();
            drain(view, events);
        }
        Command::Status => view.notice(commands::status_text(
            session.conversation(),
            &settings.backend_url,
        )),
        Command::Export(path) => {
            let target = path.unwrap_or_else(|| PathBuf::from("."));
            match write_markdown(session.messages(), &target) {
                Ok(written) => view.notice(format!("Exported to {}", written.display())),
                Err(ExportError::NoMessages) => view.notice("No messages to export."),
                Err(e) => view.notice(format!("Export failed: {e}")),
            }
        }
        Command::Quit => return false,
        Command::Unknown(name) => view.notice(format!("Unknown command: /{name}. Try /help.")),
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use charla_session::Message;
    use chrono::Local;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn view() -> ChatView {
        ChatView::new(Theme::dark(), "http://127.0.0.1:8000".into())
    }

    fn message(id: u64, sender: Sender, text: &str) -> Message {
        Message {
            id,
            sender,
            text: text.to_string(),
            timestamp: Local::now(),
        }
    }

    fn turn_started(id: u64, text: &str) -> SessionEvent {
        SessionEvent::TurnStarted {
            message: message(id, Sender::User, text),
        }
    }

    #[test]
    fn test_welcome_notice_shows_before_any_messages() {
        let view = view();
        let entries = view.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].speaker, Speaker::Notice);
        assert!(entries[0].body.contains("Welcome"));
        assert!(entries[0].body.contains("/help"));
    }

    #[test]
    fn test_apply_mirrors_a_full_turn() {
        let mut view = view();
        view.apply(&turn_started(0, "hola"));
        assert!(view.typing);

        view.apply(&SessionEvent::ReplyStarted {
            message: message(1, Sender::Assistant, ""),
        });
        assert!(!view.typing);
        for c in "hi!".chars() {
            view.apply(&SessionEvent::ReplyDelta { id: 1, delta: c });
        }
        view.apply(&SessionEvent::UsageUpdated { total_tokens: 12 });
        view.apply(&SessionEvent::TurnEnded);

        assert_eq!(view.messages.len(), 2);
        assert_eq!(view.messages[0].body, "hola");
        assert_eq!(view.messages[1].body, "hi!");
        assert!(!view.messages[1].streaming);
        assert_eq!(view.tokens, 12);
    }

    #[test]
    fn test_turn_failure_sets_the_banner() {
        let mut view = view();
        view.apply(&turn_started(0, "hola"));
        view.apply(&SessionEvent::TurnFailed {
            message: "Failed to connect to server.".into(),
        });
        assert!(!view.typing);
        assert_eq!(view.banner.as_deref(), Some("Failed to connect to server."));

        // The next turn clears it.
        view.apply(&turn_started(1, "again"));
        assert!(view.banner.is_none());
    }

    #[test]
    fn test_cleared_resets_and_leaves_a_notice() {
        let mut view = view();
        view.apply(&turn_started(0, "hola"));
        view.tokens = 40;
        view.apply(&SessionEvent::Cleared);

        assert!(view.messages.is_empty());
        assert_eq!(view.tokens, 0);
        let entries = view.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].body.contains("cleared"));
    }

    #[test]
    fn test_notices_keep_their_place_in_the_transcript() {
        let mut view = view();
        view.apply(&turn_started(0, "first"));
        view.notice("between");
        view.apply(&turn_started(1, "second"));

        let entries = view.entries();
        let bodies: Vec<&str> = entries.iter().map(|e| e.body.as_str()).collect();
        let first = bodies.iter().position(|b| *b == "first").unwrap();
        let between = bodies.iter().position(|b| *b == "between").unwrap();
        let second = bodies.iter().position(|b| *b == "second").unwrap();
        assert!(first < between && between < second);
    }

    #[test]
    fn test_typing_then_submit_hands_over_the_line() {
        let mut view = view();
        for c in "hi".chars() {
            assert_eq!(view.on_key(Action::Insert(c)), AfterKey::Redraw);
        }
        assert_eq!(view.on_key(Action::Submit), AfterKey::Submit("hi".into()));
        assert!(view.prompt.is_empty());
    }

    #[test]
    fn test_blank_submit_does_nothing() {
        let mut view = view();
        view.on_key(Action::Insert(' '));
        assert_eq!(view.on_key(Action::Submit), AfterKey::Redraw);
    }

    #[test]
    fn test_slash_input_parses_to_a_command() {
        let mut view = view();
        for c in "/status".chars() {
            view.on_key(Action::Insert(c));
        }
        assert_eq!(
            view.on_key(Action::Submit),
            AfterKey::Command(Command::Status)
        );
        assert!(view.prompt.is_empty());
    }

    #[test]
    fn test_submit_while_busy_keeps_the_prompt() {
        let mut view = view();
        view.busy = true;
        for c in "queued".chars() {
            view.on_key(Action::Insert(c));
        }
        assert_eq!(view.on_key(Action::Submit), AfterKey::Redraw);
        assert_eq!(view.prompt.text(), "queued");
    }

    #[test]
    fn test_eof_quits_only_on_an_empty_prompt() {
        let mut view = view();
        assert_eq!(view.on_key(Action::Eof), AfterKey::Quit);
        view.on_key(Action::Insert('x'));
        view.on_key(Action::LineStart);
        assert_eq!(view.on_key(Action::Eof), AfterKey::Redraw);
        assert!(view.prompt.is_empty());
    }

    #[test]
    fn test_clear_and_export_keys_become_commands() {
        let mut view = view();
        assert_eq!(
            view.on_key(Action::Clear),
            AfterKey::Command(Command::Clear)
        );
        assert_eq!(
            view.on_key(Action::Export),
            AfterKey::Command(Command::Export(None))
        );
    }

    #[test]
    fn test_scrolling_clamps_to_the_content() {
        let mut view = view();
        view.max_back = 5;
        view.page = 4;
        view.on_key(Action::ScrollUp(3));
        assert_eq!(view.scroll_back, 3);
        view.on_key(Action::PageUp);
        assert_eq!(view.scroll_back, 5);
        view.on_key(Action::ScrollDown(2));
        assert_eq!(view.scroll_back, 3);
        view.on_key(Action::PageDown);
        assert_eq!(view.scroll_back, 0);
    }

    #[test]
    fn test_resync_rebuilds_the_mirror_from_the_conversation() {
        let mut conversation = Conversation::new();
        conversation.begin_turn("hola");
        conversation.begin_reply();
        for c in "par".chars() {
            conversation.push_char(c);
        }
        conversation.set_total_tokens(9);

        let mut view = view();
        view.resync(&conversation);
        assert_eq!(view.messages.len(), 2);
        assert_eq!(view.messages[1].body, "par");
        assert!(view.messages[1].streaming);
        assert_eq!(view.tokens, 9);

        conversation.finish_turn();
        view.resync(&conversation);
        assert!(!view.messages[1].streaming);
    }

    #[test]
    fn test_draw_renders_transcript_status_and_prompt() {
        let mut view = view();
        view.apply(&turn_started(0, "hola"));
        view.apply(&SessionEvent::ReplyStarted {
            message: message(1, Sender::Assistant, ""),
        });
        for c in "hello".chars() {
            view.apply(&SessionEvent::ReplyDelta { id: 1, delta: c });
        }
        view.apply(&SessionEvent::TurnEnded);

        let mut terminal = Terminal::new(TestBackend::new(60, 16)).unwrap();
        terminal.draw(|frame| view.draw(frame)).unwrap();

        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        assert!(text.contains("User"));
        assert!(text.contains("hello"));
        assert!(text.contains("http://127.0.0.1:8000"));
        assert!(text.contains("❯"));
        assert_eq!(view.page, 14);
    }
}
