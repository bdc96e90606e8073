//! Markdown export of a conversation transcript

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::message::Message;

/// Errors surfaced while exporting a transcript
#[derive(Error, Debug)]
pub enum ExportError {
    /// Nothing to write yet
    #[error("No messages to export.")]
    NoMessages,

    /// Filesystem failure while writing the document
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

/// Render the transcript as a markdown document.
///
/// Each entry is a bold sender label with its clock time, the message body,
/// and a closing rule:
///
/// ```text
/// **User** (14:05:30):
///
/// hola
///
/// ---
/// ```
pub fn conversation_markdown(messages: &[Message]) -> Result<String, ExportError> {
    if messages.is_empty() {
        return Err(ExportError::NoMessages);
    }
    let blocks: Vec<String> = messages
        .iter()
        .map(|m| {
            format!(
                "**{}** ({}):\n\n{}\n\n---",
                m.sender.label(),
                m.time_label(),
                m.text
            )
        })
        .collect();
    Ok(blocks.join("\n"))
}

/// Default export file name for a given moment, e.g.
/// `chat-2026-08-25T14-05-30.md`. Colons are avoided so the name works on
/// every filesystem.
pub fn export_file_name(moment: DateTime<Local>) -> String {
    format!("chat-{}.md", moment.format("%Y-%m-%dT%H-%M-%S"))
}

/// Write the transcript to `path`, or to a timestamped file inside `path`
/// when it is a directory. Returns the path written.
pub fn write_markdown(messages: &[Message], path: &Path) -> Result<PathBuf, ExportError> {
    let document = conversation_markdown(messages)?;
    let target = if path.is_dir() {
        path.join(export_file_name(Local::now()))
    } else {
        path.to_path_buf()
    };
    fs::write(&target, document)?;
    Ok(target)
}
