//! Widgets for the chat screen.

pub mod activity;
pub mod markdown;
pub mod prompt;
pub mod transcript;

pub use prompt::{Prompt, PromptView};
pub use transcript::{Entry, Speaker, Transcript};
