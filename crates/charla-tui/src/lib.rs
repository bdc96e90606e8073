//! charla-tui: terminal widgets for the chat screen.
//!
//! Everything here is synchronous and side-effect free. Widgets draw
//! from plain state passed in each frame and animations advance on a
//! caller-supplied tick, so the whole crate can be tested against an
//! in-memory [`ratatui::buffer::Buffer`].

pub mod input;
pub mod theme;
pub mod widgets;

pub use input::Action;
pub use theme::Theme;
