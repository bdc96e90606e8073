//! Animation frames driven by the UI tick counter.
//!
//! Taking the tick as an argument keeps the animations deterministic
//! under test; nothing here reads the clock.

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const DOTS: [&str; 4] = ["", ".", "..", "..."];

/// Braille spinner frame for the status line.
pub fn spinner_frame(tick: u64) -> &'static str {
    SPINNER[(tick % SPINNER.len() as u64) as usize]
}

/// Trailing dots for the typing indicator. Advances every other tick
/// so it reads slower than the spinner.
pub fn typing_dots(tick: u64) -> &'static str {
    DOTS[((tick / 2) % DOTS.len() as u64) as usize]
}
