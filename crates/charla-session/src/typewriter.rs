//! Paced character reveal for streamed reply text
//!
//! The backend sends reply text in multi-character chunks. The session
//! reveals it one character at a time with a short pause after each, which
//! is what makes the reply read as typing rather than appearing in slabs.

use std::time::Duration;

use async_stream::stream;
use tokio_stream::Stream;

/// Default pause after each revealed character
pub const DEFAULT_CHAR_DELAY: Duration = Duration::from_millis(15);

/// Turn a text chunk into a stream of single characters, pausing `delay`
/// after each one. A zero delay yields the characters back-to-back, still
/// one at a time and in order.
pub fn paced_chars(text: String, delay: Duration) -> impl Stream<Item = char> {
    stream! {
        for c in text.chars() {
            yield c;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
