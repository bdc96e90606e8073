//! Incremental frame decoding for streamed response bodies

use memchr::memchr;

/// Splits raw response bytes into newline-delimited frames.
///
/// Bytes arrive in whatever chunks the network produces, so a frame, or a
/// multi-byte UTF-8 sequence inside one, can be cut at any read boundary.
/// Incomplete data stays buffered until its closing newline shows up, which
/// makes the emitted frames independent of how the bytes were chunked.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes, returning every frame it completes.
    ///
    /// Frames are trimmed (which also strips the `\r` of CRLF endings) and
    /// blank lines are dropped. A completed line that is not valid UTF-8 is
    /// skipped with a warning.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            match std::str::from_utf8(&self.buffer[..newline_pos]) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        frames.push(line.to_string());
                    }
                }
                Err(e) => {
                    tracing::warn!("dropping non-UTF-8 line from stream: {e}");
                }
            }
            self.buffer.drain(..=newline_pos);
        }
        frames
    }

    /// Consume the decoder at end-of-data, returning a trailing frame that
    /// was never closed by a newline, if any.
    pub fn finish(self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        match String::from_utf8(self.buffer) {
            Ok(tail) => {
                let tail = tail.trim();
                (!tail.is_empty()).then(|| tail.to_string())
            }
            Err(e) => {
                tracing::warn!(
                    "dropping non-UTF-8 tail from stream: {}",
                    e.utf8_error()
                );
                None
            }
        }
    }
}
