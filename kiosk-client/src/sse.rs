//! Incremental decoder for `text/event-stream` bodies
//!
//! Only `data:` fields matter for the order stream. `event:`, `id:` and
//! `retry:` are accepted and ignored, `:` comment lines are skipped.

/// Longest line the decoder buffers while waiting for its terminator
pub const MAX_PENDING_LINE: usize = 64 * 1024;

/// Turns arbitrary byte chunks into complete event payloads
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
    /// Inside an oversized line; everything up to its terminator is dropped
    skipping: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning the payload of every event it completes
    ///
    /// Multi-line `data:` fields are joined with `\n`. Bytes after the last
    /// line terminator stay buffered until the next chunk, up to
    /// [`MAX_PENDING_LINE`]. A longer line is discarded along with the
    /// event it belongs to.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n' || b == b'\r') {
            let mut consumed = pos + 1;
            if self.buf[pos] == b'\r' {
                // \r at the end of the chunk may be the first half of \r\n
                match self.buf.get(pos + 1) {
                    None => break,
                    Some(b'\n') => consumed += 1,
                    Some(_) => {}
                }
            }
            if self.skipping {
                self.buf.drain(..consumed);
                self.skipping = false;
                continue;
            }
            let line = String::from_utf8_lossy(&self.buf[..pos]).into_owned();
            self.buf.drain(..consumed);
            self.process_line(&line, &mut events);
        }

        if self.buf.len() > MAX_PENDING_LINE {
            tracing::warn!(pending = self.buf.len(), "Dropping oversized SSE line");
            self.buf.clear();
            self.data.clear();
            self.skipping = true;
        }

        events
    }

    /// Bytes held back waiting for a line terminator
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            // 空行: dispatch
            if !self.data.is_empty() {
                events.push(self.data.join("\n"));
                self.data.clear();
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
    }
}
