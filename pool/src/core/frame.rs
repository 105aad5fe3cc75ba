//! Incremental JSON frame decoding for worker stdout
//!
//! Stdout chunks do not line up with messages: one read may hold half a
//! frame, or several frames at once. The decoder buffers bytes and tries a
//! parse after every chunk. A parse that runs out of input means "more data
//! needed"; a complete JSON value is a frame; anything else up to the next
//! newline is treated as stray output and skipped.

use serde_json::Value;

/// Upper bound on buffered, not yet decodable stdout bytes per worker
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Something the decoder produced from the buffered bytes
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// A complete JSON value
    Frame(Value),
    /// A line that could not be parsed as JSON
    Skipped(String),
    /// The buffer exceeded its bound and was discarded
    Overflow(usize),
}

enum Attempt {
    Complete(Value, usize),
    Incomplete,
    Invalid,
}

#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_bytes: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_bytes,
        }
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append a chunk and return every event it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<FrameEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        loop {
            match self.buffer.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(start) => {
                    self.buffer.drain(..start);
                }
                None => {
                    self.buffer.clear();
                    break;
                }
            }

            match self.attempt() {
                Attempt::Complete(value, consumed) => {
                    self.buffer.drain(..consumed);
                    events.push(FrameEvent::Frame(value));
                }
                Attempt::Incomplete => break,
                Attempt::Invalid => match self.buffer.iter().position(|b| *b == b'\n') {
                    Some(newline) => {
                        let line: Vec<u8> = self.buffer.drain(..=newline).collect();
                        events.push(FrameEvent::Skipped(String::from_utf8_lossy(&line).trim().to_string()));
                    }
                    // wait for the rest of the stray line
                    None => break,
                },
            }
        }

        if self.buffer.len() > self.max_bytes {
            let discarded = self.buffer.len();
            self.buffer.clear();
            events.push(FrameEvent::Overflow(discarded));
        }

        events
    }

    fn attempt(&self) -> Attempt {
        let mut stream = serde_json::Deserializer::from_slice(&self.buffer).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => Attempt::Complete(value, stream.byte_offset()),
            Some(Err(err)) if err.is_eof() => Attempt::Incomplete,
            Some(Err(_)) => Attempt::Invalid,
            None => Attempt::Incomplete,
        }
    }
}
