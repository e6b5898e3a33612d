//! Frame Decoder
//!
//! Re-segments an arbitrarily chunked byte stream into messages. Two state
//! machines back the three read modes:
//!
//! - newline: every LF closes a frame, a CR directly before the LF is dropped
//! - delimited (STX/ETX and custom): a frame runs from the start delimiter to
//!   the first end delimiter that arrives once the frame is at least
//!   `packet_size` bytes long. Both delimiters stay in the emitted payload, so
//!   `STX 01 02 ETX` with `packet_size = 4` yields `02 01 02 03`. Bytes seen
//!   outside a frame are discarded, and an early end delimiter is kept as data.
//!
//! Malformed input never errors; the working buffer keeps growing until a
//! frame completes or the decoder is reset.

use crate::config::{FramingMode, CARRIAGE_RETURN, NEWLINE};
use crate::message::Message;
use tracing::debug;

/// Streaming decoder owned by a single port reader
#[derive(Debug, Default)]
pub struct FrameDecoder {
    mode: FramingMode,
    /// Working buffer for the frame being assembled
    buffer: Vec<u8>,
    /// Inside a start..end run (delimited mode only)
    capturing: bool,
}

impl FrameDecoder {
    /// Create a decoder for the given framing
    pub fn new(mode: FramingMode) -> Self {
        Self {
            mode,
            buffer: Vec::new(),
            capturing: false,
        }
    }

    /// Active framing
    pub fn mode(&self) -> FramingMode {
        self.mode
    }

    /// Switch framing; a real change drops the half-built frame.
    ///
    /// Returns whether the mode changed.
    pub fn set_mode(&mut self, mode: FramingMode) -> bool {
        if mode == self.mode {
            return false;
        }
        debug!(
            "Framing changed from {:?} to {:?}, discarding {} pending bytes",
            self.mode,
            mode,
            self.buffer.len()
        );
        self.mode = mode;
        self.reset();
        true
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.capturing = false;
    }

    /// Bytes accumulated for the frame in progress
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Feed a raw chunk and collect every frame it completes, in order
    pub fn feed(&mut self, data: &[u8]) -> Vec<Message> {
        let mut frames = Vec::new();

        match self.mode {
            FramingMode::NewLine => self.feed_newline(data, &mut frames),
            FramingMode::Delimited {
                start,
                end,
                packet_size,
            } => self.feed_delimited(data, start, end, packet_size, &mut frames),
        }

        frames
    }

    fn feed_newline(&mut self, data: &[u8], frames: &mut Vec<Message>) {
        for &byte in data {
            if byte == NEWLINE {
                if self.buffer.last() == Some(&CARRIAGE_RETURN) {
                    self.buffer.pop();
                }
                frames.push(self.take_frame());
            } else {
                self.buffer.push(byte);
            }
        }
    }

    fn feed_delimited(
        &mut self,
        data: &[u8],
        start: u8,
        end: u8,
        packet_size: usize,
        frames: &mut Vec<Message>,
    ) {
        for &byte in data {
            if !self.capturing {
                if byte == start {
                    self.capturing = true;
                    self.buffer.push(byte);
                }
                continue;
            }

            self.buffer.push(byte);

            if byte == end && self.buffer.len() >= packet_size {
                self.capturing = false;
                frames.push(self.take_frame());
            }
        }
    }

    fn take_frame(&mut self) -> Message {
        Message::received(std::mem::take(&mut self.buffer))
    }
}
