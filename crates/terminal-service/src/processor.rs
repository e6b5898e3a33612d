//! Message Processor
//!
//! Bounded message history plus the display encoding used to render it.

use crate::error::ServiceError;
use message_format::{DisplayEncoding, MessageFormatter};
use ring_buffer::RingBuffer;
use serial_protocol::Message;
use std::sync::{Mutex, PoisonError};

/// History of the most recent messages, rendered on demand
#[derive(Debug)]
pub struct MessageProcessor {
    buffer: RingBuffer<Message>,
    encoding: Mutex<DisplayEncoding>,
    formatter: Mutex<MessageFormatter>,
}

impl MessageProcessor {
    /// Create a processor holding at most `capacity` messages
    pub fn new(capacity: usize, encoding: DisplayEncoding) -> Result<Self, ServiceError> {
        Ok(Self {
            buffer: RingBuffer::new(capacity)?,
            encoding: Mutex::new(encoding),
            formatter: Mutex::new(MessageFormatter::new()),
        })
    }

    /// Append a message, evicting the oldest once full
    pub fn process(&self, message: Message) {
        self.buffer.push(message);
    }

    /// Render the whole history with the current encoding
    pub fn render(&self) -> String {
        let messages = self.buffer.snapshot();
        let encoding = self.encoding();
        let mut formatter = self.formatter.lock().unwrap_or_else(PoisonError::into_inner);
        formatter.render(&messages, encoding).to_string()
    }

    /// Switch the display encoding; returns false when nothing changed
    pub fn set_encoding(&self, encoding: DisplayEncoding) -> bool {
        let mut current = self.encoding.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == encoding {
            return false;
        }
        *current = encoding;
        true
    }

    pub fn encoding(&self) -> DisplayEncoding {
        *self.encoding.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the history, oldest first
    pub fn snapshot(&self) -> Vec<Message> {
        self.buffer.snapshot()
    }

    /// Most recent `count` messages, newest first
    pub fn recent(&self, count: usize) -> Vec<Message> {
        self.buffer.read_last(count)
    }

    pub fn clear(&self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Messages processed since creation, evicted ones included
    pub fn total_processed(&self) -> u64 {
        self.buffer.total_written()
    }
}
