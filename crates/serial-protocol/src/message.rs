//! Framed Serial Messages

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Framed from the incoming byte stream
    Received,
    /// Written to the port by the user
    Sent,
    /// Synthesised to report a failure
    Error,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Origin::Received => "Received",
            Origin::Sent => "Sent",
            Origin::Error => "Error",
        };
        f.write_str(name)
    }
}

/// A complete application-level message, immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    payload: Vec<u8>,
    timestamp: DateTime<Local>,
    origin: Origin,
}

impl Message {
    /// Build a message captured now
    pub fn new(payload: Vec<u8>, origin: Origin) -> Self {
        Self::with_timestamp(payload, origin, Local::now())
    }

    /// Build a message with an explicit capture time
    pub fn with_timestamp(payload: Vec<u8>, origin: Origin, timestamp: DateTime<Local>) -> Self {
        Self {
            payload,
            timestamp,
            origin,
        }
    }

    /// Shorthand for a frame read off the wire
    pub fn received(payload: Vec<u8>) -> Self {
        Self::new(payload, Origin::Received)
    }

    /// Shorthand for bytes the user wrote
    pub fn sent(payload: Vec<u8>) -> Self {
        Self::new(payload, Origin::Sent)
    }

    /// A failure report, stored as UTF-8 text
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text.into().into_bytes(), Origin::Error)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Consume the message, keeping only its bytes
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_origin() {
        assert_eq!(Message::received(vec![1]).origin(), Origin::Received);
        assert_eq!(Message::sent(vec![1]).origin(), Origin::Sent);

        let error = Message::error("Failed to open COM3");
        assert_eq!(error.origin(), Origin::Error);
        assert_eq!(error.payload(), b"Failed to open COM3");
    }
}
