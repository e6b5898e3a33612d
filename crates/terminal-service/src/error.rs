//! Service Error Types

use message_format::FormatError;
use ring_buffer::RingBufferError;
use serial_protocol::SerialError;
use thiserror::Error;

/// Errors raised while building or configuring the service
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Connection-level failure
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    /// History buffer could not be created
    #[error("Buffer error: {0}")]
    Buffer(#[from] RingBufferError),

    /// Invalid display encoding
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Settings file or environment could not be read
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Logging could not be initialised
    #[error("Logging error: {0}")]
    Logging(String),

    /// Constructed outside a Tokio runtime
    #[error("No Tokio runtime available: {0}")]
    NoRuntime(String),
}
