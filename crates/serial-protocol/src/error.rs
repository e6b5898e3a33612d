//! Serial Error Types

use thiserror::Error;

/// Errors that can occur on the serial connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerialError {
    /// Open requested while a session is live
    #[error("Serial port is already connected")]
    AlreadyConnected,

    /// Close or write requested without a live session
    #[error("Serial port is not connected")]
    NotConnected,

    /// The transport refused to open
    #[error("Failed to open serial port {port}: {reason}")]
    Open { port: String, reason: String },

    /// The transport rejected a write
    #[error("Serial write failed: {0}")]
    Write(String),

    /// The session was cancelled while the operation was pending
    #[error("Serial operation cancelled")]
    Cancelled,

    /// A line setting the native driver cannot express
    #[error("Unsupported serial setting: {0}")]
    UnsupportedSetting(String),

    /// Underlying I/O failure
    #[error("Serial I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SerialError {
    fn from(err: std::io::Error) -> Self {
        SerialError::Io(err.to_string())
    }
}

/// Errors raised when validating configuration values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Baud rate must be a positive integer
    #[error("Baud rate must be greater than 0, got {0}")]
    InvalidBaudRate(u32),

    /// Data bits outside 5..=8
    #[error("Data bits must be between 5 and 8, got {0}")]
    InvalidDataBits(u8),
}
