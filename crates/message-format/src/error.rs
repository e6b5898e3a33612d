//! Formatting Error Types

use thiserror::Error;

/// Errors raised by the formatting layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Encoding name or code that has no renderer
    #[error("Unsupported format: {0}")]
    UnsupportedEncoding(String),

    /// Token that is not two hex digits
    #[error("Invalid hex pair: {0:?}")]
    InvalidHexPair(String),
}
