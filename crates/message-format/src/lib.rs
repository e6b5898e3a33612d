//! Serial Message Rendering
//!
//! Turns stored messages into display text: a fixed-width timestamp, a space,
//! and the payload in the selected [`DisplayEncoding`].

mod encoding;
mod error;
mod formatter;
mod time;

pub use encoding::DisplayEncoding;
pub use error::FormatError;
pub use formatter::{
    encode_hex, format_message, format_messages, format_messages_as, parse_hex_pairs,
    write_messages, write_payload, MessageFormatter,
};
pub use time::{format_timestamp, write_timestamp, TIMESTAMP_LEN};
