//! Serial Frame Ingestion
//!
//! This crate drains an open serial connection, re-segments the raw byte
//! stream into messages under the selected read mode, and hands each message
//! to a single consumer through an asynchronous channel.

mod adapter;
mod channel;
mod config;
mod decoder;
mod error;
mod message;
mod parser;
mod transport;

pub use adapter::SerialPortAdapter;
pub use channel::{
    message_channel, MessageReceiver, MessageSender, PortEvent, SessionEvent, SessionId,
    DEFAULT_CHANNEL_CAPACITY,
};
pub use config::{
    BaudRate, ConfigHandle, ConnectionConfig, DataBits, FramingMode, Parity, ReadMode,
    RuntimeConfig, StopBits, CARRIAGE_RETURN, ETX, NEWLINE, STANDARD_BAUD_RATES, STX,
};
pub use decoder::FrameDecoder;
pub use error::{ConfigError, SerialError};
pub use message::{Message, Origin};
pub use parser::parse_to_bytes;
pub use transport::{MockDevice, MockPortOpener, NativePortOpener, PortOpener, SerialTransport};
