//! Connection and Runtime Configuration
//!
//! The settings layer owns these values. The core only observes them through
//! [`tokio::sync::watch`] receivers handed out by [`ConfigHandle`], so it never
//! keeps a private copy that could drift.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

/// Line feed, terminates a frame in newline mode
pub const NEWLINE: u8 = 0x0A;
/// Carriage return, stripped when it directly precedes a line feed
pub const CARRIAGE_RETURN: u8 = 0x0D;
/// Default start-of-text delimiter
pub const STX: u8 = 0x02;
/// Default end-of-text delimiter
pub const ETX: u8 = 0x03;

/// Standard rates offered as suggestions; any positive rate is accepted
pub const STANDARD_BAUD_RATES: [u32; 14] = [
    600, 1200, 2400, 4800, 9600, 14400, 19200, 28800, 38400, 56000, 57600, 115200, 128000, 256000,
];

/// Validated serial baud rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BaudRate(u32);

impl BaudRate {
    /// Create a baud rate, rejecting zero
    pub fn new(rate: u32) -> Result<Self, ConfigError> {
        if rate == 0 {
            return Err(ConfigError::InvalidBaudRate(rate));
        }
        Ok(Self(rate))
    }

    /// Get the raw rate
    pub fn get(self) -> u32 {
        self.0
    }

    /// Whether the rate is one of [`STANDARD_BAUD_RATES`]
    pub fn is_standard(self) -> bool {
        STANDARD_BAUD_RATES.contains(&self.0)
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        Self(9600)
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = ConfigError;

    fn try_from(rate: u32) -> Result<Self, Self::Error> {
        Self::new(rate)
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> Self {
        rate.0
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parity checking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
    Mark,
    Space,
}

/// Number of data bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = ConfigError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(ConfigError::InvalidDataBits(other)),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

/// Physical connection parameters, applied on the next open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial port device path (e.g., "/dev/ttyUSB0" or "COM3")
    pub port_name: String,
    pub baud_rate: BaudRate,
    pub parity: Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_name: "COM1".to_string(),
            baud_rate: BaudRate::default(),
            parity: Parity::default(),
            data_bits: DataBits::default(),
            stop_bits: StopBits::default(),
        }
    }
}

/// Framing policy selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    #[default]
    NewLine,
    StxEtx,
    Custom,
}

/// Parameters read by the port reader while a session is running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub read_mode: ReadMode,
    /// Start delimiter for [`ReadMode::Custom`]
    pub custom_stx: u8,
    /// End delimiter for [`ReadMode::Custom`]
    pub custom_etx: u8,
    /// Minimum frame length, delimiters included, before an end delimiter closes a frame
    pub packet_size: usize,
    /// Record successful writes in the message history
    pub local_echo: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            read_mode: ReadMode::NewLine,
            custom_stx: STX,
            custom_etx: ETX,
            packet_size: 0,
            local_echo: false,
        }
    }
}

impl RuntimeConfig {
    /// Resolve the framing the decoder should run with
    pub fn framing(&self) -> FramingMode {
        match self.read_mode {
            ReadMode::NewLine => FramingMode::NewLine,
            ReadMode::StxEtx => FramingMode::Delimited {
                start: STX,
                end: ETX,
                packet_size: self.packet_size,
            },
            ReadMode::Custom => FramingMode::Delimited {
                start: self.custom_stx,
                end: self.custom_etx,
                packet_size: self.packet_size,
            },
        }
    }
}

/// Fully resolved framing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramingMode {
    /// One message per LF, trailing CR dropped
    #[default]
    NewLine,
    /// One message per start..end delimited run
    Delimited { start: u8, end: u8, packet_size: usize },
}

/// Owner side of the shared configuration
#[derive(Debug)]
pub struct ConfigHandle {
    connection: watch::Sender<ConnectionConfig>,
    runtime: watch::Sender<RuntimeConfig>,
}

impl ConfigHandle {
    /// Create a handle seeded with the given values
    pub fn new(connection: ConnectionConfig, runtime: RuntimeConfig) -> Self {
        let (connection, _) = watch::channel(connection);
        let (runtime, _) = watch::channel(runtime);
        Self { connection, runtime }
    }

    /// Observer for connection parameters
    pub fn connection(&self) -> watch::Receiver<ConnectionConfig> {
        self.connection.subscribe()
    }

    /// Observer for runtime parameters
    pub fn runtime(&self) -> watch::Receiver<RuntimeConfig> {
        self.runtime.subscribe()
    }

    /// Current connection parameters
    pub fn current_connection(&self) -> ConnectionConfig {
        self.connection.borrow().clone()
    }

    /// Current runtime parameters
    pub fn current_runtime(&self) -> RuntimeConfig {
        self.runtime.borrow().clone()
    }

    /// Edit connection parameters in place
    pub fn update_connection(&self, edit: impl FnOnce(&mut ConnectionConfig)) {
        self.connection.send_modify(edit);
    }

    /// Edit runtime parameters in place
    pub fn update_runtime(&self, edit: impl FnOnce(&mut RuntimeConfig)) {
        self.runtime.send_modify(edit);
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(ConnectionConfig::default(), RuntimeConfig::default())
    }
}
