//! Service Settings
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables such as `SERIAL_MONITOR__CONNECTION__PORT_NAME=/dev/ttyUSB0`.

use crate::error::ServiceError;
use config::{Config, Environment, File, FileFormat};
use message_format::DisplayEncoding;
use ring_buffer::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use serial_protocol::{ConnectionConfig, RuntimeConfig, DEFAULT_CHANNEL_CAPACITY};
use std::path::Path;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "SERIAL_MONITOR";

/// Default number of queued events per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Sizing and display options of the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Messages kept in history
    pub buffer_capacity: usize,
    /// Messages queued between the port reader and the service
    pub channel_capacity: usize,
    /// Events queued per subscriber before it starts lagging
    pub event_capacity: usize,
    pub display_encoding: DisplayEncoding,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_CAPACITY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            display_encoding: DisplayEncoding::Ascii,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub connection: ConnectionConfig,
    pub runtime: RuntimeConfig,
    pub service: ServiceSettings,
    /// Write every received message to the message log
    pub log_messages: bool,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            runtime: RuntimeConfig::default(),
            service: ServiceSettings::default(),
            log_messages: false,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (if given) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ServiceError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Parse settings from TOML text alone
    pub fn from_toml(text: &str) -> Result<Self, ServiceError> {
        let settings = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
