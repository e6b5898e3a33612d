//! Serial Terminal Service
//!
//! Ties the port adapter, message history, display formatting and rate
//! monitoring together behind [`SerialService`], and publishes
//! [`ServiceEvent`]s for the presentation layer.

pub mod error;
pub mod logging;
pub mod message_log;
pub mod processor;
pub mod rate;
pub mod service;
pub mod settings;

pub use error::ServiceError;
pub use logging::init_logging;
pub use message_log::{MessageLog, TracingMessageLog, MESSAGE_LOG_TARGET};
pub use processor::MessageProcessor;
pub use rate::RateMonitor;
pub use service::{SerialService, ServiceEvent};
pub use settings::{ServiceSettings, Settings, DEFAULT_EVENT_CAPACITY, ENV_PREFIX};
