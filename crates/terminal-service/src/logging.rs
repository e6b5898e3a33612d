//! Logging setup

use crate::error::ServiceError;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging at the given level name ("trace" through "error")
pub fn init_logging(level: &str) -> Result<(), ServiceError> {
    let level: Level = level
        .trim()
        .parse()
        .map_err(|_| ServiceError::Logging(format!("unknown log level '{}'", level)))?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ServiceError::Logging(e.to_string()))
}
