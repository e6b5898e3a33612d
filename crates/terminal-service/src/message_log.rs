//! Message Log Sink
//!
//! Optional collaborator that receives each formatted message while active.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Tracing target used for logged message lines
pub const MESSAGE_LOG_TARGET: &str = "serial_message";

/// Destination for formatted message lines
pub trait MessageLog: Send + Sync {
    /// Whether lines should currently be written
    fn is_active(&self) -> bool;

    /// Record one formatted line
    fn write_line(&self, line: &str);
}

/// Message log that emits each line as a tracing event
#[derive(Debug, Default)]
pub struct TracingMessageLog {
    active: AtomicBool,
}

impl TracingMessageLog {
    /// Create an inactive log
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        if !self.active.swap(true, Ordering::AcqRel) {
            info!("Message logging started");
        }
    }

    pub fn stop(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            info!("Message logging stopped");
        }
    }
}

impl MessageLog for TracingMessageLog {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn write_line(&self, line: &str) {
        info!(target: MESSAGE_LOG_TARGET, "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_stop() {
        let log = TracingMessageLog::new();
        assert!(!log.is_active());
        log.start();
        log.start();
        assert!(log.is_active());
        log.write_line("[00:00:00.000] ping");
        log.stop();
        assert!(!log.is_active());
    }
}
