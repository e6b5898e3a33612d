//! Message Rate Monitor
//!
//! Counts messages and recomputes messages/second at most once per second.
//! The reported rate is the last computed value, not a live estimate.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Length of one measurement window
const WINDOW: Duration = Duration::from_millis(1000);

#[derive(Debug)]
struct RateState {
    count: u64,
    rate: f64,
    window_start: Instant,
}

/// Sliding one-second message counter
#[derive(Debug)]
pub struct RateMonitor {
    state: Mutex<RateState>,
}

impl RateMonitor {
    /// Create a monitor with its window starting now
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RateState {
                count: 0,
                rate: 0.0,
                window_start: Instant::now(),
            }),
        }
    }

    /// Count one message, closing the window once a second has passed
    pub fn register_message(&self) {
        let mut state = self.lock();
        state.count += 1;

        let elapsed = state.window_start.elapsed();
        if elapsed >= WINDOW {
            state.rate = state.count as f64 * 1000.0 / elapsed.as_millis() as f64;
            state.count = 0;
            state.window_start = Instant::now();
        }
    }

    /// Rate computed at the end of the last window
    pub fn current_rate(&self) -> f64 {
        self.lock().rate
    }

    /// Messages counted in the open window
    pub fn pending_count(&self) -> u64 {
        self.lock().count
    }

    /// Zero the counter and rate and restart the window
    pub fn reset(&self) {
        let mut state = self.lock();
        state.count = 0;
        state.rate = 0.0;
        state.window_start = Instant::now();
    }

    fn lock(&self) -> MutexGuard<'_, RateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RateMonitor {
    fn default() -> Self {
        Self::new()
    }
}
