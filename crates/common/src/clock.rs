//! Pass timing and notification throttling.
//!
//! An equalization pass over a large selection runs for a long time, and
//! the presentation layer only needs occasional redraw hints. This module
//! provides:
//! - A monotonic pass clock anchored at pass start
//! - A rate controller that spaces out advisory notifications

use std::time::Instant;

/// Monotonic clock anchored to the moment a pass started.
#[derive(Debug, Clone)]
pub struct PassClock {
    epoch: Instant,
}

impl PassClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Nanoseconds elapsed since the pass started.
    pub fn elapsed_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Milliseconds elapsed since the pass started.
    pub fn elapsed_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Convert milliseconds to nanoseconds.
    pub fn ms_to_ns(ms: u64) -> u64 {
        ms.saturating_mul(1_000_000)
    }
}

/// Spaces out fire-and-forget notifications to a minimum interval.
#[derive(Debug)]
pub struct RateController {
    interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller that fires at most once per `interval_ms`.
    pub fn every_ms(interval_ms: u64) -> Self {
        Self {
            interval_ns: PassClock::ms_to_ns(interval_ms),
            last_tick_ns: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last.saturating_add(self.interval_ns) => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            _ => false,
        }
    }

    /// Minimum interval in nanoseconds.
    pub fn interval_ns(&self) -> u64 {
        self.interval_ns
    }
}
