//! Virtual simulation clock.

use std::time::Duration;

/// Simulated time, advanced only by explicit calls.
///
/// Resolution is one millisecond. The clock has no relation to wall-clock
/// time: a tick advances it by a fixed amount however long the tick took.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimClock {
    now_ms: u64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances virtual time by the given duration.
    pub fn advance(&mut self, duration: Duration) {
        self.now_ms = self.now_ms.saturating_add(duration.as_millis() as u64);
    }

    /// Advances virtual time by a number of milliseconds.
    pub fn advance_ms(&mut self, ms: u64) {
        self.now_ms = self.now_ms.saturating_add(ms);
    }

    /// Sets the virtual time to a specific value.
    pub fn set_ms(&mut self, ms: u64) {
        self.now_ms = ms;
    }

    /// Rewinds the clock to zero.
    pub fn reset(&mut self) {
        self.now_ms = 0;
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms)
    }

    /// Current virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Current virtual time in seconds.
    pub fn secs(&self) -> f64 {
        self.now_ms as f64 / 1000.0
    }
}
