//! # Monotonic Clock
//!
//! Free-running 32-bit millisecond counter.
//!
//! The counter wraps after about 49.7 days. All interval arithmetic goes
//! through [`MonotonicClock::elapsed_since`], which uses wrapping subtraction
//! so that a wait spanning the wrap still measures correctly.

use tokio::time::Instant;

/// Wrapping millisecond counter backed by the runtime's monotonic clock
///
/// Built on `tokio::time::Instant` so that tests running with paused time
/// advance it deterministically.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
    offset_ms: u32,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Start a clock reading zero now
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Start a clock reading `offset_ms` now
    ///
    /// Lets tests place the counter just below the wrap point.
    pub fn with_offset(offset_ms: u32) -> Self {
        Self {
            origin: Instant::now(),
            offset_ms,
        }
    }

    /// Current counter value in milliseconds (wraps at `u32::MAX`)
    pub fn now_ms(&self) -> u32 {
        // Truncation is the wrap
        let since_origin = self.origin.elapsed().as_millis() as u32;
        self.offset_ms.wrapping_add(since_origin)
    }

    /// Milliseconds from `start` to now, correct across one wrap
    pub fn elapsed_since(&self, start: u32) -> u32 {
        elapsed_between(start, self.now_ms())
    }
}

/// Wraparound-safe difference `now - start`
#[inline]
pub fn elapsed_between(start: u32, now: u32) -> u32 {
    now.wrapping_sub(start)
}
