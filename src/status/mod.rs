//! # Status Indicator Module
//!
//! Encodes device health on a single LED with no feedback path.
//!
//! | State           | Pattern      |
//! |-----------------|--------------|
//! | Initializing    | off          |
//! | Critical error  | steady on    |
//! | Acquiring       | fast pulse   |
//! | Logging         | slow pulse   |
//!
//! The mapping is stateless and evaluated every cycle: a single invalid fix
//! puts the pulse back to fast on the next cycle.

pub mod led;

pub use led::{NullLed, StatusLed, SysfsLed};

use std::time::Duration;

use tracing::debug;

use crate::controller::state::DeviceState;

/// Externally observable LED pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPattern {
    Off,
    Steady,
    FastPulse,
    SlowPulse,
}

impl StatusPattern {
    /// Pattern shown for a device state
    pub fn for_state(state: DeviceState) -> Self {
        match state {
            DeviceState::Initializing => StatusPattern::Off,
            DeviceState::CriticalError => StatusPattern::Steady,
            DeviceState::Acquiring => StatusPattern::FastPulse,
            DeviceState::Logging => StatusPattern::SlowPulse,
        }
    }
}

/// Pulse timing for the two blinking patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseTiming {
    /// Half-period (on time, then off time) of the fast pulse
    pub fast: Duration,
    /// Half-period of the slow pulse
    pub slow: Duration,
}

impl Default for PulseTiming {
    fn default() -> Self {
        Self {
            fast: Duration::from_millis(100),
            slow: Duration::from_millis(1_000),
        }
    }
}

impl PulseTiming {
    /// Half-period for a pattern, `None` for the steady patterns
    pub fn half_period(&self, pattern: StatusPattern) -> Option<Duration> {
        match pattern {
            StatusPattern::FastPulse => Some(self.fast),
            StatusPattern::SlowPulse => Some(self.slow),
            StatusPattern::Off | StatusPattern::Steady => None,
        }
    }
}

/// Where a pulse pattern stands at the end of the last wait
#[derive(Debug, Clone, Copy)]
struct PulsePhase {
    pattern: StatusPattern,
    on: bool,
    /// Time left in the current half-period
    left: Duration,
}

/// Drives a [`StatusLed`] and remembers the last level written
pub struct StatusIndicator<L> {
    led: L,
    timing: PulseTiming,
    level: Option<bool>,
    phase: Option<PulsePhase>,
}

impl<L: StatusLed> StatusIndicator<L> {
    pub fn new(led: L, timing: PulseTiming) -> Self {
        Self {
            led,
            timing,
            level: None,
            phase: None,
        }
    }

    /// Last level written (`None` before the first write)
    pub fn level(&self) -> Option<bool> {
        self.level
    }

    /// Drive the LED on or off
    ///
    /// Output errors are logged and swallowed: there is nowhere to report them.
    pub fn set_level(&mut self, on: bool) {
        if self.level == Some(on) {
            return;
        }
        match self.led.set(on) {
            Ok(()) => self.level = Some(on),
            Err(e) => debug!("Status LED write failed: {}", e),
        }
    }

    /// Split a wait into `(level, duration)` segments rendering `pattern`
    ///
    /// The segments sum to exactly `total`. A pulse picks up where the
    /// previous wait left it when the pattern is unchanged, so back-to-back
    /// waits blink evenly; a new pattern starts with the LED on.
    pub fn segments(&mut self, pattern: StatusPattern, total: Duration) -> Vec<(bool, Duration)> {
        let Some(half) = self.timing.half_period(pattern) else {
            self.phase = None;
            return vec![(pattern == StatusPattern::Steady, total)];
        };

        let (mut on, mut left) = match self.phase {
            Some(phase) if phase.pattern == pattern && !phase.left.is_zero() => {
                (phase.on, phase.left)
            }
            Some(phase) if phase.pattern == pattern => (!phase.on, half),
            _ => (true, half),
        };

        let mut segments = Vec::new();
        let mut remaining = total;
        while !remaining.is_zero() {
            let slice = left.min(remaining);
            segments.push((on, slice));
            remaining -= slice;
            left -= slice;
            if left.is_zero() && !remaining.is_zero() {
                on = !on;
                left = half;
            }
        }

        self.phase = Some(PulsePhase { pattern, on, left });
        segments
    }
}
