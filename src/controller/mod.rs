//! # Controller Module
//!
//! The logger's acquisition, validation and recovery state machine.
//!
//! ```text
//! Initializing ──ok──▶ Acquiring ◀──▶ Logging
//!      │  ▲                 │            │
//!    fail │ backoff         └─ medium lost ┘
//!      ▼  │                       │
//!  CriticalError ◀────────────────┘
//! ```
//!
//! Every wait goes through [`drain_for`], so the decoder keeps consuming
//! receiver bytes whatever state the controller is in, and the status LED is
//! driven from the current state on every cycle.

pub mod state;

pub use state::DeviceState;

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::clock::MonotonicClock;
use crate::config::TimingConfig;
use crate::error::{LoggerError, Result};
use crate::nmea::{Fix, FixDecoder};
use crate::poll::drain_for;
use crate::record::RecordStore;
use crate::serial::ByteSource;
use crate::session::{CounterStore, SessionCounter, SessionId};
use crate::status::{PulseTiming, StatusIndicator, StatusLed, StatusPattern};

/// Logger lifecycle driver
///
/// Owns the decoder, the open record session and the status LED. Nothing
/// else touches them while the controller runs.
pub struct Controller<S, R, C, L> {
    source: S,
    decoder: FixDecoder,
    store: R,
    counter: SessionCounter<C>,
    indicator: StatusIndicator<L>,
    clock: MonotonicClock,
    timing: TimingConfig,
    state: DeviceState,
    session: Option<SessionId>,
    boot_ms: u32,
}

impl<S, R, C, L> Controller<S, R, C, L>
where
    S: ByteSource,
    R: RecordStore,
    C: CounterStore,
    L: StatusLed,
{
    /// Build a controller in the `Initializing` state with the LED off
    ///
    /// # Arguments
    ///
    /// * `source` - Receiver byte stream
    /// * `store` - Record sink on the removable medium
    /// * `counter` - Durable session counter
    /// * `led` - Status output
    /// * `pulse` - Half-periods of the fast and slow pulse patterns
    /// * `timing` - Sampling, warm-up, backoff and liveness timing
    pub fn new(
        source: S,
        store: R,
        counter: SessionCounter<C>,
        led: L,
        pulse: PulseTiming,
        timing: TimingConfig,
    ) -> Self {
        let clock = MonotonicClock::new();
        let mut indicator = StatusIndicator::new(led, pulse);
        indicator.set_level(false);

        Self {
            source,
            decoder: FixDecoder::new(),
            store,
            counter,
            indicator,
            boot_ms: clock.now_ms(),
            clock,
            timing,
            state: DeviceState::Initializing,
            session: None,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Session currently being recorded, if any
    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn decoder(&self) -> &FixDecoder {
        &self.decoder
    }

    /// Run the controller until the process stops
    pub async fn run(&mut self) {
        info!("Controller running");
        loop {
            self.step().await;
        }
    }

    /// Do one state's worth of work and return the state it leads to
    pub async fn step(&mut self) -> DeviceState {
        let next = match self.state {
            DeviceState::Initializing => self.initialize().await,
            DeviceState::Acquiring | DeviceState::Logging => self.sample().await,
            DeviceState::CriticalError => self.recover().await,
        };

        if next != self.state {
            info!("State {} -> {}", self.state, next);
        }
        self.state = next;
        next
    }

    async fn initialize(&mut self) -> DeviceState {
        match self.open_session() {
            Ok(id) => {
                self.session = Some(id);
                // Give the receiver time to produce a first fix
                self.pulse_wait(StatusPattern::FastPulse, self.timing.warmup()).await;
                DeviceState::Acquiring
            }
            Err(e) => {
                error!("Initialization failed: {}", e);
                DeviceState::CriticalError
            }
        }
    }

    /// Mount storage and open the session the counter says is next
    ///
    /// The counter only moves once the session file exists, so a failed
    /// create does not burn an id. A name that is already taken is committed
    /// anyway so the next attempt moves past the stale file.
    fn open_session(&mut self) -> Result<SessionId> {
        self.store.mount()?;
        let id = self.counter.peek_next()?;

        if let Err(e) = self.store.create_session(id) {
            if matches!(e, LoggerError::SessionExists(_)) {
                warn!("Session {} already on the medium, skipping it", id);
                if let Err(commit_err) = self.counter.commit(id) {
                    warn!("Could not skip session {}: {}", id, commit_err);
                }
            }
            return Err(e);
        }

        if let Err(e) = self.counter.commit(id) {
            self.store.abandon_session();
            return Err(e);
        }

        Ok(id)
    }

    async fn sample(&mut self) -> DeviceState {
        if !self.store.medium_present() {
            error!(
                "Storage medium lost (session {})",
                self.session.map_or_else(|| "-".to_string(), |id| id.to_string())
            );
            self.store.close_session();
            self.session = None;
            return DeviceState::CriticalError;
        }

        let pattern = StatusPattern::for_state(self.state);
        self.pulse_wait(pattern, self.timing.sample_interval()).await;

        if self.sensor_silent() {
            warn!(
                "No data from sensor ({} bytes in {} ms)",
                self.decoder.bytes_processed(),
                self.clock.elapsed_since(self.boot_ms)
            );
        }

        let fix = self.decoder.current_fix();
        if !fix.valid {
            debug!("No valid fix this cycle");
            return DeviceState::Acquiring;
        }

        self.record(&fix)
    }

    fn record(&mut self, fix: &Fix) -> DeviceState {
        match self.store.append(fix) {
            Ok(()) => {
                debug!(
                    "Logged {:.6}, {:.6}, {:.1} m",
                    fix.longitude, fix.latitude, fix.altitude
                );
            }
            Err(e) if e.is_critical() => {
                error!("Record store failed: {}", e);
                self.store.close_session();
                self.session = None;
                return DeviceState::CriticalError;
            }
            Err(e) => warn!("Dropped fix: {}", e),
        }
        DeviceState::Logging
    }

    async fn recover(&mut self) -> DeviceState {
        self.pulse_wait(StatusPattern::Steady, self.timing.backoff()).await;
        DeviceState::Initializing
    }

    /// Whether the receiver has been too quiet since boot
    ///
    /// Only a warning: the controller keeps sampling either way.
    pub fn sensor_silent(&self) -> bool {
        let since_boot = u64::from(self.clock.elapsed_since(self.boot_ms));
        since_boot > self.timing.liveness_grace_ms
            && self.decoder.bytes_processed() < self.timing.liveness_min_bytes
    }

    /// Wait out `duration` rendering `pattern`, draining the receiver throughout
    async fn pulse_wait(&mut self, pattern: StatusPattern, duration: Duration) -> usize {
        let poll = self.timing.poll_interval();
        let mut drained = 0;

        for (level, slice) in self.indicator.segments(pattern, duration) {
            self.indicator.set_level(level);
            let decoder = &mut self.decoder;
            drained += drain_for(&mut self.source, &self.clock, slice, poll, |byte| {
                decoder.feed(byte)
            })
            .await;
        }

        drained
    }
}
