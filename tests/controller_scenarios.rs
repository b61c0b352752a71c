//! End-to-end controller scenarios over a real filesystem store
//!
//! All tests run on paused tokio time, so multi-second waits finish instantly.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use gps_field_logger::config::TimingConfig;
use gps_field_logger::controller::{Controller, DeviceState};
use gps_field_logger::error::{LoggerError, Result};
use gps_field_logger::nmea::checksum::frame_sentence;
use gps_field_logger::nmea::Fix;
use gps_field_logger::record::{FsRecordStore, RecordStore, RECORD_HEADER};
use gps_field_logger::serial::{AsyncReadSource, ByteSource};
use gps_field_logger::session::{FileCounterStore, SessionCounter, SessionId};
use gps_field_logger::status::{PulseTiming, StatusLed};

const GGA: &str = "GPGGA,030405.00,6753.4000,N,01220.7000,E,1,08,0.9,10.0,M,0.0,M,,";
const RMC: &str = "GPRMC,030405.00,A,6753.4000,N,01220.7000,E,0.0,0.0,020124,,,A";
const RMC_LATER: &str = "GPRMC,030415.00,A,6753.4000,N,01220.7000,E,0.0,0.0,020124,,,A";
const RMC_VOID: &str = "GPRMC,030410.00,V,,,,,,,020124,,,N";

/// Receiver that never sends anything
struct SilentReceiver;

#[async_trait]
impl ByteSource for SilentReceiver {
    async fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        std::future::pending().await
    }
}

/// LED that records every level written
#[derive(Clone, Default)]
struct RecordingLed(Arc<Mutex<Vec<bool>>>);

impl RecordingLed {
    fn writes(&self) -> Vec<bool> {
        self.0.lock().unwrap().clone()
    }

    fn last(&self) -> Option<bool> {
        self.0.lock().unwrap().last().copied()
    }
}

impl StatusLed for RecordingLed {
    fn set(&mut self, on: bool) -> io::Result<()> {
        self.0.lock().unwrap().push(on);
        Ok(())
    }
}

/// Filesystem store whose first `create_session` fails
struct FlakyCreateStore {
    inner: FsRecordStore,
    failures_left: u32,
}

impl RecordStore for FlakyCreateStore {
    fn mount(&mut self) -> Result<()> {
        self.inner.mount()
    }

    fn medium_present(&self) -> bool {
        self.inner.medium_present()
    }

    fn create_session(&mut self, id: SessionId) -> Result<()> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(LoggerError::CreateFailed("write protected".to_string()));
        }
        self.inner.create_session(id)
    }

    fn append(&mut self, fix: &Fix) -> Result<()> {
        self.inner.append(fix)
    }

    fn close_session(&mut self) {
        self.inner.close_session()
    }

    fn abandon_session(&mut self) {
        self.inner.abandon_session()
    }
}

fn timing() -> TimingConfig {
    TimingConfig {
        sample_interval_ms: 1_000,
        warmup_ms: 1_000,
        backoff_ms: 3_000,
        poll_interval_ms: 10,
        liveness_grace_ms: 10_000,
        liveness_min_bytes: 10,
    }
}

fn counter(dir: &TempDir) -> SessionCounter<FileCounterStore> {
    SessionCounter::new(FileCounterStore::new(dir.path().join("counter.json")), "session")
}

fn card(dir: &TempDir) -> PathBuf {
    dir.path().join("card")
}

fn session_file(card: &Path, id: u32) -> PathBuf {
    card.join(format!("gpslog_{:06}.csv", id))
}

fn controller<S: ByteSource, R: RecordStore>(
    dir: &TempDir,
    source: S,
    store: R,
    led: RecordingLed,
) -> Controller<S, R, FileCounterStore, RecordingLed> {
    Controller::new(source, store, counter(dir), led, PulseTiming::default(), timing())
}

#[tokio::test(start_paused = true)]
async fn test_session_records_only_valid_fixes() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(card(&dir)).unwrap();

    let receiver = tokio_test::io::Builder::new()
        .wait(Duration::from_millis(1_500))
        .read(format!("{}{}", frame_sentence(GGA), frame_sentence(RMC)).as_bytes())
        .wait(Duration::from_millis(1_000))
        .read(frame_sentence(RMC_VOID).as_bytes())
        .wait(Duration::from_millis(1_000))
        .read(frame_sentence(RMC_LATER).as_bytes())
        .build();

    let led = RecordingLed::default();
    let mut controller = controller(
        &dir,
        AsyncReadSource::new(receiver),
        FsRecordStore::new(card(&dir), false),
        led.clone(),
    );

    assert_eq!(controller.step().await, DeviceState::Acquiring);
    assert_eq!(controller.step().await, DeviceState::Logging);
    assert_eq!(controller.step().await, DeviceState::Acquiring);
    assert_eq!(controller.step().await, DeviceState::Logging);

    let contents = fs::read_to_string(session_file(&card(&dir), 1)).unwrap();
    assert_eq!(
        contents,
        format!(
            "{}{}{}",
            RECORD_HEADER,
            "12.345000, 67.890000, 10.000000, 01/02/24, 03:04:05\r\n",
            "12.345000, 67.890000, 10.000000, 01/02/24, 03:04:15\r\n",
        )
    );
    assert_eq!(controller.decoder().failed_checksum(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_session_ids_increase_across_restart() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(card(&dir)).unwrap();

    for expected in 1..=3u32 {
        // Fresh controller over the same counter file: a power cycle
        let mut controller = controller(
            &dir,
            SilentReceiver,
            FsRecordStore::new(card(&dir), false),
            RecordingLed::default(),
        );
        assert_eq!(controller.step().await, DeviceState::Acquiring);
        assert_eq!(controller.session().map(SessionId::get), Some(expected));
    }

    for id in 1..=3 {
        let contents = fs::read_to_string(session_file(&card(&dir), id)).unwrap();
        assert!(contents.starts_with(RECORD_HEADER));
    }
}

#[tokio::test(start_paused = true)]
async fn test_missing_medium_holds_led_steady_until_inserted() {
    let dir = TempDir::new().unwrap();
    let led = RecordingLed::default();
    let mut controller = controller(
        &dir,
        SilentReceiver,
        FsRecordStore::new(card(&dir), false),
        led.clone(),
    );

    for _ in 0..3 {
        assert_eq!(controller.step().await, DeviceState::CriticalError);
        assert_eq!(controller.step().await, DeviceState::Initializing);
        assert_eq!(led.last(), Some(true));
    }
    // Steady: switched on once, never pulsed
    assert_eq!(led.writes(), vec![false, true]);

    fs::create_dir_all(card(&dir)).unwrap();
    assert_eq!(controller.step().await, DeviceState::Acquiring);
    assert_eq!(controller.session().map(SessionId::get), Some(1));
    assert!(led.writes().len() > 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_create_does_not_burn_a_session_id() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(card(&dir)).unwrap();

    let store = FlakyCreateStore {
        inner: FsRecordStore::new(card(&dir), false),
        failures_left: 1,
    };
    let mut controller = controller(&dir, SilentReceiver, store, RecordingLed::default());

    assert_eq!(controller.step().await, DeviceState::CriticalError);
    assert_eq!(counter(&dir).last().unwrap(), 0);

    assert_eq!(controller.step().await, DeviceState::Initializing);
    assert_eq!(controller.step().await, DeviceState::Acquiring);

    assert_eq!(counter(&dir).last().unwrap(), 1);
    assert!(session_file(&card(&dir), 1).exists());
    assert!(!session_file(&card(&dir), 2).exists());
}

#[tokio::test(start_paused = true)]
async fn test_card_swap_starts_new_session() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(card(&dir)).unwrap();
    let mut controller = controller(
        &dir,
        SilentReceiver,
        FsRecordStore::new(card(&dir), false),
        RecordingLed::default(),
    );

    assert_eq!(controller.step().await, DeviceState::Acquiring);
    assert_eq!(controller.step().await, DeviceState::Acquiring);

    // Card pulled and a blank one inserted
    fs::remove_dir_all(card(&dir)).unwrap();
    fs::create_dir_all(card(&dir)).unwrap();

    assert_eq!(controller.step().await, DeviceState::CriticalError);
    assert_eq!(controller.step().await, DeviceState::Initializing);
    assert_eq!(controller.step().await, DeviceState::Acquiring);
    assert_eq!(controller.session().map(SessionId::get), Some(2));
    assert!(session_file(&card(&dir), 2).exists());
}
