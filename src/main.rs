//! # GPS Field Logger
//!
//! Logs GPS fixes from an NMEA receiver to CSV session files on a removable
//! medium, reporting device health on a single status LED.

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gps_field_logger::config::{Config, IndicatorConfig, LoggingConfig, SerialConfig};
use gps_field_logger::controller::Controller;
use gps_field_logger::record::FsRecordStore;
use gps_field_logger::serial::{open_replay, ByteSource, GpsSerial};
use gps_field_logger::session::{FileCounterStore, SessionCounter};
use gps_field_logger::status::{NullLed, StatusLed, SysfsLed};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix of the daily diagnostic log
const LOG_FILE_PREFIX: &str = "gps-field-logger.log";

/// Main entry point for the GPS field logger
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging with tracing subscriber (and a daily file if configured)
///    - Open the receiver UART, or the replay capture if configured
///    - Take over the status LED
///
/// 2. **Main Loop**
///    - Run the controller state machine: open a session, sample and log
///      fixes, recover from storage loss
///
/// 3. **Shutdown**
///    - Stop on Ctrl+C; every logged line is already synced to the medium
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded or is invalid
/// - No receiver (or replay file) can be opened
///
/// # Examples
///
/// Run the application:
/// ```bash
/// cargo run --release -- /etc/gps-field-logger.toml
/// ```
///
/// Expected output:
/// ```text
/// INFO gps_field_logger: GPS Field Logger v0.1.0 starting...
/// INFO gps_field_logger::serial: Opened GPS receiver at /dev/serial0 (9600 baud)
/// INFO gps_field_logger::record::disk: Storage mounted at /mnt/sdcard
/// INFO gps_field_logger::record::disk: Session 7 recording to /mnt/sdcard/gpslog_000007.csv
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&config.logging);

    info!("GPS Field Logger v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    let source = open_source(&config.serial).await?;
    let led = open_led(&config.indicator);
    let store = FsRecordStore::new(&config.storage.mount_dir, config.storage.require_mount_point);
    info!("Recording sessions under {}", store.mount_dir().display());
    let counter = SessionCounter::new(
        FileCounterStore::new(&config.counter.path),
        config.counter.key.clone(),
    );

    let mut controller = Controller::new(
        source,
        store,
        counter,
        led,
        config.indicator.pulse_timing(),
        config.timing.clone(),
    );

    info!("Press Ctrl+C to exit");

    tokio::select! {
        _ = controller.run() => {}

        // Handle Ctrl+C for graceful shutdown
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Received Ctrl+C, shutting down...");
        }
    }

    info!(
        "Stopped in state {} ({} bytes decoded, {} fixes seen)",
        controller.state(),
        controller.decoder().bytes_processed(),
        controller.decoder().sentences_with_fix()
    );

    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. Returns the file writer guard
/// when file logging is enabled.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let (file_layer, guard) = match &logging.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Open the receiver, or the replay capture when one is configured
async fn open_source(serial: &SerialConfig) -> Result<Box<dyn ByteSource>> {
    if let Some(path) = &serial.replay_file {
        return Ok(Box::new(open_replay(path).await?));
    }

    let port = GpsSerial::open_with_paths(&serial.candidate_paths(), serial.baud_rate)?;
    info!("GPS receiver opened at: {}", port.device_path());
    Ok(Box::new(port.into_source()))
}

/// Take over the configured LED, falling back to no LED
fn open_led(indicator: &IndicatorConfig) -> Box<dyn StatusLed> {
    if indicator.led_path.is_empty() {
        info!("No status LED configured");
        return Box::new(NullLed);
    }

    match SysfsLed::open(&indicator.led_path) {
        Ok(led) => Box::new(led),
        Err(e) => {
            warn!("Status LED unavailable ({}), continuing without it", e);
            Box::new(NullLed)
        }
    }
}
