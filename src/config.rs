//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, and every section may be omitted, so an empty
//! file is a valid configuration.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{LoggerError, Result};
use crate::serial::{DEFAULT_DEVICE_PATHS, GPS_DEFAULT_BAUD_RATE};
use crate::status::PulseTiming;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub counter: CounterConfig,
    #[serde(default)]
    pub indicator: IndicatorConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GPS receiver serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Device path; empty means try the default candidates
    #[serde(default)]
    pub port: String,

    /// Candidates tried in order when `port` is empty
    #[serde(default = "default_device_paths")]
    pub paths: Vec<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Read this NMEA capture instead of the UART
    #[serde(default)]
    pub replay_file: Option<String>,
}

/// Record storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_mount_dir")]
    pub mount_dir: String,

    /// Only treat `mount_dir` as present when a filesystem is mounted on it
    #[serde(default = "default_require_mount_point")]
    pub require_mount_point: bool,
}

/// Session counter store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CounterConfig {
    #[serde(default = "default_counter_path")]
    pub path: String,

    #[serde(default = "default_counter_key")]
    pub key: String,
}

/// Status LED configuration
#[derive(Debug, Deserialize, Clone)]
pub struct IndicatorConfig {
    /// sysfs LED directory; empty means no LED
    #[serde(default)]
    pub led_path: String,

    #[serde(default = "default_fast_pulse_ms")]
    pub fast_pulse_ms: u64,

    #[serde(default = "default_slow_pulse_ms")]
    pub slow_pulse_ms: u64,
}

/// Controller timing
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_liveness_grace_ms")]
    pub liveness_grace_ms: u64,

    #[serde(default = "default_liveness_min_bytes")]
    pub liveness_min_bytes: u64,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write diagnostics to daily files in this directory
    #[serde(default)]
    pub dir: Option<String>,
}

// Default value functions
fn default_baud_rate() -> u32 { GPS_DEFAULT_BAUD_RATE }
fn default_device_paths() -> Vec<String> {
    DEFAULT_DEVICE_PATHS.iter().map(|p| p.to_string()).collect()
}

fn default_mount_dir() -> String { "/mnt/sdcard".to_string() }
fn default_require_mount_point() -> bool { true }

fn default_counter_path() -> String { "/var/lib/gps-field-logger/counter.json".to_string() }
fn default_counter_key() -> String { "session".to_string() }

fn default_fast_pulse_ms() -> u64 { 100 }
fn default_slow_pulse_ms() -> u64 { 1000 }

fn default_sample_interval_ms() -> u64 { 5000 }
fn default_warmup_ms() -> u64 { 1000 }
fn default_backoff_ms() -> u64 { 5000 }
fn default_poll_interval_ms() -> u64 { 10 }
fn default_liveness_grace_ms() -> u64 { 5000 }
fn default_liveness_min_bytes() -> u64 { 10 }

fn default_log_level() -> String { "info".to_string() }

/// Upper bound for any configured interval (one hour)
const MAX_INTERVAL_MS: u64 = 3_600_000;

/// Baud rates NMEA receivers commonly run at
const VALID_BAUD_RATES: [u32; 8] = [4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800];

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            paths: default_device_paths(),
            baud_rate: default_baud_rate(),
            replay_file: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mount_dir: default_mount_dir(),
            require_mount_point: default_require_mount_point(),
        }
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            path: default_counter_path(),
            key: default_counter_key(),
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            led_path: String::new(),
            fast_pulse_ms: default_fast_pulse_ms(),
            slow_pulse_ms: default_slow_pulse_ms(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            warmup_ms: default_warmup_ms(),
            backoff_ms: default_backoff_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            liveness_grace_ms: default_liveness_grace_ms(),
            liveness_min_bytes: default_liveness_min_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

impl IndicatorConfig {
    pub fn pulse_timing(&self) -> PulseTiming {
        PulseTiming {
            fast: Duration::from_millis(self.fast_pulse_ms),
            slow: Duration::from_millis(self.slow_pulse_ms),
        }
    }
}

impl SerialConfig {
    /// Device paths to try, in order
    pub fn candidate_paths(&self) -> Vec<String> {
        if self.port.is_empty() {
            self.paths.clone()
        } else {
            vec![self.port.clone()]
        }
    }
}

impl TimingConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn invalid(message: impl std::fmt::Display) -> LoggerError {
    LoggerError::Config(toml::de::Error::custom(message))
}

fn check_interval(name: &str, value_ms: u64) -> Result<()> {
    if value_ms == 0 || value_ms > MAX_INTERVAL_MS {
        return Err(invalid(format!("{} must be between 1 and {}", name, MAX_INTERVAL_MS)));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gps_field_logger::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if !VALID_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {:?}",
                VALID_BAUD_RATES
            )));
        }

        if self.serial.port.is_empty() && self.serial.paths.is_empty() {
            return Err(invalid("serial port or candidate paths must be set"));
        }

        if matches!(&self.serial.replay_file, Some(path) if path.is_empty()) {
            return Err(invalid("replay_file cannot be empty when set"));
        }

        if self.storage.mount_dir.is_empty() {
            return Err(invalid("storage mount_dir cannot be empty"));
        }

        if self.counter.path.is_empty() {
            return Err(invalid("counter path cannot be empty"));
        }

        if self.counter.key.is_empty() {
            return Err(invalid("counter key cannot be empty"));
        }

        // Pulse timing
        check_interval("fast_pulse_ms", self.indicator.fast_pulse_ms)?;
        check_interval("slow_pulse_ms", self.indicator.slow_pulse_ms)?;
        if self.indicator.fast_pulse_ms >= self.indicator.slow_pulse_ms {
            return Err(invalid("fast_pulse_ms must be shorter than slow_pulse_ms"));
        }

        // Controller timing
        check_interval("sample_interval_ms", self.timing.sample_interval_ms)?;
        check_interval("backoff_ms", self.timing.backoff_ms)?;
        check_interval("poll_interval_ms", self.timing.poll_interval_ms)?;

        if self.timing.warmup_ms > MAX_INTERVAL_MS {
            return Err(invalid(format!("warmup_ms must be at most {}", MAX_INTERVAL_MS)));
        }

        if self.timing.poll_interval_ms > self.timing.sample_interval_ms {
            return Err(invalid("poll_interval_ms cannot exceed sample_interval_ms"));
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "logging level must be one of: {}",
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        if matches!(&self.logging.dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("logging dir cannot be empty when set"));
        }

        Ok(())
    }
}
