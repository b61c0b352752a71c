//! # Serial Communication Module
//!
//! Handles the byte stream from the GPS receiver.
//!
//! This module handles:
//! - Opening the receiver UART (8N1, no flow control) at the configured baud
//! - Auto-detecting the device among candidate paths
//! - Replaying a captured NMEA file in place of the UART

pub mod port_trait;

pub use port_trait::{AsyncReadSource, ByteSource};

use std::path::Path;

use crate::error::{LoggerError, Result};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Default NMEA baud rate for most GPS receivers
pub const GPS_DEFAULT_BAUD_RATE: u32 = 9_600;

/// Default receiver device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/serial0", // Raspberry Pi primary UART alias
    "/dev/ttyAMA0", // PL011 UART
    "/dev/ttyUSB0", // USB-to-serial adapters
    "/dev/ttyACM0", // USB CDC receivers
];

/// GPS receiver serial port handler
pub struct GpsSerial {
    /// Serial port handle
    port: tokio_serial::SerialStream,
    /// Device path (e.g., /dev/serial0)
    device_path: String,
}

impl std::fmt::Debug for GpsSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpsSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl GpsSerial {
    /// Open the receiver by trying each candidate path in order
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/serial0"])
    /// * `baud_rate` - Receiver output rate
    ///
    /// # Returns
    ///
    /// * `Result<GpsSerial>` - Connected serial port or error
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` listing the paths if none can be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gps_field_logger::serial::{GpsSerial, GPS_DEFAULT_BAUD_RATE};
    ///
    /// let serial = GpsSerial::open_with_paths(&["/dev/serial0"], GPS_DEFAULT_BAUD_RATE)?;
    /// println!("Receiver on {}", serial.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open_with_paths<S: AsRef<str>>(paths: &[S], baud_rate: u32) -> Result<Self> {
        for path in paths {
            let path = path.as_ref();
            debug!("Trying to open GPS serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened GPS receiver at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        let tried: Vec<&str> = paths.iter().map(|p| p.as_ref()).collect();
        Err(LoggerError::SerialPortNotFound(tried.join(", ")))
    }

    /// Open a specific serial port with NMEA settings (8N1)
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| LoggerError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Hand the port over as a byte source for the controller
    pub fn into_source(self) -> AsyncReadSource<tokio_serial::SerialStream> {
        AsyncReadSource::new(self.port)
    }
}

/// Open a captured NMEA file as a byte source
///
/// The file is read as fast as the controller drains it; it reports end of
/// stream once exhausted, after which the decoder simply sees no new bytes.
pub async fn open_replay<P: AsRef<Path>>(path: P) -> Result<AsyncReadSource<tokio::fs::File>> {
    let path = path.as_ref();
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| {
            LoggerError::Serial(format!("Failed to open replay {}: {}", path.display(), e))
        })?;
    info!("Replaying NMEA capture from {}", path.display());
    Ok(AsyncReadSource::new(file))
}
