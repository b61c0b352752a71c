//! # Record Store Module
//!
//! Append-only CSV session files on a removable medium.
//!
//! Schema, written once per session immediately after creation:
//!
//! ```text
//! Longitude, Latitude, Altitude, Date, Time
//! 12.345000, 67.890000, 10.000000, 01/02/24, 03:04:05
//! ```
//!
//! Lines end in `\r\n`. Each session gets its own file named after its
//! [`SessionId`], and files are created exclusively so an existing record is
//! never overwritten.

pub mod disk;

pub use disk::FsRecordStore;

use crate::error::Result;
use crate::nmea::Fix;
use crate::session::SessionId;

/// First line of every session file
pub const RECORD_HEADER: &str = "Longitude, Latitude, Altitude, Date, Time\r\n";

/// Session file name prefix
pub const RECORD_FILE_PREFIX: &str = "gpslog_";

/// Session file name extension
pub const RECORD_FILE_EXTENSION: &str = "csv";

/// File name for a session, e.g. `gpslog_000042.csv`
///
/// Ids past six digits simply grow wider, so names stay unique.
pub fn session_file_name(id: SessionId) -> String {
    format!("{}{:06}.{}", RECORD_FILE_PREFIX, id.get(), RECORD_FILE_EXTENSION)
}

/// Render a fix as one record line
///
/// Returns `None` for fixes that must not be logged.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, NaiveTime};
/// use gps_field_logger::nmea::Fix;
/// use gps_field_logger::record::format_record;
///
/// let fix = Fix {
///     longitude: 12.345,
///     latitude: 67.890,
///     altitude: 10.0,
///     date: NaiveDate::from_ymd_opt(2024, 1, 2),
///     time: NaiveTime::from_hms_opt(3, 4, 5),
///     valid: true,
/// };
/// assert_eq!(
///     format_record(&fix).unwrap(),
///     "12.345000, 67.890000, 10.000000, 01/02/24, 03:04:05\r\n"
/// );
/// ```
pub fn format_record(fix: &Fix) -> Option<String> {
    if !fix.valid {
        return None;
    }
    let (date, time) = (fix.date?, fix.time?);

    Some(format!(
        "{:.6}, {:.6}, {:.6}, {}, {}\r\n",
        fix.longitude,
        fix.latitude,
        fix.altitude,
        date.format("%m/%d/%y"),
        time.format("%H:%M:%S"),
    ))
}

/// Append-only record sink on a mountable medium
///
/// Exactly one session is open at a time, owned by the controller.
#[cfg_attr(test, mockall::automock)]
pub trait RecordStore: Send {
    /// Make the medium available
    ///
    /// # Errors
    ///
    /// `MediumAbsent` if no medium is present, `MountFailed` otherwise
    fn mount(&mut self) -> Result<()>;

    /// Whether the medium (and the open session file, if any) is still there
    fn medium_present(&self) -> bool;

    /// Create the session file for `id` and write the header
    ///
    /// # Errors
    ///
    /// `SessionExists` if the name is taken, `CreateFailed` for any other
    /// failure to create the file or write the header
    fn create_session(&mut self, id: SessionId) -> Result<()>;

    /// Append one valid fix to the open session
    ///
    /// # Errors
    ///
    /// `AppendFailed` if the line is not fully written. Transient: the caller
    /// drops this fix and keeps the session.
    fn append(&mut self, fix: &Fix) -> Result<()>;

    /// Forget the open session (medium lost); a remount is needed next
    fn close_session(&mut self);

    /// Close the open session and delete its file
    fn abandon_session(&mut self);
}
