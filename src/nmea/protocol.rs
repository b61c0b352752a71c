//! # NMEA Protocol Constants and Types
//!
//! Sentence framing constants, the [`Fix`] type, and field parsers for the
//! NMEA 0183 sentences the logger consumes (`RMC` and `GGA`).

use chrono::{NaiveDate, NaiveTime};

/// Sentence start delimiter
pub const NMEA_START: u8 = b'$';

/// Checksum delimiter
pub const NMEA_CHECKSUM_DELIMITER: u8 = b'*';

/// Field separator
pub const NMEA_FIELD_SEPARATOR: u8 = b',';

/// Longest sentence accepted, excluding `$` and line ending
///
/// The standard allows 82 characters including framing; receivers with
/// proprietary extensions run longer, so allow some headroom.
pub const NMEA_MAX_SENTENCE_LEN: usize = 120;

/// Years in `ddmmyy` dates are offset from 2000
pub const NMEA_CENTURY: i32 = 2000;

/// Largest latitude magnitude in degrees
pub const MAX_LATITUDE: f64 = 90.0;

/// Largest longitude magnitude in degrees
pub const MAX_LONGITUDE: f64 = 180.0;

/// Sentence types the decoder understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceKind {
    /// Recommended minimum data: time, status, position, date
    Rmc,
    /// Fix data: time, position, quality, altitude
    Gga,
    /// Anything else (checksum-verified, otherwise ignored)
    Other,
}

impl SentenceKind {
    /// Classify a sentence by its address field (e.g. `GPRMC`, `GNGGA`)
    ///
    /// The two-letter talker prefix is ignored so that multi-constellation
    /// receivers (`GN`, `GL`, `GA`, `BD`) are handled alike.
    pub fn from_address(address: &[u8]) -> Self {
        if address.len() != 5 {
            return SentenceKind::Other;
        }

        match &address[2..] {
            b"RMC" => SentenceKind::Rmc,
            b"GGA" => SentenceKind::Gga,
            _ => SentenceKind::Other,
        }
    }
}

/// One decoded positioning reading
///
/// `valid` is true only when location, date and time are all valid; the
/// record schema needs all three.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    /// Longitude in degrees (east positive)
    pub longitude: f64,

    /// Latitude in degrees (north positive)
    pub latitude: f64,

    /// Altitude above mean sea level in metres
    pub altitude: f64,

    /// UTC date
    pub date: Option<NaiveDate>,

    /// UTC time of day
    pub time: Option<NaiveTime>,

    /// Whether the fix may be logged
    pub valid: bool,
}

impl Fix {
    /// A fix carrying no usable data
    pub const fn invalid() -> Self {
        Self {
            longitude: 0.0,
            latitude: 0.0,
            altitude: 0.0,
            date: None,
            time: None,
            valid: false,
        }
    }
}

impl Default for Fix {
    fn default() -> Self {
        Self::invalid()
    }
}

/// Parse an NMEA time field (`hhmmss` with optional fractional seconds)
///
/// Fractional seconds are dropped; the record schema has whole seconds.
pub fn parse_time(field: &[u8]) -> Option<NaiveTime> {
    if field.len() < 6 {
        return None;
    }
    if field.len() > 6 && field[6] != b'.' {
        return None;
    }

    let hour = parse_two_digits(&field[0..2])?;
    let minute = parse_two_digits(&field[2..4])?;
    let second = parse_two_digits(&field[4..6])?;
    NaiveTime::from_hms_opt(hour, minute, second)
}

/// Parse an NMEA date field (`ddmmyy`)
pub fn parse_date(field: &[u8]) -> Option<NaiveDate> {
    if field.len() != 6 {
        return None;
    }

    let day = parse_two_digits(&field[0..2])?;
    let month = parse_two_digits(&field[2..4])?;
    let year = parse_two_digits(&field[4..6])? as i32 + NMEA_CENTURY;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse a coordinate field pair (`ddmm.mmmm` / `dddmm.mmmm` and hemisphere)
///
/// # Arguments
///
/// * `value` - Degrees and decimal minutes, e.g. `4807.038`
/// * `hemisphere` - One of `N`, `S`, `E`, `W`
///
/// # Returns
///
/// * `Option<f64>` - Signed decimal degrees (south and west negative),
///   `None` if malformed or beyond 90° latitude / 180° longitude
pub fn parse_coordinate(value: &[u8], hemisphere: &[u8]) -> Option<f64> {
    let (sign, limit) = match hemisphere {
        b"N" => (1.0, MAX_LATITUDE),
        b"S" => (-1.0, MAX_LATITUDE),
        b"E" => (1.0, MAX_LONGITUDE),
        b"W" => (-1.0, MAX_LONGITUDE),
        _ => return None,
    };

    // Digits and at most one decimal point, so byte offsets are char offsets
    if !value.iter().all(|b| b.is_ascii_digit() || *b == b'.')
        || value.iter().filter(|&&b| b == b'.').count() > 1
    {
        return None;
    }

    let dot = value.iter().position(|&b| b == b'.').unwrap_or(value.len());
    // At least two minute digits before the decimal point
    if dot < 3 {
        return None;
    }

    let (degrees, minutes) = value.split_at(dot - 2);
    let degrees: u32 = std::str::from_utf8(degrees).ok()?.parse().ok()?;
    let minutes: f64 = std::str::from_utf8(minutes).ok()?.parse().ok()?;
    if minutes >= 60.0 {
        return None;
    }

    let decimal = f64::from(degrees) + minutes / 60.0;
    if decimal > limit {
        return None;
    }

    Some(sign * decimal)
}

/// Parse a decimal field such as altitude
///
/// Only finite values are accepted; `NaN` and `inf` are rejected.
pub fn parse_decimal(field: &[u8]) -> Option<f64> {
    if field.is_empty() {
        return None;
    }
    let value: f64 = std::str::from_utf8(field).ok()?.parse().ok()?;
    value.is_finite().then_some(value)
}

#[inline]
fn parse_two_digits(digits: &[u8]) -> Option<u32> {
    match digits {
        [tens @ b'0'..=b'9', ones @ b'0'..=b'9'] => {
            Some(u32::from(tens - b'0') * 10 + u32::from(ones - b'0'))
        }
        _ => None,
    }
}
