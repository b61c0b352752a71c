//! # NMEA Checksum
//!
//! XOR checksum used by NMEA 0183 sentences.
//!
//! The checksum covers every character between the leading `$` and the `*`
//! delimiter, and is transmitted as two uppercase hexadecimal digits.

/// Calculate the XOR checksum of a sentence body
///
/// # Arguments
///
/// * `body` - Sentence characters between `$` and `*` (exclusive)
///
/// # Returns
///
/// * `u8` - XOR of all bytes
///
/// # Examples
///
/// ```
/// use gps_field_logger::nmea::checksum::nmea_checksum;
///
/// let body = b"GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,";
/// assert_eq!(nmea_checksum(body), 0x47);
/// ```
pub fn nmea_checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, &byte| acc ^ byte)
}

/// Parse the two hex digits that follow `*`
///
/// Accepts upper- and lowercase digits. Returns `None` for anything else.
pub fn parse_checksum(digits: &[u8]) -> Option<u8> {
    if digits.len() != 2 {
        return None;
    }

    let high = hex_value(digits[0])?;
    let low = hex_value(digits[1])?;
    Some((high << 4) | low)
}

#[inline]
fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}

/// Frame a sentence body as a complete NMEA line
///
/// Produces `$<body>*HH\r\n`. Used by bench tooling and tests to build
/// receiver output.
///
/// # Examples
///
/// ```
/// use gps_field_logger::nmea::checksum::frame_sentence;
///
/// let line = frame_sentence("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
/// assert!(line.ends_with("*47\r\n"));
/// ```
pub fn frame_sentence(body: &str) -> String {
    format!("${}*{:02X}\r\n", body, nmea_checksum(body.as_bytes()))
}
