//! # NMEA Fix Decoder
//!
//! Incremental, byte-at-a-time decoder for receiver output.
//!
//! The receiver streams sentences continuously and without regard to the
//! logger's sampling cadence, so [`FixDecoder::feed`] must be cheap enough to
//! call for every byte as it arrives. Each call does O(1) amortized work: bytes
//! are buffered until a line ending, and the buffered sentence (bounded by
//! [`NMEA_MAX_SENTENCE_LEN`]) is parsed once.

use chrono::{NaiveDate, NaiveTime};
use tracing::trace;

use super::checksum::{nmea_checksum, parse_checksum};
use super::protocol::*;

/// Latest committed value of each fix component
#[derive(Debug, Default, Clone, Copy)]
struct FixFields {
    /// (latitude, longitude) in signed degrees
    location: Option<(f64, f64)>,
    altitude: Option<f64>,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
}

/// Incremental NMEA decoder producing [`Fix`] values
///
/// # Examples
///
/// ```
/// use gps_field_logger::nmea::checksum::frame_sentence;
/// use gps_field_logger::nmea::decoder::FixDecoder;
///
/// let mut decoder = FixDecoder::new();
/// let line = frame_sentence("GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W");
/// for byte in line.bytes() {
///     decoder.feed(byte);
/// }
///
/// assert!(decoder.current_fix().valid);
/// assert_eq!(decoder.bytes_processed(), line.len() as u64);
/// ```
#[derive(Debug)]
pub struct FixDecoder {
    /// Sentence characters after `$`, up to the line ending
    buffer: Vec<u8>,
    /// Inside a sentence (saw `$`, no line ending yet)
    in_sentence: bool,
    fields: FixFields,
    fix: Fix,
    bytes_processed: u64,
    passed_checksum: u32,
    failed_checksum: u32,
    sentences_with_fix: u32,
}

impl Default for FixDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FixDecoder {
    /// Create a decoder with no fix
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(NMEA_MAX_SENTENCE_LEN),
            in_sentence: false,
            fields: FixFields::default(),
            fix: Fix::invalid(),
            bytes_processed: 0,
            passed_checksum: 0,
            failed_checksum: 0,
            sentences_with_fix: 0,
        }
    }

    /// Consume one byte from the receiver
    ///
    /// Never blocks. A sentence is committed when its line ending arrives.
    pub fn feed(&mut self, byte: u8) {
        self.bytes_processed += 1;

        match byte {
            NMEA_START => {
                // A `$` always restarts framing, even mid-sentence
                self.buffer.clear();
                self.in_sentence = true;
            }
            b'\r' | b'\n' => {
                if self.in_sentence {
                    self.in_sentence = false;
                    self.finish_sentence();
                }
            }
            _ if self.in_sentence => {
                if self.buffer.len() >= NMEA_MAX_SENTENCE_LEN {
                    trace!("Discarding overlong NMEA sentence");
                    self.in_sentence = false;
                    self.buffer.clear();
                } else {
                    self.buffer.push(byte);
                }
            }
            _ => {}
        }
    }

    /// Most recently committed fix (invalid until one is decoded)
    pub fn current_fix(&self) -> Fix {
        self.fix
    }

    /// Bytes consumed since construction
    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }

    /// Sentences whose checksum matched
    pub fn passed_checksum(&self) -> u32 {
        self.passed_checksum
    }

    /// Sentences dropped for a missing or mismatching checksum
    pub fn failed_checksum(&self) -> u32 {
        self.failed_checksum
    }

    /// Accepted RMC/GGA sentences that carried a position fix
    pub fn sentences_with_fix(&self) -> u32 {
        self.sentences_with_fix
    }

    fn finish_sentence(&mut self) {
        let sentence = std::mem::take(&mut self.buffer);
        self.process_sentence(&sentence);
        self.buffer = sentence;
        self.buffer.clear();
    }

    fn process_sentence(&mut self, sentence: &[u8]) {
        let Some(star) = sentence.iter().position(|&b| b == NMEA_CHECKSUM_DELIMITER) else {
            self.failed_checksum += 1;
            return;
        };

        let body = &sentence[..star];
        match parse_checksum(&sentence[star + 1..]) {
            Some(expected) if expected == nmea_checksum(body) => {
                self.passed_checksum += 1;
            }
            _ => {
                trace!("NMEA checksum mismatch");
                self.failed_checksum += 1;
                return;
            }
        }

        let fields: Vec<&[u8]> = body.split(|&b| b == NMEA_FIELD_SEPARATOR).collect();
        let field = |index: usize| fields.get(index).copied().unwrap_or(&[]);

        match SentenceKind::from_address(field(0)) {
            SentenceKind::Rmc => self.apply_rmc(&field),
            SentenceKind::Gga => self.apply_gga(&field),
            SentenceKind::Other => return,
        }

        if self.fields.location.is_some() {
            self.sentences_with_fix += 1;
        }
        self.fix = self.build_fix();
    }

    /// `$--RMC,time,status,lat,N/S,lon,E/W,speed,course,date,...`
    fn apply_rmc<'a>(&mut self, field: &impl Fn(usize) -> &'a [u8]) {
        let time = parse_time(field(1));
        let date = parse_date(field(9));

        if field(2) == b"A" {
            self.fields.location = parse_location(field(3), field(4), field(5), field(6));
            self.fields.time = time;
            self.fields.date = date;
        } else {
            self.fields.location = None;
            if time.is_some() {
                self.fields.time = time;
            }
            if date.is_some() {
                self.fields.date = date;
            }
        }
    }

    /// `$--GGA,time,lat,N/S,lon,E/W,quality,sats,hdop,alt,M,...`
    fn apply_gga<'a>(&mut self, field: &impl Fn(usize) -> &'a [u8]) {
        let quality = parse_decimal(field(6)).unwrap_or(0.0);

        if quality > 0.0 {
            self.fields.location = parse_location(field(2), field(3), field(4), field(5));
            self.fields.time = parse_time(field(1));
            if let Some(altitude) = parse_decimal(field(9)) {
                self.fields.altitude = Some(altitude);
            }
        } else {
            self.fields.location = None;
        }
    }

    fn build_fix(&self) -> Fix {
        let (latitude, longitude) = self.fields.location.unwrap_or((0.0, 0.0));

        Fix {
            longitude,
            latitude,
            altitude: self.fields.altitude.unwrap_or(0.0),
            date: self.fields.date,
            time: self.fields.time,
            valid: self.fields.location.is_some()
                && self.fields.date.is_some()
                && self.fields.time.is_some(),
        }
    }
}

fn parse_location(lat: &[u8], ns: &[u8], lon: &[u8], ew: &[u8]) -> Option<(f64, f64)> {
    if !matches!(ns, b"N" | b"S") || !matches!(ew, b"E" | b"W") {
        return None;
    }
    Some((parse_coordinate(lat, ns)?, parse_coordinate(lon, ew)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmea::checksum::frame_sentence;

    const RMC_VALID: &str = "GPRMC,030405.00,A,6753.4000,N,01220.7000,E,0.0,0.0,020124,,,A";
    const GGA_VALID: &str = "GPGGA,030405.00,6753.4000,N,01220.7000,E,1,08,0.9,10.0,M,0.0,M,,";

    fn feed_str(decoder: &mut FixDecoder, text: &str) {
        for byte in text.bytes() {
            decoder.feed(byte);
        }
    }

    #[test]
    fn test_no_fix_before_any_sentence() {
        let decoder = FixDecoder::new();
        assert!(!decoder.current_fix().valid);
        assert_eq!(decoder.bytes_processed(), 0);
    }

    #[test]
    fn test_known_literal_sentences() {
        let mut decoder = FixDecoder::new();
        feed_str(
            &mut decoder,
            "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n\
             $GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n",
        );

        assert_eq!(decoder.passed_checksum(), 2);
        assert_eq!(decoder.failed_checksum(), 0);

        let fix = decoder.current_fix();
        assert!(fix.valid);
        assert!((fix.latitude - 48.1173).abs() < 1e-9);
        assert!((fix.longitude - 11.516_666_666).abs() < 1e-6);
        assert!((fix.altitude - 545.4).abs() < 1e-9);
        assert_eq!(fix.date, NaiveDate::from_ymd_opt(2094, 3, 23));
        assert_eq!(fix.time, NaiveTime::from_hms_opt(12, 35, 19));
    }

    #[test]
    fn test_full_fix_from_rmc_and_gga() {
        let mut decoder = FixDecoder::new();
        feed_str(&mut decoder, &frame_sentence(GGA_VALID));
        feed_str(&mut decoder, &frame_sentence(RMC_VALID));

        let fix = decoder.current_fix();
        assert!(fix.valid);
        assert!((fix.longitude - 12.345).abs() < 1e-9);
        assert!((fix.latitude - 67.890).abs() < 1e-9);
        assert!((fix.altitude - 10.0).abs() < 1e-9);
        assert_eq!(fix.date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(fix.time, NaiveTime::from_hms_opt(3, 4, 5));
        assert_eq!(decoder.sentences_with_fix(), 2);
    }

    #[test]
    fn test_gga_alone_lacks_date() {
        let mut decoder = FixDecoder::new();
        feed_str(&mut decoder, &frame_sentence(GGA_VALID));

        let fix = decoder.current_fix();
        assert!(!fix.valid, "location without a date must not be loggable");
        assert!(fix.date.is_none());
        assert!(fix.time.is_some());
    }

    #[test]
    fn test_void_rmc_invalidates_location() {
        let mut decoder = FixDecoder::new();
        feed_str(&mut decoder, &frame_sentence(RMC_VALID));
        assert!(decoder.current_fix().valid);

        feed_str(&mut decoder, &frame_sentence("GPRMC,030410.00,V,,,,,,,020124,,,N"));
        let fix = decoder.current_fix();
        assert!(!fix.valid);
        assert_eq!(fix.time, NaiveTime::from_hms_opt(3, 4, 10));
        assert_eq!(fix.date, NaiveDate::from_ymd_opt(2024, 1, 2));
    }

    #[test]
    fn test_gga_quality_zero_invalidates_location() {
        let mut decoder = FixDecoder::new();
        feed_str(&mut decoder, &frame_sentence(RMC_VALID));
        feed_str(&mut decoder, &frame_sentence("GPGGA,030406.00,,,,,0,00,99.99,,,,,,"));
        assert!(!decoder.current_fix().valid);
    }

    #[test]
    fn test_bad_date_makes_fix_invalid() {
        let mut decoder = FixDecoder::new();
        feed_str(
            &mut decoder,
            &frame_sentence("GPRMC,030405.00,A,6753.4000,N,01220.7000,E,0.0,0.0,021324,,,A"),
        );
        assert!(!decoder.current_fix().valid);
    }

    #[test]
    fn test_non_ascii_coordinate_is_rejected() {
        let mut decoder = FixDecoder::new();
        let sentence =
            frame_sentence("GPRMC,030405.00,A,\u{e9}a.5,N,01220.7000,E,0.0,0.0,020124,,,A");
        feed_str(&mut decoder, &sentence);

        assert_eq!(decoder.passed_checksum(), 1);
        assert!(!decoder.current_fix().valid);

        // Decoder keeps working afterwards
        feed_str(&mut decoder, &frame_sentence(RMC_VALID));
        assert!(decoder.current_fix().valid);
    }

    #[test]
    fn test_latitude_beyond_pole_is_rejected() {
        let mut decoder = FixDecoder::new();
        feed_str(
            &mut decoder,
            &frame_sentence("GPRMC,030405.00,A,9530.0000,N,01220.7000,E,0.0,0.0,020124,,,A"),
        );
        assert!(!decoder.current_fix().valid);

        feed_str(
            &mut decoder,
            &frame_sentence("GPRMC,030405.00,A,6753.4000,N,17959.0000,W,0.0,0.0,020124,,,A"),
        );
        let fix = decoder.current_fix();
        assert!(fix.valid);
        assert!((fix.longitude + (179.0 + 59.0 / 60.0)).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_altitude_is_ignored() {
        let mut decoder = FixDecoder::new();
        feed_str(&mut decoder, &frame_sentence(GGA_VALID));
        feed_str(
            &mut decoder,
            &frame_sentence("GPGGA,030406.00,6753.4000,N,01220.7000,E,1,08,0.9,NaN,M,0.0,M,,"),
        );
        feed_str(&mut decoder, &frame_sentence(RMC_VALID));

        let fix = decoder.current_fix();
        assert!(fix.valid);
        assert!((fix.altitude - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_checksum_mismatch_is_dropped() {
        let mut decoder = FixDecoder::new();
        let mut line = frame_sentence(RMC_VALID);
        // Corrupt a payload digit
        line = line.replacen("6753", "6754", 1);
        feed_str(&mut decoder, &line);

        assert!(!decoder.current_fix().valid);
        assert_eq!(decoder.failed_checksum(), 1);
        assert_eq!(decoder.passed_checksum(), 0);
    }

    #[test]
    fn test_missing_checksum_is_dropped() {
        let mut decoder = FixDecoder::new();
        feed_str(&mut decoder, &format!("${}\r\n", RMC_VALID));
        assert!(!decoder.current_fix().valid);
        assert_eq!(decoder.failed_checksum(), 1);
    }

    #[test]
    fn test_unknown_sentence_is_ignored() {
        let mut decoder = FixDecoder::new();
        feed_str(&mut decoder, &frame_sentence(RMC_VALID));
        feed_str(&mut decoder, &frame_sentence("GPGSV,3,1,11,03,03,111,00,04,15,270,00"));

        assert!(decoder.current_fix().valid);
        assert_eq!(decoder.passed_checksum(), 2);
    }

    #[test]
    fn test_resync_on_dollar_mid_sentence() {
        let mut decoder = FixDecoder::new();
        // Receiver output starts mid-sentence, then a truncated sentence is cut by `$`
        feed_str(&mut decoder, "4,E,1,08*3F\r\n$GPGGA,0304");
        feed_str(&mut decoder, &frame_sentence(RMC_VALID));

        assert!(decoder.current_fix().valid);
        assert_eq!(decoder.failed_checksum(), 0);
    }

    #[test]
    fn test_overlong_sentence_is_discarded() {
        let mut decoder = FixDecoder::new();
        let junk = format!("$GPTXT,{}", "A".repeat(NMEA_MAX_SENTENCE_LEN + 10));
        feed_str(&mut decoder, &junk);
        feed_str(&mut decoder, "*00\r\n");

        // The overflow ended the sentence, so its tail is noise outside framing
        assert_eq!(decoder.passed_checksum(), 0);
        assert_eq!(decoder.failed_checksum(), 0);

        feed_str(&mut decoder, &frame_sentence(RMC_VALID));
        assert!(decoder.current_fix().valid);
    }

    #[test]
    fn test_bytes_processed_counts_everything() {
        let mut decoder = FixDecoder::new();
        feed_str(&mut decoder, "noise");
        let line = frame_sentence(RMC_VALID);
        feed_str(&mut decoder, &line);
        assert_eq!(decoder.bytes_processed(), 5 + line.len() as u64);
    }

    #[test]
    fn test_fix_split_across_feeds() {
        let mut decoder = FixDecoder::new();
        let line = frame_sentence(RMC_VALID);
        let (head, tail) = line.split_at(20);

        feed_str(&mut decoder, head);
        assert!(!decoder.current_fix().valid);
        feed_str(&mut decoder, tail);
        assert!(decoder.current_fix().valid);
    }
}
