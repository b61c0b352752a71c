//! # NMEA Module
//!
//! Decoding of NMEA 0183 receiver output into positional fixes.
//!
//! This module handles:
//! - Sentence framing and resynchronisation on `$`
//! - XOR checksum verification
//! - RMC (position, date, time, status) and GGA (position, time, altitude)
//! - The validity policy: a fix is loggable only with location, date and time

pub mod checksum;
pub mod decoder;
pub mod protocol;

pub use decoder::FixDecoder;
pub use protocol::Fix;
