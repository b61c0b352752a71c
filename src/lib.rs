//! # GPS Field Logger Library
//!
//! Battery-powered field logger for NMEA GPS receivers.
//!
//! This library decodes the receiver's byte stream into fixes, appends valid
//! fixes to one CSV file per session on a removable medium, numbers sessions
//! with a durable counter, and reports device health on a single LED.

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod nmea;
pub mod poll;
pub mod record;
pub mod serial;
pub mod session;
pub mod status;
