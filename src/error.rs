//! # Error Types
//!
//! Custom error types for the GPS field logger using `thiserror`.
//!
//! Storage-class errors (`MediumAbsent`, `MountFailed`, `CreateFailed`,
//! `SessionExists`) and `Counter` escalate the controller to its critical
//! state. `AppendFailed` is transient: the fix is dropped and logging goes on.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the GPS field logger
#[derive(Debug, Error)]
pub enum LoggerError {
    /// No storage medium at the mount point
    #[error("Storage medium absent: {0}")]
    MediumAbsent(String),

    /// Medium present but unusable
    #[error("Mount failed: {0}")]
    MountFailed(String),

    /// Session file could not be created or its header not written
    #[error("Session create failed: {0}")]
    CreateFailed(String),

    /// Session file name already taken on the medium
    #[error("Session file already exists: {}", .0.display())]
    SessionExists(PathBuf),

    /// A record line could not be written
    #[error("Append failed: {0}")]
    AppendFailed(String),

    /// Durable session counter could not be read or persisted
    #[error("Session counter error: {0}")]
    Counter(String),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("GPS serial port not found (tried: {0})")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoggerError {
    /// Whether this error forces the controller into its critical state
    ///
    /// Append failures are the only storage errors that are tolerated.
    pub fn is_critical(&self) -> bool {
        !matches!(self, LoggerError::AppendFailed(_))
    }
}

/// Result type alias for the GPS field logger
pub type Result<T> = std::result::Result<T, LoggerError>;
