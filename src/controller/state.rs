//! Device lifecycle states

use std::fmt;

/// Overall device health, exactly one active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    /// Bringing up storage and opening a session
    #[default]
    Initializing,
    /// Storage or counter failure; waiting out the backoff before retrying
    CriticalError,
    /// Session open, no valid fix on the last cycle
    Acquiring,
    /// Session open, last fix was valid and appended
    Logging,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceState::Initializing => "initializing",
            DeviceState::CriticalError => "critical error",
            DeviceState::Acquiring => "acquiring",
            DeviceState::Logging => "logging",
        };
        f.write_str(name)
    }
}
