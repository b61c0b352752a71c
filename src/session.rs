//! # Session Counter
//!
//! Durable, strictly increasing session numbers.
//!
//! Each logging session gets the next integer after the last one persisted,
//! and that integer names the session's record file. The value lives in a
//! small key-value store that survives power loss; the production store is a
//! JSON file replaced atomically (write temporary file, `fsync`, rename), so a
//! crash leaves either the old or the new value, never a torn one.
//!
//! The controller uses the two-phase form: [`SessionCounter::peek_next`]
//! before creating the record file and [`SessionCounter::commit`] once the
//! file exists, so failed attempts do not burn numbers.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::num::NonZeroU32;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::{LoggerError, Result};

/// Default key holding the last session number
pub const DEFAULT_COUNTER_KEY: &str = "session";

/// Identity of one logging session (always positive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(NonZeroU32);

impl SessionId {
    /// `None` for zero
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persistent store of named integers
#[cfg_attr(test, mockall::automock)]
pub trait CounterStore: Send {
    /// Read `key`, `None` if it was never written
    fn load(&self, key: &str) -> io::Result<Option<u32>>;

    /// Durably write `key`
    fn store(&mut self, key: &str, value: u32) -> io::Result<()>;
}

/// Counter store backed by a JSON object in a single file
#[derive(Debug, Clone)]
pub struct FileCounterStore {
    path: PathBuf,
}

impl FileCounterStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> io::Result<BTreeMap<String, u32>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl CounterStore for FileCounterStore {
    fn load(&self, key: &str) -> io::Result<Option<u32>> {
        Ok(self.read_all()?.get(key).copied())
    }

    fn store(&mut self, key: &str, value: u32) -> io::Result<()> {
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value);
        let contents = serde_json::to_string_pretty(&values)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let temp = self.temp_path();
        {
            let mut file = fs::File::create(&temp)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;

        // Persist the rename itself
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::File::open(parent).and_then(|dir| dir.sync_all()) {
                debug!("Could not sync counter directory {}: {}", parent.display(), e);
            }
        }

        Ok(())
    }
}

/// Issues session numbers from a [`CounterStore`]
pub struct SessionCounter<C> {
    store: C,
    key: String,
}

impl<C: CounterStore> SessionCounter<C> {
    pub fn new(store: C, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Last persisted session number (0 if none)
    pub fn last(&self) -> Result<u32> {
        self.store
            .load(&self.key)
            .map(|value| value.unwrap_or(0))
            .map_err(|e| LoggerError::Counter(format!("Failed to read '{}': {}", self.key, e)))
    }

    /// The id the next session would get, without persisting anything
    pub fn peek_next(&self) -> Result<SessionId> {
        let last = self.last()?;
        last.checked_add(1)
            .and_then(SessionId::new)
            .ok_or_else(|| LoggerError::Counter("session counter exhausted".to_string()))
    }

    /// Persist `id` as the last issued session number
    ///
    /// # Errors
    ///
    /// Returns `Counter` if the store fails, or if `id` would not move the
    /// counter forward (ids are never reissued).
    pub fn commit(&mut self, id: SessionId) -> Result<()> {
        let last = self.last()?;
        if id.get() <= last {
            return Err(LoggerError::Counter(format!(
                "session {} is not after last issued {}",
                id, last
            )));
        }

        self.store
            .store(&self.key, id.get())
            .map_err(|e| LoggerError::Counter(format!("Failed to persist '{}': {}", self.key, e)))?;
        debug!("Session counter '{}' now {}", self.key, id);
        Ok(())
    }

    /// Read, increment, persist and return the next session id
    ///
    /// # Examples
    ///
    /// ```
    /// use gps_field_logger::session::{FileCounterStore, SessionCounter};
    ///
    /// let dir = tempfile::tempdir()?;
    /// let store = FileCounterStore::new(dir.path().join("counter.json"));
    /// let mut counter = SessionCounter::new(store, "session");
    /// assert_eq!(counter.next_session()?.get(), 1);
    /// assert_eq!(counter.next_session()?.get(), 2);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn next_session(&mut self) -> Result<SessionId> {
        let id = self.peek_next()?;
        self.commit(id)?;
        info!("Starting session {}", id);
        Ok(id)
    }
}
