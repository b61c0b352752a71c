//! Record store on a mounted filesystem

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{format_record, session_file_name, RecordStore, RECORD_HEADER};
use crate::error::{LoggerError, Result};
use crate::nmea::Fix;
use crate::session::SessionId;

/// Name of the scratch file used to check the medium accepts writes
const PROBE_FILE_NAME: &str = ".gpslog_probe";

/// The open session file
#[derive(Debug)]
struct OpenSession {
    id: SessionId,
    path: PathBuf,
    file: File,
    records: u64,
}

/// [`RecordStore`] writing session files under a mount directory
///
/// With `require_mount_point` set, the directory only counts as a medium
/// when something is mounted on it (its device differs from its parent's),
/// so an unplugged card is never silently replaced by the root filesystem.
#[derive(Debug)]
pub struct FsRecordStore {
    mount_dir: PathBuf,
    require_mount_point: bool,
    mounted: bool,
    session: Option<OpenSession>,
}

impl FsRecordStore {
    pub fn new<P: Into<PathBuf>>(mount_dir: P, require_mount_point: bool) -> Self {
        Self {
            mount_dir: mount_dir.into(),
            require_mount_point,
            mounted: false,
            session: None,
        }
    }

    pub fn mount_dir(&self) -> &Path {
        &self.mount_dir
    }

    /// Path of the open session file
    pub fn session_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    /// Lines appended to the open session (header excluded)
    pub fn records_written(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.records)
    }

    fn check_medium(&self) -> Result<()> {
        let metadata = match fs::metadata(&self.mount_dir) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LoggerError::MediumAbsent(self.mount_dir.display().to_string()));
            }
            Err(e) => {
                return Err(LoggerError::MountFailed(format!(
                    "{}: {}",
                    self.mount_dir.display(),
                    e
                )));
            }
        };

        if !metadata.is_dir() {
            return Err(LoggerError::MountFailed(format!(
                "{} is not a directory",
                self.mount_dir.display()
            )));
        }

        if self.require_mount_point && !is_mount_point(&self.mount_dir, &metadata) {
            return Err(LoggerError::MediumAbsent(format!(
                "nothing mounted on {}",
                self.mount_dir.display()
            )));
        }

        Ok(())
    }

    fn probe_writable(&self) -> Result<()> {
        let probe = self.mount_dir.join(PROBE_FILE_NAME);
        let result = File::create(&probe)
            .and_then(|mut file| file.write_all(b"ok"))
            .and_then(|()| fs::remove_file(&probe));

        result.map_err(|e| {
            LoggerError::MountFailed(format!("{} not writable: {}", self.mount_dir.display(), e))
        })
    }
}

#[cfg(unix)]
fn is_mount_point(dir: &Path, metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Some(parent) = dir.parent() else {
        return true;
    };
    match fs::metadata(parent) {
        Ok(parent_meta) => parent_meta.dev() != metadata.dev(),
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_mount_point(_dir: &Path, _metadata: &fs::Metadata) -> bool {
    true
}

impl RecordStore for FsRecordStore {
    fn mount(&mut self) -> Result<()> {
        self.mounted = false;
        self.check_medium()?;
        self.probe_writable()?;

        self.mounted = true;
        info!("Storage mounted at {}", self.mount_dir.display());
        Ok(())
    }

    fn medium_present(&self) -> bool {
        if !self.mounted || self.check_medium().is_err() {
            return false;
        }
        // The session file vanishing means the medium was swapped underneath us
        self.session.as_ref().map_or(true, |s| s.path.exists())
    }

    fn create_session(&mut self, id: SessionId) -> Result<()> {
        if !self.mounted {
            return Err(LoggerError::CreateFailed("storage not mounted".to_string()));
        }
        self.session = None;

        let path = self.mount_dir.join(session_file_name(id));
        let mut file = match OpenOptions::new().append(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(LoggerError::SessionExists(path));
            }
            Err(e) => {
                return Err(LoggerError::CreateFailed(format!("{}: {}", path.display(), e)));
            }
        };

        if let Err(e) = file
            .write_all(RECORD_HEADER.as_bytes())
            .and_then(|()| file.sync_data())
        {
            drop(file);
            if let Err(remove_err) = fs::remove_file(&path) {
                debug!("Could not remove partial {}: {}", path.display(), remove_err);
            }
            return Err(LoggerError::CreateFailed(format!(
                "header write to {} failed: {}",
                path.display(),
                e
            )));
        }

        info!("Session {} recording to {}", id, path.display());
        self.session = Some(OpenSession {
            id,
            path,
            file,
            records: 0,
        });
        Ok(())
    }

    fn append(&mut self, fix: &Fix) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| LoggerError::AppendFailed("no open session".to_string()))?;
        let line = format_record(fix)
            .ok_or_else(|| LoggerError::AppendFailed("fix is not loggable".to_string()))?;

        session
            .file
            .write_all(line.as_bytes())
            .and_then(|()| session.file.flush())
            .and_then(|()| session.file.sync_data())
            .map_err(|e| LoggerError::AppendFailed(format!("{}: {}", session.path.display(), e)))?;

        session.records += 1;
        debug!("Session {} record {}", session.id, session.records);
        Ok(())
    }

    fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            info!(
                "Closed session {} after {} records",
                session.id, session.records
            );
        }
        self.mounted = false;
    }

    fn abandon_session(&mut self) {
        if let Some(session) = self.session.take() {
            drop(session.file);
            match fs::remove_file(&session.path) {
                Ok(()) => info!("Abandoned session {}", session.id),
                Err(e) => warn!("Could not remove {}: {}", session.path.display(), e),
            }
        }
    }
}
