//! Binary status output backends

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// A single binary output
pub trait StatusLed: Send {
    /// Drive the output on or off
    fn set(&mut self, on: bool) -> io::Result<()>;
}

impl<L: StatusLed + ?Sized> StatusLed for Box<L> {
    fn set(&mut self, on: bool) -> io::Result<()> {
        (**self).set(on)
    }
}

/// LED exposed through the Linux LED class (`/sys/class/leds/<name>`)
///
/// On creation the kernel trigger is switched to `none` so that the logger
/// owns the brightness.
#[derive(Debug)]
pub struct SysfsLed {
    brightness: PathBuf,
}

impl SysfsLed {
    /// Take over the LED at `dir` (e.g. `/sys/class/leds/ACT`)
    pub fn open<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref();
        let brightness = dir.join("brightness");
        if !brightness.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no LED at {}", dir.display()),
            ));
        }

        if let Err(e) = fs::write(dir.join("trigger"), "none") {
            debug!("Could not clear LED trigger at {}: {}", dir.display(), e);
        }
        info!("Status LED at {}", dir.display());

        Ok(Self { brightness })
    }
}

impl StatusLed for SysfsLed {
    fn set(&mut self, on: bool) -> io::Result<()> {
        fs::write(&self.brightness, if on { "1" } else { "0" })
    }
}

/// Output that goes nowhere (no LED fitted)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLed;

impl StatusLed for NullLed {
    fn set(&mut self, _on: bool) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock LED recording every level written
    #[derive(Clone, Default)]
    pub struct MockLed {
        pub writes: Arc<Mutex<Vec<bool>>>,
        pub write_error: Arc<Mutex<Option<io::ErrorKind>>>,
    }

    impl MockLed {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn writes(&self) -> Vec<bool> {
            self.writes.lock().unwrap().clone()
        }

        pub fn last(&self) -> Option<bool> {
            self.writes.lock().unwrap().last().copied()
        }

        pub fn set_write_error(&self, error: io::ErrorKind) {
            *self.write_error.lock().unwrap() = Some(error);
        }
    }

    impl StatusLed for MockLed {
        fn set(&mut self, on: bool) -> io::Result<()> {
            if let Some(error) = *self.write_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock LED error"));
            }
            self.writes.lock().unwrap().push(on);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sysfs_led_writes_brightness() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("brightness"), "0").unwrap();
        fs::write(dir.path().join("trigger"), "mmc0").unwrap();

        let mut led = SysfsLed::open(dir.path()).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("trigger")).unwrap(), "none");

        led.set(true).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("brightness")).unwrap(), "1");

        led.set(false).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("brightness")).unwrap(), "0");
    }

    #[test]
    fn test_sysfs_led_missing() {
        let dir = TempDir::new().unwrap();
        let err = SysfsLed::open(dir.path().join("led0")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_null_led() {
        let mut led = NullLed;
        assert!(led.set(true).is_ok());
        assert!(led.set(false).is_ok());
    }

    #[test]
    fn test_boxed_led_forwards() {
        let probe = mocks::MockLed::new();
        let mut led: Box<dyn StatusLed> = Box::new(probe.clone());
        led.set(true).unwrap();
        assert_eq!(probe.writes(), vec![true]);
    }
}
