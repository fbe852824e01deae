//! Byte meters
//!
//! A [`Meter`] is a passive stage counting the bytes that pass through it.
//! [`MeterWithBackup`] additionally persists the value into a backup file,
//! so the size of a reopened slice continues from the stored value.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::backup::{BackupError, BackupFile, PeriodicBackup};
use crate::chain::Stage;

/// Shared read handle of a meter value
#[derive(Debug, Clone, Default)]
pub struct SizeMeter(Arc<AtomicU64>);

impl SizeMeter {
    /// Create a meter starting at `initial`
    pub fn new(initial: u64) -> Self {
        Self(Arc::new(AtomicU64::new(initial)))
    }

    /// Bytes counted so far
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }
}

/// Passive stage counting successfully written bytes
pub struct Meter<W: Write> {
    inner: W,
    size: SizeMeter,
}

impl<W: Write> Meter<W> {
    /// Count bytes written to `inner`, starting at zero
    pub fn new(inner: W) -> Self {
        Self::with_meter(inner, SizeMeter::default())
    }

    fn with_meter(inner: W, size: SizeMeter) -> Self {
        Self { inner, size }
    }

    /// Read handle of the counted size
    pub fn meter(&self) -> SizeMeter {
        self.size.clone()
    }

    /// Bytes counted so far
    pub fn size(&self) -> u64 {
        self.size.get()
    }
}

impl<W: Write> Write for Meter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.size.add(n as u64);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> fmt::Debug for Meter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meter").field("size", &self.size()).finish()
    }
}

impl<W: Write + Send + 'static> Stage for Meter<W> {
    fn name(&self) -> &'static str {
        "meter"
    }
}

/// Meter whose value is persisted in a backup file
pub struct MeterWithBackup<W: Write> {
    meter: Meter<W>,
    backup: Arc<BackupFile>,
    task: Mutex<Option<PeriodicBackup>>,
}

impl<W: Write> MeterWithBackup<W> {
    /// Open the backup file, load its value and start the periodic backup
    ///
    /// A zero `interval` disables the periodic backup, the value is still
    /// persisted on [`sync_backup`](Self::sync_backup) and on close.
    pub fn open(inner: W, path: impl AsRef<Path>, interval: Duration) -> Result<Self, BackupError> {
        let (backup, content) = BackupFile::open(path)?;
        let initial = parse_size(&content)?;

        let size = SizeMeter::new(initial);
        let backup = Arc::new(backup);

        let task = {
            let size = size.clone();
            let backup = Arc::clone(&backup);
            PeriodicBackup::start("meter", interval, move || {
                backup.write_with(|| size.get().to_string())
            })?
        };

        Ok(Self {
            meter: Meter::with_meter(inner, size),
            backup,
            task: Mutex::new(task),
        })
    }

    /// Read handle of the counted size
    pub fn meter(&self) -> SizeMeter {
        self.meter.meter()
    }

    /// Bytes counted so far, including the loaded value
    pub fn size(&self) -> u64 {
        self.meter.size()
    }

    /// Write the current value to the backup file
    pub fn sync_backup(&self) -> Result<(), BackupError> {
        self.backup.write_with(|| self.size().to_string())
    }

    fn close_backup(&self) -> Result<(), BackupError> {
        if let Some(task) = self.task.lock().take() {
            task.stop();
        }
        self.sync_backup()?;
        self.backup.close()
    }
}

impl<W: Write> Write for MeterWithBackup<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.meter.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.meter.flush()
    }
}

impl<W: Write> fmt::Debug for MeterWithBackup<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeterWithBackup")
            .field("size", &self.size())
            .field("backup", &self.backup.path())
            .finish()
    }
}

impl<W: Write + Send + 'static> Stage for MeterWithBackup<W> {
    fn name(&self) -> &'static str {
        "meter-with-backup"
    }

    fn is_closer(&self) -> bool {
        true
    }

    fn close(&mut self) -> io::Result<()> {
        self.close_backup().map_err(io::Error::other)
    }
}

fn parse_size(content: &str) -> Result<u64, BackupError> {
    if content.is_empty() {
        return Ok(0);
    }
    content
        .parse()
        .map_err(|_| BackupError::invalid(content, format!("invalid size \"{}\"", content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_meter_counts_written_bytes() {
        let mut meter = Meter::new(Vec::new());
        meter.write_all(b"foo").unwrap();
        meter.write_all(b"barbaz").unwrap();
        assert_eq!(meter.size(), 9);
        assert_eq!(meter.meter().get(), 9);
    }

    struct Failing;

    impl Write for Failing {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("some error"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_meter_ignores_failed_writes() {
        let mut meter = Meter::new(Failing);
        assert!(meter.write(b"foo").is_err());
        assert_eq!(meter.size(), 0);
    }

    #[tokio::test]
    async fn test_meter_with_backup_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("compressed_size");

        let mut meter = MeterWithBackup::open(Vec::new(), &path, Duration::ZERO).unwrap();
        meter.write_all(b"foobar").unwrap();
        meter.sync_backup().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "6");

        meter.write_all(b"abcd").unwrap();
        Stage::close(&mut meter).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "10");

        let meter = MeterWithBackup::open(Vec::new(), &path, Duration::ZERO).unwrap();
        assert_eq!(meter.size(), 10);
    }

    #[tokio::test]
    async fn test_meter_with_backup_periodic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("size");

        let mut meter = MeterWithBackup::open(Vec::new(), &path, Duration::from_millis(5)).unwrap();
        meter.write_all(b"foobar").unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "6");

        Stage::close(&mut meter).unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_meter_with_backup_close_during_periodic_backup() {
        let dir = TempDir::new().unwrap();

        for i in 0..20 {
            let path = dir.path().join(format!("size-{i}"));
            let mut meter =
                MeterWithBackup::open(Vec::new(), &path, Duration::from_millis(1)).unwrap();
            for _ in 0..9 {
                meter.write_all(b"x").unwrap();
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            meter.write_all(b"x").unwrap();
            Stage::close(&mut meter).unwrap();

            // A late periodic backup never overwrites the final value
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert_eq!(std::fs::read_to_string(&path).unwrap(), "10");
        }
    }

    #[test]
    fn test_meter_with_backup_invalid_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("size");
        std::fs::write(&path, "foo").unwrap();

        let err = MeterWithBackup::open(Vec::new(), &path, Duration::ZERO).unwrap_err();
        assert_eq!(
            err.to_string(),
            "content \"foo\" of the backup file is not valid: invalid size \"foo\""
        );
    }
}
