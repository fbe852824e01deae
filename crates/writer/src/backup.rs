//! Backup files of in-memory statistics
//!
//! A backup file holds one short text value (a byte size, a record count).
//! It is overwritten in place, periodically and on close, so a reopened
//! slice continues from the last persisted value.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Backup file errors
#[derive(Debug, Error)]
pub enum BackupError {
    /// Backup file cannot be opened or read
    #[error("cannot open backup file \"{path}\": {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Backup file content cannot be parsed
    #[error("content \"{content}\" of the backup file is not valid: {reason}")]
    Invalid { content: String, reason: String },

    /// Backup cannot be written
    #[error("cannot write backup file \"{path}\": {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Backup file cannot be synced and closed
    #[error("cannot close backup file \"{path}\": {source}")]
    Close {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Periodic backup needs a running tokio runtime
    #[error("periodic backup requires a tokio runtime")]
    NoRuntime,
}

impl BackupError {
    pub(crate) fn invalid(content: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            content: content.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Small file rewritten in place
#[derive(Debug)]
pub struct BackupFile {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl BackupFile {
    /// Open or create the file, returns it with its current trimmed content
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, String), BackupError> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| BackupError::Open {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(open_err)?;

        let mut content = String::new();
        file.read_to_string(&mut content).map_err(open_err)?;
        let content = content.trim().to_owned();

        Ok((
            Self {
                path,
                file: Mutex::new(Some(file)),
            },
            content,
        ))
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the file content from the beginning
    pub fn write(&self, content: &str) -> Result<(), BackupError> {
        self.write_with(|| content.to_owned())
    }

    /// Like [`write`](Self::write), the content is produced under the file
    /// lock, so concurrent backups are written in the order they read the value
    pub fn write_with(&self, content: impl FnOnce() -> String) -> Result<(), BackupError> {
        let mut guard = self.file.lock();
        let file = guard.as_mut().ok_or_else(|| BackupError::Write {
            path: self.path.clone(),
            source: io::Error::other("file is already closed"),
        })?;

        let content = content();
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.write_all(content.as_bytes()))
            .and_then(|_| file.set_len(content.len() as u64))
            .map_err(|source| BackupError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Sync and release the file
    pub fn close(&self) -> Result<(), BackupError> {
        let Some(file) = self.file.lock().take() else {
            return Ok(());
        };
        file.sync_all().map_err(|source| BackupError::Close {
            path: self.path.clone(),
            source,
        })
    }
}

/// Task running a backup function at a fixed interval
#[derive(Debug)]
pub(crate) struct PeriodicBackup {
    cancel: CancellationToken,
    /// Held while a backup runs
    running: Arc<Mutex<()>>,
    handle: JoinHandle<()>,
}

impl PeriodicBackup {
    /// Start the task, `None` if `interval` is zero
    pub(crate) fn start<F>(
        name: &'static str,
        interval: Duration,
        backup: F,
    ) -> Result<Option<Self>, BackupError>
    where
        F: Fn() -> Result<(), BackupError> + Send + 'static,
    {
        if interval.is_zero() {
            return Ok(None);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BackupError::NoRuntime)?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let running = Arc::new(Mutex::new(()));
        let task_running = Arc::clone(&running);
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let _running = task_running.lock();
                        if token.is_cancelled() {
                            break;
                        }
                        if let Err(err) = backup() {
                            tracing::error!(backup = name, error = %err, "cannot backup statistics");
                        }
                    }
                }
            }
        });

        Ok(Some(Self {
            cancel,
            running,
            handle,
        }))
    }

    /// Stop the task and wait for an in-progress backup
    ///
    /// No backup starts after `stop` returns. Usable outside of the runtime,
    /// chain stages are closed on blocking threads.
    pub(crate) fn stop(self) {
        self.cancel.cancel();
        drop(self.running.lock());
        drop(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let (file, content) = BackupFile::open(dir.path().join("size")).unwrap();
        assert_eq!(content, "");
        file.close().unwrap();
        assert!(dir.path().join("size").exists());
    }

    #[test]
    fn test_write_overwrites_from_start() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("size");

        let (file, _) = BackupFile::open(&path).unwrap();
        file.write("9").unwrap();
        file.write("10").unwrap();
        file.close().unwrap();

        let (_, content) = BackupFile::open(&path).unwrap();
        assert_eq!(content, "10");
    }

    #[test]
    fn test_write_after_close_fails() {
        let dir = TempDir::new().unwrap();
        let (file, _) = BackupFile::open(dir.path().join("size")).unwrap();
        file.close().unwrap();
        assert!(matches!(file.write("1"), Err(BackupError::Write { .. })));
    }

    #[test]
    fn test_periodic_backup_requires_runtime() {
        let result = PeriodicBackup::start("test", Duration::from_millis(10), || Ok(()));
        assert!(matches!(result, Err(BackupError::NoRuntime)));
    }

    #[test]
    fn test_zero_interval_disables_task() {
        let task = PeriodicBackup::start("test", Duration::ZERO, || Ok(())).unwrap();
        assert!(task.is_none());
    }

    #[tokio::test]
    async fn test_periodic_backup_runs_until_stopped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let task = PeriodicBackup::start("test", Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap()
        .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        task.stop();
        let after_stop = calls.load(Ordering::SeqCst);
        assert!(after_stop >= 2);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_waits_for_running_backup() {
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let (s, f) = (Arc::clone(&started), Arc::clone(&finished));
        let task = PeriodicBackup::start("test", Duration::from_millis(5), move || {
            s.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            f.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap()
        .unwrap();

        while started.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        task.stop();
        assert_eq!(
            finished.load(Ordering::SeqCst),
            started.load(Ordering::SeqCst)
        );
    }

    #[test]
    fn test_write_with_shorter_content_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("size");

        let (file, _) = BackupFile::open(&path).unwrap();
        file.write("10").unwrap();
        file.write_with(|| "9".to_owned()).unwrap();
        file.close().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "9");
    }
}
