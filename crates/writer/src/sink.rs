//! Output sinks at the end of a write chain
//!
//! The chain only needs the five verbs of [`OutputSink`]. The local file
//! sink is the default; a network transport to a remote disk writer can
//! implement the same trait.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

/// Destination of the encoded bytes
pub trait OutputSink: Send + Sync {
    /// Whether the sink currently accepts writes
    fn is_ready(&self) -> bool;

    /// Write bytes, returns the number of bytes accepted
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Push any transport buffers towards the destination
    fn flush(&self) -> io::Result<()>;

    /// Make written data durable
    fn sync(&self) -> io::Result<()>;

    /// Release the sink, no further writes are accepted
    fn close(&self) -> io::Result<()>;
}

/// Append-only local file
///
/// Writes and syncs share the file, only close takes it exclusively, so a
/// running `sync_data` does not block writes.
#[derive(Debug)]
pub struct LocalFile {
    path: PathBuf,
    file: RwLock<Option<File>>,
}

impl LocalFile {
    /// Open the file for appending, creating it if missing
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self::from_file(path, file))
    }

    /// Wrap an already opened file
    pub fn from_file(path: PathBuf, file: File) -> Self {
        Self {
            path,
            file: RwLock::new(Some(file)),
        }
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` with the open file
    ///
    /// Used for operations outside the write path, e.g. disk allocation.
    pub fn with_file<R>(&self, f: impl FnOnce(&File) -> io::Result<R>) -> io::Result<R> {
        match self.file.read().as_ref() {
            Some(file) => f(file),
            None => Err(closed_error()),
        }
    }
}

impl OutputSink for LocalFile {
    fn is_ready(&self) -> bool {
        self.file.read().is_some()
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        match self.file.read().as_ref() {
            Some(mut file) => file.write(buf),
            None => Err(closed_error()),
        }
    }

    fn flush(&self) -> io::Result<()> {
        // Writes go straight to the OS, nothing is buffered here
        Ok(())
    }

    fn sync(&self) -> io::Result<()> {
        self.with_file(|file| file.sync_data())
    }

    fn close(&self) -> io::Result<()> {
        match self.file.write().take() {
            Some(file) => {
                drop(file);
                Ok(())
            }
            None => Err(closed_error()),
        }
    }
}

fn closed_error() -> io::Error {
    io::Error::other("file is already closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.csv");

        let file = LocalFile::open(&path).unwrap();
        assert!(file.is_ready());
        assert_eq!(file.write(b"foo\n").unwrap(), 4);
        file.sync().unwrap();
        file.close().unwrap();
        assert!(!file.is_ready());

        let file = LocalFile::open(&path).unwrap();
        file.write(b"bar\n").unwrap();
        file.close().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "foo\nbar\n");
    }

    #[test]
    fn test_write_during_sync() {
        use std::sync::mpsc;
        use std::time::Duration;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.csv");
        let file = std::sync::Arc::new(LocalFile::open(&path).unwrap());

        let (started_tx, started_rx) = mpsc::channel();
        let (written_tx, written_rx) = mpsc::channel::<()>();
        let syncing = {
            let file = std::sync::Arc::clone(&file);
            std::thread::spawn(move || {
                // Holds the file like a long sync_data
                file.with_file(|f| {
                    started_tx.send(()).unwrap();
                    written_rx
                        .recv_timeout(Duration::from_secs(5))
                        .map_err(io::Error::other)?;
                    f.sync_data()
                })
            })
        };

        started_rx.recv().unwrap();
        file.write(b"foo\n").unwrap();
        written_tx.send(()).unwrap();

        syncing.join().unwrap().unwrap();
        file.close().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "foo\n");
    }

    #[test]
    fn test_closed_file_errors() {
        let dir = TempDir::new().unwrap();
        let file = LocalFile::open(dir.path().join("file")).unwrap();
        file.close().unwrap();

        assert_eq!(file.write(b"x").unwrap_err().to_string(), "file is already closed");
        assert!(file.sync().is_err());
        assert!(file.close().is_err());
    }
}
