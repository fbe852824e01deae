//! Volume error types

use std::io;
use std::path::PathBuf;

use sluice_encoding::EncodingError;
use sluice_model::VolumeId;
use sluice_writer::MultiError;
use thiserror::Error;

/// Volume and writer lifecycle errors
#[derive(Debug, Error)]
pub enum VolumeError {
    /// Volume ID file cannot be read or created
    #[error("cannot open volume ID file \"{}\": {source}", .path.display())]
    IdFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Another process holds the volume
    #[error("cannot acquire writer lock \"{}\": already locked", .path.display())]
    Locked { path: PathBuf },

    /// Lock file cannot be created
    #[error("cannot acquire writer lock \"{}\": {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Open writer after the volume was closed
    #[error("volume \"{0}\" is closed")]
    Closed(VolumeId),

    /// Open writer on a drained volume
    #[error("volume is drained")]
    Drained,

    /// A writer for the slice is open or being opened
    #[error("writer already exists")]
    WriterExists,

    /// Slice directory or file cannot be created
    #[error("cannot open slice file \"{}\": {source}", .path.display())]
    SliceFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writer construction failed
    #[error(transparent)]
    Writer(#[from] EncodingError),

    /// Several steps of the volume close failed
    #[error(transparent)]
    Multi(#[from] MultiError),

    /// Writer failed to close during the volume close
    #[error("cannot close writer for slice \"{key}\": {source}")]
    CloseWriter {
        key: String,
        #[source]
        source: EncodingError,
    },

    /// Lock file cannot be removed on close
    #[error("cannot remove writer lock \"{}\": {source}", .path.display())]
    RemoveLock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for volume operations
pub type Result<T> = std::result::Result<T, VolumeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_messages() {
        assert_eq!(
            VolumeError::Closed(VolumeId::new("my-volume")).to_string(),
            "volume \"my-volume\" is closed"
        );
        assert_eq!(VolumeError::Drained.to_string(), "volume is drained");
        assert_eq!(VolumeError::WriterExists.to_string(), "writer already exists");
    }

    #[test]
    fn test_lock_message() {
        let err = VolumeError::Locked {
            path: PathBuf::from("/data/writer.lock"),
        };
        assert_eq!(
            err.to_string(),
            "cannot acquire writer lock \"/data/writer.lock\": already locked"
        );
    }
}
