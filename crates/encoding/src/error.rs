//! Encoding error types

use std::io;
use std::sync::Arc;

use sluice_model::ModelError;
use sluice_writer::{BackupError, ChainError, MultiError};
use thiserror::Error;

/// Failure of one sync operation, shared by every write waiting for it
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Chain flush or sync failed
    #[error(transparent)]
    Chain(Arc<ChainError>),

    /// Sync task panicked or was cancelled
    #[error("sync task failed: {0}")]
    Task(String),
}

/// Encoding and writer errors
#[derive(Debug, Error)]
pub enum EncodingError {
    /// Write after close
    #[error("writer is closed")]
    Closed,

    /// Close called twice
    #[error("writer is already closed")]
    AlreadyClosed,

    /// Stop called twice
    #[error("syncer is already stopped")]
    SyncerStopped,

    /// Number of values does not match the columns
    #[error("expected {expected} columns in the row, given {given}")]
    ColumnCount { expected: usize, given: usize },

    /// Formatted row exceeds the configured limit
    #[error("too big CSV row, column: \"{column}\", row limit: {}", sluice_config::format_bytes(*.limit))]
    RowTooBig { column: String, limit: u64 },

    /// Column cannot be rendered from the record
    #[error("cannot convert value of the column \"{column}\" to the string: {source}")]
    Column {
        column: String,
        #[source]
        source: ModelError,
    },

    /// Chain or file I/O failed
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Chain operation failed
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Statistics backup failed
    #[error(transparent)]
    Backup(#[from] BackupError),

    /// Sync failed, reported to writes waiting for it
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Several steps failed, e.g. during close, or event listeners failed
    #[error(transparent)]
    Multi(#[from] MultiError),

    /// Writer needs a running tokio runtime
    #[error("writer requires a tokio runtime")]
    NoRuntime,
}

/// Result type for encoding operations
pub type Result<T> = std::result::Result<T, EncodingError>;
