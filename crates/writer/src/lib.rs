//! Sluice - Writer
//!
//! Byte-level building blocks of the local write path.
//!
//! # Architecture
//!
//! A [`WriteChain`] is built from the sink outwards. Each prepended stage
//! wraps the current head, so bytes written to the chain pass every stage
//! before reaching the sink:
//!
//! ```text
//! write ─> [Meter] ─> [LimitBuffer] ─> [Compression] ─> [Meter] ─> [LimitBuffer] ─> [Sink]
//!           uncompressed   input                          compressed   file
//! ```
//!
//! Stages that buffer data are flushed by the chain, stages that must be
//! finalized are closed by the chain, outermost first.
//!
//! # Modules
//!
//! - **chain**: [`WriteChain`] and the [`Stage`] trait
//! - **limitbuffer**: bounded accumulation buffer
//! - **meter** / **counter**: byte and record statistics with backup files
//! - **compression**: gzip (standard, fast, parallel) and zstd stages
//! - **events**: hierarchical open/close callbacks
//! - **sink**: output sink trait and the local file sink

pub mod backup;
pub mod chain;
pub mod compression;
pub mod counter;
pub mod error;
pub mod events;
pub mod limitbuffer;
pub mod meter;
pub mod sink;

pub use backup::{BackupError, BackupFile};
pub use chain::{ChainError, FlusherCloser, Stage, StageWriter, WriteChain};
pub use compression::CompressionWriter;
pub use counter::{Counter, CounterWithBackup};
pub use error::{BoxError, MultiError};
pub use events::Events;
pub use limitbuffer::LimitBuffer;
pub use meter::{Meter, MeterWithBackup, SizeMeter};
pub use sink::{LocalFile, OutputSink};
