//! Sluice - Encoding
//!
//! Turns records into CSV rows and drives them through a write chain into a
//! slice file.
//!
//! # Modules
//!
//! - **csv**: [`CsvEncoder`], quoted CSV rows with a size limit
//! - **syncer**: [`Syncer`], flush/sync policy driven by write statistics
//! - **notify**: [`Notifier`], completion of one sync shared by many writes
//! - **writer**: [`Writer`], the per-slice pipeline and its lifecycle

pub mod csv;
pub mod error;
pub mod notify;
pub mod syncer;
pub mod writer;

pub use csv::CsvEncoder;
pub use error::{EncodingError, Result, SyncError};
pub use notify::Notifier;
pub use syncer::{StatisticsProvider, SyncChain, Syncer};
pub use writer::{Writer, WriterEvents};
