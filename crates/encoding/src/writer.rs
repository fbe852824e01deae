//! Slice writer
//!
//! Top-level object of the write path. One writer owns one slice file:
//!
//! ```text
//! record ─> [CSV encoder] ─> [Meter] ─> [LimitBuffer] ─> [Compression] ─> [Meter] ─> [LimitBuffer] ─> file
//!                            uncompressed  input                          compressed   file
//! ```
//!
//! The meters and the completed writes counter persist their values into
//! backup files next to the slice file. The [`Syncer`] watches the counters
//! and flushes or syncs the chain; writes optionally wait for the sync
//! covering them before they are reported as completed.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use sluice_config::CompressionType;
use sluice_model::{
    COMPLETED_COUNT_FILE, COMPRESSED_SIZE_FILE, Record, Slice, SliceKey, UNCOMPRESSED_SIZE_FILE,
    Value,
};
use sluice_writer::{
    CompressionWriter, Counter, CounterWithBackup, Events, LimitBuffer, MeterWithBackup,
    MultiError, OutputSink, SizeMeter, WriteChain,
};
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;

use crate::csv::CsvEncoder;
use crate::error::{EncodingError, Result};
use crate::syncer::{StatisticsProvider, SyncChain, Syncer};

/// Writer lifecycle events
pub type WriterEvents = Events<Writer>;

/// Counters observed by the syncer and exposed by the writer
#[derive(Debug, Clone)]
struct WriterStatistics {
    accepted_writes: Counter,
    compressed: SizeMeter,
    uncompressed: SizeMeter,
}

impl StatisticsProvider for WriterStatistics {
    fn accepted_writes(&self) -> u64 {
        self.accepted_writes.count()
    }

    fn uncompressed_size(&self) -> u64 {
        self.uncompressed.get()
    }

    fn compressed_size(&self) -> u64 {
        self.compressed.get()
    }
}

struct Inner {
    slice: Slice,
    dir_path: PathBuf,
    file_path: PathBuf,
    events: Arc<WriterEvents>,
    chain: Arc<WriteChain>,
    encoder: Arc<CsvEncoder>,
    syncer: Syncer,
    statistics: WriterStatistics,
    completed_writes: Arc<CounterWithBackup>,
    closed: AtomicBool,
    /// Writes putting their row into the chain
    encoding: TaskTracker,
    /// Writes waiting for the sync covering their row
    waiting: TaskTracker,
}

/// Writer of one slice file, cheap to clone
#[derive(Clone)]
pub struct Writer {
    inner: Arc<Inner>,
}

struct BuiltChain {
    chain: WriteChain,
    encoder: Arc<CsvEncoder>,
    statistics: WriterStatistics,
}

impl Writer {
    /// Build the chain over `sink`, start the syncer and dispatch the open event
    ///
    /// `dir_path` is the slice directory holding the backup files, it must
    /// exist. The writer's own events are a child of `volume_events`; the open
    /// event is dispatched on `volume_events`, so only volume level listeners
    /// observe it. If a listener fails, the writer is closed again and the
    /// listener errors are returned.
    pub async fn open(
        slice: Slice,
        sink: Arc<dyn OutputSink>,
        dir_path: impl Into<PathBuf>,
        file_path: impl Into<PathBuf>,
        volume_events: &Arc<WriterEvents>,
    ) -> Result<Self> {
        let dir_path = dir_path.into();
        let file_path = file_path.into();
        let interval = slice.encoding.statistics.disk_sync_interval;

        let completed_writes = Arc::new(CounterWithBackup::open(
            dir_path.join(COMPLETED_COUNT_FILE),
            interval,
        )?);

        let built = match build_chain(&slice, sink, &dir_path) {
            Ok(built) => built,
            Err(err) => {
                let _ = completed_writes.close();
                return Err(err);
            }
        };
        let chain = Arc::new(built.chain);

        let syncer = match Syncer::new(
            slice.encoding.sync.clone(),
            Arc::clone(&chain) as Arc<dyn SyncChain>,
            Arc::new(built.statistics.clone()),
        ) {
            Ok(syncer) => syncer,
            Err(err) => {
                let _ = chain.close();
                let _ = completed_writes.close();
                return Err(err);
            }
        };

        let writer = Self {
            inner: Arc::new(Inner {
                dir_path,
                file_path,
                events: volume_events.clone_child(),
                chain,
                encoder: built.encoder,
                syncer,
                statistics: built.statistics,
                completed_writes,
                closed: AtomicBool::new(false),
                encoding: TaskTracker::new(),
                waiting: TaskTracker::new(),
                slice,
            }),
        };

        if let Err(err) = volume_events.dispatch_on_open(&writer) {
            writer.inner.closed.store(true, Ordering::SeqCst);
            if let Err(close_err) = writer.release().await {
                tracing::error!(slice = %writer.slice_key(), error = %close_err, "cannot close writer after failed open");
            }
            return Err(err.into());
        }

        tracing::debug!(slice = %writer.slice_key(), path = %writer.file_path().display(), "opened slice writer");
        Ok(writer)
    }

    /// Render the record by the slice columns and write it
    ///
    /// If sync waiting is enabled, returns once the write is synced.
    pub async fn write_record(&self, record: &dyn Record) -> Result<()> {
        let encoding = self.inner.encoding.token();
        if self.is_closed() {
            return Err(EncodingError::Closed);
        }

        self.inner.encoder.write_record(record).await?;
        self.complete_write(encoding, record.timestamp()).await
    }

    /// Write already rendered values, one per column
    pub async fn write_row(&self, timestamp: DateTime<Utc>, values: &[Value]) -> Result<()> {
        let encoding = self.inner.encoding.token();
        if self.is_closed() {
            return Err(EncodingError::Closed);
        }

        let expected = self.inner.slice.columns.len();
        if values.len() != expected {
            return Err(EncodingError::ColumnCount {
                expected,
                given: values.len(),
            });
        }

        self.inner.encoder.write_row(values).await?;
        self.complete_write(encoding, timestamp).await
    }

    async fn complete_write(
        &self,
        encoding: TaskTrackerToken,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        // Obtained after the row is in the chain, the sync covers it
        let notifier = self.inner.syncer.notifier();

        self.inner.statistics.accepted_writes.add(timestamp, 1);

        // Close stops the syncer only after the encoding phase is over
        let _waiting = self.inner.waiting.token();
        drop(encoding);

        if let Some(notifier) = notifier {
            notifier.wait().await?;
        }

        self.inner.completed_writes.add(timestamp, 1);
        Ok(())
    }

    /// Stop the syncer, close the chain and dispatch the close event
    ///
    /// The last sync runs before the chain is closed, so no accepted write
    /// is lost. All failures are collected.
    pub async fn close(&self) -> Result<()> {
        tracing::debug!(slice = %self.slice_key(), "closing slice writer");
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Err(EncodingError::AlreadyClosed);
        }

        let mut errs = MultiError::new();
        if let Err(err) = self.release().await {
            errs.push(err);
        }

        let close_err = (!errs.is_empty()).then_some(&errs as &(dyn Error + 'static));
        let dispatched = self.inner.events.dispatch_on_close(self, close_err);
        errs.check(dispatched);

        tracing::debug!(slice = %self.slice_key(), "closed slice writer");
        errs.into_result().map_err(EncodingError::from)
    }

    /// Wait for rows being encoded, stop the syncer, wait for writes waiting
    /// for the last sync, then close the chain and the completed writes counter
    async fn release(&self) -> std::result::Result<(), MultiError> {
        let inner = &self.inner;
        let mut errs = MultiError::new();

        // No row enters the chain after the last sync
        inner.encoding.close();
        inner.encoding.wait().await;

        errs.check(inner.syncer.stop().await);

        // The last sync resolved every notifier
        inner.waiting.close();
        inner.waiting.wait().await;

        let chain = Arc::clone(&inner.chain);
        match tokio::task::spawn_blocking(move || chain.close()).await {
            Ok(result) => errs.check(result),
            Err(err) => errs.push(io::Error::other(err)),
        }

        errs.check(inner.completed_writes.close());
        errs.into_result()
    }

    /// Whether the writer accepts writes
    pub fn is_ready(&self) -> bool {
        !self.is_closed() && self.inner.chain.is_ready()
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Slice written by the writer
    pub fn slice(&self) -> &Slice {
        &self.inner.slice
    }

    /// Key of the slice
    pub fn slice_key(&self) -> &SliceKey {
        &self.inner.slice.key
    }

    /// Slice directory with the data and backup files
    pub fn dir_path(&self) -> &Path {
        &self.inner.dir_path
    }

    /// Slice data file
    pub fn file_path(&self) -> &Path {
        &self.inner.file_path
    }

    /// Writer level events, a child of the volume events
    pub fn events(&self) -> &Arc<WriterEvents> {
        &self.inner.events
    }

    /// Writes accepted so far, synced or not
    pub fn accepted_writes(&self) -> u64 {
        self.inner.statistics.accepted_writes.count()
    }

    /// Writes written and synced, including values loaded from the backup
    pub fn completed_writes(&self) -> u64 {
        self.inner.completed_writes.count()
    }

    /// Timestamp of the oldest completed record
    pub fn first_record_at(&self) -> Option<DateTime<Utc>> {
        self.inner.completed_writes.first_at()
    }

    /// Timestamp of the newest completed record
    pub fn last_record_at(&self) -> Option<DateTime<Utc>> {
        self.inner.completed_writes.last_at()
    }

    /// Bytes written to the file, measured after compression
    pub fn compressed_size(&self) -> u64 {
        self.inner.statistics.compressed.get()
    }

    /// Bytes written to the file, measured before compression
    pub fn uncompressed_size(&self) -> u64 {
        self.inner.statistics.uncompressed.get()
    }

    /// Syncer of the writer
    pub fn syncer(&self) -> &Syncer {
        &self.inner.syncer
    }

    /// Stages, flushers and closers of the chain
    pub fn dump(&self) -> String {
        self.inner.chain.dump()
    }
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("slice", &self.slice_key().to_string())
            .field("file_path", &self.inner.file_path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn build_chain(slice: &Slice, sink: Arc<dyn OutputSink>, dir_path: &Path) -> Result<BuiltChain> {
    let mut chain = WriteChain::new(sink);
    match add_stages(&mut chain, slice, dir_path) {
        Ok((encoder, statistics)) => Ok(BuiltChain {
            chain,
            encoder,
            statistics,
        }),
        Err(err) => {
            if let Err(close_err) = chain.close() {
                tracing::error!(error = %close_err, "cannot close chain after failed open");
            }
            Err(err)
        }
    }
}

fn add_stages(
    chain: &mut WriteChain,
    slice: &Slice,
    dir_path: &Path,
) -> Result<(Arc<CsvEncoder>, WriterStatistics)> {
    let config = &slice.encoding;
    let interval = config.statistics.disk_sync_interval;

    // Buffer in front of the file
    if config.file_buffer > 0 {
        let size = config.file_buffer as usize;
        chain.prepend_writer(|w| Some(LimitBuffer::new(w, size)));
    }

    // Size after compression
    let mut compressed = SizeMeter::default();
    chain.prepend_writer_or_err(|w| {
        let meter = MeterWithBackup::open(w, dir_path.join(COMPRESSED_SIZE_FILE), interval)?;
        compressed = meter.meter();
        Ok::<_, EncodingError>(Some(meter))
    })?;

    let uncompressed = if config.compression.kind == CompressionType::None {
        // Same bytes, same meter
        compressed.clone()
    } else {
        chain.prepend_writer_or_err(|w| CompressionWriter::new(w, &config.compression))?;

        if config.input_buffer > 0 && !config.compression.has_writer_input_buffer() {
            let size = config.input_buffer as usize;
            chain.prepend_writer(|w| Some(LimitBuffer::new(w, size)));
        }

        let mut uncompressed = SizeMeter::default();
        chain.prepend_writer_or_err(|w| {
            let meter = MeterWithBackup::open(w, dir_path.join(UNCOMPRESSED_SIZE_FILE), interval)?;
            uncompressed = meter.meter();
            Ok::<_, EncodingError>(Some(meter))
        })?;
        uncompressed
    };

    let encoder = Arc::new(CsvEncoder::new(
        config.encoder.concurrency(),
        config.encoder.row_size_limit,
        slice.columns.clone(),
        chain.head(),
    ));
    // Encoder is flushed and closed first
    chain.prepend_flusher_closer(Arc::clone(&encoder));

    let statistics = WriterStatistics {
        accepted_writes: Counter::new(),
        compressed,
        uncompressed,
    };
    Ok((encoder, statistics))
}

#[cfg(test)]
#[path = "writer_test.rs"]
mod writer_test;
