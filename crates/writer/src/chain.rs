//! Write chain
//!
//! A chain of writers at the end of which is an [`OutputSink`].
//!
//! - Stages are added with [`WriteChain::prepend_writer`] /
//!   [`WriteChain::prepend_writer_or_err`]; the new stage wraps the current
//!   head and becomes the new head.
//! - A stage reporting [`Stage::is_flusher`] is flushed by
//!   [`WriteChain::flush`]. A stage reporting [`Stage::is_closer`] is closed
//!   by [`WriteChain::close`]; a flush-only stage is flushed on close instead,
//!   so buffered data is never dropped.
//! - Callbacks outside the byte path (encoders, statistics backups) are
//!   registered with the `append_*` / `prepend_*` methods.
//!
//! Every stage sits behind its own lock. A periodic flush and a concurrent
//! write therefore never interleave inside one stage.
//!
//! # Example
//!
//! ```ignore
//! let mut chain = WriteChain::new(sink);
//! chain.prepend_writer(|w| Some(LimitBuffer::new(w, 64 * 1024)));
//! chain.write(b"foo,bar\n")?;
//! chain.sync()?;
//! chain.close()?;
//! ```

use std::convert::Infallible;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::error::{BoxError, MultiError};
use crate::sink::OutputSink;

/// A writer that can be placed into a [`WriteChain`]
pub trait Stage: Write + Send + 'static {
    /// Name used in the chain dump and error messages
    fn name(&self) -> &'static str;

    /// Stage buffers data that the chain must flush
    fn is_flusher(&self) -> bool {
        false
    }

    /// Stage must be finalized when the chain is closed
    fn is_closer(&self) -> bool {
        false
    }

    /// Finalize the stage, called once by [`WriteChain::close`]
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// Resource outside the byte path flushed and closed with the chain
pub trait FlusherCloser: Send + Sync + 'static {
    /// Name used in the chain dump and error messages
    fn name(&self) -> &str;

    /// Flush internal buffers into the chain
    fn flush(&self) -> Result<(), BoxError>;

    /// Flush and release the resource
    fn close(&self) -> Result<(), BoxError>;
}

/// Shared handle to one stage, the inner writer of the next stage
///
/// Writes lock the stage for the whole buffer. `flush` is a no-op: each
/// stage is flushed by the chain itself, outermost first.
#[derive(Clone)]
pub struct StageWriter {
    name: &'static str,
    inner: Arc<Mutex<dyn Write + Send>>,
}

impl StageWriter {
    fn new(name: &'static str, inner: Arc<Mutex<dyn Write + Send>>) -> Self {
        Self { name, inner }
    }

    /// Name of the stage
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Write the whole buffer under the stage lock
    pub fn write_locked(&self, buf: &[u8]) -> io::Result<()> {
        self.inner.lock().write_all(buf)
    }
}

impl Write for StageWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_locked(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for StageWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageWriter").field("name", &self.name).finish()
    }
}

/// Adapts the sink to `io::Write` for the innermost stage
struct SinkWriter(Arc<dyn OutputSink>);

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

type HookFn = dyn Fn() -> Result<(), BoxError> + Send + Sync;

struct Hook {
    info: String,
    run: Arc<HookFn>,
}

impl Hook {
    fn new(info: impl Into<String>, run: Arc<HookFn>) -> Self {
        Self {
            info: info.into(),
            run,
        }
    }
}

/// Failure of one flusher or closer
#[derive(Debug, Error)]
#[error("cannot {op} \"{stage}\": {source}")]
pub struct StageError {
    op: &'static str,
    stage: String,
    #[source]
    source: BoxError,
}

/// Chain operation errors, each aggregating every failed step
#[derive(Debug, Error)]
pub enum ChainError {
    /// One or more flushers failed
    #[error("{}", .0.prefixed("chain flush error"))]
    Flush(MultiError),

    /// Flush or sink sync failed
    #[error("{}", .0.prefixed("chain sync error"))]
    Sync(MultiError),

    /// One or more closers, the sink sync or the sink close failed
    #[error("{}", .0.prefixed("chain close error"))]
    Close(MultiError),
}

/// Ordered list of writer stages ending at a sink
pub struct WriteChain {
    sink: Arc<dyn OutputSink>,
    beginning: StageWriter,
    writers: Vec<&'static str>,
    flushers: Vec<Hook>,
    closers: Vec<Hook>,
}

impl WriteChain {
    /// Create a chain whose only stage is the sink
    pub fn new(sink: Arc<dyn OutputSink>) -> Self {
        let inner: Arc<Mutex<dyn Write + Send>> =
            Arc::new(Mutex::new(SinkWriter(Arc::clone(&sink))));
        Self {
            sink,
            beginning: StageWriter::new("sink", inner),
            writers: Vec::new(),
            flushers: Vec::new(),
            closers: Vec::new(),
        }
    }

    /// Current head of the chain, the entry point for encoded bytes
    pub fn head(&self) -> StageWriter {
        self.beginning.clone()
    }

    /// The sink at the end of the chain
    pub fn sink(&self) -> &Arc<dyn OutputSink> {
        &self.sink
    }

    /// Whether the sink accepts writes
    pub fn is_ready(&self) -> bool {
        self.sink.is_ready()
    }

    /// Write the whole buffer through all stages
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.beginning.write_locked(buf)?;
        Ok(buf.len())
    }

    /// Wrap the head with the stage returned by the factory
    ///
    /// Returns `false` if the factory returned `None`, the chain is unchanged.
    pub fn prepend_writer<S, F>(&mut self, factory: F) -> bool
    where
        S: Stage,
        F: FnOnce(StageWriter) -> Option<S>,
    {
        match self.prepend_writer_or_err(|w| Ok::<_, Infallible>(factory(w))) {
            Ok(changed) => changed,
            Err(never) => match never {},
        }
    }

    /// Like [`prepend_writer`](Self::prepend_writer) with a fallible factory
    pub fn prepend_writer_or_err<S, E, F>(&mut self, factory: F) -> Result<bool, E>
    where
        S: Stage,
        F: FnOnce(StageWriter) -> Result<Option<S>, E>,
    {
        let Some(stage) = factory(self.beginning.clone())? else {
            return Ok(false);
        };

        let name = stage.name();
        let is_flusher = stage.is_flusher();
        let is_closer = stage.is_closer();
        let shared = Arc::new(Mutex::new(stage));

        self.writers.insert(0, name);

        if is_flusher {
            let s = Arc::clone(&shared);
            let flush: Arc<HookFn> = Arc::new(move || -> Result<(), BoxError> {
                s.lock().flush()?;
                Ok(())
            });
            self.add_flusher(true, Hook::new(name, Arc::clone(&flush)));
            if !is_closer {
                self.add_closer(true, Hook::new(name, flush));
            }
        }
        if is_closer {
            let s = Arc::clone(&shared);
            let close: Arc<HookFn> = Arc::new(move || -> Result<(), BoxError> {
                s.lock().close()?;
                Ok(())
            });
            self.add_closer(true, Hook::new(name, close));
        }

        let inner: Arc<Mutex<dyn Write + Send>> = shared;
        self.beginning = StageWriter::new(name, inner);
        Ok(true)
    }

    /// Register flush and close of `v` at the end of the lists
    pub fn append_flusher_closer<T: FlusherCloser>(&mut self, v: Arc<T>) {
        self.add_flusher_closer(false, v);
    }

    /// Register flush and close of `v` at the beginning of the lists
    pub fn prepend_flusher_closer<T: FlusherCloser>(&mut self, v: Arc<T>) {
        self.add_flusher_closer(true, v);
    }

    /// Register a flush function, also called on close, at the end
    pub fn append_flush_fn<F>(&mut self, info: impl Into<String>, f: F)
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let info = info.into();
        let f: Arc<HookFn> = Arc::new(f);
        self.add_flusher(false, Hook::new(info.clone(), Arc::clone(&f)));
        self.add_closer(false, Hook::new(info, f));
    }

    /// Register a flush function, also called on close, at the beginning
    pub fn prepend_flush_fn<F>(&mut self, info: impl Into<String>, f: F)
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let info = info.into();
        let f: Arc<HookFn> = Arc::new(f);
        self.add_flusher(true, Hook::new(info.clone(), Arc::clone(&f)));
        self.add_closer(true, Hook::new(info, f));
    }

    /// Register a close function at the end
    pub fn append_close_fn<F>(&mut self, info: impl Into<String>, f: F)
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.add_closer(false, Hook::new(info, Arc::new(f)));
    }

    /// Register a close function at the beginning
    pub fn prepend_close_fn<F>(&mut self, info: impl Into<String>, f: F)
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.add_closer(true, Hook::new(info, Arc::new(f)));
    }

    /// Flush every registered flusher in order, then the sink
    pub fn flush(&self) -> Result<(), ChainError> {
        tracing::debug!("flushing writers");
        let mut errs = MultiError::new();
        run_hooks("flush", &self.flushers, &mut errs);
        if let Err(err) = self.sink.flush() {
            tracing::error!(error = %err, "cannot flush sink");
            errs.push(StageError {
                op: "flush",
                stage: "sink".into(),
                source: err.into(),
            });
        }
        tracing::debug!("writers flushed");
        errs.into_result().map_err(ChainError::Flush)
    }

    /// Flush all stages, then sync the sink to durable storage
    pub fn sync(&self) -> Result<(), ChainError> {
        tracing::debug!("syncing chain");
        let mut errs = MultiError::new();
        errs.check(self.flush());
        errs.check(self.sync_sink());
        errs.into_result().map_err(ChainError::Sync)
    }

    /// Close every registered closer in order, then sync and close the sink
    pub fn close(&self) -> Result<(), ChainError> {
        tracing::debug!("closing chain");
        let mut errs = MultiError::new();
        run_hooks("close", &self.closers, &mut errs);
        errs.check(self.sync_sink());
        if let Err(err) = self.sink.close() {
            tracing::error!(error = %err, "cannot close sink");
            errs.push(StageError {
                op: "close",
                stage: "sink".into(),
                source: err.into(),
            });
        }
        tracing::debug!("chain closed");
        errs.into_result().map_err(ChainError::Close)
    }

    /// Human-readable listing of writers, flushers and closers
    pub fn dump(&self) -> String {
        let mut out = String::from("Writers:\n");
        for name in &self.writers {
            out.push_str("  ");
            out.push_str(name);
            out.push('\n');
        }
        out.push_str("  sink\nFlushers:\n");
        for hook in &self.flushers {
            out.push_str("  ");
            out.push_str(&hook.info);
            out.push('\n');
        }
        out.push_str("Closers:\n");
        for hook in &self.closers {
            out.push_str("  ");
            out.push_str(&hook.info);
            out.push('\n');
        }
        out
    }

    fn sync_sink(&self) -> Result<(), StageError> {
        self.sink.sync().map_err(|err| {
            tracing::error!(error = %err, "cannot sync sink");
            StageError {
                op: "sync",
                stage: "sink".into(),
                source: err.into(),
            }
        })
    }

    fn add_flusher_closer<T: FlusherCloser>(&mut self, prepend: bool, v: Arc<T>) {
        let name = v.name().to_owned();
        let flushed = Arc::clone(&v);
        self.add_flusher(
            prepend,
            Hook::new(name.clone(), Arc::new(move || flushed.flush())),
        );
        self.add_closer(prepend, Hook::new(name, Arc::new(move || v.close())));
    }

    fn add_flusher(&mut self, prepend: bool, hook: Hook) {
        if prepend {
            self.flushers.insert(0, hook);
        } else {
            self.flushers.push(hook);
        }
    }

    fn add_closer(&mut self, prepend: bool, hook: Hook) {
        if prepend {
            self.closers.insert(0, hook);
        } else {
            self.closers.push(hook);
        }
    }
}

impl fmt::Debug for WriteChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteChain")
            .field("writers", &self.writers)
            .field("flushers", &self.flushers.len())
            .field("closers", &self.closers.len())
            .finish()
    }
}

fn run_hooks(op: &'static str, hooks: &[Hook], errs: &mut MultiError) {
    for hook in hooks {
        if let Err(source) = (hook.run)() {
            let err = StageError {
                op,
                stage: hook.info.clone(),
                source,
            };
            tracing::error!(error = %err, "chain {} failed", op);
            errs.push(err);
        }
    }
}

#[cfg(test)]
#[path = "chain_test.rs"]
mod chain_test;
