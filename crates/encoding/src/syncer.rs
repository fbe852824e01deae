//! Sync policy engine
//!
//! The syncer decides when buffered data is flushed to the OS cache
//! (`cache` mode) or synced to disk (`disk` mode):
//!
//! - a check loop runs every `check_interval` and triggers a sync if, since
//!   the last successful sync, any of the count, uncompressed bytes,
//!   compressed bytes or interval triggers is reached
//! - only one sync runs at a time; a non-forced trigger during a running
//!   sync starts nothing and returns the notifier of the next sync
//! - the notifier is swapped when a sync starts, writes accepted during the
//!   sync wait for the next one
//! - [`Syncer::stop`] stops the loop and runs one final forced sync

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use sluice_config::{SyncConfig, SyncMode, format_bytes};
use sluice_writer::{ChainError, WriteChain};
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{EncodingError, Result, SyncError};
use crate::notify::Notifier;

/// Resource synchronized by the syncer
pub trait SyncChain: Send + Sync + 'static {
    /// Flush in-memory buffers to the OS disk cache
    fn flush(&self) -> std::result::Result<(), ChainError>;

    /// Flush and sync to disk
    fn sync(&self) -> std::result::Result<(), ChainError>;
}

impl SyncChain for WriteChain {
    fn flush(&self) -> std::result::Result<(), ChainError> {
        WriteChain::flush(self)
    }

    fn sync(&self) -> std::result::Result<(), ChainError> {
        WriteChain::sync(self)
    }
}

/// Counters observed by the sync triggers
pub trait StatisticsProvider: Send + Sync + 'static {
    /// Writes accepted so far
    fn accepted_writes(&self) -> u64;

    /// Bytes written before compression
    fn uncompressed_size(&self) -> u64;

    /// Bytes written after compression
    fn compressed_size(&self) -> u64;
}

#[derive(Debug, Default)]
struct Baseline {
    accepted_writes: AtomicU64,
    uncompressed_size: AtomicU64,
    compressed_size: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    accepted_writes: u64,
    uncompressed_size: u64,
    compressed_size: u64,
    at: Instant,
}

struct Inner {
    config: SyncConfig,
    chain: Arc<dyn SyncChain>,
    statistics: Arc<dyn StatisticsProvider>,
    runtime: Handle,
    stopped: AtomicBool,
    cancel: CancellationToken,
    tracker: TaskTracker,
    baseline: Baseline,
    last_sync_at: Mutex<Instant>,
    sync_lock: Arc<tokio::sync::Mutex<()>>,
    notifier: RwLock<Notifier>,
    syncs: AtomicU64,
}

/// Triggers chain flush or sync according to [`SyncConfig`]
#[derive(Clone)]
pub struct Syncer {
    inner: Arc<Inner>,
}

impl Syncer {
    /// Create the syncer and start the check loop
    ///
    /// Must be called within a tokio runtime.
    pub fn new(
        config: SyncConfig,
        chain: Arc<dyn SyncChain>,
        statistics: Arc<dyn StatisticsProvider>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| EncodingError::NoRuntime)?;

        let syncer = Self {
            inner: Arc::new(Inner {
                config,
                chain,
                statistics,
                runtime,
                stopped: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
                baseline: Baseline::default(),
                last_sync_at: Mutex::new(Instant::now()),
                sync_lock: Arc::new(tokio::sync::Mutex::new(())),
                notifier: RwLock::new(Notifier::new()),
                syncs: AtomicU64::new(0),
            }),
        };

        let config = &syncer.inner.config;
        if config.mode == SyncMode::Disabled {
            tracing::info!("sync is disabled");
        } else {
            tracing::info!(
                "sync is enabled, mode={}, sync each {{count={} or uncompressed={} or compressed={} or interval={:?}}}, check each {:?}",
                config.mode,
                config.count_trigger,
                format_bytes(config.uncompressed_bytes_trigger),
                format_bytes(config.compressed_bytes_trigger),
                config.interval_trigger,
                config.check_interval,
            );
            syncer.start_check_loop();
        }

        Ok(syncer)
    }

    /// Sync mode
    pub fn mode(&self) -> SyncMode {
        self.inner.config.mode
    }

    /// Number of sync operations started so far
    pub fn sync_count(&self) -> u64 {
        self.inner.syncs.load(Ordering::Relaxed)
    }

    /// Notifier of the next sync, `None` if waiting is disabled
    pub fn notifier(&self) -> Option<Notifier> {
        let config = &self.inner.config;
        if !config.wait || config.mode == SyncMode::Disabled {
            return None;
        }
        Some(self.inner.notifier.read().clone())
    }

    /// Start a sync
    ///
    /// With `force = false`, a running sync is not interrupted and the
    /// notifier of the next sync is returned, the running sync does not cover
    /// writes accepted after it started. With `force = true`, the running sync
    /// is awaited and a new one is started. `None` if sync is disabled.
    pub async fn trigger_sync(&self, force: bool) -> Option<Notifier> {
        let inner = &self.inner;
        if inner.config.mode == SyncMode::Disabled {
            return None;
        }

        let guard = if force {
            Arc::clone(&inner.sync_lock).lock_owned().await
        } else {
            match Arc::clone(&inner.sync_lock).try_lock_owned() {
                Ok(guard) => guard,
                // Sync in progress, coalesce
                Err(_) => return Some(inner.notifier.read().clone()),
            }
        };

        let snapshot = Snapshot {
            accepted_writes: inner.statistics.accepted_writes(),
            uncompressed_size: inner.statistics.uncompressed_size(),
            compressed_size: inner.statistics.compressed_size(),
            at: Instant::now(),
        };

        // Split old and new writes
        let notifier = std::mem::take(&mut *inner.notifier.write());
        inner.syncs.fetch_add(1, Ordering::Relaxed);

        let sync_inner = Arc::clone(inner);
        let done = notifier.clone();
        inner.tracker.spawn_on(
            async move {
                let result = sync_inner.run_op().await;
                if result.is_ok() {
                    sync_inner.store_baseline(snapshot);
                }
                drop(guard);
                done.done(result);
            },
            &inner.runtime,
        );

        Some(notifier)
    }

    /// Stop the check loop, run the last sync and wait for running tasks
    pub async fn stop(&self) -> Result<()> {
        tracing::debug!("stopping syncer");
        let inner = &self.inner;
        if inner.stopped.swap(true, Ordering::SeqCst) {
            return Err(EncodingError::SyncerStopped);
        }
        inner.cancel.cancel();

        let result = match self.trigger_sync(true).await {
            Some(notifier) => notifier.wait().await,
            None => Ok(()),
        };

        inner.tracker.close();
        inner.tracker.wait().await;

        tracing::debug!("syncer stopped");
        result.map_err(EncodingError::from)
    }

    fn start_check_loop(&self) {
        let syncer = self.clone();
        let inner = &self.inner;
        let token = inner.cancel.clone();
        let period = inner.config.check_interval;

        inner.tracker.spawn_on(
            async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            if syncer.inner.check_conditions() {
                                syncer.trigger_sync(false).await;
                            }
                        }
                    }
                }
            },
            &inner.runtime,
        );
    }
}

impl Inner {
    async fn run_op(&self) -> std::result::Result<(), SyncError> {
        let mode = self.config.mode;
        let chain = Arc::clone(&self.chain);

        tracing::debug!("starting sync to {}", mode);
        let result = tokio::task::spawn_blocking(move || match mode {
            SyncMode::Disk => chain.sync(),
            SyncMode::Cache => chain.flush(),
            SyncMode::Disabled => Ok(()),
        })
        .await;

        match result {
            Ok(Ok(())) => {
                tracing::debug!("sync to {} done", mode);
                Ok(())
            }
            Ok(Err(err)) => {
                tracing::error!(error = %err, "sync to {} failed", mode);
                Err(SyncError::Chain(Arc::new(err)))
            }
            Err(err) => {
                tracing::error!(error = %err, "sync to {} failed", mode);
                Err(SyncError::Task(err.to_string()))
            }
        }
    }

    fn store_baseline(&self, snapshot: Snapshot) {
        let baseline = &self.baseline;
        baseline
            .accepted_writes
            .store(snapshot.accepted_writes, Ordering::Relaxed);
        baseline
            .uncompressed_size
            .store(snapshot.uncompressed_size, Ordering::Relaxed);
        baseline
            .compressed_size
            .store(snapshot.compressed_size, Ordering::Relaxed);
        *self.last_sync_at.lock() = snapshot.at;
    }

    fn check_conditions(&self) -> bool {
        let config = &self.config;
        let baseline = &self.baseline;
        let stats = &self.statistics;

        let count = stats
            .accepted_writes()
            .saturating_sub(baseline.accepted_writes.load(Ordering::Relaxed));
        if count == 0 {
            return false;
        }
        if count >= config.count_trigger {
            return true;
        }

        let uncompressed = stats
            .uncompressed_size()
            .saturating_sub(baseline.uncompressed_size.load(Ordering::Relaxed));
        if uncompressed >= config.uncompressed_bytes_trigger {
            return true;
        }

        let compressed = stats
            .compressed_size()
            .saturating_sub(baseline.compressed_size.load(Ordering::Relaxed));
        if compressed >= config.compressed_bytes_trigger {
            return true;
        }

        self.last_sync_at.lock().elapsed() >= config.interval_trigger
    }
}

impl fmt::Debug for Syncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Syncer")
            .field("mode", &self.inner.config.mode)
            .field("stopped", &self.inner.stopped.load(Ordering::Relaxed))
            .field("syncs", &self.sync_count())
            .finish()
    }
}

#[cfg(test)]
#[path = "syncer_test.rs"]
mod syncer_test;
