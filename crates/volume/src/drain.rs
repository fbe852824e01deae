//! Drain file watcher
//!
//! An operator marks a volume as drained by creating the `drain` file in its
//! root. A drained volume opens no new writers, already open writers keep
//! running until they are closed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Name of the drain file in the volume root
pub const DRAIN_FILE: &str = "drain";

/// Drained flag backed by the drain file
#[derive(Debug)]
pub struct DrainState {
    path: PathBuf,
    drained: AtomicBool,
}

impl DrainState {
    /// Create the state and check the file once
    pub fn new(volume_path: &Path) -> Self {
        let path = volume_path.join(DRAIN_FILE);
        let drained = path.exists();
        if drained {
            tracing::info!(path = %path.display(), "volume is drained");
        }
        Self {
            path,
            drained: AtomicBool::new(drained),
        }
    }

    pub fn is_drained(&self) -> bool {
        self.drained.load(Ordering::SeqCst)
    }

    /// Re-check the drain file, returns the current flag
    pub fn check(&self) -> bool {
        let drained = self.path.exists();
        if self.drained.swap(drained, Ordering::SeqCst) != drained {
            if drained {
                tracing::info!(path = %self.path.display(), "volume is drained");
            } else {
                tracing::info!(path = %self.path.display(), "volume is no longer drained");
            }
        }
        drained
    }

    /// Re-check the file every `interval` until `cancel` fires
    pub fn watch(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
        tracker: &TaskTracker,
    ) {
        let state = Arc::clone(self);
        tracker.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        state.check();
                    }
                }
            }
            tracing::debug!(path = %state.path.display(), "stopped drain file watcher");
        });
    }
}
