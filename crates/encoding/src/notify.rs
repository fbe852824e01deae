//! Sync completion notifier
//!
//! One notifier covers one batch of writes: every write accepted before the
//! syncer swapped the notifier out. It resolves once with the result of the
//! sync covering that batch, any number of waiters observe the same result.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::SyncError;

type State = Option<Result<(), SyncError>>;

/// Waitable result of one sync
#[derive(Clone)]
pub struct Notifier {
    tx: Arc<watch::Sender<State>>,
}

impl Notifier {
    /// Create a pending notifier
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Resolve the notifier, later calls are ignored
    pub fn done(&self, result: Result<(), SyncError>) {
        self.tx.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(result);
            true
        });
    }

    /// Whether the notifier has been resolved
    pub fn is_done(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait until the sync finishes and return its result
    pub async fn wait(&self) -> Result<(), SyncError> {
        let mut rx = self.tx.subscribe();
        let state = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| SyncError::Task("notifier dropped".into()))?;
        (*state).clone().unwrap_or(Ok(()))
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("done", &self.is_done())
            .finish()
    }
}
