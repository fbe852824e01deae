//! Volume
//!
//! A volume is one local directory that holds slice files. It owns:
//!
//! - the volume ID, stored in `volume-id` and generated on the first open
//! - the writer lock `writer.lock`, so only one process writes to the volume
//! - the drain state, see [`DrainState`]
//! - the registry of open writers, one per slice key
//!
//! Writers are opened through [`Volume::open_writer`] and unregister
//! themselves when they are closed. Closing the volume closes every writer
//! that is still open.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;
use sluice_config::VolumeConfig;
use sluice_encoding::{Writer, WriterEvents};
use sluice_model::{Slice, SliceKey, VolumeId};
use sluice_writer::{LocalFile, MultiError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::allocate::{Allocator, DefaultAllocator};
use crate::drain::DrainState;
use crate::error::{Result, VolumeError};
use crate::registry::Registry;

/// File with the volume ID
pub const VOLUME_ID_FILE: &str = "volume-id";

/// Exclusive writer lock
pub const LOCK_FILE: &str = "writer.lock";

struct Inner {
    id: VolumeId,
    path: PathBuf,
    config: VolumeConfig,
    events: Arc<WriterEvents>,
    allocator: Arc<dyn Allocator>,
    writers: Registry<SliceKey, Writer>,
    drain: Arc<DrainState>,
    lock_path: PathBuf,
    closed: AtomicBool,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

/// Local directory for slice writing, cheap to clone
#[derive(Clone)]
pub struct Volume {
    inner: Arc<Inner>,
}

impl Volume {
    /// Open the volume at `path` with the default disk allocator
    ///
    /// The directory must exist. The volume's writer events are a child of
    /// `events`, so listeners registered there observe every writer of
    /// every volume.
    pub async fn open(
        path: impl Into<PathBuf>,
        config: VolumeConfig,
        events: &Arc<WriterEvents>,
    ) -> Result<Self> {
        Self::open_with_allocator(path, config, events, Arc::new(DefaultAllocator)).await
    }

    /// Open the volume with a custom disk allocator
    pub async fn open_with_allocator(
        path: impl Into<PathBuf>,
        config: VolumeConfig,
        events: &Arc<WriterEvents>,
        allocator: Arc<dyn Allocator>,
    ) -> Result<Self> {
        let path = path.into();
        tracing::info!(volume.path = %path.display(), "opening volume");

        let id = read_or_create_id(&path)?;
        let lock_path = acquire_lock(&path)?;

        let drain = Arc::new(DrainState::new(&path));
        let cancel = CancellationToken::new();
        let tasks = TaskTracker::new();
        if config.watch_drain_file {
            drain.watch(config.drain_check_interval, cancel.clone(), &tasks);
        }

        tracing::info!(volume.id = %id, volume.path = %path.display(), "opened volume");

        Ok(Self {
            inner: Arc::new(Inner {
                id,
                path,
                config,
                events: events.clone_child(),
                allocator,
                writers: Registry::new(),
                drain,
                lock_path,
                closed: AtomicBool::new(false),
                cancel,
                tasks,
            }),
        })
    }

    pub fn id(&self) -> &VolumeId {
        &self.inner.id
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Volume level writer events
    pub fn events(&self) -> &Arc<WriterEvents> {
        &self.inner.events
    }

    /// Whether the drain file was present at the last check
    pub fn is_drained(&self) -> bool {
        self.inner.drain.is_drained()
    }

    /// Open a writer for the slice
    ///
    /// Writers for different slices are constructed concurrently, a second
    /// writer for the same slice key fails while the first one exists.
    pub async fn open_writer(&self, slice: Slice) -> Result<Writer> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::SeqCst) {
            return Err(VolumeError::Closed(inner.id.clone()));
        }
        if inner.drain.is_drained() {
            return Err(VolumeError::Drained);
        }

        let key = slice.key.clone();
        let Some(claim) = inner.writers.claim(key.clone()) else {
            tracing::error!(volume.id = %inner.id, slice = %key, "writer already exists");
            return Err(VolumeError::WriterExists);
        };

        // The claim is released on error
        let writer = self.create_writer(slice).await?;

        let volume = Arc::downgrade(&self.inner);
        writer.events().on_close(move |_, _| {
            if let Some(volume) = volume.upgrade() {
                volume.writers.remove(&key);
            }
            Ok(())
        });

        claim.fill(writer.clone());
        Ok(writer)
    }

    async fn create_writer(&self, slice: Slice) -> Result<Writer> {
        let inner = &self.inner;
        let dir_path = inner.path.join(slice.dir_path());
        let file_path = dir_path.join(slice.filename());

        fs::create_dir_all(&dir_path).map_err(|source| VolumeError::SliceFile {
            path: dir_path.clone(),
            source,
        })?;
        let file = LocalFile::open(&file_path).map_err(|source| VolumeError::SliceFile {
            path: file_path.clone(),
            source,
        })?;

        if inner.config.allocation.enabled {
            let size = match slice.allocated_disk_space {
                0 => inner.config.allocation.static_size,
                size => size,
            };
            self.allocate(&file, size);
        }

        let writer = Writer::open(
            slice,
            Arc::new(file),
            dir_path,
            file_path,
            &inner.events,
        )
        .await?;
        Ok(writer)
    }

    /// Reserve space for a new file, failures are only logged
    fn allocate(&self, file: &LocalFile, size: u64) {
        let allocator = &self.inner.allocator;
        let result = file.with_file(|f| {
            if f.metadata()?.len() > 0 {
                // Reopened slice, the space was allocated on the first open
                return Ok(true);
            }
            allocator.allocate(f, size)
        });
        match result {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(path = %file.path().display(), "disk space allocation is not supported");
            }
            Err(err) => {
                tracing::warn!(path = %file.path().display(), size, error = %err, "cannot allocate disk space");
            }
        }
    }

    /// Open writers sorted by slice key, writers being opened are skipped
    pub fn writers(&self) -> Vec<Writer> {
        let mut writers = self.inner.writers.values();
        writers.sort_by_cached_key(|w| w.slice_key().to_string());
        writers
    }

    /// Close all writers in parallel, stop the drain watcher and release the lock
    pub async fn close(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::SeqCst) {
            return Err(VolumeError::Closed(inner.id.clone()));
        }
        tracing::info!(volume.id = %inner.id, "closing volume");

        inner.cancel.cancel();

        let writers = self.writers();
        let results = join_all(writers.iter().map(|writer| async move {
            writer.close().await.map_err(|source| VolumeError::CloseWriter {
                key: writer.slice_key().to_string(),
                source,
            })
        }))
        .await;

        let mut errs = MultiError::new();
        for result in results {
            errs.check(result);
        }

        inner.tasks.close();
        inner.tasks.wait().await;

        if let Err(source) = fs::remove_file(&inner.lock_path) {
            errs.push(VolumeError::RemoveLock {
                path: inner.lock_path.clone(),
                source,
            });
        }

        tracing::info!(volume.id = %inner.id, "closed volume");
        errs.into_result().map_err(VolumeError::from)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("id", &self.inner.id)
            .field("path", &self.inner.path)
            .field("drained", &self.is_drained())
            .field("writers", &self.inner.writers.len())
            .finish()
    }
}

fn read_or_create_id(path: &Path) -> Result<VolumeId> {
    let id_path = path.join(VOLUME_ID_FILE);
    let id_err = |source| VolumeError::IdFile {
        path: id_path.clone(),
        source,
    };

    match fs::read_to_string(&id_path) {
        Ok(content) => Ok(VolumeId::new(content.trim())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let id = VolumeId::new(Uuid::new_v4().simple().to_string());
            create_id_file(&id_path, id.as_str()).map_err(id_err)?;
            tracing::info!(volume.id = %id, "generated volume ID");
            Ok(id)
        }
        Err(err) => Err(id_err(err)),
    }
}

fn create_id_file(path: &Path, id: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(id.as_bytes())?;
    file.sync_all()
}

fn acquire_lock(path: &Path) -> Result<PathBuf> {
    let lock_path = path.join(LOCK_FILE);
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&lock_path);

    let mut file: File = match file {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Err(VolumeError::Locked { path: lock_path });
        }
        Err(source) => {
            return Err(VolumeError::Lock {
                path: lock_path,
                source,
            });
        }
    };

    if let Err(source) = writeln!(file, "{}", std::process::id()) {
        let _ = fs::remove_file(&lock_path);
        return Err(VolumeError::Lock {
            path: lock_path,
            source,
        });
    }
    Ok(lock_path)
}

#[cfg(test)]
#[path = "volume_test.rs"]
mod volume_test;
