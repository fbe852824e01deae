//! Sluice - Volume
//!
//! Local disk volumes and the lifecycle of the slice writers they hold.
//!
//! # Modules
//!
//! - **volume**: [`Volume`], ID, writer lock and the writer registry
//! - **registry**: claim-slot map used for the writer registry
//! - **drain**: drain file watcher
//! - **allocate**: disk space pre-allocation for new slice files
//!
//! # Example
//!
//! ```no_run
//! use sluice_config::VolumeConfig;
//! use sluice_encoding::WriterEvents;
//! use sluice_volume::Volume;
//!
//! # async fn example() -> sluice_volume::Result<()> {
//! let events = WriterEvents::new();
//! let volume = Volume::open("/data/volume-1", VolumeConfig::default(), &events).await?;
//! // volume.open_writer(slice).await?
//! volume.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod allocate;
pub mod drain;
pub mod error;
pub mod registry;
pub mod volume;

pub use allocate::{Allocator, DefaultAllocator};
pub use drain::{DRAIN_FILE, DrainState};
pub use error::{Result, VolumeError};
pub use registry::{Claim, Registry};
pub use volume::{LOCK_FILE, VOLUME_ID_FILE, Volume};
