//! Sluice Configuration
//!
//! TOML configuration of the local write path. Every section and field has
//! a default, an empty document is a valid configuration.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use sluice_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[encoding.sync]\nmode = \"cache\"").unwrap();
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! filter = "debug"
//!
//! [volume]
//! watch_drain_file = true
//!
//! [encoding]
//! file_buffer = 1048576
//!
//! [encoding.compression]
//! type = "gzip"
//!
//! [encoding.sync]
//! mode = "disk"
//! wait = true
//! interval_trigger = "50ms"
//! ```

mod compression;
mod encoding;
mod error;
mod format;
mod logging;
mod sync;
mod validation;
mod volume;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use compression::{
    CompressionConfig, CompressionType, GzipConfig, GzipImplementation, ZstdConfig,
};
pub use encoding::{EncoderConfig, EncoderType, EncodingConfig, StatisticsConfig};
pub use error::{ConfigError, Result};
pub use format::format_bytes;
pub use logging::{LogConfig, LogFormat, LogOutput, init_logging};
pub use sync::{SyncConfig, SyncMode};
pub use validation::{validate_config, validate_encoding};
pub use volume::{AllocationConfig, VolumeConfig};

use serde::Deserialize;

/// Root configuration document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Volume settings (drain file, disk allocation)
    pub volume: VolumeConfig,

    /// Encoding pipeline settings (encoder, buffers, compression, sync)
    pub encoding: EncodingConfig,
}

impl Config {
    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML,
    /// or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        contents.parse()
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<()> {
        validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

/// Number of logical CPUs, used where a concurrency setting is left at 0
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
