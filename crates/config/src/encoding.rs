//! Encoding pipeline configuration

use std::time::Duration;

use serde::Deserialize;

use crate::compression::CompressionConfig;
use crate::sync::SyncConfig;

/// Table file format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EncoderType {
    /// Quoted CSV without header row (default)
    #[default]
    Csv,
}

/// Encoder settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EncoderConfig {
    /// Encoder type
    /// Default: csv
    #[serde(rename = "type")]
    pub kind: EncoderType,

    /// Rows rendered and written in parallel, 0 = num CPUs
    /// Default: 0
    pub concurrency: usize,

    /// Maximum size of one encoded row in bytes
    /// Default: 1 MiB
    pub row_size_limit: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            kind: EncoderType::Csv,
            concurrency: 0,
            row_size_limit: 1024 * 1024,
        }
    }
}

impl EncoderConfig {
    /// Effective concurrency, resolving 0 to the number of CPUs
    pub fn concurrency(&self) -> usize {
        if self.concurrency == 0 {
            crate::num_cpus()
        } else {
            self.concurrency
        }
    }
}

/// Statistics backup settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatisticsConfig {
    /// How often counters and meters are written to their backup files,
    /// zero disables the periodic backup (the final backup on close is kept)
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub disk_sync_interval: Duration,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            disk_sync_interval: Duration::from_secs(1),
        }
    }
}

/// Encoding pipeline configuration
///
/// # Example
///
/// ```toml
/// [encoding]
/// input_buffer = 1048576
/// file_buffer = 1048576
///
/// [encoding.encoder]
/// concurrency = 8
/// row_size_limit = 1048576
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EncodingConfig {
    /// Encoder settings
    pub encoder: EncoderConfig,

    /// Buffer in front of the compression writer in bytes, 0 = disabled.
    /// Not used if the compression writer buffers internally.
    /// Default: 1 MiB
    pub input_buffer: u64,

    /// Buffer in front of the output file in bytes, 0 = disabled
    /// Default: 1 MiB
    pub file_buffer: u64,

    /// Compression settings
    pub compression: CompressionConfig,

    /// Sync settings
    pub sync: SyncConfig,

    /// Statistics backup settings
    pub statistics: StatisticsConfig,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig::default(),
            input_buffer: 1024 * 1024,
            file_buffer: 1024 * 1024,
            compression: CompressionConfig::default(),
            sync: SyncConfig::default(),
            statistics: StatisticsConfig::default(),
        }
    }
}
