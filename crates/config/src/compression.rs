//! Compression configuration
//!
//! Selects the compression stage inserted into the write chain.

use serde::Deserialize;

/// Compression algorithm applied to the slice file
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    /// Plain CSV, no compression stage
    None,
    /// GZIP (default)
    #[default]
    Gzip,
    /// Zstandard
    Zstd,
}

impl CompressionType {
    /// Extension appended to the base filename
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
            Self::Zstd => ".zstd",
        }
    }

    /// Name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
        }
    }
}

/// GZIP writer implementation
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GzipImplementation {
    /// Single-threaded encoder with a buffered input
    Standard,
    /// Single-threaded encoder at the fastest level
    Fast,
    /// Blocks compressed concurrently, written as gzip members (default)
    #[default]
    Parallel,
}

/// GZIP settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GzipConfig {
    /// Compression level 1-9
    /// Default: 1
    pub level: u32,

    /// Encoder implementation
    /// Default: parallel
    pub implementation: GzipImplementation,

    /// Uncompressed block size for the parallel implementation
    /// Default: 256 KiB
    pub block_size: u64,

    /// Blocks compressed at once by the parallel implementation, 0 = num CPUs
    /// Default: 0
    pub concurrency: usize,
}

impl Default for GzipConfig {
    fn default() -> Self {
        Self {
            level: 1,
            implementation: GzipImplementation::Parallel,
            block_size: 256 * 1024,
            concurrency: 0,
        }
    }
}

/// Zstandard settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ZstdConfig {
    /// Compression level 1-22
    /// Default: 1
    pub level: i32,

    /// Window size in bytes, must be a power of two
    /// Default: 1 MiB
    pub window_size: u64,

    /// Worker threads, 0 = num CPUs
    /// Default: 0
    pub concurrency: usize,
}

impl Default for ZstdConfig {
    fn default() -> Self {
        Self {
            level: 1,
            window_size: 1024 * 1024,
            concurrency: 0,
        }
    }
}

/// Compression configuration
///
/// # Example
///
/// ```toml
/// [encoding.compression]
/// type = "gzip"
///
/// [encoding.compression.gzip]
/// level = 1
/// implementation = "parallel"
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompressionConfig {
    /// Compression type (none, gzip, zstd)
    /// Default: gzip
    #[serde(rename = "type")]
    pub kind: CompressionType,

    /// GZIP settings, used when type = "gzip"
    pub gzip: GzipConfig,

    /// Zstandard settings, used when type = "zstd"
    pub zstd: ZstdConfig,
}

impl CompressionConfig {
    /// No compression
    pub fn none() -> Self {
        Self {
            kind: CompressionType::None,
            ..Default::default()
        }
    }

    /// GZIP with the given implementation and default settings
    pub fn gzip(implementation: GzipImplementation) -> Self {
        Self {
            kind: CompressionType::Gzip,
            gzip: GzipConfig {
                implementation,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Zstandard with default settings
    pub fn zstd() -> Self {
        Self {
            kind: CompressionType::Zstd,
            ..Default::default()
        }
    }

    /// Whether the compression writer buffers its input internally
    ///
    /// If not, the pipeline places a limit buffer in front of it.
    pub fn has_writer_input_buffer(&self) -> bool {
        match self.kind {
            CompressionType::None => false,
            CompressionType::Gzip => self.gzip.implementation == GzipImplementation::Parallel,
            CompressionType::Zstd => true,
        }
    }
}
