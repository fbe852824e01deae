//! Compression stages
//!
//! - **gzip standard**: single-threaded encoder at the configured level
//! - **gzip fast**: single-threaded encoder at the fastest level
//! - **gzip parallel**: blocks compressed by a worker pool, see [`ParallelGzipWriter`]
//! - **zstd**: multithreaded zstd encoder with a configured window
//!
//! Every implementation produces a stream readable by a standard decoder of
//! its format. The parallel gzip output is a sequence of gzip members.

mod parallel_gzip;

pub use parallel_gzip::ParallelGzipWriter;

use std::fmt;
use std::io::{self, Write};

use flate2::Compression;
use flate2::write::GzEncoder;
use sluice_config::{CompressionConfig, CompressionType, GzipImplementation, num_cpus};

use crate::chain::Stage;

/// Compression writer selected by the configuration
pub enum CompressionWriter<W: Write> {
    /// Standard or fast gzip
    Gzip(GzEncoder<W>),
    /// Parallel gzip
    ParallelGzip(ParallelGzipWriter<W>),
    /// Zstandard
    Zstd(zstd::stream::write::Encoder<'static, W>),
}

impl<W: Write + Send + 'static> CompressionWriter<W> {
    /// Create the writer, `None` if the type is `none`
    pub fn new(inner: W, config: &CompressionConfig) -> io::Result<Option<Self>> {
        let writer = match config.kind {
            CompressionType::None => return Ok(None),
            CompressionType::Gzip => {
                let gzip = &config.gzip;
                match gzip.implementation {
                    GzipImplementation::Standard => {
                        Self::Gzip(GzEncoder::new(inner, Compression::new(gzip.level)))
                    }
                    GzipImplementation::Fast => Self::Gzip(GzEncoder::new(inner, Compression::fast())),
                    GzipImplementation::Parallel => Self::ParallelGzip(ParallelGzipWriter::new(
                        inner,
                        Compression::new(gzip.level),
                        gzip.block_size as usize,
                        concurrency(gzip.concurrency),
                    )?),
                }
            }
            CompressionType::Zstd => {
                let zstd = &config.zstd;
                let mut encoder = zstd::stream::write::Encoder::new(inner, zstd.level)?;
                encoder.window_log(zstd.window_size.trailing_zeros())?;
                encoder.multithread(concurrency(zstd.concurrency) as u32)?;
                Self::Zstd(encoder)
            }
        };

        tracing::debug!(compression = %writer.kind(), "compression writer created");
        Ok(Some(writer))
    }
}

impl<W: Write> CompressionWriter<W> {
    /// Short description used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Gzip(_) => "gzip",
            Self::ParallelGzip(_) => "gzip-parallel",
            Self::Zstd(_) => "zstd",
        }
    }

    /// Write the format trailer, the writer must not be used afterwards
    pub fn finish(&mut self) -> io::Result<()> {
        match self {
            Self::Gzip(w) => w.try_finish(),
            Self::ParallelGzip(w) => w.finish(),
            Self::Zstd(w) => w.do_finish(),
        }
    }
}

impl<W: Write> Write for CompressionWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Gzip(w) => w.write(buf),
            Self::ParallelGzip(w) => w.write(buf),
            Self::Zstd(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Gzip(w) => w.flush(),
            Self::ParallelGzip(w) => w.flush(),
            Self::Zstd(w) => w.flush(),
        }
    }
}

impl<W: Write> fmt::Debug for CompressionWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompressionWriter").field(&self.kind()).finish()
    }
}

impl<W: Write + Send + 'static> Stage for CompressionWriter<W> {
    fn name(&self) -> &'static str {
        "compression"
    }

    fn is_flusher(&self) -> bool {
        true
    }

    fn is_closer(&self) -> bool {
        true
    }

    fn close(&mut self) -> io::Result<()> {
        self.finish()
    }
}

fn concurrency(configured: usize) -> usize {
    if configured == 0 { num_cpus() } else { configured }
}
