//! Bounded accumulation buffer
//!
//! Collects small writes into one larger write to the inner writer.
//! Writes larger than the bypass threshold skip the buffer: pending bytes
//! are written first, then the large write goes straight through, so byte
//! order is always preserved.

use std::io::{self, Write};

use crate::chain::Stage;

/// Default share of the capacity above which writes bypass the buffer
const DEFAULT_BYPASS_DIVISOR: usize = 2;

/// Write buffer with a fixed capacity
#[derive(Debug)]
pub struct LimitBuffer<W: Write> {
    inner: W,
    buf: Vec<u8>,
    max_size: usize,
    bypass_threshold: usize,
}

impl<W: Write> LimitBuffer<W> {
    /// Create a buffer of `max_size` bytes in front of `inner`
    pub fn new(inner: W, max_size: usize) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(max_size),
            max_size,
            bypass_threshold: max_size / DEFAULT_BYPASS_DIVISOR,
        }
    }

    /// Writes longer than `threshold` bytes bypass the buffer
    #[must_use]
    pub fn with_bypass_threshold(mut self, threshold: usize) -> Self {
        self.bypass_threshold = threshold.min(self.max_size);
        self
    }

    /// Number of bytes waiting in the buffer
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Capacity of the buffer
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Reference to the inner writer
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    fn flush_buf(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let result = self.inner.write_all(&self.buf);
        self.buf.clear();
        result
    }
}

impl<W: Write> Write for LimitBuffer<W> {
    fn write(&mut self, p: &[u8]) -> io::Result<usize> {
        if p.len() > self.bypass_threshold {
            self.flush_buf()?;
            self.inner.write_all(p)?;
            return Ok(p.len());
        }

        if self.buf.len() + p.len() > self.max_size {
            self.flush_buf()?;
        }
        self.buf.extend_from_slice(p);
        Ok(p.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buf()?;
        self.inner.flush()
    }
}

impl<W: Write + Send + 'static> Stage for LimitBuffer<W> {
    fn name(&self) -> &'static str {
        "limit-buffer"
    }

    fn is_flusher(&self) -> bool {
        true
    }
}
