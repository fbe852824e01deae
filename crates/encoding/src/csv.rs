//! CSV encoder
//!
//! Renders records into CSV rows and writes each row into the chain with a
//! single locked write, so rows are never interleaved or partially written.
//!
//! - every value is quoted, embedded quotes are doubled
//! - columns are separated by `,`, rows end with `\n`, there is no header
//! - rows longer than the row size limit are rejected, the error names the
//!   column that crossed the limit
//!
//! Up to `concurrency` rows are rendered at once, each with a buffer taken
//! from a fixed pool. Rows written concurrently land in the file in the order
//! their writes acquire the chain, not in the order of the calls.

use std::fmt;

use crossbeam::queue::ArrayQueue;
use sluice_model::{Columns, Record, Value};
use sluice_writer::{BoxError, FlusherCloser, StageWriter};
use tokio::sync::Semaphore;

use crate::error::{EncodingError, Result};

/// Initial capacity of a row buffer
const ROW_BUFFER_CAPACITY: usize = 4 * 1024;

#[derive(Default)]
struct RowBuffer {
    row: Vec<u8>,
    value: Vec<u8>,
}

impl RowBuffer {
    fn new() -> Self {
        Self {
            row: Vec::with_capacity(ROW_BUFFER_CAPACITY),
            value: Vec::with_capacity(ROW_BUFFER_CAPACITY),
        }
    }

    fn clear(&mut self) {
        self.row.clear();
        self.value.clear();
    }

    /// Append one quoted field
    fn push_field(&mut self, first: bool, value: &Value) {
        if !first {
            self.row.push(b',');
        }
        self.value.clear();
        value.write_text(&mut self.value);

        self.row.push(b'"');
        for &b in &self.value {
            if b == b'"' {
                self.row.push(b'"');
            }
            self.row.push(b);
        }
        self.row.push(b'"');
    }
}

/// CSV row encoder writing into a chain
pub struct CsvEncoder {
    columns: Columns,
    row_size_limit: u64,
    out: StageWriter,
    permits: Semaphore,
    pool: ArrayQueue<RowBuffer>,
}

impl CsvEncoder {
    /// Create an encoder writing rows of `columns` into `out`
    pub fn new(concurrency: usize, row_size_limit: u64, columns: Columns, out: StageWriter) -> Self {
        let concurrency = concurrency.max(1);
        let pool = ArrayQueue::new(concurrency);
        for _ in 0..concurrency {
            // Capacity equals the number of pushed buffers
            let _ = pool.push(RowBuffer::new());
        }

        Self {
            columns,
            row_size_limit,
            out,
            permits: Semaphore::new(concurrency),
            pool,
        }
    }

    /// Column set of the encoder
    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// Render the record by the columns and write the row
    ///
    /// Returns the number of bytes written.
    pub async fn write_record(&self, record: &dyn Record) -> Result<usize> {
        self.encode(|buf| {
            for (i, column) in self.columns.iter().enumerate() {
                let value = column.render(record).map_err(|source| EncodingError::Column {
                    column: column.name().to_owned(),
                    source,
                })?;
                buf.push_field(i == 0, &value);
                self.check_limit(buf, column.name())?;
            }
            Ok(())
        })
        .await
    }

    /// Write already rendered values, one per column
    pub async fn write_row(&self, values: &[Value]) -> Result<usize> {
        if values.len() != self.columns.len() {
            return Err(EncodingError::ColumnCount {
                expected: self.columns.len(),
                given: values.len(),
            });
        }

        self.encode(|buf| {
            for (i, (column, value)) in self.columns.iter().zip(values).enumerate() {
                buf.push_field(i == 0, value);
                self.check_limit(buf, column.name())?;
            }
            Ok(())
        })
        .await
    }

    async fn encode<F>(&self, fill: F) -> Result<usize>
    where
        F: FnOnce(&mut RowBuffer) -> Result<()>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| EncodingError::Closed)?;
        let mut buf = self.pool.pop().unwrap_or_else(RowBuffer::new);
        buf.clear();

        let result = fill(&mut buf).and_then(|()| {
            buf.row.push(b'\n');
            let last = self.columns.iter().last().map(|c| c.name()).unwrap_or_default();
            self.check_limit(&buf, last)?;
            self.out.write_locked(&buf.row)?;
            Ok(buf.row.len())
        });

        // The pool never holds more buffers than permits
        let _ = self.pool.push(buf);
        result
    }

    fn check_limit(&self, buf: &RowBuffer, column: &str) -> Result<()> {
        if buf.row.len() as u64 > self.row_size_limit {
            return Err(EncodingError::RowTooBig {
                column: column.to_owned(),
                limit: self.row_size_limit,
            });
        }
        Ok(())
    }
}

impl FlusherCloser for CsvEncoder {
    fn name(&self) -> &str {
        "csv-encoder"
    }

    fn flush(&self) -> std::result::Result<(), BoxError> {
        // Rows are written whole, nothing is buffered
        Ok(())
    }

    fn close(&self) -> std::result::Result<(), BoxError> {
        self.permits.close();
        Ok(())
    }
}

impl fmt::Debug for CsvEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvEncoder")
            .field("columns", &self.columns.names())
            .field("row_size_limit", &self.row_size_limit)
            .field("available", &self.permits.available_permits())
            .finish()
    }
}

#[cfg(test)]
#[path = "csv_test.rs"]
mod csv_test;
