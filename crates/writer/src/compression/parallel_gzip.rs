//! Parallel gzip writer
//!
//! Input is cut into blocks of `block_size` bytes. Each block is compressed
//! by a worker thread into an independent gzip member, members are written
//! to the inner writer in input order. At most `concurrency` blocks are in
//! flight, the writer blocks when the window is full.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::thread::JoinHandle;

use crossbeam::channel::{self, Receiver, Sender};
use flate2::Compression;
use flate2::write::GzEncoder;

struct Job {
    data: Vec<u8>,
    result: Sender<io::Result<Vec<u8>>>,
}

/// Gzip writer compressing blocks concurrently
pub struct ParallelGzipWriter<W: Write> {
    inner: W,
    block_size: usize,
    concurrency: usize,
    block: Vec<u8>,
    pending: VecDeque<Receiver<io::Result<Vec<u8>>>>,
    jobs: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    members: u64,
}

impl<W: Write> ParallelGzipWriter<W> {
    /// Start `concurrency` workers compressing at `level`
    pub fn new(
        inner: W,
        level: Compression,
        block_size: usize,
        concurrency: usize,
    ) -> io::Result<Self> {
        let block_size = block_size.max(1);
        let concurrency = concurrency.max(1);
        let (jobs, queue) = channel::bounded::<Job>(concurrency);

        let mut workers = Vec::with_capacity(concurrency);
        for i in 0..concurrency {
            let queue = queue.clone();
            let handle = std::thread::Builder::new()
                .name(format!("gzip-worker-{}", i))
                .spawn(move || {
                    for job in queue {
                        // Receiver gone means the writer was dropped
                        let _ = job.result.send(compress(&job.data, level));
                    }
                })?;
            workers.push(handle);
        }

        Ok(Self {
            inner,
            block_size,
            concurrency,
            block: Vec::with_capacity(block_size),
            pending: VecDeque::with_capacity(concurrency),
            jobs: Some(jobs),
            workers,
            members: 0,
        })
    }

    /// Number of gzip members written so far
    pub fn members(&self) -> u64 {
        self.members
    }

    /// Mutable reference to the inner writer
    pub fn inner_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Compress and write all buffered data, then write an empty member if
    /// nothing was written, and stop the workers
    pub fn finish(&mut self) -> io::Result<()> {
        self.flush()?;
        if self.members == 0 {
            let empty = compress(&[], Compression::fast())?;
            self.inner.write_all(&empty)?;
            self.members += 1;
            self.inner.flush()?;
        }
        self.stop_workers();
        Ok(())
    }

    fn submit_block(&mut self) -> io::Result<()> {
        if self.block.is_empty() {
            return Ok(());
        }
        while self.pending.len() >= self.concurrency {
            self.write_oldest()?;
        }

        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| io::Error::other("gzip writer is already finished"))?;
        let data = std::mem::replace(&mut self.block, Vec::with_capacity(self.block_size));
        let (result, receiver) = channel::bounded(1);
        jobs.send(Job { data, result })
            .map_err(|_| io::Error::other("gzip workers stopped"))?;
        self.pending.push_back(receiver);
        Ok(())
    }

    fn write_oldest(&mut self) -> io::Result<()> {
        let Some(receiver) = self.pending.pop_front() else {
            return Ok(());
        };
        let member = receiver
            .recv()
            .map_err(|_| io::Error::other("gzip worker stopped"))??;
        self.inner.write_all(&member)?;
        self.members += 1;
        Ok(())
    }

    fn stop_workers(&mut self) {
        self.jobs = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("gzip worker panicked");
            }
        }
    }
}

impl<W: Write> Write for ParallelGzipWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;
        while !rest.is_empty() {
            let n = (self.block_size - self.block.len()).min(rest.len());
            self.block.extend_from_slice(&rest[..n]);
            rest = &rest[n..];
            if self.block.len() >= self.block_size {
                self.submit_block()?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.submit_block()?;
        while !self.pending.is_empty() {
            self.write_oldest()?;
        }
        self.inner.flush()
    }
}

impl<W: Write> Drop for ParallelGzipWriter<W> {
    fn drop(&mut self) {
        self.pending.clear();
        self.stop_workers();
    }
}

fn compress(data: &[u8], level: Compression) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 64), level);
    encoder.write_all(data)?;
    encoder.finish()
}
