//! Record counters
//!
//! A [`Counter`] tracks a count together with the timestamps of the first
//! and the last counted record. [`CounterWithBackup`] persists the state as
//! `count,firstAt,lastAt`, e.g. `5,2001-01-01T00:00:00.000Z,2002-01-01T00:00:00.000Z`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::Mutex;

use crate::backup::{BackupError, BackupFile, PeriodicBackup};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct State {
    count: u64,
    first_at: Option<DateTime<Utc>>,
    last_at: Option<DateTime<Utc>>,
}

/// Thread-safe record counter
#[derive(Debug, Clone, Default)]
pub struct Counter {
    state: Arc<Mutex<State>>,
}

impl Counter {
    /// Create an empty counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` records with the given timestamp, zero is a no-op
    pub fn add(&self, timestamp: DateTime<Utc>, n: u64) {
        if n == 0 {
            return;
        }
        let mut state = self.state.lock();
        state.count += n;
        if state.first_at.is_none_or(|first| timestamp < first) {
            state.first_at = Some(timestamp);
        }
        if state.last_at.is_none_or(|last| timestamp > last) {
            state.last_at = Some(timestamp);
        }
    }

    /// Number of counted records
    pub fn count(&self) -> u64 {
        self.state.lock().count
    }

    /// Timestamp of the oldest counted record
    pub fn first_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().first_at
    }

    /// Timestamp of the newest counted record
    pub fn last_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_at
    }

    fn snapshot(&self) -> State {
        *self.state.lock()
    }

    fn encode(&self) -> String {
        let state = self.snapshot();
        format!(
            "{},{},{}",
            state.count,
            format_opt(state.first_at),
            format_opt(state.last_at)
        )
    }
}

/// Counter persisted in a backup file
#[derive(Debug)]
pub struct CounterWithBackup {
    counter: Counter,
    backup: Arc<BackupFile>,
    task: Mutex<Option<PeriodicBackup>>,
}

impl CounterWithBackup {
    /// Open the backup file, load its state and start the periodic backup
    pub fn open(path: impl AsRef<Path>, interval: Duration) -> Result<Self, BackupError> {
        let (backup, content) = BackupFile::open(path)?;
        let counter = Counter {
            state: Arc::new(Mutex::new(decode(&content)?)),
        };
        let backup = Arc::new(backup);

        let task = {
            let counter = counter.clone();
            let backup = Arc::clone(&backup);
            PeriodicBackup::start("counter", interval, move || {
                backup.write_with(|| counter.encode())
            })?
        };

        Ok(Self {
            counter,
            backup,
            task: Mutex::new(task),
        })
    }

    /// The in-memory counter
    pub fn counter(&self) -> &Counter {
        &self.counter
    }

    /// See [`Counter::add`]
    pub fn add(&self, timestamp: DateTime<Utc>, n: u64) {
        self.counter.add(timestamp, n);
    }

    /// See [`Counter::count`]
    pub fn count(&self) -> u64 {
        self.counter.count()
    }

    /// See [`Counter::first_at`]
    pub fn first_at(&self) -> Option<DateTime<Utc>> {
        self.counter.first_at()
    }

    /// See [`Counter::last_at`]
    pub fn last_at(&self) -> Option<DateTime<Utc>> {
        self.counter.last_at()
    }

    /// Write the current state to the backup file
    pub fn sync_backup(&self) -> Result<(), BackupError> {
        self.backup.write_with(|| self.counter.encode())
    }

    /// Stop the periodic backup, write the final state and close the file
    pub fn close(&self) -> Result<(), BackupError> {
        if let Some(task) = self.task.lock().take() {
            task.stop();
        }
        self.sync_backup()?;
        self.backup.close()
    }
}

fn format_opt(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_default()
}

fn parse_opt(value: &str) -> Result<Option<DateTime<Utc>>, chrono::ParseError> {
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(value, TIME_FORMAT).map(|t| Some(t.and_utc()))
}

fn decode(content: &str) -> Result<State, BackupError> {
    if content.is_empty() {
        return Ok(State::default());
    }

    let parts: Vec<&str> = content.split(',').collect();
    let [count, first_at, last_at] = parts.as_slice() else {
        return Err(BackupError::invalid(
            content,
            format!(
                "expected 3 comma-separated values, found {}",
                parts.len()
            ),
        ));
    };

    let count = count
        .parse()
        .map_err(|_| BackupError::invalid(content, format!("invalid count \"{}\"", count)))?;
    let first_at = parse_opt(first_at).map_err(|_| {
        BackupError::invalid(content, format!("invalid firstAt time \"{}\"", first_at))
    })?;
    let last_at = parse_opt(last_at).map_err(|_| {
        BackupError::invalid(content, format!("invalid lastAt time \"{}\"", last_at))
    })?;

    Ok(State {
        count,
        first_at,
        last_at,
    })
}

#[cfg(test)]
#[path = "counter_test.rs"]
mod counter_test;
