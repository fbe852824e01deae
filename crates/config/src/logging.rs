//! Logging configuration and subscriber setup
//!
//! Library crates only emit `tracing` events. Binaries and integration tests
//! call [`init_logging`] once to install the subscriber.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Deserialize;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{ConfigError, Result};

/// Fallback filter when the configured one cannot be parsed
const DEFAULT_FILTER: &str = "info";

/// Output format of log lines
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One human-readable line per event
    #[default]
    Text,
    /// One JSON object per event, fields flattened
    Json,
}

/// Destination of log lines
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stderr,
    Stdout,
    /// Append to a file
    #[serde(untagged)]
    File(PathBuf),
}

/// Logging configuration
///
/// ```toml
/// [log]
/// filter = "info,sluice_encoding=debug"
/// format = "json"
/// output = "/var/log/sluice.log"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directives, e.g. `debug` or `info,sluice_volume=trace`
    pub filter: String,

    pub format: LogFormat,

    pub output: LogOutput,

    /// Include the module path of the event
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_owned(),
            format: LogFormat::Text,
            output: LogOutput::Stderr,
            with_target: false,
        }
    }
}

impl LogConfig {
    /// Filter built from the directives, `info` if they do not parse
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }

    fn make_writer(&self) -> Result<BoxMakeWriter> {
        Ok(match &self.output {
            LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
            LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogOutput::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| ConfigError::IoError {
                        path: path.display().to_string(),
                        source,
                    })?;
                BoxMakeWriter::new(Mutex::new(file))
            }
        })
    }
}

/// Install the global `tracing` subscriber
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let writer = config.make_writer()?;
    let ansi = matches!(config.output, LogOutput::Stderr | LogOutput::Stdout);

    let registry = tracing_subscriber::registry().with(config.env_filter());
    let installed = match config.format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(config.with_target)
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_target(config.with_target)
                    .with_writer(writer),
            )
            .try_init(),
    };

    installed.map_err(|err| ConfigError::Logging(err.to_string()))
}
