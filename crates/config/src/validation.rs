//! Configuration validation
//!
//! Validates value ranges the type system cannot express:
//! - Sync triggers and check interval are positive when sync is enabled
//! - The check interval is not longer than the interval trigger
//! - Compression levels and sizes are in range
//! - The encoder row limit is positive

use crate::Config;
use crate::compression::{CompressionConfig, CompressionType};
use crate::encoding::EncodingConfig;
use crate::error::{ConfigError, Result};
use crate::sync::{SyncConfig, SyncMode};
use crate::volume::VolumeConfig;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_encoding(&config.encoding)?;
    validate_volume(&config.volume)?;
    Ok(())
}

/// Validate the encoding pipeline configuration
pub fn validate_encoding(config: &EncodingConfig) -> Result<()> {
    if config.encoder.row_size_limit == 0 {
        return Err(ConfigError::invalid_value(
            "encoding.encoder",
            "row_size_limit",
            "must be positive",
        ));
    }
    validate_compression(&config.compression)?;
    validate_sync(&config.sync)?;
    Ok(())
}

fn validate_compression(config: &CompressionConfig) -> Result<()> {
    match config.kind {
        CompressionType::None => {}
        CompressionType::Gzip => {
            if !(1..=9).contains(&config.gzip.level) {
                return Err(ConfigError::invalid_value(
                    "encoding.compression.gzip",
                    "level",
                    format!("{} is not in range 1-9", config.gzip.level),
                ));
            }
            if config.gzip.block_size == 0 {
                return Err(ConfigError::invalid_value(
                    "encoding.compression.gzip",
                    "block_size",
                    "must be positive",
                ));
            }
        }
        CompressionType::Zstd => {
            if !(1..=22).contains(&config.zstd.level) {
                return Err(ConfigError::invalid_value(
                    "encoding.compression.zstd",
                    "level",
                    format!("{} is not in range 1-22", config.zstd.level),
                ));
            }
            let window = config.zstd.window_size;
            if window < 1024 || !window.is_power_of_two() {
                return Err(ConfigError::invalid_value(
                    "encoding.compression.zstd",
                    "window_size",
                    format!("{} must be a power of two, at least 1024", window),
                ));
            }
        }
    }
    Ok(())
}

fn validate_sync(config: &SyncConfig) -> Result<()> {
    if config.mode == SyncMode::Disabled {
        return Ok(());
    }

    if config.check_interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "encoding.sync",
            "check_interval",
            "must be positive",
        ));
    }
    if config.interval_trigger.is_zero() {
        return Err(ConfigError::invalid_value(
            "encoding.sync",
            "interval_trigger",
            "must be positive",
        ));
    }
    if config.check_interval > config.interval_trigger {
        return Err(ConfigError::invalid_value(
            "encoding.sync",
            "check_interval",
            "must not be longer than interval_trigger",
        ));
    }

    for (field, value) in [
        ("count_trigger", config.count_trigger),
        ("uncompressed_bytes_trigger", config.uncompressed_bytes_trigger),
        ("compressed_bytes_trigger", config.compressed_bytes_trigger),
    ] {
        if value == 0 {
            return Err(ConfigError::invalid_value(
                "encoding.sync",
                field,
                "must be positive",
            ));
        }
    }

    Ok(())
}

fn validate_volume(config: &VolumeConfig) -> Result<()> {
    if config.watch_drain_file && config.drain_check_interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "volume",
            "drain_check_interval",
            "must be positive",
        ));
    }
    Ok(())
}
