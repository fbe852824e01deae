//! Sync configuration
//!
//! Controls when buffered data is flushed to the OS cache or synced to disk,
//! and whether writers wait for that to happen.

use std::time::Duration;

use serde::Deserialize;

/// Durability level reached by a sync
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// No periodic sync, data reaches the disk on close only
    Disabled,
    /// Flush buffers and fsync the file (default)
    #[default]
    Disk,
    /// Flush buffers to the OS disk cache
    Cache,
}

impl SyncMode {
    /// Name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Disk => "disk",
            Self::Cache => "cache",
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sync configuration
///
/// A sync is triggered by whichever threshold is reached first, counted
/// since the last successful sync.
///
/// # Example
///
/// ```toml
/// [encoding.sync]
/// mode = "disk"
/// wait = true
/// check_interval = "5ms"
/// count_trigger = 500
/// interval_trigger = "50ms"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Sync mode (disabled, disk, cache)
    /// Default: disk
    pub mode: SyncMode,

    /// Block each write until the sync covering it completes
    /// Default: true
    pub wait: bool,

    /// How often trigger conditions are evaluated
    /// Default: 5ms
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,

    /// Accepted writes since the last sync
    /// Default: 500
    pub count_trigger: u64,

    /// Uncompressed bytes written since the last sync
    /// Default: 10 MiB
    pub uncompressed_bytes_trigger: u64,

    /// Compressed bytes written since the last sync
    /// Default: 1 MiB
    pub compressed_bytes_trigger: u64,

    /// Time since the last sync
    /// Default: 50ms
    #[serde(with = "humantime_serde")]
    pub interval_trigger: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::Disk,
            wait: true,
            check_interval: Duration::from_millis(5),
            count_trigger: 500,
            uncompressed_bytes_trigger: 10 * 1024 * 1024,
            compressed_bytes_trigger: 1024 * 1024,
            interval_trigger: Duration::from_millis(50),
        }
    }
}

impl SyncConfig {
    /// Config with sync disabled
    pub fn disabled() -> Self {
        Self {
            mode: SyncMode::Disabled,
            wait: false,
            ..Default::default()
        }
    }

    /// Set the sync mode
    #[must_use]
    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the wait flag
    #[must_use]
    pub fn with_wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Set the check interval
    #[must_use]
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Set the count trigger
    #[must_use]
    pub fn with_count_trigger(mut self, count: u64) -> Self {
        self.count_trigger = count;
        self
    }

    /// Set the uncompressed bytes trigger
    #[must_use]
    pub fn with_uncompressed_bytes_trigger(mut self, bytes: u64) -> Self {
        self.uncompressed_bytes_trigger = bytes;
        self
    }

    /// Set the compressed bytes trigger
    #[must_use]
    pub fn with_compressed_bytes_trigger(mut self, bytes: u64) -> Self {
        self.compressed_bytes_trigger = bytes;
        self
    }

    /// Set the interval trigger
    #[must_use]
    pub fn with_interval_trigger(mut self, interval: Duration) -> Self {
        self.interval_trigger = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.mode, SyncMode::Disk);
        assert!(config.wait);
        assert_eq!(config.check_interval, Duration::from_millis(5));
        assert_eq!(config.count_trigger, 500);
        assert_eq!(config.interval_trigger, Duration::from_millis(50));
    }

    #[test]
    fn test_deserialize() {
        let toml = r#"
mode = "cache"
wait = false
check_interval = "20ms"
interval_trigger = "2s"
compressed_bytes_trigger = 4096
"#;
        let config: SyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.mode, SyncMode::Cache);
        assert!(!config.wait);
        assert_eq!(config.check_interval, Duration::from_millis(20));
        assert_eq!(config.interval_trigger, Duration::from_secs(2));
        assert_eq!(config.compressed_bytes_trigger, 4096);
        assert_eq!(config.count_trigger, 500);
    }

    #[test]
    fn test_deserialize_all_modes() {
        for (s, expected) in [
            ("disabled", SyncMode::Disabled),
            ("disk", SyncMode::Disk),
            ("cache", SyncMode::Cache),
        ] {
            let config: SyncConfig = toml::from_str(&format!("mode = \"{}\"", s)).unwrap();
            assert_eq!(config.mode, expected);
            assert_eq!(expected.as_str(), s);
        }
    }

    #[test]
    fn test_builder() {
        let config = SyncConfig::default()
            .with_mode(SyncMode::Cache)
            .with_wait(false)
            .with_count_trigger(10);
        assert_eq!(config.mode, SyncMode::Cache);
        assert!(!config.wait);
        assert_eq!(config.count_trigger, 10);
    }
}
