//! Volume configuration

use std::time::Duration;

use serde::Deserialize;

/// Disk space pre-allocation for new slice files
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AllocationConfig {
    /// Pre-allocate disk space when a slice file is opened
    /// Default: true
    pub enabled: bool,

    /// Bytes to allocate when the slice does not specify its own size
    /// Default: 100 MiB
    #[serde(rename = "static")]
    pub static_size: u64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            static_size: 100 * 1024 * 1024,
        }
    }
}

/// Volume configuration
///
/// # Example
///
/// ```toml
/// [volume]
/// watch_drain_file = true
/// drain_check_interval = "1s"
///
/// [volume.allocation]
/// enabled = true
/// static = 104857600
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VolumeConfig {
    /// Disk allocation settings
    pub allocation: AllocationConfig,

    /// Keep checking the drain file while the volume is open
    /// Default: true
    pub watch_drain_file: bool,

    /// How often the drain file is checked
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub drain_check_interval: Duration,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            allocation: AllocationConfig::default(),
            watch_drain_file: true,
            drain_check_interval: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VolumeConfig::default();
        assert!(config.allocation.enabled);
        assert_eq!(config.allocation.static_size, 100 * 1024 * 1024);
        assert!(config.watch_drain_file);
        assert_eq!(config.drain_check_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_deserialize() {
        let toml = r#"
watch_drain_file = false
drain_check_interval = "250ms"

[allocation]
static = 1024
"#;
        let config: VolumeConfig = toml::from_str(toml).unwrap();
        assert!(!config.watch_drain_file);
        assert_eq!(config.drain_check_interval, Duration::from_millis(250));
        assert!(config.allocation.enabled);
        assert_eq!(config.allocation.static_size, 1024);
    }
}
