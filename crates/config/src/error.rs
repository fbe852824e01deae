//! Configuration errors

use std::io;

use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config or log file cannot be opened
    #[error("cannot open \"{path}\": {source}")]
    IoError {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Not valid TOML, or an unknown enum value such as a compression type
    #[error("invalid config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A value is out of its allowed range, e.g. `encoding.sync` `count_trigger`
    #[error("{component} has invalid {field}: {message}")]
    InvalidValue {
        component: &'static str,
        field: &'static str,
        message: String,
    },

    #[error("cannot initialize logging: {0}")]
    Logging(String),
}

impl ConfigError {
    pub(crate) fn invalid_value(
        component: &'static str,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            component,
            field,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_message() {
        let err = ConfigError::invalid_value("encoding.sync", "count_trigger", "must be positive");
        assert_eq!(
            err.to_string(),
            "encoding.sync has invalid count_trigger: must be positive"
        );
    }

    #[test]
    fn test_io_error_names_the_file() {
        let err = ConfigError::IoError {
            path: "sluice.toml".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("cannot open \"sluice.toml\": "));
    }
}
