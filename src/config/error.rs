//! Errors raised while loading, validating or saving configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly named file does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not fit the schema.
    #[error("Invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value parsed but makes no sense for a serial instrument, e.g. a
    /// zero baud rate or a vid that is not hex.
    #[error("Invalid value for '{key}': {message}")]
    Invalid { key: String, message: String },

    /// A `SERIAL_INSTR_*` override could not be parsed.
    #[error("Invalid environment override {var}: {message}")]
    Env { var: String, message: String },
}

impl ConfigError {
    /// `key` is the dotted setting name, e.g. `usb_switch.vid`.
    pub fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn env_parse(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Env {
            var: var.into(),
            message: message.into(),
        }
    }

    /// Offending file, for errors tied to one.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::NotFound(path)
            | Self::Read { path, .. }
            | Self::Parse { path, .. }
            | Self::Write { path, .. } => Some(path),
            Self::Serialize(_) | Self::Invalid { .. } | Self::Env { .. } => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_setting() {
        let err = ConfigError::validation("usb_switch.vid", "must be hex");
        assert_eq!(err.to_string(), "Invalid value for 'usb_switch.vid': must be hex");
        assert!(err.path().is_none());

        let err = ConfigError::env_parse("SERIAL_INSTR_SERIAL_BAUD_RATE", "Invalid baud rate: x");
        assert!(err.to_string().contains("SERIAL_INSTR_SERIAL_BAUD_RATE"));
    }

    #[test]
    fn test_parse_error_keeps_path() {
        let source = toml::from_str::<toml::Table>("serial = [").unwrap_err();
        let err = ConfigError::Parse {
            path: PathBuf::from("bench.toml"),
            source,
        };
        assert_eq!(err.path(), Some(&PathBuf::from("bench.toml")));
        assert!(err.to_string().starts_with("Invalid TOML in bench.toml"));
    }
}
