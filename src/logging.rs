//! `tracing` subscriber setup for binaries.

use crate::config::{LogFormat, LoggingConfig};
use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Failure to install the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level '{level}': {source}")]
    InvalidLevel {
        level: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("Failed to initialize tracing: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install a global subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this twice
/// is harmless; the second call keeps the existing subscriber.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|source| LoggingError::InvalidLevel {
            level: config.level.clone(),
            source,
        })?;

    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_filter(env_filter),
            )
            .try_init()?,
        LogFormat::Compact => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(false)
                    .with_writer(std::io::stderr)
                    .with_filter(env_filter),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_filter(env_filter),
            )
            .try_init()?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_init_twice_is_ok() {
        let config = LoggingConfig {
            format: LogFormat::Compact,
            ..LoggingConfig::default()
        };
        assert!(init(&config).is_ok());
        assert!(init(&config).is_ok());
    }

    #[test]
    #[serial]
    fn test_invalid_level_is_reported() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "serial_instruments=loud".to_string(),
            ..LoggingConfig::default()
        };
        match init(&config) {
            Err(LoggingError::InvalidLevel { level, .. }) => {
                assert_eq!(level, "serial_instruments=loud")
            }
            other => panic!("expected an invalid level error, got {other:?}"),
        }
    }
}
