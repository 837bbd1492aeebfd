//! Port-specific error types.
//!
//! These are the raw faults reported by the serial backend. The core wraps
//! them into a [`CommandError`](crate::error::CommandError) with an
//! [`ErrorKind`](crate::error::ErrorKind) before handing them to callers.

use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// The port exists but another process holds it.
    #[error("Serial port is busy: {0}")]
    Busy(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The device went away while the port was open.
    #[error("Device disconnected: {0}")]
    Disconnected(String),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Busy error from a port name.
    pub fn busy(port_name: impl Into<String>) -> Self {
        Self::Busy(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a Timeout error from a duration.
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout(duration)
    }

    /// True when the error only means "no data arrived before the timeout".
    ///
    /// The line protocol treats this as the normal end-of-data signal rather
    /// than a fault.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        let err = PortError::not_found("/dev/ttyUSB0");
        assert_eq!(err.to_string(), "Serial port not found: /dev/ttyUSB0");

        let err = PortError::config("Invalid baud rate");
        assert_eq!(err.to_string(), "Configuration error: Invalid baud rate");

        let err = PortError::busy("COM4");
        assert_eq!(err.to_string(), "Serial port is busy: COM4");
    }

    #[test]
    fn test_timeout_error() {
        let duration = std::time::Duration::from_millis(500);
        let err = PortError::timeout(duration);
        assert!(err.to_string().contains("500ms"));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_io_timeout_classification() {
        assert!(PortError::Io(io::Error::new(io::ErrorKind::TimedOut, "t")).is_timeout());
        assert!(PortError::Io(io::Error::new(io::ErrorKind::WouldBlock, "w")).is_timeout());
        assert!(!PortError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "b")).is_timeout());
        assert!(!PortError::Disconnected("x".into()).is_timeout());
    }
}
