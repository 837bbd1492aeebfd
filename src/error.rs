//! Result contract shared by every device operation.
//!
//! Expected device failures (nothing plugged in, port busy, cable pulled
//! mid-write) are ordinary outcomes here, so every operation returns a
//! [`CommandResult`] instead of panicking. A [`CommandError`] records its
//! [`ErrorKind`], a human-readable description, the call site that detected
//! the failure and, when there is one, the underlying [`PortError`].

use crate::port::PortError;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::panic::Location;
use thiserror::Error;

/// Result type for device operations.
pub type CommandResult<T> = Result<T, CommandError>;

/// The closed set of failure kinds a device operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A caller-supplied argument was missing or malformed.
    InvalidInput,
    /// No interface matched the requested vendor/product id.
    NotFound,
    /// A matching interface exists but could not be claimed.
    Unavailable,
    /// Opening the interface failed.
    ConnectFailure,
    /// The operation needs an open connection and there is none.
    NotConnected,
    /// Transmitting to the device failed.
    WriteFailure,
    /// Receiving from the device failed.
    ReadFailure,
}

impl ErrorKind {
    /// Stable numeric result code. Zero is reserved for success.
    pub fn code(self) -> i32 {
        match self {
            Self::InvalidInput => 1,
            Self::NotFound => 2,
            Self::Unavailable => 3,
            Self::ConnectFailure => 4,
            Self::NotConnected => 5,
            Self::WriteFailure => 6,
            Self::ReadFailure => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid input",
            Self::NotFound => "not found",
            Self::Unavailable => "unavailable",
            Self::ConnectFailure => "connect failure",
            Self::NotConnected => "not connected",
            Self::WriteFailure => "write failure",
            Self::ReadFailure => "read failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed device operation.
#[derive(Debug, Error)]
#[error("{kind}: {description}")]
pub struct CommandError {
    kind: ErrorKind,
    description: String,
    location: &'static Location<'static>,
    #[source]
    cause: Option<PortError>,
}

impl CommandError {
    /// Create an error attributed to the caller's source location.
    #[track_caller]
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            location: Location::caller(),
            cause: None,
        }
    }

    /// Create an error wrapping a port-level fault.
    ///
    /// The fault's text is appended to the description so it survives even
    /// when only the description reaches the user.
    #[track_caller]
    pub fn with_cause(kind: ErrorKind, description: impl Into<String>, cause: PortError) -> Self {
        Self {
            kind,
            description: format!("{}: {}", description.into(), cause),
            location: Location::caller(),
            cause: Some(cause),
        }
    }

    #[track_caller]
    pub fn invalid_input(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, description)
    }

    #[track_caller]
    pub fn not_connected(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotConnected, description)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// `file:line:column` of the code that detected the failure.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// The port-level fault behind this error, if any.
    pub fn cause(&self) -> Option<&PortError> {
        self.cause.as_ref()
    }

    /// Build the record handed to an [`ErrorSink`](crate::context::ErrorSink).
    pub fn to_record(&self, name: impl Into<String>) -> ErrorRecord {
        ErrorRecord {
            name: name.into(),
            kind: self.kind,
            code: self.code(),
            description: self.description.clone(),
            source: format!(
                "{}:{}:{}",
                self.location.file(),
                self.location.line(),
                self.location.column()
            ),
            timestamp: Local::now(),
        }
    }
}

/// Structured failure record for the logging/error-reporting collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Which component or operation failed (e.g. `connection.open`).
    pub name: String,
    pub kind: ErrorKind,
    pub code: i32,
    pub description: String,
    /// Call site that detected the failure.
    pub source: String,
    pub timestamp: DateTime<Local>,
}

/// Failure of a multi-line read, carrying the lines received before the fault.
#[derive(Debug, Error)]
#[error("{error} (after {} line(s))", .collected.len())]
pub struct ReadLinesError {
    pub collected: Vec<String>,
    #[source]
    pub error: CommandError,
}

impl ReadLinesError {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl From<ReadLinesError> for CommandError {
    fn from(err: ReadLinesError) -> Self {
        err.error
    }
}
