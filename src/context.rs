//! Explicitly constructed context shared by the device components.
//!
//! A [`DeviceContext`] bundles the read-only configuration with the sink
//! that receives failure records. It is built once by the caller and passed
//! to each component at construction; there is no process-wide instance.

use crate::config::{Config, Verbosity};
use crate::error::{CommandError, ErrorRecord};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

/// Receives a structured record for every failed device operation.
pub trait ErrorSink: Send + Sync + std::fmt::Debug {
    fn record(&self, record: ErrorRecord);
}

/// Forwards records to `tracing` as warning events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn record(&self, record: ErrorRecord) {
        warn!(
            name = %record.name,
            kind = %record.kind,
            code = record.code,
            source = %record.source,
            timestamp = %record.timestamp.to_rfc3339(),
            "{}",
            record.description
        );
    }
}

/// Keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<ErrorRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl ErrorSink for MemorySink {
    fn record(&self, record: ErrorRecord) {
        self.records.lock().push(record);
    }
}

/// Configuration and reporting collaborators handed to each component.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    config: Arc<Config>,
    sink: Arc<dyn ErrorSink>,
}

impl DeviceContext {
    pub fn new(config: Config, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            config: Arc::new(config),
            sink,
        }
    }

    /// Context that reports failures through `tracing`.
    pub fn with_tracing(config: Config) -> Self {
        Self::new(config, Arc::new(TracingSink))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn verbosity(&self) -> Verbosity {
        self.config.logging.verbosity
    }

    /// True when optional trace output at `level` should be produced.
    pub fn traces(&self, level: Verbosity) -> bool {
        self.verbosity() >= level
    }

    /// Send a failure to the sink and hand it back for propagation.
    pub fn report(&self, name: &str, error: CommandError) -> CommandError {
        self.sink.record(error.to_record(name));
        error
    }
}

impl Default for DeviceContext {
    fn default() -> Self {
        Self::with_tracing(Config::default())
    }
}
