//! Shared test utilities for the integration tests.
//!
//! Everything runs against [`MockPortRegistry`], so no hardware is needed.

#![allow(dead_code)]

use serial_instruments::config::Config;
use serial_instruments::{
    ConnectionManager, DeviceContext, LineTransport, MemorySink, MockPortRegistry,
    MockSerialPort, UsbSwitch, USB_SWITCH_PID, USB_SWITCH_VID,
};
use std::sync::Arc;

/// Device path of the switch in tests that need one.
pub const SWITCH_PORT: &str = "/dev/ttyACM0";

/// Config with short timeouts so tests that wait for silence stay quick.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.serial.read_timeout_ms = 20;
    config.usb_switch.response_timeout_ms = 300;
    config
}

/// Fake platform plus the context and sink the code under test reports into.
pub struct Harness {
    pub registry: MockPortRegistry,
    pub sink: MemorySink,
    pub ctx: DeviceContext,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: Config) -> Self {
        let sink = MemorySink::new();
        Self {
            registry: MockPortRegistry::new(),
            ctx: DeviceContext::new(config, Arc::new(sink.clone())),
            sink,
        }
    }

    pub fn manager(&self) -> ConnectionManager {
        ConnectionManager::new(
            Arc::new(self.registry.clone()),
            Arc::new(self.registry.clone()),
            self.ctx.clone(),
        )
    }

    pub fn transport(&self) -> LineTransport {
        LineTransport::new(self.manager())
    }

    pub fn switch(&self) -> UsbSwitch {
        UsbSwitch::new(
            Arc::new(self.registry.clone()),
            Arc::new(self.registry.clone()),
            self.ctx.clone(),
        )
    }

    /// Register a switch at [`SWITCH_PORT`] and return its mock port.
    pub fn add_switch(&self) -> MockSerialPort {
        self.registry
            .add_usb(SWITCH_PORT, USB_SWITCH_VID, USB_SWITCH_PID)
    }

    /// Kinds of every failure reported so far, oldest first.
    pub fn reported_kinds(&self) -> Vec<serial_instruments::ErrorKind> {
        self.sink.records().iter().map(|r| r.kind).collect()
    }
}

/// Queue a switch response block: each line, then the closing blank line.
pub fn enqueue_reply(port: &mut MockSerialPort, lines: &[&str]) {
    port.enqueue_lines(lines, "\r\n");
    port.enqueue_read(b"\r\n");
}
