//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use crate::port::{DataBits, FlowControl, Parity, PortConfiguration, StopBits};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Line settings for the generic serial port manager
    pub serial: SerialConfig,
    /// Default target device for the generic manager
    pub device: DeviceConfig,
    /// USB switch controller settings
    pub usb_switch: UsbSwitchConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check values that would otherwise only fail at the first device operation.
    pub fn validate(&self) -> ConfigResult<()> {
        self.serial.validate()?;
        if let Some(vid) = &self.device.vid {
            check_usb_id("device.vid", vid)?;
        }
        if let Some(pid) = &self.device.pid {
            check_usb_id("device.pid", pid)?;
        }
        check_usb_id("usb_switch.vid", &self.usb_switch.vid)?;
        check_usb_id("usb_switch.pid", &self.usb_switch.pid)?;
        if self.usb_switch.baud_rate == 0 {
            return Err(ConfigError::validation("usb_switch.baud_rate", "must be non-zero"));
        }
        if self.usb_switch.tx_newline.is_empty() {
            return Err(ConfigError::validation("usb_switch.tx_newline", "must not be empty"));
        }
        Ok(())
    }
}

fn check_usb_id(key: &str, value: &str) -> ConfigResult<()> {
    crate::locator::parse_usb_id(value)
        .map(|_| ())
        .map_err(|e| ConfigError::validation(key, e.description()))
}

/// Serial line settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Receive timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Transmit timeout in milliseconds
    pub write_timeout_ms: u64,
    /// Appended to every transmitted line
    pub tx_newline: String,
    /// Marks the end of every received line
    pub rx_newline: String,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            read_timeout_ms: 100,
            write_timeout_ms: 100,
            tx_newline: "\n".to_string(),
            rx_newline: "\r\n".to_string(),
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Port-level settings for opening a connection.
    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            flow_control: self.flow_control,
            parity: self.parity,
            stop_bits: self.stop_bits,
            read_timeout: self.read_timeout(),
            write_timeout: self.write_timeout(),
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.baud_rate == 0 {
            return Err(ConfigError::validation("serial.baud_rate", "must be non-zero"));
        }
        if self.tx_newline.is_empty() {
            return Err(ConfigError::validation("serial.tx_newline", "must not be empty"));
        }
        if self.rx_newline.is_empty() {
            return Err(ConfigError::validation("serial.rx_newline", "must not be empty"));
        }
        Ok(())
    }
}

/// Which device the generic manager connects to when none is named.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Explicit device path; skips discovery when set
    pub port_name: Option<String>,
    /// USB vendor id as hex, e.g. "045E"
    pub vid: Option<String>,
    /// USB product id as hex, e.g. "0646"
    pub pid: Option<String>,
}

/// USB switch controller settings (MCCI Model 3141 defaults).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsbSwitchConfig {
    /// Explicit device path; skips discovery when set
    pub port_name: Option<String>,
    pub vid: String,
    pub pid: String,
    pub baud_rate: u32,
    /// Appended to every command
    pub tx_newline: String,
    /// How long to wait for a complete response block
    pub response_timeout_ms: u64,
}

impl Default for UsbSwitchConfig {
    fn default() -> Self {
        Self {
            port_name: None,
            vid: "045E".to_string(),
            pid: "0646".to_string(),
            baud_rate: 9600,
            tx_newline: "\r\n".to_string(),
            response_timeout_ms: 1000,
        }
    }
}

impl UsbSwitchConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// How much optional device tracing the core emits
    pub verbosity: Verbosity,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            verbosity: Verbosity::Min,
            format: LogFormat::Pretty,
        }
    }
}

/// Amount of optional trace output produced by the device layer.
///
/// Failures are always reported; verbosity only controls the extra lines.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Only major events and errors
    #[default]
    Min,
    Warnings,
    /// Every open, close, write and read
    Verbose,
    /// Adds every interface seen during discovery
    DebugLow,
    DebugMed,
    DebugHi,
}

impl Verbosity {
    /// Map a numeric level (e.g. a count of `-v` flags) onto a verbosity.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::Min,
            1 => Self::Warnings,
            2 => Self::Verbose,
            3 => Self::DebugLow,
            4 => Self::DebugMed,
            _ => Self::DebugHi,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}
