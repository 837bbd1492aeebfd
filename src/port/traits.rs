//! Core traits for serial port abstraction.
//!
//! `SerialPortAdapter` lets real serial ports and mocks be used
//! interchangeably for I/O. `PortLister` and `PortOpener` cover the two
//! platform facilities the core needs beyond I/O: enumerating interfaces and
//! opening one by name.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration parameters for a serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Flow control mode.
    pub flow_control: FlowControl,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Receive timeout.
    pub read_timeout: Duration,

    /// Transmit timeout.
    pub write_timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: Duration::from_millis(100),
            write_timeout: Duration::from_millis(100),
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// A serial interface as reported by the platform at enumeration time.
///
/// Produced transiently by discovery and never persisted. Only USB
/// interfaces report a vendor/product id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// Device path or name (e.g. `/dev/ttyACM0`, `COM7`).
    pub port_name: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    /// Whether the interface is believed free to open. Only meaningful after a
    /// trial open; enumeration alone reports `true`.
    pub available: bool,
}

impl PortDescriptor {
    /// Descriptor for a non-USB interface.
    pub fn plain(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial_number: None,
            available: true,
        }
    }

    /// Descriptor for a USB interface with the given ids.
    pub fn usb(port_name: impl Into<String>, vid: u16, pid: u16) -> Self {
        Self {
            vid: Some(vid),
            pid: Some(pid),
            ..Self::plain(port_name)
        }
    }

    /// True when this interface reports exactly the given vendor/product ids.
    pub fn matches(&self, vid: u16, pid: u16) -> bool {
        self.vid == Some(vid) && self.pid == Some(pid)
    }

    /// `VVVV:PPPP` in upper-case hex, or `None` for non-USB interfaces.
    pub fn usb_id(&self) -> Option<String> {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => Some(format!("{vid:04X}:{pid:04X}")),
            _ => None,
        }
    }
}

/// Trait for serial port I/O operations.
///
/// This trait abstracts over synchronous serial port operations, allowing both
/// real hardware ports and mock implementations for testing.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the serial port.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes from the serial port into the provided buffer.
    ///
    /// Blocks for at most the current timeout. When nothing arrives in time
    /// the returned error satisfies [`PortError::is_timeout`].
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Push any buffered output to the device.
    fn flush(&mut self) -> Result<(), PortError> {
        Ok(())
    }

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Set the read timeout for this port.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Discard any unread data in the receive buffer.
    fn clear_input(&mut self) -> Result<(), PortError>;
}

/// Enumerates the serial interfaces currently visible to the process.
pub trait PortLister: Send + Sync + std::fmt::Debug {
    /// List interfaces in platform enumeration order.
    fn list_ports(&self) -> Result<Vec<PortDescriptor>, PortError>;
}

/// Opens a serial interface by name.
pub trait PortOpener: Send + Sync + std::fmt::Debug {
    fn open(
        &self,
        port_name: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = PortConfiguration::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.flow_control, FlowControl::None);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.read_timeout, Duration::from_millis(100));
        assert_eq!(config.write_timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_parity_conversion() {
        let parity = Parity::Even;
        let serialport_parity: serialport::Parity = parity.into();
        assert_eq!(serialport_parity, serialport::Parity::Even);
    }

    #[test]
    fn test_stop_bits_conversion() {
        let stop_bits = StopBits::Two;
        let serialport_stop_bits: serialport::StopBits = stop_bits.into();
        assert_eq!(serialport_stop_bits, serialport::StopBits::Two);
    }

    #[test]
    fn test_descriptor_matching() {
        let usb = PortDescriptor::usb("/dev/ttyACM0", 0x045E, 0x0646);
        assert!(usb.matches(0x045E, 0x0646));
        assert!(!usb.matches(0x045E, 0x0647));
        assert_eq!(usb.usb_id().as_deref(), Some("045E:0646"));

        let plain = PortDescriptor::plain("/dev/ttyS0");
        assert!(!plain.matches(0, 0));
        assert_eq!(plain.usb_id(), None);
    }
}
