//! Synchronous serial port implementation.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own `SerialPortAdapter`
//! trait, and exposes the platform's port enumeration and open calls through
//! [`SystemPorts`].

use super::error::PortError;
use super::traits::{
    PortConfiguration, PortDescriptor, PortLister, PortOpener, SerialPortAdapter,
};
use serialport::SerialPortType;
use std::io::{Read, Write};
use std::time::Duration;

/// Synchronous serial port implementation wrapping `serialport::SerialPort`.
pub struct SyncSerialPort {
    /// The underlying serial port implementation.
    port: Box<dyn serialport::SerialPort>,
    /// The port name/path for identification.
    name: String,
    read_timeout: Duration,
    write_timeout: Duration,
    /// Timeout currently programmed into the OS handle.
    active_timeout: Duration,
}

impl SyncSerialPort {
    /// Open a serial port with the given configuration.
    ///
    /// # Arguments
    /// * `port_name` - The system path to the serial port (e.g., "/dev/ttyUSB0" or "COM3")
    /// * `config` - Configuration parameters for the port
    ///
    /// # Example
    /// ```no_run
    /// use serial_instruments::port::{SyncSerialPort, PortConfiguration};
    ///
    /// let config = PortConfiguration::default();
    /// let port = SyncSerialPort::open("/dev/ttyUSB0", &config)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(port_name: &str, config: &PortConfiguration) -> Result<Self, PortError> {
        let port = serialport::new(port_name, config.baud_rate)
            .data_bits(config.data_bits.into())
            .flow_control(config.flow_control.into())
            .parity(config.parity.into())
            .stop_bits(config.stop_bits.into())
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| classify_open_error(port_name, e))?;

        Ok(Self {
            port,
            name: port_name.to_string(),
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            active_timeout: config.read_timeout,
        })
    }

    fn apply_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        if self.active_timeout != timeout {
            self.port.set_timeout(timeout).map_err(PortError::Serial)?;
            self.active_timeout = timeout;
        }
        Ok(())
    }
}

fn classify_open_error(port_name: &str, e: serialport::Error) -> PortError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => PortError::not_found(port_name),
        serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            PortError::busy(port_name)
        }
        _ if e.description.to_ascii_lowercase().contains("busy") => PortError::busy(port_name),
        _ => PortError::Serial(e),
    }
}

/// Map a read/write failure, telling a vanished device apart from other I/O faults.
///
/// Timeouts stay `Io` so callers can still treat them as a quiet line.
fn classify_io_error(port_name: &str, e: std::io::Error) -> PortError {
    use std::io::ErrorKind as Kind;

    let device_gone = matches!(
        e.kind(),
        Kind::BrokenPipe | Kind::NotConnected | Kind::ConnectionAborted | Kind::ConnectionReset
    ) || e.raw_os_error().is_some_and(is_device_gone_os_error);

    if device_gone {
        PortError::Disconnected(port_name.to_string())
    } else {
        PortError::Io(e)
    }
}

#[cfg(unix)]
fn is_device_gone_os_error(code: i32) -> bool {
    // EIO, ENXIO, ENODEV: what a tty reports once its USB interface is unplugged.
    matches!(code, 5 | 6 | 19)
}

#[cfg(windows)]
fn is_device_gone_os_error(code: i32) -> bool {
    // ERROR_GEN_FAILURE, ERROR_DEVICE_NOT_CONNECTED
    matches!(code, 31 | 1167)
}

#[cfg(not(any(unix, windows)))]
fn is_device_gone_os_error(_code: i32) -> bool {
    false
}

impl SerialPortAdapter for SyncSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let write_timeout = self.write_timeout;
        self.apply_timeout(write_timeout)?;
        self.port
            .write_all(data)
            .map_err(|e| classify_io_error(&self.name, e))?;
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let read_timeout = self.read_timeout;
        self.apply_timeout(read_timeout)?;
        self.port
            .read(buffer)
            .map_err(|e| classify_io_error(&self.name, e))
    }

    fn flush(&mut self) -> Result<(), PortError> {
        self.port
            .flush()
            .map_err(|e| classify_io_error(&self.name, e))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.read_timeout = timeout;
        self.apply_timeout(timeout)
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(PortError::Serial)
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate())
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}

/// The host's serial interfaces, as seen through the `serialport` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl PortLister for SystemPorts {
    fn list_ports(&self) -> Result<Vec<PortDescriptor>, PortError> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|port| match port.port_type {
                SerialPortType::UsbPort(usb) => PortDescriptor {
                    manufacturer: usb.manufacturer,
                    product: usb.product,
                    serial_number: usb.serial_number,
                    ..PortDescriptor::usb(port.port_name, usb.vid, usb.pid)
                },
                _ => PortDescriptor::plain(port.port_name),
            })
            .collect())
    }
}

impl PortOpener for SystemPorts {
    fn open(
        &self,
        port_name: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        Ok(Box::new(SyncSerialPort::open(port_name, config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_not_found_error() {
        let config = PortConfiguration::default();
        let result = SyncSerialPort::open("/dev/nonexistent_port_12345", &config);

        assert!(result.is_err());
        if let Err(e) = result {
            match e {
                PortError::NotFound(name) => {
                    assert!(name.contains("nonexistent"));
                }
                PortError::Serial(_) | PortError::Io(_) | PortError::Config(_) => {
                    // Some platforms report a generic failure for missing devices.
                }
                _ => panic!("Expected NotFound error, got: {:?}", e),
            }
        }
    }

    #[test]
    fn test_busy_classification() {
        let err = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "Access is denied.",
        );
        assert!(matches!(classify_open_error("COM3", err), PortError::Busy(_)));

        let err = serialport::Error::new(
            serialport::ErrorKind::Unknown,
            "Device or resource busy",
        );
        assert!(matches!(classify_open_error("/dev/ttyACM0", err), PortError::Busy(_)));
    }

    #[test]
    fn test_no_device_classification() {
        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        assert!(matches!(
            classify_open_error("/dev/ttyACM9", err),
            PortError::NotFound(name) if name == "/dev/ttyACM9"
        ));
    }

    #[test]
    fn test_unplugged_device_is_disconnected() {
        let err = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        assert!(matches!(
            classify_io_error("/dev/ttyACM0", err),
            PortError::Disconnected(name) if name == "/dev/ttyACM0"
        ));

        #[cfg(unix)]
        assert!(matches!(
            classify_io_error("/dev/ttyACM0", std::io::Error::from_raw_os_error(6)),
            PortError::Disconnected(_)
        ));
        #[cfg(windows)]
        assert!(matches!(
            classify_io_error("COM3", std::io::Error::from_raw_os_error(1167)),
            PortError::Disconnected(_)
        ));
    }

    #[test]
    fn test_timeout_is_not_disconnected() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "Operation timed out");
        let classified = classify_io_error("COM3", err);
        assert!(matches!(classified, PortError::Io(_)));
        assert!(classified.is_timeout());

        let err = std::io::Error::from(std::io::ErrorKind::InvalidData);
        assert!(matches!(classify_io_error("COM3", err), PortError::Io(_)));
    }
}
