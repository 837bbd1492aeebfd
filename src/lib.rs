//! Serial Instruments Library
//!
//! Device-control layer for USB-attached serial instruments: locate an
//! interface by USB vendor/product id, manage the connection to it, and
//! exchange newline-delimited text commands with timeouts.
//!
//! # Modules
//!
//! - `config`: Configuration management with TOML support
//! - `context`: Injected configuration and failure-record sink
//! - `error`: Result contract and error taxonomy for device operations
//! - `port`: Port abstraction layer for serial communication
//! - `locator`: Interface discovery by vendor/product id
//! - `connection`: Connection lifecycle
//! - `transport`: Line-oriented reads and writes
//! - `device`: Command facades for specific instruments
//! - `logging`: Subscriber setup for binaries
//!
//! # Example
//!
//! ```no_run
//! use serial_instruments::{config::ConfigLoader, DeviceContext, UsbSwitch};
//!
//! let ctx = DeviceContext::with_tracing(ConfigLoader::with_defaults().into_config());
//! let mut switch = UsbSwitch::system(ctx);
//! switch.enable_port(1)?;
//! println!("now on {}", switch.query_state()?);
//! # Ok::<(), serial_instruments::CommandError>(())
//! ```

pub mod config;
pub mod connection;
pub mod context;
pub mod device;
pub mod error;
pub mod locator;
pub mod logging;
pub mod port;
pub mod transport;

// Re-export commonly used types for convenience
pub use connection::{ConnectionHandle, ConnectionManager, ConnectionState, PortTarget};
pub use context::{DeviceContext, ErrorSink, MemorySink, TracingSink};
pub use device::{FirmwareVersion, SwitchState, UsbSwitch, USB_SWITCH_PID, USB_SWITCH_VID};
pub use error::{CommandError, CommandResult, ErrorKind, ErrorRecord, ReadLinesError};
pub use locator::{parse_usb_id, PortLocator};
pub use port::{
    DataBits, FlowControl, MockPortRegistry, MockSerialPort, Parity, PortConfiguration,
    PortDescriptor, PortError, PortLister, PortOpener, SerialPortAdapter, StopBits,
    SyncSerialPort, SystemPorts,
};
pub use transport::{LineTransport, ReadLinesOptions};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
