//! Configuration module for serial-instruments.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//! The loaded [`Config`] is read-only to the device layer; it reaches each
//! component through a [`DeviceContext`](crate::context::DeviceContext).
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_INSTR_CONFIG` environment variable (explicit path)
//! 2. `./serial-instruments.toml` (current directory)
//! 3. `~/.config/serial-instruments/config.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\serial-instruments\config.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is: `SERIAL_INSTR_<SECTION>_<KEY>`
//!
//! Examples:
//! - `SERIAL_INSTR_SERIAL_BAUD_RATE=115200`
//! - `SERIAL_INSTR_DEVICE_PORT=/dev/ttyACM0`
//! - `SERIAL_INSTR_USB_SWITCH_PORT=COM7`
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_instruments::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! println!("Default baud: {}", loader.config().serial.baud_rate);
//! # Ok::<(), serial_instruments::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{get_default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{
    Config, DeviceConfig, LogFormat, LoggingConfig, SerialConfig, UsbSwitchConfig, Verbosity,
};
