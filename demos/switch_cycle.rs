//! Cycle an MCCI 3141 USB switch through both ports.
//!
//! Prints the firmware version, connects port 1, then port 2, and finally
//! restores whatever was connected before.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug SERIAL_INSTR_LOGGING_VERBOSITY=2 cargo run --example switch_cycle
//! ```

use serial_instruments::config::ConfigLoader;
use serial_instruments::{logging, DeviceContext, UsbSwitch};
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load()?.into_config();
    logging::init(&config.logging)?;

    let mut switch = UsbSwitch::system(DeviceContext::with_tracing(config));
    let port_name = switch.connect()?;
    println!("Switch at {port_name}, {}", switch.get_firmware_version()?);

    let initial = switch.query_state()?;
    println!("Initially {initial}");

    for port in [1, 2] {
        switch.enable_port(port)?;
        println!("Now {}", switch.query_state()?);
        std::thread::sleep(Duration::from_secs(2));
    }

    switch.set_port(initial)?;
    println!("Restored {}", switch.query_state()?);
    Ok(())
}
