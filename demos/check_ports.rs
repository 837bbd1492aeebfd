//! Check available serial ports on the system.
//!
//! Lists every interface the platform reports and marks the ones matching
//! the vendor/product id given on the command line (default: the MCCI 3141
//! USB switch). A matching interface is trial-opened to show whether it is
//! free.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example check_ports
//! cargo run --example check_ports -- 2341 0043
//! ```

use serial_instruments::config::Config;
use serial_instruments::{
    parse_usb_id, DeviceContext, ErrorKind, PortLocator, SystemPorts, USB_SWITCH_PID,
    USB_SWITCH_VID,
};
use std::sync::Arc;

fn main() {
    let mut args = std::env::args().skip(1);
    let vid = args.next().unwrap_or_else(|| format!("{USB_SWITCH_VID:04X}"));
    let pid = args.next().unwrap_or_else(|| format!("{USB_SWITCH_PID:04X}"));

    let (vid, pid) = match (parse_usb_id(&vid), parse_usb_id(&pid)) {
        (Ok(vid), Ok(pid)) => (vid, pid),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("{e}");
            std::process::exit(e.code());
        }
    };

    println!("Serial Port Detection Utility");
    println!("{:=<70}", "");
    println!();

    let ctx = DeviceContext::with_tracing(Config::default());
    let ports = Arc::new(SystemPorts);
    let locator = PortLocator::new(ports.clone(), ports, ctx);

    let found = match locator.list() {
        Ok(found) => found,
        Err(e) => {
            println!("Error detecting serial ports: {e}");
            println!();
            println!("Possible causes:");
            println!("  - Insufficient permissions");
            println!("  - Serial port drivers not installed");
            return;
        }
    };

    if found.is_empty() {
        println!("No serial ports detected on this system");
        return;
    }

    println!("Found {} serial port(s):", found.len());
    println!();
    for (idx, port) in found.iter().enumerate() {
        let marker = if port.matches(vid, pid) { "  <== match" } else { "" };
        println!("{}. {}{marker}", idx + 1, port.port_name);
        println!("{:-<70}", "");
        match port.usb_id() {
            Some(id) => println!("   USB id:       {id}"),
            None => println!("   Type:         not USB"),
        }
        if let Some(manufacturer) = &port.manufacturer {
            println!("   Manufacturer: {manufacturer}");
        }
        if let Some(product) = &port.product {
            println!("   Product:      {product}");
        }
        if let Some(serial) = &port.serial_number {
            println!("   Serial#:      {serial}");
        }
        println!();
    }

    println!("{:=<70}", "");
    match locator.find_usb(vid, pid) {
        Ok(name) => println!("{vid:04X}:{pid:04X} is available at {name}"),
        Err(e) if e.kind() == ErrorKind::Unavailable => {
            println!("{vid:04X}:{pid:04X} is present but held by another process")
        }
        Err(e) => println!("{vid:04X}:{pid:04X}: {e}"),
    }
}
