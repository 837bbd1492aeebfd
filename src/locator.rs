//! Locating a serial interface by USB vendor/product id.
//!
//! Discovery walks the platform's interface list in enumeration order, takes
//! the first interface reporting the requested ids and confirms it is free
//! with a trial open that is immediately closed again.

use crate::config::Verbosity;
use crate::context::DeviceContext;
use crate::error::{CommandError, CommandResult, ErrorKind};
use crate::port::{PortConfiguration, PortDescriptor, PortLister, PortOpener};
use std::sync::Arc;
use tracing::{debug, info};

/// Parse a USB vendor or product id written as hex (`"045E"`, `"0x45e"`).
pub fn parse_usb_id(text: &str) -> CommandResult<u16> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() {
        return Err(CommandError::invalid_input(format!(
            "USB id must not be empty: '{text}'"
        )));
    }
    if digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CommandError::invalid_input(format!(
            "USB id must be 1 to 4 hex digits: '{text}'"
        )));
    }
    u16::from_str_radix(digits, 16)
        .map_err(|e| CommandError::invalid_input(format!("Invalid USB id '{text}': {e}")))
}

/// Finds the device path of an interface by its USB ids.
#[derive(Debug, Clone)]
pub struct PortLocator {
    lister: Arc<dyn PortLister>,
    opener: Arc<dyn PortOpener>,
    probe_config: PortConfiguration,
    ctx: DeviceContext,
}

impl PortLocator {
    pub fn new(
        lister: Arc<dyn PortLister>,
        opener: Arc<dyn PortOpener>,
        ctx: DeviceContext,
    ) -> Self {
        Self {
            lister,
            opener,
            probe_config: ctx.config().serial.port_configuration(),
            ctx,
        }
    }

    /// Settings used for the trial open.
    pub fn with_probe_config(mut self, probe_config: PortConfiguration) -> Self {
        self.probe_config = probe_config;
        self
    }

    /// Every interface the platform currently reports, in enumeration order.
    pub fn list(&self) -> CommandResult<Vec<PortDescriptor>> {
        self.lister.list_ports().map_err(|e| {
            self.ctx.report(
                "locator.list",
                CommandError::with_cause(
                    ErrorKind::NotFound,
                    "Unable to enumerate serial ports",
                    e,
                ),
            )
        })
    }

    /// Find the interface for hex vendor/product ids such as `"045E"`/`"0646"`.
    pub fn find(&self, vid_hex: &str, pid_hex: &str) -> CommandResult<String> {
        let vid = parse_usb_id(vid_hex).map_err(|e| self.ctx.report("locator.find", e))?;
        let pid = parse_usb_id(pid_hex).map_err(|e| self.ctx.report("locator.find", e))?;
        self.find_usb(vid, pid)
    }

    /// Find the interface reporting exactly `vid`/`pid`.
    ///
    /// Only the first match is considered. If its trial open fails the result
    /// is [`ErrorKind::Unavailable`] even when a later interface also matches.
    pub fn find_usb(&self, vid: u16, pid: u16) -> CommandResult<String> {
        if self.ctx.traces(Verbosity::Verbose) {
            debug!("Looking for vid:pid {vid:04X}:{pid:04X}");
        }

        let ports = self.list()?;
        for port in &ports {
            if self.ctx.traces(Verbosity::DebugLow) {
                debug!(
                    "Discovered port {} with vid:pid = {}",
                    port.port_name,
                    port.usb_id().unwrap_or_else(|| "----:----".to_string())
                );
            }
            if !port.matches(vid, pid) {
                continue;
            }

            return match self.opener.open(&port.port_name, &self.probe_config) {
                Ok(handle) => {
                    drop(handle);
                    if self.ctx.traces(Verbosity::Verbose) {
                        info!("Serial port lookup success: port='{}'", port.port_name);
                    }
                    Ok(port.port_name.clone())
                }
                Err(e) => Err(self.ctx.report(
                    "locator.find",
                    CommandError::with_cause(
                        ErrorKind::Unavailable,
                        format!(
                            "Serial port '{}' is not available for connection",
                            port.port_name
                        ),
                        e,
                    ),
                )),
            };
        }

        Err(self.ctx.report(
            "locator.find",
            CommandError::new(
                ErrorKind::NotFound,
                format!("No serial port with vid:pid {vid:04X}:{pid:04X}"),
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_usb_id_accepts_common_forms() {
        assert_eq!(parse_usb_id("045E").unwrap(), 0x045E);
        assert_eq!(parse_usb_id("045e").unwrap(), 0x045E);
        assert_eq!(parse_usb_id("0x0646").unwrap(), 0x0646);
        assert_eq!(parse_usb_id(" 2341 ").unwrap(), 0x2341);
        assert_eq!(parse_usb_id("1").unwrap(), 1);
    }

    #[test]
    fn test_parse_usb_id_rejects_malformed() {
        for bad in ["", "   ", "0x", "12345", "G123", "+12", "-1", "04 5E"] {
            let err = parse_usb_id(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "input {bad:?}");
        }
    }

    proptest! {
        #[test]
        fn prop_formatted_ids_parse_back(id in any::<u16>()) {
            prop_assert_eq!(parse_usb_id(&format!("{id:04X}")).unwrap(), id);
            prop_assert_eq!(parse_usb_id(&format!("0x{id:x}")).unwrap(), id);
        }

        #[test]
        fn prop_parse_never_panics(text in "\\PC{0,8}") {
            let _ = parse_usb_id(&text);
        }
    }
}
