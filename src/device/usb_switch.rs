//! MCCI Model 3141 USB switch controller.
//!
//! The switch enumerates as a USB CDC serial device (vid `045E`, pid `0646`,
//! 9600 8N1). It accepts one text command per line and answers with a block
//! of lines closed by a single blank line.
//!
//! Command vocabulary:
//!
//! | command             | effect                                             |
//! |---------------------|----------------------------------------------------|
//! | `port [n]`          | show the connected port, or connect 1/2, 0 = none  |
//! | `version`           | `XXYY`: firmware version and shield type           |
//! | `superspeed <v>`    | 0 disables SuperSpeed lanes on the next connect    |
//! | `delay <s>`         | delay the next port change by `s` seconds          |
//! | `timeout <ms>`      | disconnect `ms` after the next port change         |
//! | `defaultport [n]`   | show or set the power-on port                      |
//! | `put <i> <v>`       | store byte `v` at index `i` (< 10)                 |
//! | `get <i>`           | read the byte stored at index `i`                  |
//! | `status`            | human-readable status dump                         |
//! | `reset`             | reset the microcontroller                          |
//! | `?`                 | help text                                          |

use crate::connection::{configured_target, ConnectionManager, PortTarget};
use crate::context::DeviceContext;
use crate::error::{CommandError, CommandResult, ErrorKind};
use crate::port::{PortLister, PortOpener, SystemPorts};
use crate::transport::{LineTransport, ReadLinesOptions};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Vendor id reported by the switch.
pub const USB_SWITCH_VID: u16 = 0x045E;
/// Product id reported by the switch.
pub const USB_SWITCH_PID: u16 = 0x0646;

/// Highest index + 1 accepted by `put`/`get`.
pub const USER_BYTE_SLOTS: u8 = 10;

/// Which downstream port the switch connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchState {
    Disconnected,
    Port1,
    Port2,
}

impl SwitchState {
    /// Number used on the wire for this state.
    pub fn number(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Port1 => 1,
            Self::Port2 => 2,
        }
    }

    pub fn from_number(n: u32) -> Option<Self> {
        match n {
            0 => Some(Self::Disconnected),
            1 => Some(Self::Port1),
            2 => Some(Self::Port2),
            _ => None,
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Port1 => f.write_str("port 1"),
            Self::Port2 => f.write_str("port 2"),
        }
    }
}

/// Reply to `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirmwareVersion {
    /// The `XXYY` token as sent by the device.
    pub raw: String,
    /// `XX`
    pub firmware: String,
    /// `YY`
    pub shield: String,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "firmware {} shield {}", self.firmware, self.shield)
    }
}

/// Command facade for the switch.
#[derive(Debug)]
pub struct UsbSwitch {
    transport: LineTransport,
    response_timeout: Duration,
}

impl UsbSwitch {
    /// Build a switch controller from the `[usb_switch]` settings in `ctx`.
    ///
    /// The target is the configured `port_name` if set, otherwise the
    /// configured vid/pid.
    pub fn new(
        lister: Arc<dyn PortLister>,
        opener: Arc<dyn PortOpener>,
        ctx: DeviceContext,
    ) -> Self {
        let settings = ctx.config().usb_switch.clone();
        let mut port_config = ctx.config().serial.port_configuration();
        port_config.baud_rate = settings.baud_rate;

        // Blank ids fall back to the switch's own; malformed ones are kept as errors.
        let target = configured_target(
            settings.port_name.as_deref(),
            Some(settings.vid.as_str()),
            Some(settings.pid.as_str()),
        )
        .map(|target| {
            target.or(Some(PortTarget::Usb {
                vid: USB_SWITCH_VID,
                pid: USB_SWITCH_PID,
            }))
        });

        let connection = ConnectionManager::new(lister, opener, ctx)
            .with_port_config(port_config)
            .with_configured_target(target);

        let response_timeout = settings.response_timeout();
        Self {
            transport: LineTransport::new(connection).with_tx_newline(settings.tx_newline),
            response_timeout,
        }
    }

    /// Switch controller over the host's real serial ports.
    pub fn system(ctx: DeviceContext) -> Self {
        let ports = Arc::new(SystemPorts);
        Self::new(ports.clone(), ports, ctx)
    }

    pub fn transport(&self) -> &LineTransport {
        &self.transport
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Connect to the configured target, returning the device path.
    pub fn connect(&mut self) -> CommandResult<String> {
        self.transport.reopen()
    }

    /// Connect to an explicit device path or vid/pid instead of the configured one.
    pub fn connect_to(
        &mut self,
        port_name: Option<&str>,
        vid: Option<&str>,
        pid: Option<&str>,
    ) -> CommandResult<String> {
        self.transport.open(port_name, vid, pid)
    }

    pub fn close(&mut self) {
        self.transport.close();
    }

    /// Connect port 1 or 2.
    pub fn enable_port(&mut self, port: u8) -> CommandResult<()> {
        let state = match port {
            1 => SwitchState::Port1,
            2 => SwitchState::Port2,
            other => {
                return Err(self.report(CommandError::invalid_input(format!(
                    "USB switch port must be 1 or 2, got {other}"
                ))))
            }
        };
        self.set_port(state)
    }

    /// Disconnect both ports.
    pub fn disable_all(&mut self) -> CommandResult<()> {
        self.set_port(SwitchState::Disconnected)
    }

    pub fn set_port(&mut self, state: SwitchState) -> CommandResult<()> {
        self.command(&format!("port {}", state.number())).map(drop)
    }

    /// Which port is connected right now.
    pub fn query_state(&mut self) -> CommandResult<SwitchState> {
        let lines = self.command("port")?;
        self.parse_state("port", &lines)
    }

    pub fn get_firmware_version(&mut self) -> CommandResult<FirmwareVersion> {
        let lines = self.command("version")?;
        parse_version(&lines).ok_or_else(|| self.unexpected("version", &lines))
    }

    pub fn set_superspeed(&mut self, enabled: bool) -> CommandResult<()> {
        self.command(&format!("superspeed {}", u8::from(enabled))).map(drop)
    }

    /// Delay the next port change.
    pub fn set_delay(&mut self, seconds: u32) -> CommandResult<()> {
        self.command(&format!("delay {seconds}")).map(drop)
    }

    /// Disconnect automatically this long after the next port change.
    pub fn set_disconnect_timeout(&mut self, millis: u32) -> CommandResult<()> {
        self.command(&format!("timeout {millis}")).map(drop)
    }

    /// Port selected at power on.
    pub fn default_port(&mut self) -> CommandResult<SwitchState> {
        let lines = self.command("defaultport")?;
        self.parse_state("defaultport", &lines)
    }

    pub fn set_default_port(&mut self, state: SwitchState) -> CommandResult<()> {
        self.command(&format!("defaultport {}", state.number())).map(drop)
    }

    /// Store a byte in one of the user slots.
    pub fn put(&mut self, index: u8, value: u8) -> CommandResult<()> {
        self.check_slot(index)?;
        self.command(&format!("put {index} {value}")).map(drop)
    }

    /// Read a byte from one of the user slots.
    pub fn get(&mut self, index: u8) -> CommandResult<u8> {
        self.check_slot(index)?;
        let command = format!("get {index}");
        let lines = self.command(&command)?;
        last_number(&command, &lines)
            .and_then(|n| u8::try_from(n).ok())
            .ok_or_else(|| self.unexpected(&command, &lines))
    }

    pub fn status(&mut self) -> CommandResult<Vec<String>> {
        self.command("status")
    }

    pub fn reset(&mut self) -> CommandResult<()> {
        self.command("reset").map(drop)
    }

    pub fn help(&mut self) -> CommandResult<Vec<String>> {
        self.command("?")
    }

    /// Send any command and return its response block.
    pub fn query(&mut self, command: &str) -> CommandResult<Vec<String>> {
        let command = command.trim();
        if command.is_empty() {
            return Err(self.report(CommandError::invalid_input("Command must not be empty")));
        }
        self.command(command)
    }

    /// Write a command and read its blank-line-terminated response.
    ///
    /// The closing blank line and a leading echo of the command are removed.
    fn command(&mut self, command: &str) -> CommandResult<Vec<String>> {
        if !self.transport.is_connected() {
            self.transport.reopen()?;
        }
        self.transport.write_line(command)?;

        let options = ReadLinesOptions::default()
            .overall_timeout(self.response_timeout)
            .terminator("");
        let mut lines = self.transport.read_lines(&options)?;

        if lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        if lines.first().is_some_and(|line| line.trim() == command) {
            lines.remove(0);
        }
        Ok(lines)
    }

    fn check_slot(&self, index: u8) -> CommandResult<()> {
        if index < USER_BYTE_SLOTS {
            Ok(())
        } else {
            Err(self.report(CommandError::invalid_input(format!(
                "User byte index must be below {USER_BYTE_SLOTS}, got {index}"
            ))))
        }
    }

    fn parse_state(&self, command: &str, lines: &[String]) -> CommandResult<SwitchState> {
        last_number(command, lines)
            .and_then(SwitchState::from_number)
            .ok_or_else(|| self.unexpected(command, lines))
    }

    #[track_caller]
    fn unexpected(&self, command: &str, lines: &[String]) -> CommandError {
        self.report(CommandError::new(
            ErrorKind::ReadFailure,
            format!("Unrecognized reply to '{command}': {lines:?}"),
        ))
    }

    fn report(&self, error: CommandError) -> CommandError {
        self.transport.connection().context().report("usb_switch", error)
    }
}

impl Drop for UsbSwitch {
    fn drop(&mut self) {
        self.transport.close();
    }
}

/// Last number in the reply, scanning lines and tokens from the end.
///
/// Tokens of the echoed command itself are skipped so `get 3` does not
/// answer `3` when the device echoes.
fn last_number(command: &str, lines: &[String]) -> Option<u32> {
    lines
        .iter()
        .rev()
        .filter(|line| line.trim() != command)
        .flat_map(|line| {
            line.split(|c: char| c.is_whitespace() || c == ':' || c == '=' || c == ',')
                .rev()
                .collect::<Vec<_>>()
        })
        .find_map(|token| token.trim().parse().ok())
}

fn parse_version(lines: &[String]) -> Option<FirmwareVersion> {
    let token = lines
        .iter()
        .rev()
        .flat_map(|line| line.split_whitespace().rev().collect::<Vec<_>>())
        .find(|token| token.len() == 4 && token.chars().all(|c| c.is_ascii_alphanumeric()))?;

    Some(FirmwareVersion {
        raw: token.to_string(),
        firmware: token[..2].to_string(),
        shield: token[2..].to_string(),
    })
}
