//! Open/close lifecycle of a single serial connection.
//!
//! A [`ConnectionManager`] owns at most one [`ConnectionHandle`]. Opening
//! while connected closes the old handle first; closing is best-effort and
//! never fails. The last requested [`PortTarget`] is remembered so the
//! connection can be re-established without the caller repeating it.

use crate::config::Verbosity;
use crate::context::DeviceContext;
use crate::error::{CommandError, CommandResult, ErrorKind};
use crate::locator::{parse_usb_id, PortLocator};
use crate::port::{PortConfiguration, PortLister, PortOpener, SerialPortAdapter, SystemPorts};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// What to connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortTarget {
    /// A device path used as-is, skipping discovery.
    Path(String),
    /// Whatever interface currently reports these USB ids.
    Usb { vid: u16, pid: u16 },
}

impl fmt::Display for PortTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{path}"),
            Self::Usb { vid, pid } => write!(f, "usb {vid:04X}:{pid:04X}"),
        }
    }
}

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unopened,
    Connected,
}

/// An open serial stream.
#[derive(Debug)]
pub struct ConnectionHandle {
    port: Box<dyn SerialPortAdapter>,
    port_name: String,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl ConnectionHandle {
    /// Effective device path of the open interface.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    pub fn port_mut(&mut self) -> &mut dyn SerialPortAdapter {
        &mut *self.port
    }
}

/// Owns the connection to one device.
#[derive(Debug)]
pub struct ConnectionManager {
    locator: PortLocator,
    opener: Arc<dyn PortOpener>,
    port_config: PortConfiguration,
    target: Option<PortTarget>,
    /// Why the configured target could not be used, if it was malformed.
    target_error: Option<String>,
    handle: Option<ConnectionHandle>,
    ctx: DeviceContext,
}

impl ConnectionManager {
    /// Create a manager using the `[serial]` settings and `[device]` target from the context.
    pub fn new(
        lister: Arc<dyn PortLister>,
        opener: Arc<dyn PortOpener>,
        ctx: DeviceContext,
    ) -> Self {
        let port_config = ctx.config().serial.port_configuration();
        let device = &ctx.config().device;
        let target = configured_target(
            device.port_name.as_deref(),
            device.vid.as_deref(),
            device.pid.as_deref(),
        );

        Self {
            locator: PortLocator::new(lister, Arc::clone(&opener), ctx.clone()),
            opener,
            port_config,
            target: None,
            target_error: None,
            handle: None,
            ctx,
        }
        .with_configured_target(target)
    }

    /// Manager over the host's real serial ports.
    pub fn system(ctx: DeviceContext) -> Self {
        let ports = Arc::new(SystemPorts);
        Self::new(ports.clone(), ports, ctx)
    }

    /// Replace the line settings used by subsequent opens.
    pub fn with_port_config(mut self, port_config: PortConfiguration) -> Self {
        self.locator = self.locator.with_probe_config(port_config.clone());
        self.port_config = port_config;
        self
    }

    /// Replace the remembered target.
    pub fn with_target(mut self, target: Option<PortTarget>) -> Self {
        self.target = target;
        self.target_error = None;
        self
    }

    /// Replace the remembered target with one read from configuration.
    ///
    /// A malformed configured target is kept as an error: `reopen` and
    /// argument-less `open` fail with `InvalidInput` until an explicit target
    /// is opened.
    pub fn with_configured_target(mut self, target: CommandResult<Option<PortTarget>>) -> Self {
        match target {
            Ok(target) => {
                self.target = target;
                self.target_error = None;
            }
            Err(e) => {
                self.target = None;
                self.target_error = Some(e.description().to_string());
            }
        }
        self
    }

    pub fn state(&self) -> ConnectionState {
        if self.handle.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Unopened
        }
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Device path of the open connection.
    pub fn port_name(&self) -> Option<&str> {
        self.handle.as_ref().map(ConnectionHandle::port_name)
    }

    /// The target the next `reopen` would use.
    pub fn target(&self) -> Option<&PortTarget> {
        self.target.as_ref()
    }

    pub fn port_config(&self) -> &PortConfiguration {
        &self.port_config
    }

    pub fn locator(&self) -> &PortLocator {
        &self.locator
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    pub fn handle_mut(&mut self) -> Option<&mut ConnectionHandle> {
        self.handle.as_mut()
    }

    /// Open a connection.
    ///
    /// An explicit `port_name` is used directly. Otherwise both `vid` and
    /// `pid` are required and the interface is located by discovery. With
    /// no arguments at all the remembered target is used. Empty strings count
    /// as absent. Returns the effective device path.
    pub fn open(
        &mut self,
        port_name: Option<&str>,
        vid: Option<&str>,
        pid: Option<&str>,
    ) -> CommandResult<String> {
        let target = self
            .resolve_target(port_name, vid, pid)
            .map_err(|e| self.ctx.report("connection.open", e))?;
        self.target = Some(target.clone());
        self.open_target(target)
    }

    /// Open the remembered target again.
    pub fn reopen(&mut self) -> CommandResult<String> {
        match self.remembered_target() {
            Ok(target) => self.open_target(target),
            Err(e) => Err(self.ctx.report("connection.reopen", e)),
        }
    }

    /// Open a specific target, remembering it for later reconnects.
    pub fn open_target(&mut self, target: PortTarget) -> CommandResult<String> {
        self.target = Some(target.clone());
        self.target_error = None;
        self.close();

        let port_name = match target {
            PortTarget::Path(path) => path,
            PortTarget::Usb { vid, pid } => self.locator.find_usb(vid, pid)?,
        };

        match self.opener.open(&port_name, &self.port_config) {
            Ok(port) => {
                if self.ctx.traces(Verbosity::Verbose) {
                    info!("Serial connect to port {port_name}");
                }
                self.handle = Some(ConnectionHandle {
                    port,
                    port_name: port_name.clone(),
                    read_timeout: self.port_config.read_timeout,
                    write_timeout: self.port_config.write_timeout,
                });
                Ok(port_name)
            }
            Err(e) => Err(self.ctx.report(
                "connection.open",
                CommandError::with_cause(
                    ErrorKind::ConnectFailure,
                    format!("Failed to connect to serial port {port_name}"),
                    e,
                ),
            )),
        }
    }

    /// Close the connection if one is open. Never fails.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            // Pending output is best-effort during teardown.
            let _ = handle.port.flush();
            if self.ctx.traces(Verbosity::Verbose) {
                debug!("Serial close {}", handle.port_name);
            }
        }
    }

    fn resolve_target(
        &self,
        port_name: Option<&str>,
        vid: Option<&str>,
        pid: Option<&str>,
    ) -> CommandResult<PortTarget> {
        let port_name = non_empty(port_name);
        let vid = non_empty(vid);
        let pid = non_empty(pid);

        match (port_name, vid, pid) {
            (Some(name), _, _) => Ok(PortTarget::Path(name.to_string())),
            (None, Some(vid), Some(pid)) => Ok(PortTarget::Usb {
                vid: parse_usb_id(vid)?,
                pid: parse_usb_id(pid)?,
            }),
            (None, None, None) => self.remembered_target(),
            (None, vid, pid) => Err(CommandError::invalid_input(format!(
                "Both vendor id and product id are required: vid={}, pid={}",
                vid.unwrap_or("<none>"),
                pid.unwrap_or("<none>")
            ))),
        }
    }

    fn remembered_target(&self) -> CommandResult<PortTarget> {
        if let Some(reason) = &self.target_error {
            return Err(CommandError::invalid_input(format!(
                "Configured serial target is invalid: {reason}"
            )));
        }
        self.target.clone().ok_or_else(|| {
            CommandError::invalid_input("No port name or vid/pid has been specified")
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Target described by configuration, if it names one.
///
/// A port name wins over ids. Malformed ids, or only one of vid/pid, are
/// `InvalidInput`.
pub(crate) fn configured_target(
    port_name: Option<&str>,
    vid: Option<&str>,
    pid: Option<&str>,
) -> CommandResult<Option<PortTarget>> {
    if let Some(name) = non_empty(port_name) {
        return Ok(Some(PortTarget::Path(name.to_string())));
    }
    match (non_empty(vid), non_empty(pid)) {
        (None, None) => Ok(None),
        (Some(vid), Some(pid)) => Ok(Some(PortTarget::Usb {
            vid: parse_usb_id(vid)?,
            pid: parse_usb_id(pid)?,
        })),
        (vid, pid) => Err(CommandError::invalid_input(format!(
            "Both vendor id and product id are required: vid={}, pid={}",
            vid.unwrap_or("<none>"),
            pid.unwrap_or("<none>")
        ))),
    }
}
