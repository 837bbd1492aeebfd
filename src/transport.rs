//! Line-oriented reads and writes over a managed connection.
//!
//! Outgoing text gets the transmit terminator appended and is sent as ASCII.
//! Incoming bytes are buffered and split on the receive terminator; bytes
//! after a terminator stay buffered for the next read. A read whose timeout
//! elapses is not an error: it yields whatever partial text arrived, usually
//! an empty line, which is how this protocol signals "no more data".

use crate::config::Verbosity;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::context::DeviceContext;
use crate::error::{CommandError, CommandResult, ErrorKind, ReadLinesError};
use crate::port::PortError;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Size of a single read from the port.
const READ_CHUNK: usize = 256;

/// Shortest timeout handed to the port; zero would mean "non-blocking" on some platforms.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Stop conditions for [`LineTransport::read_lines`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadLinesOptions {
    /// Stop after this many lines have been collected. `None` means no limit.
    pub max_count: Option<usize>,
    /// Drop empty lines from the result. They still consume time but not count.
    pub skip_empty: bool,
    /// Stop once this much time has passed since the first read.
    pub overall_timeout: Duration,
    /// Stop after a line exactly equal to this; the line is kept.
    pub terminator: Option<String>,
}

impl Default for ReadLinesOptions {
    fn default() -> Self {
        Self {
            max_count: None,
            skip_empty: false,
            overall_timeout: Duration::from_millis(100),
            terminator: None,
        }
    }
}

impl ReadLinesOptions {
    pub fn max_count(mut self, max_count: usize) -> Self {
        self.max_count = Some(max_count);
        self
    }

    pub fn skip_empty(mut self, skip_empty: bool) -> Self {
        self.skip_empty = skip_empty;
        self
    }

    pub fn overall_timeout(mut self, overall_timeout: Duration) -> Self {
        self.overall_timeout = overall_timeout;
        self
    }

    pub fn terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = Some(terminator.into());
        self
    }

    fn is_full(&self, collected: usize) -> bool {
        self.max_count.is_some_and(|max| collected >= max)
    }
}

/// Buffered line protocol on top of a [`ConnectionManager`].
#[derive(Debug)]
pub struct LineTransport {
    connection: ConnectionManager,
    tx_newline: String,
    rx_newline: Vec<u8>,
    read_timeout: Duration,
    rx_buffer: Vec<u8>,
    ctx: DeviceContext,
}

impl LineTransport {
    /// Wrap a connection using the `[serial]` terminators from its context.
    pub fn new(connection: ConnectionManager) -> Self {
        let ctx = connection.context().clone();
        let serial = &ctx.config().serial;
        Self {
            tx_newline: serial.tx_newline.clone(),
            rx_newline: serial.rx_newline.as_bytes().to_vec(),
            read_timeout: connection.port_config().read_timeout,
            rx_buffer: Vec::new(),
            connection,
            ctx,
        }
    }

    pub fn with_tx_newline(mut self, tx_newline: impl Into<String>) -> Self {
        self.tx_newline = tx_newline.into();
        self
    }

    pub fn with_rx_newline(mut self, rx_newline: impl AsRef<[u8]>) -> Self {
        self.rx_newline = rx_newline.as_ref().to_vec();
        self
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Default per-line read timeout.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// See [`ConnectionManager::open`]. Discards any buffered input.
    pub fn open(
        &mut self,
        port_name: Option<&str>,
        vid: Option<&str>,
        pid: Option<&str>,
    ) -> CommandResult<String> {
        self.rx_buffer.clear();
        self.connection.open(port_name, vid, pid)
    }

    /// See [`ConnectionManager::reopen`]. Discards any buffered input.
    pub fn reopen(&mut self) -> CommandResult<String> {
        self.rx_buffer.clear();
        self.connection.reopen()
    }

    pub fn close(&mut self) {
        self.rx_buffer.clear();
        self.connection.close();
    }

    /// Send `text` followed by the transmit terminator.
    pub fn write_line(&mut self, text: &str) -> CommandResult<()> {
        self.write_line_with(text, false)
    }

    /// Send a line, optionally discarding unread input first.
    ///
    /// When not connected, one reconnect to the remembered target is
    /// attempted before giving up with [`ErrorKind::NotConnected`].
    pub fn write_line_with(&mut self, text: &str, clear_input: bool) -> CommandResult<()> {
        if !text.is_ascii() {
            return Err(self.ctx.report(
                "transport.write_line",
                CommandError::invalid_input(format!("Command is not ASCII text: {text:?}")),
            ));
        }

        if !self.connection.is_connected() {
            if self.ctx.traces(Verbosity::Verbose) {
                debug!("Serial write while disconnected, reconnecting");
            }
            if let Err(e) = self.reopen() {
                return Err(self.ctx.report(
                    "transport.write_line",
                    CommandError::not_connected(format!(
                        "Serial port is not connected and reconnect failed ({e})"
                    )),
                ));
            }
        }

        let Some(handle) = self.connection.handle_mut() else {
            return Err(self.ctx.report(
                "transport.write_line",
                CommandError::not_connected("Serial port is not connected"),
            ));
        };
        let port_name = handle.port_name().to_string();
        let port = handle.port_mut();

        let mut result = Ok(());
        if clear_input {
            result = port.clear_input();
            self.rx_buffer.clear();
        }
        let payload = format!("{text}{}", self.tx_newline);
        let result = result
            .and_then(|_| port.write_bytes(payload.as_bytes()))
            .and_then(|_| port.flush());

        match result {
            Ok(()) => {
                if self.ctx.traces(Verbosity::Verbose) {
                    debug!("Serial write '{text}' to {port_name}");
                }
                Ok(())
            }
            Err(e) => {
                let lost = matches!(e, PortError::Disconnected(_));
                let err = CommandError::with_cause(
                    ErrorKind::WriteFailure,
                    format!("Serial write to {port_name} failed"),
                    e,
                );
                if lost {
                    self.close();
                }
                Err(self.ctx.report("transport.write_line", err))
            }
        }
    }

    /// Read one line, without its terminator.
    ///
    /// Waits at most `timeout_override` (or the configured read timeout).
    /// An elapsed timeout returns the partial text received so far, which is
    /// empty when nothing arrived.
    pub fn read_line(&mut self, timeout_override: Option<Duration>) -> CommandResult<String> {
        if !self.connection.is_connected() {
            return Err(self.ctx.report(
                "transport.read_line",
                CommandError::not_connected("Serial read error: serial port is not connected"),
            ));
        }

        let timeout = timeout_override.unwrap_or(self.read_timeout);
        match self.next_line(timeout) {
            Ok(line) => {
                if self.ctx.traces(Verbosity::Verbose) {
                    debug!("Serial readline: '{line}'");
                }
                Ok(line)
            }
            Err(e) => Err(self.ctx.report("transport.read_line", e)),
        }
    }

    /// Read lines until a stop condition in `options` is met.
    ///
    /// On an I/O fault the lines collected so far are returned inside the
    /// error.
    pub fn read_lines(&mut self, options: &ReadLinesOptions) -> Result<Vec<String>, ReadLinesError> {
        let mut lines = Vec::new();
        if !self.connection.is_connected() {
            return Err(ReadLinesError {
                collected: lines,
                error: self.ctx.report(
                    "transport.read_lines",
                    CommandError::not_connected("Serial read error: serial port is not connected"),
                ),
            });
        }

        let started = Instant::now();
        while !options.is_full(lines.len()) {
            let remaining = options.overall_timeout.saturating_sub(started.elapsed());
            let line = match self.next_line(self.read_timeout.min(remaining)) {
                Ok(line) => line,
                Err(e) => {
                    return Err(ReadLinesError {
                        collected: lines,
                        error: self.ctx.report("transport.read_lines", e),
                    })
                }
            };

            let terminated = options.terminator.as_deref() == Some(line.as_str());
            if terminated || !(options.skip_empty && line.is_empty()) {
                lines.push(line);
            }
            if terminated || started.elapsed() >= options.overall_timeout {
                break;
            }
        }

        if self.ctx.traces(Verbosity::Verbose) {
            debug!("Serial readlines: {lines:?}");
        }
        Ok(lines)
    }

    /// Next line from the buffer or the port, waiting at most `timeout`.
    fn next_line(&mut self, timeout: Duration) -> CommandResult<String> {
        let deadline = Instant::now() + timeout.max(MIN_READ_TIMEOUT);
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(line) = self.take_line() {
                return Ok(line);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(self.take_partial());
            }

            let Some(handle) = self.connection.handle_mut() else {
                return Err(CommandError::not_connected("Serial port is not connected"));
            };
            let port_name = handle.port_name().to_string();
            let port = handle.port_mut();

            let read = port
                .set_timeout(remaining.max(MIN_READ_TIMEOUT))
                .and_then(|_| port.read_bytes(&mut chunk));
            match read {
                Ok(n) => self.rx_buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.is_timeout() => return Ok(self.take_partial()),
                Err(e) => {
                    let lost = matches!(e, PortError::Disconnected(_));
                    let err = CommandError::with_cause(
                        ErrorKind::ReadFailure,
                        format!("Serial read from {port_name} failed"),
                        e,
                    );
                    if lost {
                        warn!("Serial port {port_name} disappeared, closing");
                        self.close();
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Split one terminated line off the front of the receive buffer.
    fn take_line(&mut self) -> Option<String> {
        let pos = memchr::memmem::find(&self.rx_buffer, &self.rx_newline)?;
        let line = String::from_utf8_lossy(&self.rx_buffer[..pos]).into_owned();
        self.rx_buffer.drain(..pos + self.rx_newline.len());
        Some(line)
    }

    /// Everything buffered, as an unterminated line.
    fn take_partial(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.rx_buffer)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        self.rx_buffer.clear();
        text
    }
}
