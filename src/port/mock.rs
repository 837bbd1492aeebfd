//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that simulates serial port behavior without
//! requiring actual hardware, and a `MockPortRegistry` that stands in for the
//! platform's port enumeration and open calls.

use super::error::PortError;
use super::traits::{
    PortConfiguration, PortDescriptor, PortLister, PortOpener, SerialPortAdapter,
};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Inner state of the mock port, shared by every clone.
#[derive(Debug, Default)]
struct MockPortState {
    /// Queue of bytes to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Log of all bytes written to the port.
    write_log: Vec<Vec<u8>>,
    /// Configured read timeout.
    timeout: Duration,
    /// Largest number of bytes handed out by a single read.
    max_chunk: Option<usize>,
    /// Fault to raise on the next read, if any.
    read_fault: Option<io::ErrorKind>,
    /// Fault to raise on the next write, if any.
    write_fault: Option<io::ErrorKind>,
    /// Simulates the device being pulled from the bus.
    unplugged: bool,
    /// Number of live handles handed out by a registry.
    open_handles: usize,
    /// Number of read calls made.
    read_calls: usize,
    input_cleared: usize,
}

/// Mock serial port implementation for testing.
///
/// This implementation allows you to:
/// - Enqueue data to be returned by read operations
/// - Inspect what data was written
/// - Inject read/write faults or simulate an unplugged device
///
/// When the read queue is empty a read sleeps for the configured timeout and
/// then reports a timeout, the same way a real port does.
///
/// # Example
/// ```
/// use serial_instruments::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"Hello, World!");
///
/// let mut buffer = [0u8; 13];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"Hello, World!");
///
/// port.write_bytes(b"Response").unwrap();
/// assert_eq!(port.get_write_log(), vec![b"Response".to_vec()]);
/// ```
pub struct MockSerialPort {
    /// The port name/identifier.
    name: String,
    /// The internal state, shared between clones.
    state: Arc<Mutex<MockPortState>>,
    /// Set on the copy a registry hands out as an open handle.
    is_handle: bool,
}

impl Clone for MockSerialPort {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            state: Arc::clone(&self.state),
            is_handle: false,
        }
    }
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                timeout: Duration::from_millis(100),
                ..Default::default()
            })),
            is_handle: false,
        }
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&mut self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Enqueue each line followed by `terminator`.
    pub fn enqueue_lines(&mut self, lines: &[&str], terminator: &str) {
        let mut state = self.state.lock();
        for line in lines {
            state.read_queue.extend(line.as_bytes());
            state.read_queue.extend(terminator.as_bytes());
        }
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Everything written so far, decoded lossily and concatenated.
    pub fn written_text(&self) -> String {
        let state = self.state.lock();
        state
            .write_log
            .iter()
            .map(|chunk| String::from_utf8_lossy(chunk))
            .collect()
    }

    /// Clear the write log.
    pub fn clear_write_log(&mut self) {
        self.state.lock().write_log.clear();
    }

    /// Limit how many bytes a single read may return, to exercise fragmented input.
    pub fn set_max_chunk(&mut self, max_chunk: usize) {
        self.state.lock().max_chunk = Some(max_chunk.max(1));
    }

    /// Make the next read fail with an I/O error of the given kind.
    pub fn fail_next_read(&mut self, kind: io::ErrorKind) {
        self.state.lock().read_fault = Some(kind);
    }

    /// Make the next write fail with an I/O error of the given kind.
    pub fn fail_next_write(&mut self, kind: io::ErrorKind) {
        self.state.lock().write_fault = Some(kind);
    }

    /// Simulate pulling the device; every operation fails until plugged back.
    pub fn set_unplugged(&mut self, unplugged: bool) {
        self.state.lock().unplugged = unplugged;
    }

    pub fn is_unplugged(&self) -> bool {
        self.state.lock().unplugged
    }

    /// Current read timeout as last set through the adapter.
    pub fn timeout(&self) -> Duration {
        self.state.lock().timeout
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }

    /// Number of read calls performed so far.
    pub fn read_calls(&self) -> usize {
        self.state.lock().read_calls
    }

    /// Number of times the receive buffer was discarded.
    pub fn input_clears(&self) -> usize {
        self.state.lock().input_cleared
    }

    /// True while a registry-issued handle to this port is alive.
    pub fn is_open(&self) -> bool {
        self.state.lock().open_handles > 0
    }

    fn open_handle(&self) -> Self {
        self.state.lock().open_handles += 1;
        Self {
            name: self.name.clone(),
            state: Arc::clone(&self.state),
            is_handle: true,
        }
    }
}

impl Drop for MockSerialPort {
    fn drop(&mut self) {
        if self.is_handle {
            let mut state = self.state.lock();
            state.open_handles = state.open_handles.saturating_sub(1);
        }
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.unplugged {
            return Err(PortError::Disconnected(self.name.clone()));
        }
        if let Some(kind) = state.write_fault.take() {
            return Err(PortError::Io(io::Error::new(kind, "injected write fault")));
        }

        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        state.read_calls += 1;

        if state.unplugged {
            return Err(PortError::Disconnected(self.name.clone()));
        }
        if let Some(kind) = state.read_fault.take() {
            return Err(PortError::Io(io::Error::new(kind, "injected read fault")));
        }

        if state.read_queue.is_empty() {
            let timeout = state.timeout;
            drop(state);
            std::thread::sleep(timeout);
            return Err(PortError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "Operation timed out",
            )));
        }

        let limit = state.max_chunk.unwrap_or(usize::MAX).min(buffer.len());
        let mut bytes_read = 0;
        for byte in buffer.iter_mut().take(limit) {
            match state.read_queue.pop_front() {
                Some(queued) => {
                    *byte = queued;
                    bytes_read += 1;
                }
                None => break,
            }
        }
        Ok(bytes_read)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.state.lock().timeout = timeout;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.read_queue.clear();
        state.input_cleared += 1;
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .field("is_handle", &self.is_handle)
            .finish()
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    ports: Vec<(PortDescriptor, MockSerialPort)>,
    busy: HashSet<String>,
    fail_listing: bool,
    list_calls: usize,
    open_attempts: Vec<String>,
    last_config: Option<PortConfiguration>,
}

/// Fake port enumeration and open facility.
///
/// Cloning shares the same registry, so a test can keep one copy for
/// scripting while the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MockPortRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl MockPortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a USB interface and return its mock port for scripting.
    pub fn add_usb(&self, port_name: &str, vid: u16, pid: u16) -> MockSerialPort {
        self.add(PortDescriptor::usb(port_name, vid, pid))
    }

    /// Register a non-USB interface.
    pub fn add_plain(&self, port_name: &str) -> MockSerialPort {
        self.add(PortDescriptor::plain(port_name))
    }

    fn add(&self, descriptor: PortDescriptor) -> MockSerialPort {
        let port = MockSerialPort::new(descriptor.port_name.clone());
        self.state.lock().ports.push((descriptor, port.clone()));
        port
    }

    /// Remove an interface from enumeration and unplug its port.
    pub fn remove(&self, port_name: &str) {
        let mut state = self.state.lock();
        if let Some(pos) = state.ports.iter().position(|(d, _)| d.port_name == port_name) {
            let (_, mut port) = state.ports.remove(pos);
            port.set_unplugged(true);
        }
    }

    /// Mark an interface as held by another process.
    pub fn set_busy(&self, port_name: &str, busy: bool) {
        let mut state = self.state.lock();
        if busy {
            state.busy.insert(port_name.to_string());
        } else {
            state.busy.remove(port_name);
        }
    }

    /// Make enumeration itself fail.
    pub fn fail_listing(&self, fail: bool) {
        self.state.lock().fail_listing = fail;
    }

    /// Look up the mock port behind an interface name.
    pub fn port(&self, port_name: &str) -> Option<MockSerialPort> {
        self.state
            .lock()
            .ports
            .iter()
            .find(|(d, _)| d.port_name == port_name)
            .map(|(_, p)| p.clone())
    }

    /// Names passed to `open`, in call order, including failed attempts.
    pub fn open_attempts(&self) -> Vec<String> {
        self.state.lock().open_attempts.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    /// Configuration used by the most recent successful open.
    pub fn last_config(&self) -> Option<PortConfiguration> {
        self.state.lock().last_config.clone()
    }
}

impl PortLister for MockPortRegistry {
    fn list_ports(&self) -> Result<Vec<PortDescriptor>, PortError> {
        let mut state = self.state.lock();
        state.list_calls += 1;
        if state.fail_listing {
            return Err(PortError::Io(io::Error::new(
                io::ErrorKind::Other,
                "enumeration unavailable",
            )));
        }
        Ok(state.ports.iter().map(|(d, _)| d.clone()).collect())
    }
}

impl PortOpener for MockPortRegistry {
    fn open(
        &self,
        port_name: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let mut state = self.state.lock();
        state.open_attempts.push(port_name.to_string());

        if state.busy.contains(port_name) {
            return Err(PortError::busy(port_name));
        }
        let port = state
            .ports
            .iter()
            .find(|(d, _)| d.port_name == port_name)
            .map(|(_, p)| p.clone())
            .ok_or_else(|| PortError::not_found(port_name))?;
        if port.is_unplugged() {
            return Err(PortError::not_found(port_name));
        }

        state.last_config = Some(config.clone());
        drop(state);

        let mut handle = port.open_handle();
        handle.set_timeout(config.read_timeout)?;
        Ok(Box::new(handle))
    }
}
