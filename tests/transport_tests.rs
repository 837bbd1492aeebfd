//! Line transport behavior against mock ports.
//!
//! Covers line framing, the stop conditions of `read_lines`, timeouts and
//! how write/read faults surface.

mod common;

use common::Harness;
use pretty_assertions::assert_eq;
use serial_instruments::config::Config;
use serial_instruments::{ErrorKind, PortError, ReadLinesOptions};
use std::io;
use std::time::{Duration, Instant};

const PORT: &str = "/dev/ttyUSB0";

#[test]
fn test_skip_empty_lines_do_not_count_toward_max() {
    let harness = Harness::new();
    let mut port = harness.registry.add_plain(PORT);
    port.enqueue_lines(&["a", "", "b", "", "c", "d"], "\r\n");

    let mut transport = harness.transport();
    transport.open(Some(PORT), None, None).unwrap();

    let options = ReadLinesOptions::default()
        .max_count(3)
        .skip_empty(true)
        .overall_timeout(Duration::from_secs(1));
    let lines = transport.read_lines(&options).unwrap();

    assert_eq!(lines, vec!["a", "b", "c"]);
    assert!(harness.sink.is_empty());
}

#[test]
fn test_terminator_line_is_kept_and_stops_reading() {
    let harness = Harness::new();
    let mut port = harness.registry.add_plain(PORT);
    port.enqueue_lines(&["x", "y", "END", "z"], "\r\n");

    let mut transport = harness.transport();
    transport.open(Some(PORT), None, None).unwrap();

    let options = ReadLinesOptions::default()
        .terminator("END")
        .overall_timeout(Duration::from_secs(1));
    let lines = transport.read_lines(&options).unwrap();
    assert_eq!(lines, vec!["x", "y", "END"]);

    // "z" was not consumed
    assert_eq!(transport.read_line(None).unwrap(), "z");
}

#[test]
fn test_write_then_read_echo() {
    let harness = Harness::new();
    let mut port = harness.registry.add_plain(PORT);

    let mut transport = harness.transport();
    transport.open(Some(PORT), None, None).unwrap();
    transport.write_line("port1").unwrap();
    assert_eq!(port.written_text(), "port1\n");

    port.enqueue_read(b"port1\r\n");
    assert_eq!(transport.read_line(None).unwrap(), "port1");
}

#[test]
fn test_tx_newline_override() {
    let harness = Harness::new();
    let port = harness.registry.add_plain(PORT);

    let mut transport = harness.transport().with_tx_newline("\r\n");
    transport.open(Some(PORT), None, None).unwrap();
    transport.write_line("port 1").unwrap();

    assert_eq!(port.get_write_log(), vec![b"port 1\r\n".to_vec()]);
}

#[test]
fn test_fragmented_input_is_reassembled() {
    let harness = Harness::new();
    let mut port = harness.registry.add_plain(PORT);
    port.set_max_chunk(3);
    port.enqueue_lines(&["hello", "world"], "\r\n");

    let mut transport = harness.transport();
    transport.open(Some(PORT), None, None).unwrap();

    let lines = transport
        .read_lines(
            &ReadLinesOptions::default()
                .max_count(2)
                .overall_timeout(Duration::from_secs(1)),
        )
        .unwrap();
    assert_eq!(lines, vec!["hello", "world"]);
}

#[test]
fn test_close_twice_is_a_no_op() {
    let harness = Harness::new();
    let port = harness.registry.add_plain(PORT);

    let mut transport = harness.transport();
    transport.open(Some(PORT), None, None).unwrap();
    assert!(port.is_open());

    transport.close();
    transport.close();

    assert!(!transport.is_connected());
    assert!(!port.is_open());
    assert!(harness.sink.is_empty());
}

#[test]
fn test_read_timeout_returns_empty_line() {
    let harness = Harness::with_config(Config::default());
    harness.registry.add_plain(PORT);

    let mut transport = harness.transport();
    transport.open(Some(PORT), None, None).unwrap();

    let started = Instant::now();
    let line = transport.read_line(Some(Duration::from_millis(100))).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(line, "");
    assert!(elapsed < Duration::from_millis(500), "took {elapsed:?}");
    assert!(harness.sink.is_empty());
}

#[test]
fn test_overall_timeout_bounds_read_lines() {
    let harness = Harness::new();
    harness.registry.add_plain(PORT);

    let mut transport = harness.transport();
    transport.open(Some(PORT), None, None).unwrap();

    let started = Instant::now();
    let lines = transport
        .read_lines(
            &ReadLinesOptions::default()
                .skip_empty(true)
                .overall_timeout(Duration::from_millis(100)),
        )
        .unwrap();

    assert!(lines.is_empty());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_silence_yields_empty_lines_without_skip() {
    let harness = Harness::new();
    harness.registry.add_plain(PORT);

    let mut transport = harness.transport();
    transport.open(Some(PORT), None, None).unwrap();

    let lines = transport
        .read_lines(&ReadLinesOptions::default().overall_timeout(Duration::from_millis(100)))
        .unwrap();

    assert!(!lines.is_empty());
    assert!(lines.iter().all(String::is_empty));
}

#[test]
fn test_write_without_target_tries_one_reconnect() {
    let harness = Harness::new();
    harness.registry.add_plain(PORT);

    let mut transport = harness.transport();
    let err = transport.write_line("status").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotConnected);
    // one failed reconnect, then the write failure itself
    assert_eq!(
        harness.reported_kinds(),
        vec![ErrorKind::InvalidInput, ErrorKind::NotConnected]
    );
    assert!(harness.registry.open_attempts().is_empty());
}

#[test]
fn test_write_reconnects_to_last_target() {
    let harness = Harness::new();
    let port = harness.registry.add_plain(PORT);

    let mut transport = harness.transport();
    transport.open(Some(PORT), None, None).unwrap();
    transport.close();

    transport.write_line("status").unwrap();

    assert!(transport.is_connected());
    assert_eq!(harness.registry.open_attempts(), vec![PORT, PORT]);
    assert_eq!(port.written_text(), "status\n");
}

#[test]
fn test_write_reconnect_failure_is_not_connected() {
    let harness = Harness::new();
    harness.registry.add_plain(PORT);

    let mut transport = harness.transport();
    transport.open(Some(PORT), None, None).unwrap();
    transport.close();
    harness.registry.remove(PORT);

    let err = transport.write_line("status").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotConnected);
    assert_eq!(harness.registry.open_attempts().len(), 2);
    assert_eq!(
        harness.reported_kinds(),
        vec![ErrorKind::ConnectFailure, ErrorKind::NotConnected]
    );
}

#[test]
fn test_write_fault_is_write_failure() {
    let harness = Harness::new();
    let mut port = harness.registry.add_plain(PORT);

    let mut transport = harness.transport();
    transport.open(Some(PORT), None, None).unwrap();
    port.fail_next_write(io::ErrorKind::BrokenPipe);

    let err = transport.write_line("status").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WriteFailure);
    assert!(matches!(err.cause(), Some(PortError::Io(_))));
    // a plain I/O fault does not drop the connection
    assert!(transport.is_connected());
}

#[test]
fn test_unplug_during_write_closes_connection() {
    let harness = Harness::new();
    harness.registry.add_plain(PORT);

    let mut transport = harness.transport();
    transport.open(Some(PORT), None, None).unwrap();
    harness.registry.remove(PORT);

    let err = transport.write_line("status").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WriteFailure);
    assert!(matches!(err.cause(), Some(PortError::Disconnected(_))));
    assert!(!transport.is_connected());
}

#[test]
fn test_read_when_not_connected() {
    let harness = Harness::new();
    let mut transport = harness.transport();

    let err = transport.read_line(None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotConnected);

    let err = transport.read_lines(&ReadLinesOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotConnected);
    assert!(err.collected.is_empty());
}

#[test]
fn test_read_fault_keeps_collected_lines() {
    let harness = Harness::new();
    let mut port = harness.registry.add_plain(PORT);
    port.enqueue_lines(&["a", "b"], "\r\n");

    let mut transport = harness.transport();
    transport.open(Some(PORT), None, None).unwrap();

    // pulls both lines into the receive buffer
    assert_eq!(transport.read_line(None).unwrap(), "a");
    port.fail_next_read(io::ErrorKind::PermissionDenied);

    let err = transport
        .read_lines(&ReadLinesOptions::default().overall_timeout(Duration::from_secs(1)))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ReadFailure);
    assert_eq!(err.collected, vec!["b"]);
    assert_eq!(harness.reported_kinds(), vec![ErrorKind::ReadFailure]);
}

#[test]
fn test_read_fault_is_read_failure() {
    let harness = Harness::new();
    let mut port = harness.registry.add_plain(PORT);

    let mut transport = harness.transport();
    transport.open(Some(PORT), None, None).unwrap();
    port.fail_next_read(io::ErrorKind::Other);

    let err = transport.read_line(None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadFailure);
    assert_eq!(err.code(), 7);
    assert!(err.cause().is_some());
}

#[test]
fn test_open_discards_stale_buffered_input() {
    let harness = Harness::new();
    let mut port = harness.registry.add_plain(PORT);
    port.enqueue_lines(&["first", "stale"], "\r\n");

    let mut transport = harness.transport();
    transport.open(Some(PORT), None, None).unwrap();
    assert_eq!(transport.read_line(None).unwrap(), "first");

    transport.reopen().unwrap();
    assert_eq!(transport.read_line(None).unwrap(), "");
}
