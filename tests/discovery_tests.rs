//! Port discovery by USB vendor/product id.

mod common;

use common::Harness;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serial_instruments::{ErrorKind, PortError, PortLocator};
use std::sync::Arc;

fn locator(harness: &Harness) -> PortLocator {
    PortLocator::new(
        Arc::new(harness.registry.clone()),
        Arc::new(harness.registry.clone()),
        harness.ctx.clone(),
    )
}

#[test]
fn test_list_reports_every_interface_in_order() {
    let harness = Harness::new();
    harness.registry.add_plain("/dev/ttyS0");
    harness.registry.add_usb("/dev/ttyACM0", 0x045E, 0x0646);

    let ports = locator(&harness).list().unwrap();
    let names: Vec<_> = ports.iter().map(|p| p.port_name.as_str()).collect();

    assert_eq!(names, vec!["/dev/ttyS0", "/dev/ttyACM0"]);
    assert_eq!(ports[0].usb_id(), None);
    assert_eq!(ports[1].usb_id().as_deref(), Some("045E:0646"));
}

#[test]
fn test_find_returns_matching_port() {
    let harness = Harness::new();
    harness.registry.add_plain("/dev/ttyS0");
    let port = harness.registry.add_usb("/dev/ttyACM0", 0x045E, 0x0646);

    let found = locator(&harness).find("045E", "0646").unwrap();

    assert_eq!(found, "/dev/ttyACM0");
    assert_eq!(harness.registry.open_attempts(), vec!["/dev/ttyACM0"]);
    // the trial open is closed again
    assert!(!port.is_open());
}

#[test]
fn test_lowercase_and_prefixed_ids_match() {
    let harness = Harness::new();
    harness.registry.add_usb("/dev/ttyACM0", 0x045E, 0x0646);

    assert_eq!(locator(&harness).find("0x045e", "646").unwrap(), "/dev/ttyACM0");
}

#[test]
fn test_first_match_wins() {
    let harness = Harness::new();
    harness.registry.add_usb("/dev/ttyACM0", 0x045E, 0x0646);
    harness.registry.add_usb("/dev/ttyACM1", 0x045E, 0x0646);

    assert_eq!(locator(&harness).find_usb(0x045E, 0x0646).unwrap(), "/dev/ttyACM0");
    assert_eq!(harness.registry.open_attempts(), vec!["/dev/ttyACM0"]);
}

#[test]
fn test_no_match_is_not_found_without_opening() {
    let harness = Harness::new();
    harness.registry.add_plain("/dev/ttyS0");
    harness.registry.add_usb("/dev/ttyUSB0", 0x2341, 0x0043);

    let err = locator(&harness).find("045E", "0646").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(harness.registry.open_attempts().is_empty());
    assert_eq!(harness.reported_kinds(), vec![ErrorKind::NotFound]);
}

#[test]
fn test_busy_port_is_unavailable() {
    let harness = Harness::new();
    harness.registry.add_usb("/dev/ttyACM0", 0x045E, 0x0646);
    harness.registry.set_busy("/dev/ttyACM0", true);

    let err = locator(&harness).find("045E", "0646").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(matches!(err.cause(), Some(PortError::Busy(_))));
    assert!(err.description().contains("/dev/ttyACM0"));
}

#[test]
fn test_busy_first_match_does_not_fall_through() {
    let harness = Harness::new();
    harness.registry.add_usb("/dev/ttyACM0", 0x045E, 0x0646);
    harness.registry.add_usb("/dev/ttyACM1", 0x045E, 0x0646);
    harness.registry.set_busy("/dev/ttyACM0", true);

    let err = locator(&harness).find_usb(0x045E, 0x0646).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(harness.registry.open_attempts(), vec!["/dev/ttyACM0"]);
}

#[test]
fn test_malformed_ids_are_invalid_input() {
    let harness = Harness::new();
    harness.registry.add_usb("/dev/ttyACM0", 0x045E, 0x0646);

    for (vid, pid) in [("XYZ", "0646"), ("045E", ""), ("12345", "0646")] {
        let err = locator(&harness).find(vid, pid).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "vid={vid:?} pid={pid:?}");
    }
    assert_eq!(harness.registry.list_calls(), 0);
}

#[test]
fn test_enumeration_failure_is_not_found() {
    let harness = Harness::new();
    harness.registry.fail_listing(true);

    let err = locator(&harness).find("045E", "0646").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.cause().is_some());
}

#[test]
fn test_connection_by_ids_runs_discovery_then_opens() {
    let harness = Harness::new();
    let port = harness.registry.add_usb("/dev/ttyACM0", 0x045E, 0x0646);

    let mut manager = harness.manager();
    let name = manager.open(None, Some("045E"), Some("0646")).unwrap();

    assert_eq!(name, "/dev/ttyACM0");
    assert_eq!(manager.port_name(), Some("/dev/ttyACM0"));
    // trial open plus the real one
    assert_eq!(harness.registry.open_attempts().len(), 2);
    assert!(port.is_open());
}

#[test]
fn test_connection_with_path_skips_discovery() {
    let harness = Harness::new();
    harness.registry.add_usb("/dev/ttyACM0", 0x045E, 0x0646);

    let mut manager = harness.manager();
    manager.open(Some("/dev/ttyACM0"), Some("FFFF"), Some("FFFF")).unwrap();

    assert_eq!(harness.registry.list_calls(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_unmatched_ids_never_open(vid in any::<u16>(), pid in any::<u16>()) {
        prop_assume!((vid, pid) != (0x045E, 0x0646));

        let harness = Harness::new();
        harness.registry.add_plain("/dev/ttyS0");
        harness.registry.add_usb("/dev/ttyACM0", 0x045E, 0x0646);

        let err = locator(&harness).find_usb(vid, pid).unwrap_err();

        prop_assert_eq!(err.kind(), ErrorKind::NotFound);
        prop_assert!(harness.registry.open_attempts().is_empty());
    }
}
