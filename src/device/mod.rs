//! Command facades for specific instruments.

pub mod usb_switch;

pub use usb_switch::{FirmwareVersion, SwitchState, UsbSwitch, USB_SWITCH_PID, USB_SWITCH_VID};
