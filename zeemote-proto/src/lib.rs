//! Zeemote controller wire protocol: frame reassembly and report decoding.
//!
//! This crate turns the raw byte stream of a Zeemote-class Bluetooth
//! controller into typed reports. It knows nothing about sockets or threads
//! and is fully testable on host.
//!
//! # Features
//!
//! - Length-prefixed frame reassembly across arbitrary chunk boundaries
//! - Report id classification with human-readable names
//! - Button and 2-axis joystick report decoding
//! - No heap allocation, `no_std` by default
//!
//! # Example
//!
//! ```
//! use zeemote_proto::{parse_report, FrameAssembler, Report, MAX_FRAME_LEN};
//!
//! let mut assembler = FrameAssembler::<MAX_FRAME_LEN>::new();
//!
//! // A button report holding key 1, split across two chunks.
//! let frame = [8, 0xA1, 0x07, 0x01, 0xFE, 0xFE, 0xFE, 0xFE, 0xFE];
//! assert_eq!(assembler.feed(&frame[..4]).count(), 0);
//!
//! for frame in assembler.feed(&frame[4..]) {
//!     let frame = frame.unwrap();
//!     if let Ok(Report::Buttons(buttons)) = parse_report(frame.as_bytes()) {
//!         assert_eq!(buttons.keys().next(), Some(1));
//!     }
//! }
//! ```
//!
//! # Frame Layout
//!
//! ```text
//! +-----+--------+-----------+----------------+
//! | len | marker | report id | payload ...    |
//! +-----+--------+-----------+----------------+
//!   0       1         2          3 .. len
//! ```
//!
//! `len` counts the bytes that follow it, so a frame is `len + 1` bytes long.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod framing;
pub mod report;

// Re-export main types from framing
pub use framing::{
    AssemblerState, Frame, FrameAssembler, FrameError, Frames, Step, MAX_FRAME_LEN,
};

// Re-export main types from report
pub use report::{
    parse_report, ButtonReport, Report, ReportError, ReportId, StickReport,
    BUTTON_REPORT_KEYS, REPORT_ID_OFFSET,
};

/// Bluetooth class of device advertised by Zeemote controllers.
pub const ZEEMOTE_DEVICE_CLASS: [u8; 3] = [0x84, 0x05, 0x00];

/// RFCOMM channel the controller serves its report stream on.
pub const ZEEMOTE_RFCOMM_CHANNEL: u8 = 1;

/// Default pairing PIN.
pub const ZEEMOTE_DEFAULT_PIN: &str = "0000";

/// Check whether a discovered device's class of device matches a Zeemote.
#[inline]
#[must_use]
pub fn is_zeemote_class(class: &[u8; 3]) -> bool {
    *class == ZEEMOTE_DEVICE_CLASS
}
