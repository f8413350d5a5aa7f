//! Platform-agnostic controller input types, edge detection, and traits.
//!
//! This crate provides the core abstractions for controller input handling
//! without any platform-specific dependencies. It can be used both in
//! embedded `no_std` environments and on host for testing.
//!
//! # Overview
//!
//! The crate is organized into several modules:
//!
//! - [`types`]: Core data structures ([`DeviceId`], [`Key`], [`ButtonEvent`], [`DeviceEvent`])
//! - [`differ`]: Edge detection ([`ButtonDiffer`], [`StickButtonEmulator`])
//! - [`transport`]: Connection trait ([`Transport`])
//! - [`sink`]: Event subscriber trait ([`EventSink`])
//!
//! # Edge Detection
//!
//! Reports are snapshots: a button report lists every key currently held, a
//! stick report carries the current axis position. The differs remember the
//! previous snapshot and turn each new one into press/release transitions:
//!
//! ```rust
//! use input_core::{ButtonDiffer, ButtonEvent, DeviceId, Key};
//!
//! let id = DeviceId(0);
//! let mut buttons = ButtonDiffer::new();
//!
//! let _ = buttons.apply(id, [0, 1]);
//! let events = buttons.apply(id, [1, 2]);
//! assert_eq!(
//!     events.as_slice(),
//!     &[
//!         ButtonEvent::released(id, Key::Button(0)),
//!         ButtonEvent::pressed(id, Key::Button(2)),
//!     ]
//! );
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations,
//! making it suitable for embedded systems with limited resources.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod differ;
pub mod sink;
pub mod transport;
pub mod types;

// Re-export main types at crate root
pub use differ::{
    ButtonDiffer, StickButtonEmulator, StickEmulation, Transitions, DEFAULT_STICK_EMULATION,
    MAX_TRANSITIONS, TRACKED_BUTTONS,
};
pub use sink::{EventSink, NullSink};
pub use transport::{BluetoothAddr, Transport, TransportError, TransportStatus, TransportTarget};
pub use types::{
    ButtonEvent, ConnectionState, DeviceEvent, DeviceId, Direction, DisconnectReason, Key,
    STICK_CODE_BASE,
};
