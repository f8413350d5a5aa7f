//! Input engine for Zeemote-style Bluetooth controllers.
//!
//! Bytes arrive from a [`Transport`] in arbitrary chunks. The
//! [`DeviceRegistry`] reassembles them into frames, decodes button and
//! joystick reports, and reports every press and release to an
//! [`EventSink`], tagged with the player id of the controller.
//!
//! ```rust
//! use std::cell::RefCell;
//!
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use zeemote_input::{
//!     zeemote_target, BluetoothAddr, ButtonEvent, DeviceId, DeviceRegistry, DisconnectReason,
//!     EventSink, Transport, TransportError, TransportTarget,
//! };
//!
//! struct Link;
//!
//! impl Transport for Link {
//!     fn open(&mut self, _target: &TransportTarget) -> Result<(), TransportError> {
//!         Ok(())
//!     }
//!
//!     fn close(&mut self) {}
//! }
//!
//! #[derive(Default)]
//! struct Buttons(RefCell<Vec<ButtonEvent>>);
//!
//! impl EventSink for Buttons {
//!     fn on_device_connected(&self, _id: DeviceId) {}
//!     fn on_device_disconnected(&self, _id: DeviceId, _reason: DisconnectReason) {}
//!     fn on_button_event(&self, event: ButtonEvent) {
//!         self.0.borrow_mut().push(event);
//!     }
//! }
//!
//! let registry: DeviceRegistry<NoopRawMutex, Link, Buttons> =
//!     DeviceRegistry::new(Buttons::default());
//!
//! let target = zeemote_target(BluetoothAddr([0x00, 0x1C, 0x4D, 0x12, 0x34, 0x56]));
//! let pending = registry.open(Link, target).unwrap();
//! let handle = registry.on_opened(pending).unwrap();
//! assert_eq!(handle.id(), DeviceId(0));
//!
//! // Button 1 held, split over two chunks.
//! registry.on_data(handle, &[3, 0xA1]).unwrap();
//! registry.on_data(handle, &[0x07, 0x01]).unwrap();
//!
//! let events = registry.sink().0.borrow();
//! assert_eq!(events.len(), 1);
//! assert!(events[0].pressed);
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Derive `defmt::Format` on public types

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod config;
mod device;
pub mod dispatch;
pub mod error;
pub mod registry;

pub use config::{zeemote_target, RegistryConfig, DEFAULT_REGISTRY_CONFIG, MAX_DEVICES};
pub use device::PendingDevice;
pub use dispatch::{dispatch, InputState};
pub use error::{DataError, OpenError, RegistryFull};
pub use registry::{DeviceRegistry, SlotHandle};

pub use input_core::{
    BluetoothAddr, ButtonEvent, ConnectionState, DeviceEvent, DeviceId, Direction,
    DisconnectReason, EventSink, Key, NullSink, StickEmulation, Transport, TransportError,
    TransportStatus, TransportTarget, DEFAULT_STICK_EMULATION,
};
pub use zeemote_proto::{FrameError, MAX_FRAME_LEN};
