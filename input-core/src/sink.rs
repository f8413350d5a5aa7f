//! Event sink trait.

use crate::types::{ButtonEvent, DeviceEvent, DeviceId, DisconnectReason};

/// Subscriber for device lifecycle and input events.
///
/// Called synchronously from whatever context delivered the triggering
/// transport callback, never while the registry holds its lock, so
/// implementations may call back into the registry.
pub trait EventSink {
    /// A device was admitted under `id`.
    fn on_device_connected(&self, id: DeviceId);

    /// The device holding `id` was removed. Sent exactly once per admission.
    fn on_device_disconnected(&self, id: DeviceId, reason: DisconnectReason);

    /// A button or emulated direction changed state.
    fn on_button_event(&self, event: ButtonEvent);

    /// Route a [`DeviceEvent`] to the matching callback.
    fn emit(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Connected(id) => self.on_device_connected(id),
            DeviceEvent::Disconnected { id, reason } => self.on_device_disconnected(id, reason),
            DeviceEvent::Button(event) => self.on_button_event(event),
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for &S {
    fn on_device_connected(&self, id: DeviceId) {
        (**self).on_device_connected(id)
    }

    fn on_device_disconnected(&self, id: DeviceId, reason: DisconnectReason) {
        (**self).on_device_disconnected(id, reason)
    }

    fn on_button_event(&self, event: ButtonEvent) {
        (**self).on_button_event(event)
    }
}

/// Sink that discards everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn on_device_connected(&self, _id: DeviceId) {}

    fn on_device_disconnected(&self, _id: DeviceId, _reason: DisconnectReason) {}

    fn on_button_event(&self, _event: ButtonEvent) {}
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::types::Key;
    use core::cell::RefCell;
    use std::vec;
    use std::vec::Vec;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<DeviceEvent>>);

    impl EventSink for Recorder {
        fn on_device_connected(&self, id: DeviceId) {
            self.0.borrow_mut().push(DeviceEvent::Connected(id));
        }

        fn on_device_disconnected(&self, id: DeviceId, reason: DisconnectReason) {
            self.0
                .borrow_mut()
                .push(DeviceEvent::Disconnected { id, reason });
        }

        fn on_button_event(&self, event: ButtonEvent) {
            self.0.borrow_mut().push(DeviceEvent::Button(event));
        }
    }

    #[test]
    fn test_emit_routes_each_variant() {
        let recorder = Recorder::default();
        let id = DeviceId(1);
        let events = [
            DeviceEvent::Connected(id),
            DeviceEvent::Button(ButtonEvent::pressed(id, Key::Button(0))),
            DeviceEvent::Disconnected {
                id,
                reason: DisconnectReason::Closed,
            },
        ];

        let sink = &recorder;
        for event in events {
            sink.emit(event);
        }

        assert_eq!(*recorder.0.borrow(), vec![events[0], events[1], events[2]]);
    }
}
