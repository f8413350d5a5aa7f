//! Device registry: a bounded pool of controllers with player-id allocation.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use input_core::{
    ConnectionState, DeviceId, DisconnectReason, EventSink, Transport, TransportError,
    TransportStatus, TransportTarget,
};
use log::{debug, error, info, trace, warn};
use zeemote_proto::MAX_FRAME_LEN;

use crate::config::{RegistryConfig, DEFAULT_REGISTRY_CONFIG, MAX_DEVICES};
use crate::device::{Device, PendingDevice};
use crate::error::{DataError, OpenError, RegistryFull};

/// Reference to an admitted device.
///
/// The generation distinguishes successive occupants of the same id, so a
/// handle kept after removal never addresses the device that reuses its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotHandle {
    id: DeviceId,
    generation: u32,
}

impl SlotHandle {
    /// Player id of the device.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> DeviceId {
        self.id
    }
}

enum Slot<T, const B: usize> {
    Vacant,
    Occupied(Device<T, B>),
    /// Transport being closed outside the lock. The id stays reserved until
    /// the disconnect has been sent.
    Closing(ConnectionState),
}

/// Outcome of a removal request.
enum Removal<T, const B: usize> {
    /// No such device, or its removal was already requested.
    Unknown,
    /// Events are being delivered; whoever delivers them finishes the removal.
    Deferred,
    /// The slot is closing; the caller closes the device and notifies.
    Ready(Device<T, B>, DisconnectReason),
}

struct Pool<T, const N: usize, const B: usize> {
    slots: [Slot<T, B>; N],
    generations: [u32; N],
}

impl<T: Transport, const N: usize, const B: usize> Pool<T, N, B> {
    const IDS_FIT: () = assert!(
        N > 0 && N <= u8::MAX as usize + 1,
        "pool capacity must be 1..=256"
    );

    fn new() -> Self {
        let () = Self::IDS_FIT;
        Self {
            slots: core::array::from_fn(|_| Slot::Vacant),
            generations: [0; N],
        }
    }

    /// Place `transport` in the lowest vacant slot, or hand it back.
    fn admit(
        &mut self,
        transport: T,
        target: TransportTarget,
        config: &RegistryConfig,
    ) -> Result<SlotHandle, T> {
        let Some(index) = self.slots.iter().position(|s| matches!(s, Slot::Vacant)) else {
            return Err(transport);
        };

        let id = DeviceId(index as u8);
        let generation = self.generations[index].wrapping_add(1);
        self.generations[index] = generation;
        self.slots[index] = Slot::Occupied(Device::connect(id, transport, target, config));

        Ok(SlotHandle { id, generation })
    }

    fn is_current(&self, handle: SlotHandle) -> bool {
        self.generations.get(handle.id.index()) == Some(&handle.generation)
    }

    fn get(&self, handle: SlotHandle) -> Option<&Device<T, B>> {
        if !self.is_current(handle) {
            return None;
        }
        match &self.slots[handle.id.index()] {
            Slot::Occupied(device) => Some(device),
            Slot::Vacant | Slot::Closing(_) => None,
        }
    }

    fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut Device<T, B>> {
        if !self.is_current(handle) {
            return None;
        }
        match &mut self.slots[handle.id.index()] {
            Slot::Occupied(device) => Some(device),
            Slot::Vacant | Slot::Closing(_) => None,
        }
    }

    fn state(&self, handle: SlotHandle) -> Option<ConnectionState> {
        if !self.is_current(handle) {
            return None;
        }
        match &self.slots[handle.id.index()] {
            Slot::Occupied(device) => Some(device.state()),
            Slot::Closing(state) => Some(*state),
            Slot::Vacant => None,
        }
    }

    fn request_removal(&mut self, handle: SlotHandle, reason: DisconnectReason) -> Removal<T, B> {
        let Some(device) = self.get_mut(handle) else {
            return Removal::Unknown;
        };
        if !device.request_removal(reason) {
            return Removal::Unknown;
        }
        match self.begin_closing(handle) {
            Some((device, reason)) => Removal::Ready(device, reason),
            None => Removal::Deferred,
        }
    }

    /// Close the books on one event batch; hands over the device if a
    /// removal was requested meanwhile.
    fn end_delivery(&mut self, handle: SlotHandle) -> Option<(Device<T, B>, DisconnectReason)> {
        self.get_mut(handle)?.end_delivery();
        self.begin_closing(handle)
    }

    /// Swap a device whose removal is due for a `Closing` marker.
    fn begin_closing(&mut self, handle: SlotHandle) -> Option<(Device<T, B>, DisconnectReason)> {
        let device = self.get(handle)?;
        let reason = device.ready_to_close()?;
        let state = device.state();

        match core::mem::replace(&mut self.slots[handle.id.index()], Slot::Closing(state)) {
            Slot::Occupied(device) => Some((device, reason)),
            other => {
                self.slots[handle.id.index()] = other;
                None
            }
        }
    }

    /// Free a slot left `Closing` by `handle`.
    fn release(&mut self, handle: SlotHandle) {
        if self.is_current(handle) {
            let slot = &mut self.slots[handle.id.index()];
            if matches!(slot, Slot::Closing(_)) {
                *slot = Slot::Vacant;
            }
        }
    }

    fn handles(&self) -> impl Iterator<Item = SlotHandle> + '_ {
        self.slots
            .iter()
            .zip(self.generations.iter())
            .enumerate()
            .filter(|(_, (slot, _))| {
                matches!(slot, Slot::Occupied(device) if device.state() == ConnectionState::Connected)
            })
            .map(|(index, (_, &generation))| SlotHandle {
                id: DeviceId(index as u8),
                generation,
            })
    }

    fn has_vacancy(&self) -> bool {
        self.slots.iter().any(|s| matches!(s, Slot::Vacant))
    }
}

/// Bounded pool of connected controllers.
///
/// Owns every admitted device together with its transport, assigns player
/// ids (lowest free first), and turns incoming bytes into events for the
/// sink.
///
/// All methods take `&self`: the pool sits behind a blocking mutex so
/// transport callbacks for different devices may arrive from different
/// contexts. The lock is released before the sink or [`Transport::close`]
/// is called, so both may call back into the registry.
///
/// Per id the sink sees `connected`, then button events, then exactly one
/// `disconnected`, before the id can be handed out again: a removed device
/// keeps its slot until its transport is closed and the disconnect sent,
/// and a removal requested while the device's events are being delivered
/// is completed by the delivering call.
///
/// # Type Parameters
///
/// - `M`: raw mutex guarding the pool (`CriticalSectionRawMutex` when
///   callbacks run on several cores or threads, `NoopRawMutex` otherwise)
/// - `T`: transport of each device
/// - `S`: event subscriber
/// - `N`: pool capacity
/// - `B`: per-device frame buffer size
pub struct DeviceRegistry<
    M: RawMutex,
    T: Transport,
    S: EventSink,
    const N: usize = MAX_DEVICES,
    const B: usize = MAX_FRAME_LEN,
> {
    pool: Mutex<M, RefCell<Pool<T, N, B>>>,
    sink: S,
    config: RegistryConfig,
}

impl<M: RawMutex, T: Transport, S: EventSink, const N: usize, const B: usize>
    DeviceRegistry<M, T, S, N, B>
{
    /// Create an empty registry with the default configuration.
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, DEFAULT_REGISTRY_CONFIG)
    }

    /// Create an empty registry with a custom configuration.
    pub fn with_config(sink: S, config: RegistryConfig) -> Self {
        Self {
            pool: Mutex::new(RefCell::new(Pool::new())),
            sink,
            config,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Start connecting `transport` to `target`.
    ///
    /// The device holds no id until [`on_opened`](Self::on_opened) admits
    /// it. If the transport refuses to start, it is closed and the error
    /// returned.
    pub fn open(
        &self,
        mut transport: T,
        target: TransportTarget,
    ) -> Result<PendingDevice<T>, OpenError> {
        debug!(
            "opening {} on channel {}",
            target.address, target.rfcomm_channel
        );

        if let Err(e) = transport.open(&target) {
            error!("failed to open {}: {}", target.address, e);
            transport.close();
            return Err(e.into());
        }

        Ok(PendingDevice::new(transport, target))
    }

    /// Admit a device whose transport reported [`TransportStatus::Opened`].
    ///
    /// Takes the lowest free id and notifies the sink. When every slot is
    /// taken (including slots still closing) the transport is closed and
    /// nothing is emitted.
    pub fn on_opened(&self, pending: PendingDevice<T>) -> Result<SlotHandle, RegistryFull> {
        let (transport, target) = pending.into_parts();
        let admitted = self
            .pool
            .lock(|pool| pool.borrow_mut().admit(transport, target, &self.config));

        match admitted {
            Ok(handle) => {
                info!("{} connected ({})", handle.id, target.address);
                self.sink.on_device_connected(handle.id);
                Ok(handle)
            }
            Err(mut transport) => {
                error!("refusing {}: {}", target.address, RegistryFull);
                transport.close();
                Err(RegistryFull)
            }
        }
    }

    /// Resolve a pending device with the status its transport reported.
    pub fn on_pending_status(
        &self,
        pending: PendingDevice<T>,
        status: TransportStatus,
    ) -> Result<SlotHandle, OpenError> {
        match status {
            TransportStatus::Opened => Ok(self.on_opened(pending)?),
            TransportStatus::Error => {
                error!("connection to {} failed", pending.target().address);
                self.abandon(pending);
                Err(OpenError::Transport(TransportError::Io))
            }
        }
    }

    /// Close a pending device without admitting it.
    pub fn abandon(&self, pending: PendingDevice<T>) {
        let (mut transport, target) = pending.into_parts();
        debug!("abandoning {}", target.address);
        transport.close();
    }

    /// Feed a received chunk to the device behind `handle`.
    ///
    /// Every frame completed by the chunk is dispatched and its transitions
    /// are sent to the sink before the next frame is processed. If the
    /// device is removed meanwhile (for instance by the sink) the batch in
    /// flight is still delivered, the disconnect follows it, and the rest
    /// of the chunk is dropped.
    ///
    /// A frame larger than the buffer removes the device and the remaining
    /// bytes are discarded.
    pub fn on_data(&self, handle: SlotHandle, chunk: &[u8]) -> Result<(), DataError> {
        let mut rest = chunk;
        let mut first = true;

        loop {
            let fed = self.pool.lock(|pool| {
                let mut pool = pool.borrow_mut();
                let device = pool.get_mut(handle)?;
                if device.state() != ConnectionState::Connected {
                    return None;
                }
                let fed = device.feed(rest);
                if fed.is_ok() {
                    device.begin_delivery();
                }
                Some(fed)
            });

            let fed = match fed {
                Some(Ok(fed)) => fed,
                Some(Err(e)) => {
                    error!("{}: {}", handle.id, e);
                    self.remove(handle, DisconnectReason::FrameTooLarge);
                    return Err(e.into());
                }
                None if first => {
                    warn!("{}: data for unknown device", handle.id);
                    return Err(DataError::UnknownDevice);
                }
                None => {
                    trace!("{}: removed mid-chunk, dropping {} bytes", handle.id, rest.len());
                    return Ok(());
                }
            };
            first = false;

            for event in fed.events {
                self.sink.on_button_event(event);
            }

            if let Some((device, reason)) = self
                .pool
                .lock(|pool| pool.borrow_mut().end_delivery(handle))
            {
                self.finish_removal(handle, device, reason);
                return Ok(());
            }

            rest = &rest[fed.consumed..];
            if rest.is_empty() || fed.consumed == 0 {
                return Ok(());
            }
        }
    }

    /// Remove the device after its transport failed.
    pub fn on_transport_error(&self, handle: SlotHandle) -> bool {
        error!("{}: transport error", handle.id);
        self.remove(handle, DisconnectReason::TransportError)
    }

    /// Apply a status change reported for an admitted device.
    ///
    /// Returns `true` if the device was removed.
    pub fn on_status(&self, handle: SlotHandle, status: TransportStatus) -> bool {
        match status {
            TransportStatus::Opened => {
                warn!("{}: unexpected open status", handle.id);
                false
            }
            TransportStatus::Error => self.on_transport_error(handle),
        }
    }

    /// Disconnect the device on request.
    pub fn close(&self, handle: SlotHandle) -> bool {
        self.remove(handle, DisconnectReason::Closed)
    }

    /// Close the transport, notify the sink, and free the id.
    ///
    /// Returns `false` without side effects if `handle` no longer names a
    /// connected device or its removal is already under way. If the
    /// device's events are being delivered on another call, that call
    /// completes the removal once they are out.
    pub fn remove(&self, handle: SlotHandle, reason: DisconnectReason) -> bool {
        match self
            .pool
            .lock(|pool| pool.borrow_mut().request_removal(handle, reason))
        {
            Removal::Ready(device, reason) => {
                self.finish_removal(handle, device, reason);
                true
            }
            Removal::Deferred => {
                debug!("{}: removal waits for event delivery", handle.id);
                true
            }
            Removal::Unknown => {
                trace!("{}: already removed", handle.id);
                false
            }
        }
    }

    fn finish_removal(&self, handle: SlotHandle, mut device: Device<T, B>, reason: DisconnectReason) {
        device.close();
        info!(
            "{} disconnected ({}): {}",
            device.id(),
            device.target().address,
            reason
        );
        self.sink.on_device_disconnected(device.id(), reason);
        self.pool.lock(|pool| pool.borrow_mut().release(handle));
    }

    /// Remove every device. Returns how many were connected.
    pub fn shutdown(&self) -> usize {
        let handles = self.connected();
        let removed = handles
            .iter()
            .filter(|&&handle| self.remove(handle, DisconnectReason::Shutdown))
            .count();
        info!("registry shut down, {} devices removed", removed);
        removed
    }

    /// Number of connected devices.
    pub fn len(&self) -> usize {
        self.pool.lock(|pool| pool.borrow().handles().count())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the next admission would be refused.
    pub fn is_full(&self) -> bool {
        self.pool.lock(|pool| !pool.borrow().has_vacancy())
    }

    /// Whether `handle` names a connected device.
    pub fn contains(&self, handle: SlotHandle) -> bool {
        self.state(handle) == Some(ConnectionState::Connected)
    }

    /// Connection state of the device behind `handle`.
    ///
    /// `Closed` or `Error` while a removal is under way, `None` once the
    /// slot is free.
    pub fn state(&self, handle: SlotHandle) -> Option<ConnectionState> {
        self.pool.lock(|pool| pool.borrow().state(handle))
    }

    /// Current handle for `id`, if a connected device holds it.
    pub fn handle(&self, id: DeviceId) -> Option<SlotHandle> {
        self.pool
            .lock(|pool| pool.borrow().handles().find(|h| h.id == id))
    }

    /// Handles of all connected devices in id order.
    pub fn connected(&self) -> heapless::Vec<SlotHandle, N> {
        self.pool.lock(|pool| pool.borrow().handles().collect())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::config::zeemote_target;
    use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};
    use input_core::{
        BluetoothAddr, ButtonEvent, DeviceEvent, Direction, Key, NullSink, StickEmulation,
    };
    use static_cell::StaticCell;
    use std::boxed::Box;
    use std::cell::OnceCell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier, Mutex as StdMutex};
    use std::thread;
    use std::vec;
    use std::vec::Vec;
    use zeemote_proto::FrameError;

    /// Two-party rendezvous: the gated call signals `entered`, then waits
    /// for `release`.
    struct Gate {
        entered: Barrier,
        release: Barrier,
    }

    impl Gate {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                entered: Barrier::new(2),
                release: Barrier::new(2),
            })
        }

        fn pass(&self) {
            self.entered.wait();
            self.release.wait();
        }
    }

    #[derive(Clone, Default)]
    struct MockTransport {
        closes: Arc<AtomicUsize>,
        refuse: bool,
        gate: Option<Arc<Gate>>,
    }

    impl MockTransport {
        fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    impl Transport for MockTransport {
        fn open(&mut self, _target: &TransportTarget) -> Result<(), TransportError> {
            if self.refuse {
                Err(TransportError::Refused)
            } else {
                Ok(())
            }
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.pass();
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink(StdMutex<Vec<DeviceEvent>>);

    impl RecordingSink {
        fn events(&self) -> Vec<DeviceEvent> {
            self.0.lock().unwrap().clone()
        }

        fn clear(&self) {
            self.0.lock().unwrap().clear();
        }
    }

    impl EventSink for RecordingSink {
        fn on_device_connected(&self, id: DeviceId) {
            self.0.lock().unwrap().push(DeviceEvent::Connected(id));
        }

        fn on_device_disconnected(&self, id: DeviceId, reason: DisconnectReason) {
            self.0
                .lock()
                .unwrap()
                .push(DeviceEvent::Disconnected { id, reason });
        }

        fn on_button_event(&self, event: ButtonEvent) {
            self.0.lock().unwrap().push(DeviceEvent::Button(event));
        }
    }

    /// Records like [`RecordingSink`] but blocks on the first button event.
    #[derive(Default)]
    struct GatedSink {
        inner: RecordingSink,
        gate: StdMutex<Option<Arc<Gate>>>,
    }

    impl EventSink for GatedSink {
        fn on_device_connected(&self, id: DeviceId) {
            self.inner.on_device_connected(id);
        }

        fn on_device_disconnected(&self, id: DeviceId, reason: DisconnectReason) {
            self.inner.on_device_disconnected(id, reason);
        }

        fn on_button_event(&self, event: ButtonEvent) {
            self.inner.on_button_event(event);
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.pass();
            }
        }
    }

    type Registry = DeviceRegistry<CriticalSectionRawMutex, MockTransport, RecordingSink, 3, 16>;

    fn registry() -> Registry {
        Registry::new(RecordingSink::default())
    }

    fn target() -> TransportTarget {
        zeemote_target(BluetoothAddr([0x00, 0x1C, 0x4D, 0x01, 0x02, 0x03]))
    }

    fn connect(registry: &Registry, transport: &MockTransport) -> SlotHandle {
        let pending = registry.open(transport.clone(), target()).unwrap();
        registry.on_opened(pending).unwrap()
    }

    fn press(id: u8, button: u8) -> DeviceEvent {
        DeviceEvent::Button(ButtonEvent::pressed(DeviceId(id), Key::Button(button)))
    }

    #[test]
    fn test_connect_assigns_ascending_ids() {
        let registry = registry();
        let transport = MockTransport::default();

        let ids: Vec<_> = (0..3).map(|_| connect(&registry, &transport).id()).collect();

        assert_eq!(ids, vec![DeviceId(0), DeviceId(1), DeviceId(2)]);
        assert!(registry.is_full());
        assert_eq!(
            registry.sink().events(),
            vec![
                DeviceEvent::Connected(DeviceId(0)),
                DeviceEvent::Connected(DeviceId(1)),
                DeviceEvent::Connected(DeviceId(2)),
            ]
        );
    }

    #[test]
    fn test_pool_exhaustion_refuses_and_closes() {
        let registry = registry();
        let transport = MockTransport::default();
        for _ in 0..3 {
            connect(&registry, &transport);
        }
        registry.sink().clear();

        let extra = MockTransport::default();
        let pending = registry.open(extra.clone(), target()).unwrap();
        assert_eq!(registry.on_opened(pending), Err(RegistryFull));

        assert_eq!(extra.closes(), 1);
        assert_eq!(transport.closes(), 0);
        assert!(registry.sink().events().is_empty());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_lowest_free_id_is_reused() {
        let registry = registry();
        let transport = MockTransport::default();
        let handles: Vec<_> = (0..3).map(|_| connect(&registry, &transport)).collect();

        assert!(registry.close(handles[1]));
        let reused = connect(&registry, &transport);

        assert_eq!(reused.id(), DeviceId(1));
        assert_ne!(reused, handles[1]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = registry();
        let transport = MockTransport::default();
        let handle = connect(&registry, &transport);
        registry.sink().clear();

        assert!(registry.remove(handle, DisconnectReason::Closed));
        assert!(!registry.remove(handle, DisconnectReason::Closed));
        assert!(!registry.on_transport_error(handle));

        assert_eq!(transport.closes(), 1);
        assert_eq!(
            registry.sink().events(),
            vec![DeviceEvent::Disconnected {
                id: DeviceId(0),
                reason: DisconnectReason::Closed,
            }]
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_split_chunks_produce_events() {
        let registry = registry();
        let transport = MockTransport::default();
        let handle = connect(&registry, &transport);
        registry.sink().clear();

        let stream = [4, 0xA1, 0x07, 0x00, 0x01, 3, 0xA1, 0x07, 0x01];
        registry.on_data(handle, &stream[..2]).unwrap();
        assert!(registry.sink().events().is_empty());
        registry.on_data(handle, &stream[2..7]).unwrap();
        registry.on_data(handle, &stream[7..]).unwrap();

        assert_eq!(
            registry.sink().events(),
            vec![
                press(0, 0),
                press(0, 1),
                DeviceEvent::Button(ButtonEvent::released(DeviceId(0), Key::Button(0))),
            ]
        );
    }

    #[test]
    fn test_single_chunk_with_many_frames() {
        let registry = registry();
        let transport = MockTransport::default();
        let handle = connect(&registry, &transport);
        registry.sink().clear();

        let chunk = [
            3, 0xA1, 0x11, 0x50, // battery
            5, 0xA1, 0x08, 0x00, 0x80, 0x00, // stick hard left
            3, 0xA1, 0x07, 0x03, // button 3
        ];
        registry.on_data(handle, &chunk).unwrap();

        assert_eq!(
            registry.sink().events(),
            vec![
                DeviceEvent::Button(ButtonEvent::pressed(
                    DeviceId(0),
                    Key::Stick(Direction::Left)
                )),
                press(0, 3),
            ]
        );
    }

    #[test]
    fn test_oversized_frame_removes_device() {
        let registry = registry();
        let transport = MockTransport::default();
        let handle = connect(&registry, &transport);
        registry.sink().clear();

        let result = registry.on_data(handle, &[0x20, 0xA1, 0x07, 0x00, 0x01]);

        assert_eq!(
            result,
            Err(DataError::Frame(FrameError::TooLarge {
                declared: 33,
                capacity: 16,
            }))
        );
        assert_eq!(
            registry.sink().events(),
            vec![DeviceEvent::Disconnected {
                id: DeviceId(0),
                reason: DisconnectReason::FrameTooLarge,
            }]
        );
        assert_eq!(transport.closes(), 1);
        assert!(!registry.contains(handle));
        assert_eq!(
            registry.on_data(handle, &[3, 0xA1, 0x07, 0x00]),
            Err(DataError::UnknownDevice)
        );
    }

    #[test]
    fn test_frames_before_oversized_are_delivered() {
        let registry = registry();
        let transport = MockTransport::default();
        let handle = connect(&registry, &transport);
        registry.sink().clear();

        let chunk = [3, 0xA1, 0x07, 0x02, 0x40, 0xA1, 0x07];
        assert!(registry.on_data(handle, &chunk).is_err());

        assert_eq!(
            registry.sink().events(),
            vec![
                press(0, 2),
                DeviceEvent::Disconnected {
                    id: DeviceId(0),
                    reason: DisconnectReason::FrameTooLarge,
                },
            ]
        );
    }

    #[test]
    fn test_transport_error_removes_once() {
        let registry = registry();
        let transport = MockTransport::default();
        let handle = connect(&registry, &transport);
        registry.sink().clear();

        assert!(registry.on_status(handle, TransportStatus::Error));
        assert!(!registry.on_status(handle, TransportStatus::Error));

        assert_eq!(
            registry.sink().events(),
            vec![DeviceEvent::Disconnected {
                id: DeviceId(0),
                reason: DisconnectReason::TransportError,
            }]
        );
    }

    #[test]
    fn test_stale_handle_does_not_reach_reused_slot() {
        let registry = registry();
        let transport = MockTransport::default();
        let old = connect(&registry, &transport);
        registry.close(old);
        let new = connect(&registry, &transport);
        assert_eq!(old.id(), new.id());
        registry.sink().clear();

        assert!(!registry.close(old));
        assert_eq!(
            registry.on_data(old, &[3, 0xA1, 0x07, 0x00]),
            Err(DataError::UnknownDevice)
        );
        assert!(registry.contains(new));
        assert_eq!(registry.state(new), Some(ConnectionState::Connected));
        assert!(registry.sink().events().is_empty());
    }

    #[test]
    fn test_open_failure_closes_transport() {
        let registry = registry();
        let transport = MockTransport {
            refuse: true,
            ..Default::default()
        };

        let result = registry.open(transport.clone(), target());

        assert!(matches!(
            result,
            Err(OpenError::Transport(TransportError::Refused))
        ));
        assert_eq!(transport.closes(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_pending_status_resolution() {
        let registry = registry();
        let transport = MockTransport::default();

        let mut pending = registry.open(transport.clone(), target()).unwrap();
        assert_eq!(pending.transport_mut().closes(), 0);
        assert_eq!(pending.state(), ConnectionState::Pending);
        assert_eq!(pending.target().pin, Some("0000"));
        assert_eq!(
            registry.on_pending_status(pending, TransportStatus::Error),
            Err(OpenError::Transport(TransportError::Io))
        );
        assert_eq!(transport.closes(), 1);
        assert!(registry.sink().events().is_empty());

        let pending = registry.open(transport.clone(), target()).unwrap();
        let handle = registry
            .on_pending_status(pending, TransportStatus::Opened)
            .unwrap();
        assert_eq!(handle.id(), DeviceId(0));
        assert_eq!(registry.handle(DeviceId(0)), Some(handle));
    }

    #[test]
    fn test_shutdown_removes_everything() {
        let registry = registry();
        let transport = MockTransport::default();
        let handles: Vec<_> = (0..3).map(|_| connect(&registry, &transport)).collect();
        registry.close(handles[0]);
        registry.sink().clear();

        assert_eq!(registry.shutdown(), 2);

        assert_eq!(
            registry.sink().events(),
            vec![
                DeviceEvent::Disconnected {
                    id: DeviceId(1),
                    reason: DisconnectReason::Shutdown,
                },
                DeviceEvent::Disconnected {
                    id: DeviceId(2),
                    reason: DisconnectReason::Shutdown,
                },
            ]
        );
        assert_eq!(transport.closes(), 3);
        assert!(registry.connected().is_empty());
        assert_eq!(registry.shutdown(), 0);
    }

    /// Sink that disconnects a device as soon as it reports a button.
    #[derive(Default)]
    struct ClosingSink {
        registry: OnceCell<&'static DeviceRegistry<CriticalSectionRawMutex, MockTransport, ClosingSink, 3, 16>>,
        events: StdMutex<Vec<DeviceEvent>>,
    }

    impl EventSink for ClosingSink {
        fn on_device_connected(&self, id: DeviceId) {
            self.events.lock().unwrap().push(DeviceEvent::Connected(id));
        }

        fn on_device_disconnected(&self, id: DeviceId, reason: DisconnectReason) {
            self.events
                .lock()
                .unwrap()
                .push(DeviceEvent::Disconnected { id, reason });
        }

        fn on_button_event(&self, event: ButtonEvent) {
            self.events.lock().unwrap().push(DeviceEvent::Button(event));
            let registry = self.registry.get().unwrap();
            let handle = registry.handle(event.device).unwrap();
            assert!(registry.close(handle));
        }
    }

    #[test]
    fn test_sink_may_remove_device_mid_chunk() {
        let registry: &'static DeviceRegistry<_, MockTransport, ClosingSink, 3, 16> =
            Box::leak(Box::new(DeviceRegistry::<CriticalSectionRawMutex, _, _, 3, 16>::new(
                ClosingSink::default(),
            )));
        assert!(registry.sink().registry.set(registry).is_ok());

        let transport = MockTransport::default();
        let pending = registry.open(transport.clone(), target()).unwrap();
        let handle = registry.on_opened(pending).unwrap();

        let chunk = [3, 0xA1, 0x07, 0x00, 3, 0xA1, 0x07, 0x01];
        assert_eq!(registry.on_data(handle, &chunk), Ok(()));

        assert_eq!(
            *registry.sink().events.lock().unwrap(),
            vec![
                DeviceEvent::Connected(DeviceId(0)),
                press(0, 0),
                DeviceEvent::Disconnected {
                    id: DeviceId(0),
                    reason: DisconnectReason::Closed,
                },
            ]
        );
        assert_eq!(transport.closes(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_admission_gets_distinct_ids() {
        static REGISTRY: StaticCell<Registry> = StaticCell::new();
        let registry: &'static Registry = REGISTRY.init(registry());

        let workers: Vec<_> = (0..3)
            .map(|_| {
                thread::spawn(move || {
                    let pending = registry.open(MockTransport::default(), target()).unwrap();
                    registry.on_opened(pending).unwrap().id()
                })
            })
            .collect();

        let mut ids: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        ids.sort();

        assert_eq!(ids, vec![DeviceId(0), DeviceId(1), DeviceId(2)]);
        assert_eq!(registry.sink().events().len(), 3);

        let pending = registry.open(MockTransport::default(), target()).unwrap();
        assert_eq!(registry.on_opened(pending), Err(RegistryFull));
    }

    #[test]
    fn test_id_stays_reserved_while_transport_closes() {
        let registry: DeviceRegistry<CriticalSectionRawMutex, MockTransport, RecordingSink, 1, 16> =
            DeviceRegistry::new(RecordingSink::default());
        let gate = Gate::new();
        let slow = MockTransport {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        let old = registry
            .on_opened(registry.open(slow, target()).unwrap())
            .unwrap();

        thread::scope(|s| {
            let closer = s.spawn(|| registry.close(old));
            gate.entered.wait();

            assert_eq!(registry.state(old), Some(ConnectionState::Closed));
            assert!(!registry.contains(old));
            assert!(registry.is_full());
            let pending = registry.open(MockTransport::default(), target()).unwrap();
            assert_eq!(registry.on_opened(pending), Err(RegistryFull));
            assert_eq!(
                registry.sink().events(),
                vec![DeviceEvent::Connected(DeviceId(0))]
            );

            gate.release.wait();
            assert!(closer.join().unwrap());
        });

        assert_eq!(registry.state(old), None);
        let new = registry
            .on_opened(registry.open(MockTransport::default(), target()).unwrap())
            .unwrap();
        assert_eq!(new.id(), DeviceId(0));
        assert_eq!(
            registry.sink().events(),
            vec![
                DeviceEvent::Connected(DeviceId(0)),
                DeviceEvent::Disconnected {
                    id: DeviceId(0),
                    reason: DisconnectReason::Closed,
                },
                DeviceEvent::Connected(DeviceId(0)),
            ]
        );
    }

    #[test]
    fn test_removal_during_delivery_follows_the_events() {
        let registry: DeviceRegistry<CriticalSectionRawMutex, MockTransport, GatedSink, 1, 16> =
            DeviceRegistry::new(GatedSink::default());
        let gate = Gate::new();
        *registry.sink().gate.lock().unwrap() = Some(gate.clone());
        let transport = MockTransport::default();
        let handle = registry
            .on_opened(registry.open(transport.clone(), target()).unwrap())
            .unwrap();

        let chunk = [3, 0xA1, 0x07, 0x00, 3, 0xA1, 0x07, 0x01];
        thread::scope(|s| {
            let reader = s.spawn(|| registry.on_data(handle, &chunk));
            gate.entered.wait();

            assert!(registry.close(handle));
            assert!(!registry.close(handle));
            assert_eq!(registry.state(handle), Some(ConnectionState::Closed));
            assert_eq!(transport.closes(), 0);
            assert_eq!(
                registry.sink().inner.events(),
                vec![DeviceEvent::Connected(DeviceId(0)), press(0, 0)]
            );
            let pending = registry.open(MockTransport::default(), target()).unwrap();
            assert_eq!(registry.on_opened(pending), Err(RegistryFull));

            gate.release.wait();
            assert_eq!(reader.join().unwrap(), Ok(()));
        });

        assert_eq!(
            registry.sink().inner.events(),
            vec![
                DeviceEvent::Connected(DeviceId(0)),
                press(0, 0),
                DeviceEvent::Disconnected {
                    id: DeviceId(0),
                    reason: DisconnectReason::Closed,
                },
            ]
        );
        assert_eq!(transport.closes(), 1);
        assert_eq!(registry.state(handle), None);
    }

    #[test]
    fn test_custom_threshold_applies_to_new_devices() {
        let config = RegistryConfig {
            stick: StickEmulation { threshold: 100 },
        };
        let registry: DeviceRegistry<NoopRawMutex, MockTransport, RecordingSink, 2, 16> =
            DeviceRegistry::with_config(RecordingSink::default(), config);
        assert_eq!(registry.capacity(), 2);
        assert_eq!(registry.config().stick.threshold, 100);

        let handle = registry
            .on_opened(registry.open(MockTransport::default(), target()).unwrap())
            .unwrap();
        registry.sink().clear();

        registry.on_data(handle, &[5, 0xA1, 0x08, 0x00, 0x50, 0x00]).unwrap();
        assert!(registry.sink().events().is_empty());
        registry.on_data(handle, &[5, 0xA1, 0x08, 0x00, 0x70, 0x00]).unwrap();
        assert_eq!(
            registry.sink().events(),
            vec![DeviceEvent::Button(ButtonEvent::pressed(
                DeviceId(0),
                Key::Stick(Direction::Right)
            ))]
        );
    }

    #[test]
    fn test_null_sink_registry_tracks_lifecycle() {
        let registry: DeviceRegistry<NoopRawMutex, MockTransport, NullSink, 2, 16> =
            DeviceRegistry::new(NullSink);
        let transport = MockTransport::default();
        let handle = registry
            .on_opened(registry.open(transport.clone(), target()).unwrap())
            .unwrap();

        registry.on_data(handle, &[3, 0xA1, 0x07, 0x00]).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.close(handle));
        assert!(registry.is_empty());
        assert_eq!(transport.closes(), 1);
    }
}
