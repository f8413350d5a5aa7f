//! Per-device state: transport, frame assembler, and edge detectors.

use input_core::{
    ConnectionState, DeviceId, DisconnectReason, Transitions, Transport, TransportTarget,
};
use zeemote_proto::{FrameAssembler, FrameError};

use crate::config::RegistryConfig;
use crate::dispatch::{dispatch, InputState};

/// A device whose transport is still opening.
///
/// Hand it back to the registry once the transport reports its status,
/// either through [`DeviceRegistry::on_opened`] or
/// [`DeviceRegistry::on_pending_status`], or release it with
/// [`DeviceRegistry::abandon`].
///
/// [`DeviceRegistry::on_opened`]: crate::DeviceRegistry::on_opened
/// [`DeviceRegistry::on_pending_status`]: crate::DeviceRegistry::on_pending_status
/// [`DeviceRegistry::abandon`]: crate::DeviceRegistry::abandon
#[must_use = "a pending device keeps its transport open until resolved"]
pub struct PendingDevice<T> {
    transport: T,
    target: TransportTarget,
}

impl<T> PendingDevice<T> {
    pub(crate) fn new(transport: T, target: TransportTarget) -> Self {
        Self { transport, target }
    }

    /// Where the transport is connecting to.
    #[must_use]
    pub fn target(&self) -> &TransportTarget {
        &self.target
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::Pending
    }

    /// Access the transport, e.g. to poll the stack for its status.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub(crate) fn into_parts(self) -> (T, TransportTarget) {
        (self.transport, self.target)
    }
}

/// Result of feeding bytes to a device.
pub(crate) struct Fed {
    /// Bytes taken from the input.
    pub consumed: usize,
    /// Transitions from the frame completed by those bytes.
    pub events: Transitions,
}

/// An admitted device: its transport plus reassembly and edge-detection state.
pub(crate) struct Device<T, const B: usize> {
    id: DeviceId,
    state: ConnectionState,
    transport: T,
    target: TransportTarget,
    assembler: FrameAssembler<B>,
    input: InputState,
    /// Event batches handed out and not yet delivered.
    deliveries: usize,
    removal: Option<DisconnectReason>,
}

impl<T: Transport, const B: usize> Device<T, B> {
    /// Admit a freshly opened transport under `id`, with all inputs released.
    pub fn connect(
        id: DeviceId,
        transport: T,
        target: TransportTarget,
        config: &RegistryConfig,
    ) -> Self {
        Self {
            id,
            state: ConnectionState::Connected,
            transport,
            target,
            assembler: FrameAssembler::new(),
            input: InputState::new(config.stick),
            deliveries: 0,
            removal: None,
        }
    }

    #[inline]
    pub fn id(&self) -> DeviceId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[inline]
    pub fn target(&self) -> &TransportTarget {
        &self.target
    }

    /// Feed bytes until one frame completes or `bytes` runs out.
    ///
    /// A framing error leaves the device in [`ConnectionState::Error`]; the
    /// registry removes it.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Fed, FrameError> {
        let step = self.assembler.push(bytes).inspect_err(|_| {
            self.state = ConnectionState::Error;
        })?;

        let events = match step.frame {
            Some(frame) => dispatch(self.id, frame.as_bytes(), &mut self.input),
            None => Transitions::new(),
        };

        Ok(Fed {
            consumed: step.consumed,
            events,
        })
    }

    /// Record that an event batch is on its way to the sink.
    pub fn begin_delivery(&mut self) {
        self.deliveries += 1;
    }

    pub fn end_delivery(&mut self) {
        self.deliveries = self.deliveries.saturating_sub(1);
    }

    /// Mark the device for removal. Returns `false` if it already was.
    ///
    /// The device leaves [`ConnectionState::Connected`] immediately; error
    /// reasons move it to [`ConnectionState::Error`].
    pub fn request_removal(&mut self, reason: DisconnectReason) -> bool {
        if self.removal.is_some() {
            return false;
        }
        self.removal = Some(reason);
        self.state = match reason {
            DisconnectReason::TransportError | DisconnectReason::FrameTooLarge => {
                ConnectionState::Error
            }
            DisconnectReason::Closed | DisconnectReason::Shutdown => ConnectionState::Closed,
        };
        true
    }

    /// Removal reason, once no event batch is outstanding.
    pub fn ready_to_close(&self) -> Option<DisconnectReason> {
        if self.deliveries == 0 {
            self.removal
        } else {
            None
        }
    }

    pub fn close(&mut self) {
        self.transport.close();
    }
}
