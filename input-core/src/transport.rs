//! Transport trait and error types.

use core::fmt;

/// Error type for transport operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Socket/radio I/O error.
    Io,
    /// No adapter or the adapter is powered off.
    Unavailable,
    /// The remote device refused the connection.
    Refused,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportError::Io => "I/O error",
            TransportError::Unavailable => "transport unavailable",
            TransportError::Refused => "connection refused",
        })
    }
}

/// Connection status reported asynchronously by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportStatus {
    /// The connection is up and data will follow.
    Opened,
    /// The connection failed or dropped.
    Error,
}

/// 48-bit Bluetooth device address, most significant byte first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BluetoothAddr(pub [u8; 6]);

impl fmt::Display for BluetoothAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Where and how to connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransportTarget {
    pub address: BluetoothAddr,
    pub rfcomm_channel: u8,
    /// PIN for stacks that ask for one during pairing.
    pub pin: Option<&'static str>,
}

impl TransportTarget {
    /// RFCOMM target without a PIN.
    #[must_use]
    pub const fn rfcomm(address: BluetoothAddr, rfcomm_channel: u8) -> Self {
        Self {
            address,
            rfcomm_channel,
            pin: None,
        }
    }

    #[must_use]
    pub const fn with_pin(mut self, pin: &'static str) -> Self {
        self.pin = Some(pin);
        self
    }
}

/// Connection to a single controller.
///
/// Opening is asynchronous: `open` only starts the handshake and the outcome
/// arrives later as a [`TransportStatus`]. Received bytes are delivered by the
/// integration layer, in whatever chunks the stack produces.
///
/// # `no_std` Compatibility
///
/// Implementations should not require heap allocation.
pub trait Transport {
    /// Start connecting to `target`.
    fn open(&mut self, target: &TransportTarget) -> Result<(), TransportError>;

    /// Release the connection. Must be safe to call more than once.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn open(&mut self, target: &TransportTarget) -> Result<(), TransportError> {
        (**self).open(target)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
