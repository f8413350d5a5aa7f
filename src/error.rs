//! Registry error types.

use core::fmt;

use input_core::TransportError;
use zeemote_proto::FrameError;

/// Admission refused because every slot is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegistryFull;

impl fmt::Display for RegistryFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("no free device slot")
    }
}

/// Error type for opening a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpenError {
    /// The transport failed to start or complete the connection.
    Transport(TransportError),
    /// The connection came up but the pool was full.
    RegistryFull,
}

impl From<TransportError> for OpenError {
    fn from(e: TransportError) -> Self {
        OpenError::Transport(e)
    }
}

impl From<RegistryFull> for OpenError {
    fn from(_: RegistryFull) -> Self {
        OpenError::RegistryFull
    }
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenError::Transport(e) => write!(f, "transport: {e}"),
            OpenError::RegistryFull => fmt::Display::fmt(&RegistryFull, f),
        }
    }
}

/// Error type for data delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataError {
    /// The handle does not name a connected device.
    UnknownDevice,
    /// The stream was malformed; the device has been removed.
    Frame(FrameError),
}

impl From<FrameError> for DataError {
    fn from(e: FrameError) -> Self {
        DataError::Frame(e)
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::UnknownDevice => f.write_str("unknown device"),
            DataError::Frame(e) => write!(f, "framing: {e}"),
        }
    }
}
