//! Registry configuration and connection defaults.

use input_core::{BluetoothAddr, StickEmulation, TransportTarget, DEFAULT_STICK_EMULATION};
use zeemote_proto::{ZEEMOTE_DEFAULT_PIN, ZEEMOTE_RFCOMM_CHANNEL};

/// Default number of simultaneously connected controllers.
pub const MAX_DEVICES: usize = 5;

/// Runtime settings applied to every admitted device.
///
/// Customize this at compile-time by creating your own const.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Stick-to-direction emulation thresholds.
    pub stick: StickEmulation,
}

/// Default registry configuration.
pub const DEFAULT_REGISTRY_CONFIG: RegistryConfig = RegistryConfig {
    stick: DEFAULT_STICK_EMULATION,
};

impl Default for RegistryConfig {
    fn default() -> Self {
        DEFAULT_REGISTRY_CONFIG
    }
}

/// Connection target for a Zeemote at `address`: RFCOMM channel 1, PIN "0000".
#[must_use]
pub const fn zeemote_target(address: BluetoothAddr) -> TransportTarget {
    TransportTarget::rfcomm(address, ZEEMOTE_RFCOMM_CHANNEL).with_pin(ZEEMOTE_DEFAULT_PIN)
}
