//! Core input types: DeviceId, Key, ButtonEvent, DisconnectReason, DeviceEvent.

use core::fmt;

/// Player slot of a connected device.
///
/// Ids are small, dense, and reused: a newly admitted device always gets the
/// lowest id not held by another connected device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceId(pub u8);

impl DeviceId {
    /// Slot index backing this id.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.0)
    }
}

/// Virtual direction synthesized from an analog stick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// All directions, in event emission order.
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Right,
        Direction::Up,
        Direction::Down,
    ];

    /// Position within [`Direction::ALL`].
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
            Direction::Up => 2,
            Direction::Down => 3,
        }
    }
}

/// First flat key code used for stick directions.
pub const STICK_CODE_BASE: u16 = 0x100;

/// A pressable input, physical or emulated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Key {
    /// Physical button by report index.
    Button(u8),
    /// Stick direction emulated from analog readings.
    Stick(Direction),
}

impl Key {
    /// Flat integer code: buttons map to their index, stick directions to
    /// `STICK_CODE_BASE + Direction::index()`.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Key::Button(index) => index as u16,
            Key::Stick(direction) => STICK_CODE_BASE + direction.index() as u16,
        }
    }
}

/// A single press or release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonEvent {
    pub device: DeviceId,
    pub key: Key,
    pub pressed: bool,
}

impl ButtonEvent {
    #[must_use]
    pub const fn pressed(device: DeviceId, key: Key) -> Self {
        Self {
            device,
            key,
            pressed: true,
        }
    }

    #[must_use]
    pub const fn released(device: DeviceId, key: Key) -> Self {
        Self {
            device,
            key,
            pressed: false,
        }
    }
}

/// Why a device left the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisconnectReason {
    /// Closed on request.
    Closed,
    /// The transport reported an error.
    TransportError,
    /// The device declared a frame larger than the reassembly buffer.
    FrameTooLarge,
    /// The registry was torn down.
    Shutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DisconnectReason::Closed => "closed",
            DisconnectReason::TransportError => "transport error",
            DisconnectReason::FrameTooLarge => "frame too large",
            DisconnectReason::Shutdown => "shutdown",
        })
    }
}

/// Connection state of a device slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    /// Transport open in progress, not yet admitted.
    Pending,
    /// Admitted and producing input.
    Connected,
    /// Failed; about to be removed.
    Error,
    /// Removed.
    Closed,
}

/// Everything a subscriber can observe, as one value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceEvent {
    Connected(DeviceId),
    Disconnected {
        id: DeviceId,
        reason: DisconnectReason,
    },
    Button(ButtonEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_codes_do_not_collide() {
        for index in 0..=u8::MAX {
            let code = Key::Button(index).code();
            for direction in Direction::ALL {
                assert_ne!(code, Key::Stick(direction).code());
            }
        }
    }

    #[test]
    fn test_direction_index_matches_order() {
        for (i, direction) in Direction::ALL.iter().enumerate() {
            assert_eq!(direction.index(), i);
        }
    }

    #[test]
    fn test_button_event_constructors() {
        let id = DeviceId(2);
        let press = ButtonEvent::pressed(id, Key::Button(1));
        assert!(press.pressed);
        let release = ButtonEvent::released(id, Key::Stick(Direction::Up));
        assert!(!release.pressed);
        assert_eq!(release.device, id);
    }
}
