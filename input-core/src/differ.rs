//! Edge detection: turn report snapshots into press/release transitions.
//!
//! Both differs keep the previous snapshot and emit one [`ButtonEvent`] per
//! tracked input whose state changed. The snapshot is replaced after every
//! report, changed or not.

use heapless::Vec;

use crate::types::{ButtonEvent, DeviceId, Direction, Key};

/// Number of physical buttons tracked per device.
pub const TRACKED_BUTTONS: usize = 4;

/// Upper bound on transitions produced by a single report.
pub const MAX_TRANSITIONS: usize = 4;

const _: () = assert!(TRACKED_BUTTONS <= MAX_TRANSITIONS);
const _: () = assert!(Direction::ALL.len() <= MAX_TRANSITIONS);

/// Transitions produced by one report, in emission order.
pub type Transitions = Vec<ButtonEvent, MAX_TRANSITIONS>;

fn diff<const N: usize>(
    device: DeviceId,
    previous: &[bool; N],
    current: &[bool; N],
    key: impl Fn(usize) -> Key,
) -> Transitions {
    let mut events = Transitions::new();
    for (i, (&before, &now)) in previous.iter().zip(current).enumerate() {
        if before != now {
            // Cannot fail: N <= MAX_TRANSITIONS is checked at compile time.
            let _ = events.push(ButtonEvent {
                device,
                key: key(i),
                pressed: now,
            });
        }
    }
    events
}

/// Edge detector for button reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonDiffer {
    previous: [bool; TRACKED_BUTTONS],
}

impl ButtonDiffer {
    /// All buttons released.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            previous: [false; TRACKED_BUTTONS],
        }
    }

    /// Forget the previous snapshot.
    pub fn reset(&mut self) {
        self.previous = [false; TRACKED_BUTTONS];
    }

    /// Whether `index` was held in the last report.
    #[must_use]
    pub fn is_pressed(&self, index: usize) -> bool {
        self.previous.get(index).copied().unwrap_or(false)
    }

    /// Apply a report listing the indices currently held.
    ///
    /// Indices at or above [`TRACKED_BUTTONS`] are skipped. Events come out in
    /// ascending button index.
    pub fn apply(&mut self, device: DeviceId, held: impl IntoIterator<Item = u8>) -> Transitions {
        let mut current = [false; TRACKED_BUTTONS];
        for index in held {
            if let Some(slot) = current.get_mut(index as usize) {
                *slot = true;
            }
        }

        let events = diff(device, &self.previous, &current, |i| Key::Button(i as u8));
        self.previous = current;
        events
    }
}

/// Stick-to-button emulation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StickEmulation {
    /// A direction is held while the axis reading is beyond `±threshold`.
    pub threshold: u8,
}

/// Default emulation: a quarter of the signed 8-bit range from center.
pub const DEFAULT_STICK_EMULATION: StickEmulation = StickEmulation { threshold: 63 };

impl StickEmulation {
    /// Held state of every direction for a reading, in [`Direction::ALL`] order.
    #[must_use]
    pub const fn directions(&self, x: i8, y: i8) -> [bool; 4] {
        let t = self.threshold as i16;
        let (x, y) = (x as i16, y as i16);
        [x < -t, x > t, y > t, y < -t]
    }
}

impl Default for StickEmulation {
    fn default() -> Self {
        DEFAULT_STICK_EMULATION
    }
}

/// Edge detector that emulates four direction buttons from a 2-axis stick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StickButtonEmulator {
    config: StickEmulation,
    previous: [bool; 4],
}

impl StickButtonEmulator {
    #[must_use]
    pub const fn new(config: StickEmulation) -> Self {
        Self {
            config,
            previous: [false; 4],
        }
    }

    /// Forget the previous snapshot.
    pub fn reset(&mut self) {
        self.previous = [false; 4];
    }

    #[must_use]
    pub fn config(&self) -> StickEmulation {
        self.config
    }

    /// Whether `direction` was held after the last reading.
    #[must_use]
    pub fn is_pressed(&self, direction: Direction) -> bool {
        self.previous[direction.index()]
    }

    /// Apply a stick reading. Events come out in left, right, up, down order.
    pub fn apply(&mut self, device: DeviceId, x: i8, y: i8) -> Transitions {
        let current = self.config.directions(x, y);
        let events = diff(device, &self.previous, &current, |i| {
            Key::Stick(Direction::ALL[i])
        });
        self.previous = current;
        events
    }
}

impl Default for StickButtonEmulator {
    fn default() -> Self {
        Self::new(DEFAULT_STICK_EMULATION)
    }
}
