//! Report classification and decoding.
//!
//! Every frame carries a report id at a fixed offset. Only button and
//! joystick reports produce input; the rest are informational and unknown ids
//! are tolerated so newer firmware keeps working.

use core::fmt;

/// Offset of the report id byte within a frame.
pub const REPORT_ID_OFFSET: usize = 2;

/// Offset of the first pressed-key index in a button report.
pub const BUTTON_KEYS_OFFSET: usize = 3;

/// Number of key slots in a button report.
pub const BUTTON_REPORT_KEYS: usize = 6;

/// Offsets of the X/Y axes in a joystick report.
pub const STICK_X_OFFSET: usize = 4;
pub const STICK_Y_OFFSET: usize = 5;

/// Report ids.
pub const RID_VERSION: u8 = 0x03;
pub const RID_BTN_METADATA: u8 = 0x04;
pub const RID_CONFIG_DATA: u8 = 0x05;
pub const RID_BTN_REPORT: u8 = 0x07;
pub const RID_8BA_2A_JS_REPORT: u8 = 0x08;
pub const RID_BATTERY_REPORT: u8 = 0x11;

/// Report type carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportId {
    Version,
    ButtonMetadata,
    ConfigData,
    Buttons,
    Joystick,
    Battery,
    Unknown(u8),
}

impl ReportId {
    /// Classify a raw report id byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            RID_VERSION => ReportId::Version,
            RID_BTN_METADATA => ReportId::ButtonMetadata,
            RID_CONFIG_DATA => ReportId::ConfigData,
            RID_BTN_REPORT => ReportId::Buttons,
            RID_8BA_2A_JS_REPORT => ReportId::Joystick,
            RID_BATTERY_REPORT => ReportId::Battery,
            other => ReportId::Unknown(other),
        }
    }

    /// Raw report id byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            ReportId::Version => RID_VERSION,
            ReportId::ButtonMetadata => RID_BTN_METADATA,
            ReportId::ConfigData => RID_CONFIG_DATA,
            ReportId::Buttons => RID_BTN_REPORT,
            ReportId::Joystick => RID_8BA_2A_JS_REPORT,
            ReportId::Battery => RID_BATTERY_REPORT,
            ReportId::Unknown(byte) => byte,
        }
    }

    /// Human-readable name, for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ReportId::Version => "Version Report",
            ReportId::ButtonMetadata => "Button Metadata",
            ReportId::ConfigData => "Configuration Data",
            ReportId::Buttons => "Button Report",
            ReportId::Joystick => "8-bit Analog 2-Axis Joystick Report",
            ReportId::Battery => "Battery Report",
            ReportId::Unknown(_) => "Unknown",
        }
    }

    /// Whether reports of this type carry input.
    #[must_use]
    pub const fn carries_input(self) -> bool {
        matches!(self, ReportId::Buttons | ReportId::Joystick)
    }
}

impl From<u8> for ReportId {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X} ({})", self.as_byte(), self.name())
    }
}

/// Keys reported as held in a button report.
///
/// Slots the controller does not use carry an out-of-range filler value, so
/// consumers must ignore indices they do not track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonReport {
    keys: [u8; BUTTON_REPORT_KEYS],
    len: usize,
}

impl ButtonReport {
    /// Build from the key slots of a report; slots past
    /// [`BUTTON_REPORT_KEYS`] are ignored.
    #[must_use]
    pub fn from_keys(slots: &[u8]) -> Self {
        let len = slots.len().min(BUTTON_REPORT_KEYS);
        let mut keys = [0u8; BUTTON_REPORT_KEYS];
        keys[..len].copy_from_slice(&slots[..len]);
        Self { keys, len }
    }

    /// Raw key slots.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.keys[..self.len]
    }

    /// Held key indices, in slot order.
    pub fn keys(&self) -> impl Iterator<Item = u8> + '_ {
        self.raw().iter().copied()
    }
}

/// Two-axis joystick reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StickReport {
    pub x: i8,
    pub y: i8,
}

/// Decoded report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Report {
    Buttons(ButtonReport),
    Stick(StickReport),
    /// Report without input (version, metadata, battery, unknown ids).
    Info(ReportId),
}

impl Report {
    /// Report id this report was decoded from.
    #[must_use]
    pub const fn id(&self) -> ReportId {
        match self {
            Report::Buttons(_) => ReportId::Buttons,
            Report::Stick(_) => ReportId::Joystick,
            Report::Info(id) => *id,
        }
    }
}

/// Report decoding error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportError {
    /// The frame is shorter than its report type requires.
    Truncated {
        /// Frame length.
        len: usize,
        /// Minimum length for the report.
        needed: usize,
    },
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Truncated { len, needed } => {
                write!(f, "frame of {len} bytes is too short, need {needed}")
            }
        }
    }
}

/// Decode a complete frame (length prefix included).
pub fn parse_report(frame: &[u8]) -> Result<Report, ReportError> {
    let id = frame
        .get(REPORT_ID_OFFSET)
        .copied()
        .map(ReportId::from_byte)
        .ok_or(ReportError::Truncated {
            len: frame.len(),
            needed: REPORT_ID_OFFSET + 1,
        })?;

    match id {
        ReportId::Buttons => {
            let slots = frame.get(BUTTON_KEYS_OFFSET..).unwrap_or(&[]);
            Ok(Report::Buttons(ButtonReport::from_keys(slots)))
        }
        ReportId::Joystick => match (frame.get(STICK_X_OFFSET), frame.get(STICK_Y_OFFSET)) {
            (Some(&x), Some(&y)) => Ok(Report::Stick(StickReport {
                x: x as i8,
                y: y as i8,
            })),
            _ => Err(ReportError::Truncated {
                len: frame.len(),
                needed: STICK_Y_OFFSET + 1,
            }),
        },
        other => Ok(Report::Info(other)),
    }
}
