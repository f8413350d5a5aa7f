//! Report dispatch: route a complete frame to the matching edge detector.

use input_core::{ButtonDiffer, DeviceId, StickButtonEmulator, StickEmulation, Transitions};
use log::{debug, trace, warn};
use zeemote_proto::{parse_report, Report, ReportId};

/// Edge-detection state of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputState {
    pub buttons: ButtonDiffer,
    pub stick: StickButtonEmulator,
}

impl InputState {
    /// Everything released.
    #[must_use]
    pub const fn new(stick: StickEmulation) -> Self {
        Self {
            buttons: ButtonDiffer::new(),
            stick: StickButtonEmulator::new(stick),
        }
    }

    /// Release everything without changing the configuration.
    pub fn reset(&mut self) {
        self.buttons.reset();
        self.stick.reset();
    }
}

/// Decode `frame` and feed it to the edge detectors of `device`.
///
/// Only button and joystick reports produce transitions. Informational,
/// unknown, and truncated reports are logged and dropped.
pub fn dispatch(device: DeviceId, frame: &[u8], input: &mut InputState) -> Transitions {
    let report = match parse_report(frame) {
        Ok(report) => report,
        Err(e) => {
            warn!("{}: ignoring malformed report: {}", device, e);
            return Transitions::new();
        }
    };
    let id = report.id();
    if !id.carries_input() {
        match id {
            ReportId::Unknown(byte) => debug!("{}: unknown report id 0x{:02X}", device, byte),
            id => debug!("{}: {}", device, id.name()),
        }
        return Transitions::new();
    }
    trace!("{}: report id {}", device, id);

    match report {
        Report::Buttons(buttons) => {
            debug!("{}: button report {:02X?}", device, buttons.raw());
            input.buttons.apply(device, buttons.keys())
        }
        Report::Stick(stick) => {
            debug!("{}: analog report {} {}", device, stick.x, stick.y);
            input.stick.apply(device, stick.x, stick.y)
        }
        Report::Info(_) => Transitions::new(),
    }
}
