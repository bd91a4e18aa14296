//! Sensing drivers.
//!
//! | Driver       | Signal                | Algorithm                         |
//! |--------------|-----------------------|-----------------------------------|
//! | `lick`       | ADC, contact voltage  | delta gate + threshold + collapse |
//! | `analog`     | ADC, generic          | delta gate + band + collapse      |
//! | `torque`     | ADC, bipolar bridge   | baseline decode + the same gates  |
//! | `encoder`    | quadrature pulses     | amortised pulse accumulator       |
//!
//! A failed read is logged and the check completes without a report; the
//! filter memory keeps its previous reference.

pub mod analog;
pub mod encoder;
pub mod filter;
pub mod lick;
pub mod quadrature;
pub mod torque;

pub use analog::AnalogSensor;
pub use encoder::Encoder;
pub use filter::{Band, FilterMemory, Verdict};
pub use lick::Lick;
pub use quadrature::QuadratureCounter;
pub use torque::Torque;

use log::warn;

use crate::app::events::{ModuleAddress, Report};
use crate::app::ports::{AnalogInput, read_analog};
use crate::error::SensorError;
use crate::pins::Bound;
use crate::sequencer::{StageCtx, Step};

/// Rotation sense shared by the torque sensor and the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    Ccw,
    Cw,
}

impl Rotation {
    /// The opposite sense when `invert` is set.
    pub fn flipped(self, invert: bool) -> Self {
        match (self, invert) {
            (Self::Ccw, true) => Self::Cw,
            (Self::Cw, true) => Self::Ccw,
            (r, false) => r,
        }
    }
}

/// Settings for one level check.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LevelCheck {
    pub pool: u8,
    pub delta_threshold: u16,
    pub band: Band,
    pub changed_code: u8,
}

/// Averaged read of `pin`, or `None` after logging the failure.
pub(crate) fn sample<A: AnalogInput>(pin: &mut Bound<A>, pool: u8) -> Option<u16> {
    match read_analog(pin.pin(), pool) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("ADC pin {}: {}: {:?}", pin.number(), SensorError::AdcReadFailed, e);
            None
        }
    }
}

/// One CheckState pass for a unipolar level sensor.
pub(crate) fn check_level<A: AnalogInput>(
    pin: &mut Bound<A>,
    memory: &mut FilterMemory,
    check: LevelCheck,
    source: ModuleAddress,
    ctx: &mut StageCtx<'_, '_>,
) -> Step {
    let Some(signal) = sample(pin, check.pool) else {
        return Step::Complete;
    };
    match memory.observe(signal, check.delta_threshold, check.band) {
        Verdict::Report(value) => ctx.svc.emit(source, Report::with(check.changed_code, value)),
        Verdict::Collapse => ctx.svc.emit(source, Report::with(check.changed_code, 0u16)),
        Verdict::Quiet => {}
    }
    Step::Complete
}
