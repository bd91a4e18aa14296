//! Lock-respecting digital output shared by every switching actuator.
//!
//! An [`Actuator`] hides relay polarity: `drive(true)` always means "load
//! powered" (valve open, buzzer sounding, TTL high), whichever electrical
//! level that takes.

use embedded_hal::digital::{OutputPin, PinState};
use log::{error, warn};

use crate::app::events::{ModuleAddress, Report};
use crate::error::{ActuatorError, SetupError};
use crate::pins::Bound;
use crate::safety::OutputLock;
use crate::sequencer::StageCtx;

/// Which electrical level powers the load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

impl Polarity {
    /// A normally-closed relay closes its load circuit when driven HIGH.
    pub const fn from_normally_closed(normally_closed: bool) -> Self {
        if normally_closed { Self::ActiveHigh } else { Self::ActiveLow }
    }

    pub const fn level(self, on: bool) -> PinState {
        match (self, on) {
            (Self::ActiveHigh, true) | (Self::ActiveLow, false) => PinState::High,
            _ => PinState::Low,
        }
    }
}

/// Event codes a switching line reports with.
#[derive(Debug, Clone, Copy)]
pub struct SwitchCodes {
    pub on: u8,
    pub off: u8,
    pub locked: u8,
}

/// One polarity-aware output line.
#[derive(Debug)]
pub struct Actuator<P> {
    line: Bound<P>,
    polarity: Polarity,
    on: bool,
}

impl<P: OutputPin> Actuator<P> {
    pub fn new(line: Bound<P>, polarity: Polarity) -> Self {
        Self {
            line,
            polarity,
            on: false,
        }
    }

    pub fn pin_number(&self) -> u8 {
        self.line.number()
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Last level successfully written.
    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Command-time write. Refused while the output lock is engaged.
    pub fn drive(&mut self, on: bool, lock: &OutputLock) -> Result<(), ActuatorError> {
        lock.check()?;
        self.write(on)
    }

    /// Setup-time write of a safe level; ignores the output lock.
    pub fn force(&mut self, on: bool) -> Result<(), SetupError> {
        let number = self.line.number();
        self.write(on)
            .map_err(|_| SetupError::PinWriteFailed(number))
    }

    fn write(&mut self, on: bool) -> Result<(), ActuatorError> {
        let level = self.polarity.level(on);
        let number = self.line.number();
        self.line.pin().set_state(level).map_err(|e| {
            error!("pin {}: write {:?} failed: {:?}", number, level, e);
            ActuatorError::PinWriteFailed
        })?;
        self.on = on;
        Ok(())
    }
}

/// Drive `line` and report the outcome: the on/off code on success,
/// `codes.locked` when the output lock refused the write.
pub(crate) fn switch<P: OutputPin>(
    line: &mut Actuator<P>,
    on: bool,
    codes: SwitchCodes,
    source: ModuleAddress,
    ctx: &mut StageCtx<'_, '_>,
) -> Result<(), ActuatorError> {
    match line.drive(on, ctx.svc.lock) {
        Ok(()) => {
            let code = if on { codes.on } else { codes.off };
            ctx.svc.emit(source, Report::code(code));
            Ok(())
        }
        Err(e) => {
            refused(source, codes.locked, e, ctx);
            Err(e)
        }
    }
}

/// Log a refused write and, for a lock refusal, report it.
pub(crate) fn refused(
    source: ModuleAddress,
    locked_code: u8,
    e: ActuatorError,
    ctx: &mut StageCtx<'_, '_>,
) {
    if e == ActuatorError::OutputLocked {
        warn!("module {}/{}: output locked, command aborted", source.kind, source.id);
        ctx.svc.emit(source, Report::code(locked_code));
    } else {
        error!("module {}/{}: {}, command aborted", source.kind, source.id, e);
    }
}
