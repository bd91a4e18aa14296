//! Electromagnetic wheel brake driven through a PWM-capable pin.
//!
//! A normally-engaged brake holds when unpowered: engaging it means driving
//! the pin LOW, and a PWM duty of 255 − strength yields `strength` worth of
//! braking. A normally-disengaged brake is the mirror image. Either way
//! `breaking_strength` 255 means full braking.

use embedded_hal::pwm::SetDutyCycle;
use log::{error, info, warn};

use crate::app::events::{ModuleAddress, Report, wire_codes};
use crate::app::module::{
    CommandKind, Dispatch, Module, Services, overwrite_parameters, unhandled,
};
use crate::config::BrakeParams;
use crate::error::{ActuatorError, ConfigError, LayoutError, Result, SetupError};
use crate::pins::{Bound, PinRegistry};
use crate::sequencer::{self, Execution, StageCtx, Step};

wire_codes! {
    pub enum BrakeCommand {
        ToggleOn = 1,
        ToggleOff = 2,
        SetBreakingPower = 3,
    }
}

wire_codes! {
    pub enum BrakeEvent {
        OutputLocked = 51,
        Engaged = 52,
        Disengaged = 53,
        /// Carries the strength (u8) that was applied.
        PowerSet = 54,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrakeWiring {
    pub address: ModuleAddress,
    pub pin: u8,
    /// Engaged when the pin is unpowered.
    pub normally_engaged: bool,
    pub start_engaged: bool,
}

const fn duty_for(normally_engaged: bool, strength: u8) -> u8 {
    if normally_engaged { 255 - strength } else { strength }
}

/// Requested brake output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hold {
    Engaged,
    Disengaged,
    Strength(u8),
}

pub struct Brake<P> {
    address: ModuleAddress,
    pin: Bound<P>,
    normally_engaged: bool,
    start_engaged: bool,
    params: BrakeParams,
}

impl<P: SetDutyCycle> Brake<P> {
    pub fn new(
        wiring: &BrakeWiring,
        pin: P,
        registry: &mut PinRegistry,
    ) -> core::result::Result<Self, LayoutError> {
        Ok(Self {
            address: wiring.address,
            pin: registry.bind(wiring.pin, pin)?,
            normally_engaged: wiring.normally_engaged,
            start_engaged: wiring.start_engaged,
            params: BrakeParams::default(),
        })
    }

    pub fn parameters(&self) -> &BrakeParams {
        &self.params
    }

    pub fn set_parameters(&mut self, params: BrakeParams) {
        self.params = params;
    }

    /// Raw PWM value (out of 255) that produces `strength` braking.
    pub fn duty_for(&self, strength: u8) -> u8 {
        duty_for(self.normally_engaged, strength)
    }

    fn apply(&mut self, hold: Hold) -> core::result::Result<(), ActuatorError> {
        // Powered pin = the brake's non-resting state.
        let powered = |engage: bool| engage != self.normally_engaged;
        let pin = self.pin.pin();
        let result = match hold {
            Hold::Engaged | Hold::Disengaged => {
                if powered(hold == Hold::Engaged) {
                    pin.set_duty_cycle_fully_on()
                } else {
                    pin.set_duty_cycle_fully_off()
                }
            }
            Hold::Strength(s) => {
                let duty = duty_for(self.normally_engaged, s);
                pin.set_duty_cycle_fraction(u16::from(duty), 255)
            }
        };
        result.map_err(|e| {
            error!("brake pin {}: PWM write failed: {:?}", self.pin.number(), e);
            ActuatorError::PinWriteFailed
        })
    }

    fn command(&mut self, hold: Hold, ctx: &mut StageCtx<'_, '_>) -> Step {
        if ctx.svc.lock.is_engaged() {
            warn!("brake {}/{}: output locked, command aborted", self.address.kind, self.address.id);
            ctx.svc
                .emit(self.address, Report::code(BrakeEvent::OutputLocked));
            return Step::Abort;
        }
        if self.apply(hold).is_err() {
            return Step::Abort;
        }
        let report = match hold {
            Hold::Engaged => Report::code(BrakeEvent::Engaged),
            Hold::Disengaged => Report::code(BrakeEvent::Disengaged),
            Hold::Strength(s) => Report::with(BrakeEvent::PowerSet, s),
        };
        ctx.svc.emit(self.address, report);
        Step::Complete
    }

    fn engage(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        self.command(Hold::Engaged, ctx)
    }

    fn disengage(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        self.command(Hold::Disengaged, ctx)
    }

    fn set_power(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        self.command(Hold::Strength(self.params.breaking_strength), ctx)
    }
}

impl<P: SetDutyCycle> Module for Brake<P> {
    fn address(&self) -> ModuleAddress {
        self.address
    }

    fn apply_parameters(&mut self, bytes: &[u8]) -> core::result::Result<(), ConfigError> {
        overwrite_parameters(self.address, &mut self.params, bytes)
    }

    fn command_kind(&self, code: u8) -> Option<CommandKind> {
        BrakeCommand::try_from(code).ok().map(|_| CommandKind::Staged)
    }

    fn run_active_command(&mut self, exec: &mut Execution, svc: &mut Services<'_>) -> Dispatch {
        let Ok(command) = BrakeCommand::try_from(exec.command()) else {
            return unhandled(self.address, exec.command());
        };
        let progress = match command {
            BrakeCommand::ToggleOn => sequencer::run(self, &[Self::engage], exec, svc),
            BrakeCommand::ToggleOff => sequencer::run(self, &[Self::disengage], exec, svc),
            BrakeCommand::SetBreakingPower => sequencer::run(self, &[Self::set_power], exec, svc),
        };
        Dispatch::Handled(progress)
    }

    fn setup(&mut self, svc: &mut Services<'_>) -> Result<()> {
        self.params = BrakeParams::default();
        let (hold, code) = if self.start_engaged {
            (Hold::Engaged, BrakeEvent::Engaged)
        } else {
            (Hold::Disengaged, BrakeEvent::Disengaged)
        };
        self.apply(hold)
            .map_err(|_| SetupError::PinWriteFailed(self.pin.number()))?;
        svc.emit(self.address, Report::code(code));
        info!(
            "brake {}/{} ready on pin {} ({:?})",
            self.address.kind,
            self.address.id,
            self.pin.number(),
            code
        );
        Ok(())
    }
}
