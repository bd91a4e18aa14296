//! TTL trigger line, wired either as an output (pulses and levels sent to
//! other equipment) or as an input (level changes received from it).
//!
//! Commands meant for the other direction report `InvalidPinMode` and abort
//! without touching the pin.

use embedded_hal::digital::{InputPin, OutputPin};
use log::{info, warn};

use super::output::{Actuator, Polarity, SwitchCodes, switch};
use crate::app::events::{ModuleAddress, Report, wire_codes};
use crate::app::module::{
    CommandKind, Dispatch, Module, Services, overwrite_parameters, unhandled,
};
use crate::app::ports::read_digital;
use crate::config::TtlParams;
use crate::error::{ActuatorError, ConfigError, LayoutError, Result, SensorError};
use crate::pins::{Bound, PinRegistry, Unused};
use crate::sequencer::{self, Execution, StageCtx, Step};

wire_codes! {
    pub enum TtlCommand {
        Pulse = 1,
        ToggleOn = 2,
        ToggleOff = 3,
        CheckState = 4,
    }
}

wire_codes! {
    pub enum TtlEvent {
        OutputLocked = 51,
        InputOn = 52,
        InputOff = 53,
        InvalidPinMode = 54,
        OutputOn = 55,
        OutputOff = 56,
    }
}

const TTL_CODES: SwitchCodes = SwitchCodes {
    on: TtlEvent::OutputOn as u8,
    off: TtlEvent::OutputOff as u8,
    locked: TtlEvent::OutputLocked as u8,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlWiring {
    pub address: ModuleAddress,
    pub pin: u8,
}

enum Line<O, I> {
    Output(Actuator<O>),
    Input(Bound<I>),
}

pub struct Ttl<O = Unused, I = Unused> {
    address: ModuleAddress,
    line: Line<O, I>,
    start_on: bool,
    params: TtlParams,
    /// Last input level reported.
    previous_input: bool,
}

impl<O: OutputPin> Ttl<O, Unused> {
    /// Output line; `start_on` is the level written at setup.
    pub fn output(
        wiring: &TtlWiring,
        pin: O,
        start_on: bool,
        registry: &mut PinRegistry,
    ) -> core::result::Result<Self, LayoutError> {
        let line = Actuator::new(registry.bind(wiring.pin, pin)?, Polarity::ActiveHigh);
        Ok(Self::with_line(wiring.address, Line::Output(line), start_on))
    }
}

impl<I: InputPin> Ttl<Unused, I> {
    pub fn input(
        wiring: &TtlWiring,
        pin: I,
        registry: &mut PinRegistry,
    ) -> core::result::Result<Self, LayoutError> {
        let line = registry.bind(wiring.pin, pin)?;
        Ok(Self::with_line(wiring.address, Line::Input(line), false))
    }
}

impl<O: OutputPin, I: InputPin> Ttl<O, I> {
    fn with_line(address: ModuleAddress, line: Line<O, I>, start_on: bool) -> Self {
        Self {
            address,
            line,
            start_on,
            params: TtlParams::default(),
            previous_input: false,
        }
    }

    pub fn parameters(&self) -> &TtlParams {
        &self.params
    }

    pub fn set_parameters(&mut self, params: TtlParams) {
        self.params = params;
    }

    pub fn is_output(&self) -> bool {
        matches!(self.line, Line::Output(_))
    }

    fn invalid_mode(&self, ctx: &mut StageCtx<'_, '_>) -> Step {
        warn!(
            "ttl {}/{}: {} ({} line), command aborted",
            self.address.kind,
            self.address.id,
            ActuatorError::InvalidPinMode,
            if self.is_output() { "output" } else { "input" }
        );
        ctx.svc
            .emit(self.address, Report::code(TtlEvent::InvalidPinMode));
        Step::Abort
    }

    fn write(&mut self, on: bool, then: Step, ctx: &mut StageCtx<'_, '_>) -> Step {
        let address = self.address;
        match &mut self.line {
            Line::Output(line) => Step::after(switch(line, on, TTL_CODES, address, ctx), then),
            Line::Input(_) => self.invalid_mode(ctx),
        }
    }

    fn raise(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        self.write(true, Step::Next, ctx)
    }

    fn hold(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        if ctx.waited(u64::from(self.params.pulse_duration)) {
            Step::Next
        } else {
            Step::Wait
        }
    }

    fn lower(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        self.write(false, Step::Complete, ctx)
    }

    fn raise_and_stay(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        self.write(true, Step::Complete, ctx)
    }

    fn check(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        let Line::Input(pin) = &mut self.line else {
            return self.invalid_mode(ctx);
        };
        match read_digital(pin.pin(), self.params.average_pool_size) {
            Ok(level) if level != self.previous_input => {
                self.previous_input = level;
                let code = if level {
                    TtlEvent::InputOn
                } else {
                    TtlEvent::InputOff
                };
                ctx.svc.emit(self.address, Report::code(code));
            }
            Ok(_) => {}
            Err(e) => warn!("ttl pin {}: {}: {:?}", pin.number(), SensorError::GpioReadFailed, e),
        }
        Step::Complete
    }
}

impl<O: OutputPin, I: InputPin> Module for Ttl<O, I> {
    fn address(&self) -> ModuleAddress {
        self.address
    }

    fn apply_parameters(&mut self, bytes: &[u8]) -> core::result::Result<(), ConfigError> {
        overwrite_parameters(self.address, &mut self.params, bytes)
    }

    fn command_kind(&self, code: u8) -> Option<CommandKind> {
        TtlCommand::try_from(code).ok().map(|_| CommandKind::Staged)
    }

    fn run_active_command(&mut self, exec: &mut Execution, svc: &mut Services<'_>) -> Dispatch {
        let Ok(command) = TtlCommand::try_from(exec.command()) else {
            return unhandled(self.address, exec.command());
        };
        let progress = match command {
            TtlCommand::Pulse => {
                sequencer::run(self, &[Self::raise, Self::hold, Self::lower], exec, svc)
            }
            TtlCommand::ToggleOn => sequencer::run(self, &[Self::raise_and_stay], exec, svc),
            TtlCommand::ToggleOff => sequencer::run(self, &[Self::lower], exec, svc),
            TtlCommand::CheckState => sequencer::run(self, &[Self::check], exec, svc),
        };
        Dispatch::Handled(progress)
    }

    fn setup(&mut self, _svc: &mut Services<'_>) -> Result<()> {
        self.params = TtlParams::default();
        match &mut self.line {
            Line::Output(line) => {
                line.force(self.start_on)?;
                info!(
                    "ttl {}/{} ready as output on pin {}",
                    self.address.kind,
                    self.address.id,
                    line.pin_number()
                );
            }
            Line::Input(pin) => info!(
                "ttl {}/{} ready as input on pin {}",
                self.address.kind,
                self.address.id,
                pin.number()
            ),
        }
        Ok(())
    }
}
