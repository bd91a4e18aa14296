//! Piezo buzzer on a plain digital line.

use embedded_hal::digital::OutputPin;
use log::info;

use super::output::{Actuator, Polarity, SwitchCodes, switch};
use crate::app::events::{ModuleAddress, Report, wire_codes};
use crate::app::module::{
    CommandKind, Dispatch, Module, Services, overwrite_parameters, unhandled,
};
use crate::config::SpeakerParams;
use crate::error::{ConfigError, LayoutError, Result};
use crate::pins::PinRegistry;
use crate::sequencer::{self, Execution, StageCtx, Step};

wire_codes! {
    pub enum SpeakerCommand {
        Pulse = 1,
        ToggleOn = 2,
        ToggleOff = 3,
    }
}

wire_codes! {
    pub enum SpeakerEvent {
        OutputLocked = 51,
        On = 52,
        Off = 53,
    }
}

const SPEAKER_CODES: SwitchCodes = SwitchCodes {
    on: SpeakerEvent::On as u8,
    off: SpeakerEvent::Off as u8,
    locked: SpeakerEvent::OutputLocked as u8,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeakerWiring {
    pub address: ModuleAddress,
    pub pin: u8,
}

pub struct Speaker<P> {
    address: ModuleAddress,
    line: Actuator<P>,
    params: SpeakerParams,
}

impl<P: OutputPin> Speaker<P> {
    pub fn new(
        wiring: &SpeakerWiring,
        pin: P,
        registry: &mut PinRegistry,
    ) -> core::result::Result<Self, LayoutError> {
        Ok(Self {
            address: wiring.address,
            line: Actuator::new(registry.bind(wiring.pin, pin)?, Polarity::ActiveHigh),
            params: SpeakerParams::default(),
        })
    }

    pub fn parameters(&self) -> &SpeakerParams {
        &self.params
    }

    pub fn set_parameters(&mut self, params: SpeakerParams) {
        self.params = params;
    }

    pub fn is_sounding(&self) -> bool {
        self.line.is_on()
    }

    fn set(&mut self, on: bool, then: Step, ctx: &mut StageCtx<'_, '_>) -> Step {
        Step::after(
            switch(&mut self.line, on, SPEAKER_CODES, self.address, ctx),
            then,
        )
    }

    fn start(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        self.set(true, Step::Next, ctx)
    }

    fn hold(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        if ctx.waited(u64::from(self.params.pulse_duration)) {
            Step::Next
        } else {
            Step::Wait
        }
    }

    fn stop(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        self.set(false, Step::Complete, ctx)
    }

    fn start_and_stay(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        self.set(true, Step::Complete, ctx)
    }
}

impl<P: OutputPin> Module for Speaker<P> {
    fn address(&self) -> ModuleAddress {
        self.address
    }

    fn apply_parameters(&mut self, bytes: &[u8]) -> core::result::Result<(), ConfigError> {
        overwrite_parameters(self.address, &mut self.params, bytes)
    }

    fn command_kind(&self, code: u8) -> Option<CommandKind> {
        SpeakerCommand::try_from(code).ok().map(|_| CommandKind::Staged)
    }

    fn run_active_command(&mut self, exec: &mut Execution, svc: &mut Services<'_>) -> Dispatch {
        let Ok(command) = SpeakerCommand::try_from(exec.command()) else {
            return unhandled(self.address, exec.command());
        };
        let progress = match command {
            SpeakerCommand::Pulse => {
                sequencer::run(self, &[Self::start, Self::hold, Self::stop], exec, svc)
            }
            SpeakerCommand::ToggleOn => sequencer::run(self, &[Self::start_and_stay], exec, svc),
            SpeakerCommand::ToggleOff => sequencer::run(self, &[Self::stop], exec, svc),
        };
        Dispatch::Handled(progress)
    }

    fn setup(&mut self, svc: &mut Services<'_>) -> Result<()> {
        self.params = SpeakerParams::default();
        self.line.force(false)?;
        svc.emit(self.address, Report::code(SpeakerEvent::Off));
        info!(
            "speaker {}/{} ready on pin {}",
            self.address.kind,
            self.address.id,
            self.line.pin_number()
        );
        Ok(())
    }
}
