//! VR screen power buttons: three relays wired across the left, centre and
//! right display power switches, pressed together for `pulse_duration` µs.
//!
//! Pressing toggles the displays' power state; the firmware cannot know
//! whether that turned them on or off, so it only reports the relay state.

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use super::output::{Actuator, Polarity, refused};
use crate::app::events::{ModuleAddress, Report, wire_codes};
use crate::app::module::{
    CommandKind, Dispatch, Module, Services, overwrite_parameters, unhandled,
};
use crate::config::ScreenParams;
use crate::error::{ActuatorError, ConfigError, LayoutError, Result};
use crate::pins::PinRegistry;
use crate::sequencer::{self, Execution, StageCtx, Step};

wire_codes! {
    pub enum ScreenCommand {
        Toggle = 1,
    }
}

wire_codes! {
    pub enum ScreenEvent {
        OutputLocked = 51,
        On = 52,
        Off = 53,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenWiring {
    pub address: ModuleAddress,
    /// Left, centre, right.
    pub pins: [u8; 3],
    pub normally_closed: bool,
}

pub struct Screen<P> {
    address: ModuleAddress,
    relays: [Actuator<P>; 3],
    params: ScreenParams,
}

impl<P: OutputPin> Screen<P> {
    pub fn new(
        wiring: &ScreenWiring,
        pins: [P; 3],
        registry: &mut PinRegistry,
    ) -> core::result::Result<Self, LayoutError> {
        let polarity = Polarity::from_normally_closed(wiring.normally_closed);
        let [left, centre, right] = pins;
        let [nl, nc, nr] = wiring.pins;
        Ok(Self {
            address: wiring.address,
            relays: [
                Actuator::new(registry.bind(nl, left)?, polarity),
                Actuator::new(registry.bind(nc, centre)?, polarity),
                Actuator::new(registry.bind(nr, right)?, polarity),
            ],
            params: ScreenParams::default(),
        })
    }

    pub fn parameters(&self) -> &ScreenParams {
        &self.params
    }

    pub fn set_parameters(&mut self, params: ScreenParams) {
        self.params = params;
    }

    pub fn is_pressed(&self) -> bool {
        self.relays.iter().all(Actuator::is_on)
    }

    fn press_all(&mut self, on: bool, ctx: &mut StageCtx<'_, '_>) -> core::result::Result<(), ActuatorError> {
        // One lock check for the group so a lock never splits the relays.
        ctx.svc.lock.check()?;
        let mut first = Ok(());
        for relay in &mut self.relays {
            if let Err(e) = relay.drive(on, ctx.svc.lock) {
                first = first.and(Err(e));
            }
        }
        first
    }

    /// Release whatever a failed press managed to close.
    fn roll_back(&mut self, ctx: &mut StageCtx<'_, '_>) {
        for relay in self.relays.iter_mut().filter(|r| r.is_on()) {
            if relay.drive(false, ctx.svc.lock).is_err() {
                warn!("screen relay on pin {} stuck pressed", relay.pin_number());
            }
        }
    }

    fn set(&mut self, on: bool, then: Step, ctx: &mut StageCtx<'_, '_>) -> Step {
        match self.press_all(on, ctx) {
            Ok(()) => {
                let code = if on { ScreenEvent::On } else { ScreenEvent::Off };
                ctx.svc.emit(self.address, Report::code(code));
                then
            }
            Err(e) => {
                refused(self.address, ScreenEvent::OutputLocked.into(), e, ctx);
                if on {
                    self.roll_back(ctx);
                }
                Step::Abort
            }
        }
    }

    fn press(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        self.set(true, Step::Next, ctx)
    }

    fn hold(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        if ctx.waited(u64::from(self.params.pulse_duration)) {
            Step::Next
        } else {
            Step::Wait
        }
    }

    fn release(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        self.set(false, Step::Complete, ctx)
    }
}

impl<P: OutputPin> Module for Screen<P> {
    fn address(&self) -> ModuleAddress {
        self.address
    }

    fn apply_parameters(&mut self, bytes: &[u8]) -> core::result::Result<(), ConfigError> {
        overwrite_parameters(self.address, &mut self.params, bytes)
    }

    fn command_kind(&self, code: u8) -> Option<CommandKind> {
        ScreenCommand::try_from(code).ok().map(|_| CommandKind::Staged)
    }

    fn run_active_command(&mut self, exec: &mut Execution, svc: &mut Services<'_>) -> Dispatch {
        match ScreenCommand::try_from(exec.command()) {
            Ok(ScreenCommand::Toggle) => Dispatch::Handled(sequencer::run(
                self,
                &[Self::press, Self::hold, Self::release],
                exec,
                svc,
            )),
            Err(code) => unhandled(self.address, code),
        }
    }

    fn setup(&mut self, svc: &mut Services<'_>) -> Result<()> {
        self.params = ScreenParams::default();
        for relay in &mut self.relays {
            if let Err(e) = relay.force(false) {
                warn!("screen relay on pin {} did not release", relay.pin_number());
                return Err(e.into());
            }
        }
        svc.emit(self.address, Report::code(ScreenEvent::Off));
        info!(
            "screen {}/{} ready on pins {:?}",
            self.address.kind,
            self.address.id,
            self.relays.each_ref().map(Actuator::pin_number)
        );
        Ok(())
    }
}
