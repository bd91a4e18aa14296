//! Solenoid fluid valve with an optional reward-tone buzzer.
//!
//! Pulse delivers a fixed fluid volume by holding the valve open for
//! `pulse_duration` µs without blocking the loop. When a tone line is
//! wired it starts together with the valve and stays on for
//! `tone_duration` µs in total, never shorter than the valve pulse:
//!
//! ```text
//!  valve ──┐ pulse ┌──────────────────────
//!          └───────┘
//!  tone  ──┐ pulse + (tone − pulse)   ┌────
//!          └──────────────────────────┘
//! ```
//!
//! Calibrate is the one blocking valve command: it pulses the valve
//! `calibration_count` times back to back so the PC can weigh the
//! delivered volume.

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use super::output::{Actuator, Polarity, SwitchCodes, refused, switch};
use crate::app::events::{ModuleAddress, Report, wire_codes};
use crate::app::module::{
    CommandKind, Dispatch, Module, Services, overwrite_parameters, unhandled,
};
use crate::config::ValveParams;
use crate::error::{ActuatorError, ConfigError, LayoutError, Result};
use crate::pins::{PinRegistry, Unused};
use crate::sequencer::{self, Execution, StageCtx, Step};

wire_codes! {
    pub enum ValveCommand {
        Pulse = 1,
        ToggleOn = 2,
        ToggleOff = 3,
        Calibrate = 4,
        Tone = 5,
    }
}

wire_codes! {
    pub enum ValveEvent {
        OutputLocked = 51,
        Open = 52,
        Closed = 53,
        Calibrated = 54,
        ToneOn = 55,
        ToneOff = 56,
        TonePinNotSet = 57,
    }
}

const VALVE_CODES: SwitchCodes = SwitchCodes {
    on: ValveEvent::Open as u8,
    off: ValveEvent::Closed as u8,
    locked: ValveEvent::OutputLocked as u8,
};

const TONE_CODES: SwitchCodes = SwitchCodes {
    on: ValveEvent::ToneOn as u8,
    off: ValveEvent::ToneOff as u8,
    locked: ValveEvent::OutputLocked as u8,
};

/// Board wiring of one valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValveWiring {
    pub address: ModuleAddress,
    pub pin: u8,
    /// Closed when unpowered.
    pub normally_closed: bool,
    pub start_closed: bool,
    pub tone_pin: Option<u8>,
}

pub struct Valve<V, T = Unused> {
    address: ModuleAddress,
    valve: Actuator<V>,
    tone: Option<Actuator<T>>,
    start_closed: bool,
    params: ValveParams,
}

impl<V: OutputPin> Valve<V, Unused> {
    /// A valve with no tone buzzer.
    pub fn without_tone(
        wiring: &ValveWiring,
        valve: V,
        registry: &mut PinRegistry,
    ) -> core::result::Result<Self, LayoutError> {
        Self::new(wiring, valve, None, registry)
    }
}

impl<V: OutputPin, T: OutputPin> Valve<V, T> {
    pub fn new(
        wiring: &ValveWiring,
        valve: V,
        tone: Option<T>,
        registry: &mut PinRegistry,
    ) -> core::result::Result<Self, LayoutError> {
        let polarity = Polarity::from_normally_closed(wiring.normally_closed);
        let valve = Actuator::new(registry.bind(wiring.pin, valve)?, polarity);
        let tone = match (wiring.tone_pin, tone) {
            (Some(number), Some(pin)) => Some(Actuator::new(
                registry.bind(number, pin)?,
                Polarity::ActiveHigh,
            )),
            (None, None) => None,
            (Some(number), None) => return Err(LayoutError::MissingLine(number)),
            (None, Some(_)) => return Err(LayoutError::UndeclaredLine),
        };
        Ok(Self {
            address: wiring.address,
            valve,
            tone,
            start_closed: wiring.start_closed,
            params: ValveParams::default(),
        })
    }

    pub fn parameters(&self) -> &ValveParams {
        &self.params
    }

    pub fn set_parameters(&mut self, params: ValveParams) {
        self.params = params;
    }

    pub fn is_open(&self) -> bool {
        self.valve.is_on()
    }

    pub fn has_tone(&self) -> bool {
        self.tone.is_some()
    }

    // ── Pulse ────────────────────────────────────────────────

    fn open(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        if switch(&mut self.valve, true, VALVE_CODES, self.address, ctx).is_err() {
            return Step::Abort;
        }
        // The valve is open now; a failed tone must not strand it.
        if let Some(tone) = self.tone.as_mut()
            && switch(tone, true, TONE_CODES, self.address, ctx).is_err()
        {
            warn!(
                "valve {}/{}: tone did not start, pulse continues",
                self.address.kind, self.address.id
            );
        }
        Step::Next
    }

    fn hold_pulse(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        if ctx.waited(u64::from(self.params.pulse_duration)) {
            Step::Next
        } else {
            Step::Wait
        }
    }

    fn close(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        let then = if self.tone.is_some() {
            Step::Next
        } else {
            Step::Complete
        };
        Step::after(
            switch(&mut self.valve, false, VALVE_CODES, self.address, ctx),
            then,
        )
    }

    /// Remaining tone time after the valve has closed.
    fn hold_tone_tail(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        let tail = self
            .params
            .tone_duration
            .saturating_sub(self.params.pulse_duration);
        if ctx.waited(u64::from(tail)) {
            Step::Next
        } else {
            Step::Wait
        }
    }

    fn silence(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        match self.tone.as_mut() {
            Some(tone) => Step::after(
                switch(tone, false, TONE_CODES, self.address, ctx),
                Step::Complete,
            ),
            None => Step::Complete,
        }
    }

    // ── Toggles ──────────────────────────────────────────────

    fn open_and_stay(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        Step::after(
            switch(&mut self.valve, true, VALVE_CODES, self.address, ctx),
            Step::Complete,
        )
    }

    fn close_and_stay(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        Step::after(
            switch(&mut self.valve, false, VALVE_CODES, self.address, ctx),
            Step::Complete,
        )
    }

    // ── Tone only ────────────────────────────────────────────

    fn sound(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        let Some(tone) = self.tone.as_mut() else {
            warn!(
                "valve {}/{}: tone requested but no tone line is wired",
                self.address.kind, self.address.id
            );
            ctx.svc
                .emit(self.address, Report::code(ValveEvent::TonePinNotSet));
            return Step::Abort;
        };
        Step::after(
            switch(tone, true, TONE_CODES, self.address, ctx),
            Step::Next,
        )
    }

    fn hold_tone(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        if ctx.waited(u64::from(self.params.tone_duration)) {
            Step::Next
        } else {
            Step::Wait
        }
    }

    // ── Calibrate (blocking) ─────────────────────────────────

    fn calibrate(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        let count = self.params.calibration_count;
        for i in 0..count {
            if let Err(e) = self.calibration_pulse(ctx.svc) {
                warn!("valve calibration stopped after {i} of {count} pulses");
                refused(self.address, VALVE_CODES.locked, e, ctx);
                return Step::Abort;
            }
        }
        info!("valve calibration finished: {count} pulses");
        ctx.svc
            .emit(self.address, Report::code(ValveEvent::Calibrated));
        Step::Complete
    }

    fn calibration_pulse(&mut self, svc: &mut Services<'_>) -> core::result::Result<(), ActuatorError> {
        self.valve.drive(true, svc.lock)?;
        svc.delay.delay_us(self.params.pulse_duration);
        self.valve.drive(false, svc.lock)?;
        svc.delay.delay_us(self.params.calibration_delay);
        Ok(())
    }
}

impl<V: OutputPin, T: OutputPin> Module for Valve<V, T> {
    fn address(&self) -> ModuleAddress {
        self.address
    }

    fn apply_parameters(&mut self, bytes: &[u8]) -> core::result::Result<(), ConfigError> {
        overwrite_parameters(self.address, &mut self.params, bytes)
    }

    fn command_kind(&self, code: u8) -> Option<CommandKind> {
        match ValveCommand::try_from(code).ok()? {
            ValveCommand::Calibrate => Some(CommandKind::Blocking),
            _ => Some(CommandKind::Staged),
        }
    }

    fn run_active_command(&mut self, exec: &mut Execution, svc: &mut Services<'_>) -> Dispatch {
        let Ok(command) = ValveCommand::try_from(exec.command()) else {
            return unhandled(self.address, exec.command());
        };
        let progress = match command {
            ValveCommand::Pulse => sequencer::run(
                self,
                &[
                    Self::open,
                    Self::hold_pulse,
                    Self::close,
                    Self::hold_tone_tail,
                    Self::silence,
                ],
                exec,
                svc,
            ),
            ValveCommand::ToggleOn => sequencer::run(self, &[Self::open_and_stay], exec, svc),
            ValveCommand::ToggleOff => sequencer::run(self, &[Self::close_and_stay], exec, svc),
            ValveCommand::Calibrate => sequencer::run(self, &[Self::calibrate], exec, svc),
            ValveCommand::Tone => sequencer::run(
                self,
                &[Self::sound, Self::hold_tone, Self::silence],
                exec,
                svc,
            ),
        };
        Dispatch::Handled(progress)
    }

    fn setup(&mut self, svc: &mut Services<'_>) -> Result<()> {
        self.params = ValveParams::default();
        if let Some(tone) = self.tone.as_mut() {
            tone.force(false)?;
            svc.emit(self.address, Report::code(ValveEvent::ToneOff));
        }
        let open = !self.start_closed;
        self.valve.force(open)?;
        let state = if open {
            ValveEvent::Open
        } else {
            ValveEvent::Closed
        };
        svc.emit(self.address, Report::code(state));
        info!(
            "valve {}/{} ready on pin {} ({:?}, tone: {})",
            self.address.kind,
            self.address.id,
            self.valve.pin_number(),
            state,
            self.tone.is_some()
        );
        Ok(())
    }
}
