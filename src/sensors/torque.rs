//! Bipolar torque sensor behind an amplifier centred on `baseline`.
//!
//! Direction convention: a reading above baseline is CCW torque and one
//! below is CW, swapped when the wiring sets `invert`. A reading exactly at
//! baseline is zero torque and is tagged CCW, as are zero-collapse reports.
//! The reported value is the distance from baseline, so it means "how much
//! torque" in either direction and the event code alone carries direction.

use log::{debug, info};

use super::{FilterMemory, Rotation, sample};
use crate::app::events::{ModuleAddress, Report, wire_codes};
use crate::app::module::{
    CommandKind, Dispatch, Module, Services, overwrite_parameters, unhandled,
};
use crate::app::ports::AnalogInput;
use crate::config::TorqueParams;
use crate::error::{ConfigError, LayoutError, Result};
use crate::pins::{Bound, PinRegistry};
use crate::sequencer::{self, Execution, StageCtx, Step};

wire_codes! {
    pub enum TorqueCommand {
        CheckState = 1,
    }
}

wire_codes! {
    pub enum TorqueEvent {
        /// u16 magnitude.
        Ccw = 51,
        /// u16 magnitude.
        Cw = 52,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TorqueWiring {
    pub address: ModuleAddress,
    pub pin: u8,
    /// Zero-torque ADC reading.
    pub baseline: u16,
    pub invert: bool,
}

/// Split a raw reading into direction and distance from baseline.
pub fn decode(raw: u16, baseline: u16, invert: bool) -> (Rotation, u16) {
    match raw.cmp(&baseline) {
        core::cmp::Ordering::Greater => (Rotation::Ccw.flipped(invert), raw - baseline),
        core::cmp::Ordering::Less => (Rotation::Cw.flipped(invert), baseline - raw),
        core::cmp::Ordering::Equal => (Rotation::Ccw, 0),
    }
}

pub struct Torque<A> {
    address: ModuleAddress,
    pin: Bound<A>,
    invert: bool,
    wired_baseline: u16,
    params: TorqueParams,
    memory: FilterMemory,
}

impl<A: AnalogInput> Torque<A> {
    pub fn new(
        wiring: &TorqueWiring,
        pin: A,
        registry: &mut PinRegistry,
    ) -> core::result::Result<Self, LayoutError> {
        Ok(Self {
            address: wiring.address,
            pin: registry.bind(wiring.pin, pin)?,
            invert: wiring.invert,
            wired_baseline: wiring.baseline,
            params: TorqueParams::with_baseline(wiring.baseline),
            memory: FilterMemory::new(wiring.baseline),
        })
    }

    pub fn parameters(&self) -> &TorqueParams {
        &self.params
    }

    pub fn set_parameters(&mut self, params: TorqueParams) {
        let before = self.params.baseline;
        self.params = params;
        self.rebase(before);
    }

    /// Zero torque sits at the baseline, so a new baseline is the new
    /// delta reference.
    fn rebase(&mut self, before: u16) {
        if self.params.baseline != before {
            debug!(
                "torque {}/{}: baseline {} -> {}",
                self.address.kind, self.address.id, before, self.params.baseline
            );
            self.memory.reseed(self.params.baseline);
        }
    }

    pub fn memory(&self) -> &FilterMemory {
        &self.memory
    }

    fn reports(&self, rotation: Rotation) -> bool {
        match rotation {
            Rotation::Ccw => self.params.report_ccw,
            Rotation::Cw => self.params.report_cw,
        }
    }

    fn check(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        let p = self.params;
        let Some(raw) = sample(&mut self.pin, p.average_pool_size) else {
            return Step::Complete;
        };
        if !self.memory.passes_delta(raw, p.delta_threshold) {
            return Step::Complete;
        }

        let (rotation, magnitude) = decode(raw, p.baseline, self.invert);
        if magnitude < p.signal_threshold {
            if self.memory.collapse() {
                ctx.svc
                    .emit(self.address, Report::with(TorqueEvent::Ccw, 0u16));
            }
        } else {
            // A direction that is not reported still ends a zero run.
            self.memory.clear();
            if self.reports(rotation) {
                let code = match rotation {
                    Rotation::Ccw => TorqueEvent::Ccw,
                    Rotation::Cw => TorqueEvent::Cw,
                };
                ctx.svc.emit(self.address, Report::with(code, magnitude));
            }
        }
        Step::Complete
    }
}

impl<A: AnalogInput> Module for Torque<A> {
    fn address(&self) -> ModuleAddress {
        self.address
    }

    fn apply_parameters(&mut self, bytes: &[u8]) -> core::result::Result<(), ConfigError> {
        let before = self.params.baseline;
        overwrite_parameters(self.address, &mut self.params, bytes)?;
        self.rebase(before);
        Ok(())
    }

    fn command_kind(&self, code: u8) -> Option<CommandKind> {
        TorqueCommand::try_from(code).ok().map(|_| CommandKind::Staged)
    }

    fn run_active_command(&mut self, exec: &mut Execution, svc: &mut Services<'_>) -> Dispatch {
        match TorqueCommand::try_from(exec.command()) {
            Ok(TorqueCommand::CheckState) => {
                Dispatch::Handled(sequencer::run(self, &[Self::check], exec, svc))
            }
            Err(code) => unhandled(self.address, code),
        }
    }

    fn setup(&mut self, svc: &mut Services<'_>) -> Result<()> {
        let baseline = self.wired_baseline;
        self.set_parameters(TorqueParams::with_baseline(baseline));
        svc.emit(self.address, Report::with(TorqueEvent::Ccw, 0u16));
        self.memory.mark_suppressed();
        info!(
            "torque {}/{} ready on pin {} (baseline {}, inverted: {})",
            self.address.kind,
            self.address.id,
            self.pin.number(),
            baseline,
            self.invert
        );
        Ok(())
    }
}
