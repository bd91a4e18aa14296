//! Quadrature wheel encoder with an index (home) channel.
//!
//! Motion is reported in units of pulses once enough has accumulated to
//! clear `delta_threshold`. Pulses in a direction that is not reported are
//! still integrated, but their contribution is clamped to the threshold so
//! jitter in an ignored direction can never add up to a report on its own.
//!
//! GetPPR blocks the controller: it spins until the index channel fires,
//! then averages the pulse count over ten index-to-index revolutions.

use embedded_hal::digital::InputPin;
use log::{info, warn};

use crate::app::events::{ModuleAddress, Report, wire_codes};
use crate::app::module::{
    CommandKind, Dispatch, Module, Services, overwrite_parameters, unhandled,
};
use crate::app::ports::PulseCounter;
use crate::config::EncoderParams;
use crate::error::{ConfigError, LayoutError, Result, SensorError};
use crate::pins::{Bound, PinRegistry};
use crate::sequencer::{self, Execution, StageCtx, Step};
use super::Rotation;

/// Revolutions averaged by GetPPR.
pub const PPR_REVOLUTIONS: u32 = 10;

/// Pause after each index hit so the same index pulse is not counted twice.
const INDEX_SETTLE_MS: u32 = 100;

wire_codes! {
    pub enum EncoderCommand {
        CheckState = 1,
        Reset = 2,
        GetPpr = 3,
    }
}

wire_codes! {
    pub enum EncoderEvent {
        /// u32 pulses.
        RotatedCcw = 51,
        /// u32 pulses.
        RotatedCw = 52,
        /// u16 pulses per revolution.
        Ppr = 53,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderWiring {
    pub address: ModuleAddress,
    pub pin_a: u8,
    pub pin_b: u8,
    pub pin_index: u8,
    /// Flip the sign of every pulse.
    pub invert: bool,
}

// ── Accumulator ──────────────────────────────────────────────

/// Signed pulse integrator with amortised hysteresis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulseAccumulator {
    value: i64,
}

impl PulseAccumulator {
    pub const fn new() -> Self {
        Self { value: 0 }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn clear(&mut self) {
        self.value = 0;
    }

    /// Fold `motion` pulses in (negative = CW, positive = CCW) and return
    /// the rotation to report, if the accumulated magnitude now exceeds
    /// `params.delta_threshold`. A report consumes the accumulated pulses.
    pub fn fold(&mut self, motion: i32, params: &EncoderParams) -> Option<(Rotation, u32)> {
        let limit = i64::from(params.delta_threshold);
        let motion = i64::from(motion);
        self.value += motion;
        if motion < 0 && !params.report_cw {
            self.value = self.value.max(-limit);
        } else if motion > 0 && !params.report_ccw {
            self.value = self.value.min(limit);
        }

        if self.value.unsigned_abs() <= u64::from(params.delta_threshold) {
            return None;
        }
        let rotation = if self.value < 0 {
            Rotation::Cw
        } else {
            Rotation::Ccw
        };
        let pulses = u32::try_from(self.value.unsigned_abs()).unwrap_or(u32::MAX);
        self.value = 0;
        Some((rotation, pulses))
    }
}

// ── Driver ───────────────────────────────────────────────────

pub struct Encoder<C, X> {
    address: ModuleAddress,
    counter: C,
    index: Bound<X>,
    invert: bool,
    params: EncoderParams,
    accumulator: PulseAccumulator,
}

impl<C: PulseCounter, X: InputPin> Encoder<C, X> {
    /// `counter` is fed by the A/B channels; their pins are claimed here so
    /// nothing else on the controller can take them.
    pub fn new(
        wiring: &EncoderWiring,
        counter: C,
        index: X,
        registry: &mut PinRegistry,
    ) -> core::result::Result<Self, LayoutError> {
        registry.claim(wiring.pin_a)?;
        registry.claim(wiring.pin_b)?;
        Ok(Self {
            address: wiring.address,
            counter,
            index: registry.bind(wiring.pin_index, index)?,
            invert: wiring.invert,
            params: EncoderParams::default(),
            accumulator: PulseAccumulator::new(),
        })
    }

    pub fn parameters(&self) -> &EncoderParams {
        &self.params
    }

    pub fn set_parameters(&mut self, params: EncoderParams) {
        self.params = params;
    }

    pub fn accumulator(&self) -> &PulseAccumulator {
        &self.accumulator
    }

    fn check(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        let raw = self.counter.take();
        let motion = if self.invert { raw.saturating_neg() } else { raw };
        if motion == 0 {
            return Step::Complete;
        }
        if let Some((rotation, pulses)) = self.accumulator.fold(motion, &self.params) {
            let code = match rotation {
                Rotation::Cw => EncoderEvent::RotatedCw,
                Rotation::Ccw => EncoderEvent::RotatedCcw,
            };
            ctx.svc.emit(self.address, Report::with(code, pulses));
        }
        Step::Complete
    }

    fn reset(&mut self, _ctx: &mut StageCtx<'_, '_>) -> Step {
        self.counter.reset();
        self.accumulator.clear();
        Step::Complete
    }

    /// Spin until the index channel reads HIGH.
    fn await_index(&mut self) -> core::result::Result<(), X::Error> {
        while !self.index.pin().is_high()? {}
        Ok(())
    }

    fn measure_ppr(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        let mut total: u64 = 0;
        let measured = self.await_index().and_then(|()| {
            self.counter.reset();
            for _ in 0..PPR_REVOLUTIONS {
                ctx.svc.delay.delay_ms(INDEX_SETTLE_MS);
                self.await_index()?;
                total += u64::from(self.counter.take().unsigned_abs());
            }
            Ok(())
        });
        if let Err(e) = measured {
            warn!(
                "encoder index pin {}: {}: {:?}",
                self.index.number(),
                SensorError::GpioReadFailed,
                e
            );
            return Step::Abort;
        }

        let revs = u64::from(PPR_REVOLUTIONS);
        let ppr = u16::try_from((total + revs / 2) / revs).unwrap_or(u16::MAX);
        info!("encoder {}/{}: {} pulses per revolution", self.address.kind, self.address.id, ppr);
        ctx.svc.emit(self.address, Report::with(EncoderEvent::Ppr, ppr));
        Step::Complete
    }
}

impl<C: PulseCounter, X: InputPin> Module for Encoder<C, X> {
    fn address(&self) -> ModuleAddress {
        self.address
    }

    fn apply_parameters(&mut self, bytes: &[u8]) -> core::result::Result<(), ConfigError> {
        overwrite_parameters(self.address, &mut self.params, bytes)
    }

    fn command_kind(&self, code: u8) -> Option<CommandKind> {
        match EncoderCommand::try_from(code).ok()? {
            EncoderCommand::GetPpr => Some(CommandKind::Blocking),
            _ => Some(CommandKind::Staged),
        }
    }

    fn run_active_command(&mut self, exec: &mut Execution, svc: &mut Services<'_>) -> Dispatch {
        let Ok(command) = EncoderCommand::try_from(exec.command()) else {
            return unhandled(self.address, exec.command());
        };
        let progress = match command {
            EncoderCommand::CheckState => sequencer::run(self, &[Self::check], exec, svc),
            EncoderCommand::Reset => sequencer::run(self, &[Self::reset], exec, svc),
            EncoderCommand::GetPpr => sequencer::run(self, &[Self::measure_ppr], exec, svc),
        };
        Dispatch::Handled(progress)
    }

    fn setup(&mut self, svc: &mut Services<'_>) -> Result<()> {
        self.counter.reset();
        self.accumulator.clear();
        self.params = EncoderParams::default();
        svc.emit(self.address, Report::with(EncoderEvent::RotatedCw, 0u32));
        info!(
            "encoder {}/{} ready (index pin {}, inverted: {})",
            self.address.kind,
            self.address.id,
            self.index.number(),
            self.invert
        );
        Ok(())
    }
}
