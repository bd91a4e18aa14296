//! Conductive lick sensor.
//!
//! The tongue closes a circuit between the spout and the animal; the ADC
//! sees a voltage well above the idle noise floor while contact lasts.
//! Reports the contact level on change and a single zero when contact ends.

use log::info;

use super::{Band, FilterMemory, LevelCheck, check_level};
use crate::app::events::{ModuleAddress, Report, wire_codes};
use crate::app::module::{
    CommandKind, Dispatch, Module, Services, overwrite_parameters, unhandled,
};
use crate::app::ports::AnalogInput;
use crate::config::LickParams;
use crate::error::{ConfigError, LayoutError, Result};
use crate::pins::{Bound, PinRegistry};
use crate::sequencer::{self, Execution, StageCtx, Step};

wire_codes! {
    pub enum LickCommand {
        CheckState = 1,
    }
}

wire_codes! {
    pub enum LickEvent {
        /// u16 contact level, or 0 when contact ended.
        Changed = 51,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LickWiring {
    pub address: ModuleAddress,
    pub pin: u8,
}

pub struct Lick<A> {
    address: ModuleAddress,
    pin: Bound<A>,
    params: LickParams,
    memory: FilterMemory,
}

impl<A: AnalogInput> Lick<A> {
    pub fn new(
        wiring: &LickWiring,
        pin: A,
        registry: &mut PinRegistry,
    ) -> core::result::Result<Self, LayoutError> {
        Ok(Self {
            address: wiring.address,
            pin: registry.bind(wiring.pin, pin)?,
            params: LickParams::default(),
            memory: FilterMemory::new(0),
        })
    }

    pub fn parameters(&self) -> &LickParams {
        &self.params
    }

    pub fn set_parameters(&mut self, params: LickParams) {
        self.params = params;
    }

    pub fn memory(&self) -> &FilterMemory {
        &self.memory
    }

    fn check(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        let check = LevelCheck {
            pool: self.params.average_pool_size,
            delta_threshold: self.params.delta_threshold,
            band: Band::AtLeast(self.params.signal_threshold),
            changed_code: LickEvent::Changed.into(),
        };
        check_level(&mut self.pin, &mut self.memory, check, self.address, ctx)
    }
}

impl<A: AnalogInput> Module for Lick<A> {
    fn address(&self) -> ModuleAddress {
        self.address
    }

    fn apply_parameters(&mut self, bytes: &[u8]) -> core::result::Result<(), ConfigError> {
        overwrite_parameters(self.address, &mut self.params, bytes)
    }

    fn command_kind(&self, code: u8) -> Option<CommandKind> {
        LickCommand::try_from(code).ok().map(|_| CommandKind::Staged)
    }

    fn run_active_command(&mut self, exec: &mut Execution, svc: &mut Services<'_>) -> Dispatch {
        match LickCommand::try_from(exec.command()) {
            Ok(LickCommand::CheckState) => {
                Dispatch::Handled(sequencer::run(self, &[Self::check], exec, svc))
            }
            Err(code) => unhandled(self.address, code),
        }
    }

    fn setup(&mut self, svc: &mut Services<'_>) -> Result<()> {
        self.params = LickParams::default();
        svc.emit(self.address, Report::with(LickEvent::Changed, 0u16));
        self.memory.mark_suppressed();
        info!(
            "lick {}/{} ready on pin {}",
            self.address.kind,
            self.address.id,
            self.pin.number()
        );
        Ok(())
    }
}
