//! Generic analog input reported within a configurable band.

use log::info;

use super::{Band, FilterMemory, LevelCheck, check_level};
use crate::app::events::{ModuleAddress, Report, wire_codes};
use crate::app::module::{
    CommandKind, Dispatch, Module, Services, overwrite_parameters, unhandled,
};
use crate::app::ports::AnalogInput;
use crate::config::AnalogParams;
use crate::error::{ConfigError, LayoutError, Result};
use crate::pins::{Bound, PinRegistry};
use crate::sequencer::{self, Execution, StageCtx, Step};

wire_codes! {
    pub enum AnalogCommand {
        CheckState = 1,
    }
}

wire_codes! {
    pub enum AnalogEvent {
        Changed = 51,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogWiring {
    pub address: ModuleAddress,
    pub pin: u8,
}

pub struct AnalogSensor<A> {
    address: ModuleAddress,
    pin: Bound<A>,
    params: AnalogParams,
    memory: FilterMemory,
}

impl<A: AnalogInput> AnalogSensor<A> {
    pub fn new(
        wiring: &AnalogWiring,
        pin: A,
        registry: &mut PinRegistry,
    ) -> core::result::Result<Self, LayoutError> {
        Ok(Self {
            address: wiring.address,
            pin: registry.bind(wiring.pin, pin)?,
            params: AnalogParams::default(),
            memory: FilterMemory::new(0),
        })
    }

    pub fn parameters(&self) -> &AnalogParams {
        &self.params
    }

    pub fn set_parameters(&mut self, params: AnalogParams) {
        self.params = params;
    }

    fn check(&mut self, ctx: &mut StageCtx<'_, '_>) -> Step {
        let p = self.params;
        let check = LevelCheck {
            pool: p.average_pool_size,
            delta_threshold: p.delta_threshold,
            band: Band::Within {
                lower: p.lower_threshold,
                upper: p.upper_threshold,
            },
            changed_code: AnalogEvent::Changed.into(),
        };
        check_level(&mut self.pin, &mut self.memory, check, self.address, ctx)
    }
}

impl<A: AnalogInput> Module for AnalogSensor<A> {
    fn address(&self) -> ModuleAddress {
        self.address
    }

    fn apply_parameters(&mut self, bytes: &[u8]) -> core::result::Result<(), ConfigError> {
        overwrite_parameters(self.address, &mut self.params, bytes)
    }

    fn command_kind(&self, code: u8) -> Option<CommandKind> {
        AnalogCommand::try_from(code).ok().map(|_| CommandKind::Staged)
    }

    fn run_active_command(&mut self, exec: &mut Execution, svc: &mut Services<'_>) -> Dispatch {
        match AnalogCommand::try_from(exec.command()) {
            Ok(AnalogCommand::CheckState) => {
                Dispatch::Handled(sequencer::run(self, &[Self::check], exec, svc))
            }
            Err(code) => unhandled(self.address, code),
        }
    }

    fn setup(&mut self, svc: &mut Services<'_>) -> Result<()> {
        self.params = AnalogParams::default();
        svc.emit(self.address, Report::with(AnalogEvent::Changed, 0u16));
        self.memory.mark_suppressed();
        info!("analog {}/{} ready on pin {}", self.address.kind, self.address.id, self.pin.number());
        Ok(())
    }
}
