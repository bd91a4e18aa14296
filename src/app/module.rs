//! The capability interface the external scheduler drives each device
//! through, and the shared collaborators it hands in on every call.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use super::events::{ModuleAddress, Report};
use super::ports::{Clock, ReportSink};
use crate::config::Parameters;
use crate::error::{ConfigError, Result};
use crate::safety::OutputLock;
use crate::sequencer::{Execution, Progress};

/// Shared collaborators, borrowed for the duration of one scheduler call.
pub struct Services<'a> {
    pub clock: &'a dyn Clock,
    pub lock: &'a OutputLock,
    pub sink: &'a mut dyn ReportSink,
    /// Only the blocking calibration routines use this.
    pub delay: &'a mut dyn DelayNs,
}

impl<'a> Services<'a> {
    pub fn new(
        clock: &'a dyn Clock,
        lock: &'a OutputLock,
        sink: &'a mut dyn ReportSink,
        delay: &'a mut dyn DelayNs,
    ) -> Self {
        Self {
            clock,
            lock,
            sink,
            delay,
        }
    }

    pub fn now_us(&self) -> u64 {
        self.clock.now_us()
    }

    pub fn emit(&mut self, source: ModuleAddress, report: Report) {
        self.sink.emit(source, &report);
    }
}

/// How the scheduler must treat a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Re-entered once per tick until it completes or aborts.
    Staged,
    /// Runs to completion inside a single call and stalls the whole loop
    /// while it does. Calibration routines only.
    Blocking,
}

/// Result of one `run_active_command` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled(Progress),
    /// The command code means nothing to this device.
    Unhandled,
}

/// Implemented by every device driver.
pub trait Module {
    fn address(&self) -> ModuleAddress;

    /// Overwrite the whole parameter record from its packed wire form.
    fn apply_parameters(&mut self, bytes: &[u8]) -> core::result::Result<(), ConfigError>;

    /// `None` for an unrecognised code.
    fn command_kind(&self, code: u8) -> Option<CommandKind>;

    /// Re-enter the active command at its current stage.
    fn run_active_command(&mut self, exec: &mut Execution, svc: &mut Services<'_>) -> Dispatch;

    /// Configure pins, write safe initial levels, restore default
    /// parameters and emit any baseline report. Called at boot and on reset.
    fn setup(&mut self, svc: &mut Services<'_>) -> Result<()>;
}

/// Shared fallback for a command code a device does not know.
pub(crate) fn unhandled(source: ModuleAddress, code: u8) -> Dispatch {
    warn!(
        "module {}/{}: unrecognised command {}",
        source.kind, source.id, code
    );
    Dispatch::Unhandled
}

/// Replace a device's whole parameter record with a freshly received one.
/// A record that fails to decode leaves the old one in force.
pub(crate) fn overwrite_parameters<P: Parameters + core::fmt::Debug>(
    source: ModuleAddress,
    slot: &mut P,
    bytes: &[u8],
) -> core::result::Result<(), ConfigError> {
    match P::decode(bytes) {
        Ok(params) => {
            *slot = params;
            info!("module {}/{}: parameters updated {:?}", source.kind, source.id, params);
            Ok(())
        }
        Err(e) => {
            warn!("module {}/{}: parameters rejected: {}", source.kind, source.id, e);
            Err(e)
        }
    }
}
