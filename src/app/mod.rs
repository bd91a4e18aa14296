//! Device-facing application layer: ports, reports and the module contract.

pub mod events;
pub mod module;
pub mod ports;

pub use events::{ModuleAddress, Payload, Report, Scalar};
pub use module::{CommandKind, Dispatch, Module, Services};
pub use ports::{AnalogInput, Clock, PulseCounter, ReportSink};
