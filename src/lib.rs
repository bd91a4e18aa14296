//! labrig: device firmware library for behavioural-rig controllers.
//!
//! Each controller hosts a handful of device modules (water valve, TTL
//! line, brake, speaker, screen relays, lick/torque/analog sensors, wheel
//! encoder). A runtime outside this crate owns the serial link, parses PC
//! commands and calls each module once per loop pass; everything here is
//! non-blocking unless a command is explicitly marked blocking.
//!
//! Hardware is reached through `embedded-hal` 1.0 traits and the ports in
//! [`app::ports`], so every module runs on the host against mocks.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod safety;
pub mod sequencer;
pub mod sensors;

pub use app::{Module, ModuleAddress, Payload, Report, ReportSink, Scalar, Services};
pub use error::{Error, Result};
pub use safety::OutputLock;
pub use sequencer::{ExecState, Execution, Progress, Step};
