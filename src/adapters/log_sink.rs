//! Log-based report sink.
//!
//! Writes every outbound report to the `log` facade. Useful on a bench
//! build with no PC link, and as the default sink in host tooling.

use log::info;

use crate::app::events::{ModuleAddress, Payload, Report};
use crate::app::ports::ReportSink;

/// Adapter that logs every [`Report`].
#[derive(Debug, Default)]
pub struct LogSink {
    emitted: u32,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports written so far.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl ReportSink for LogSink {
    fn emit(&mut self, source: ModuleAddress, report: &Report) {
        self.emitted = self.emitted.wrapping_add(1);
        match &report.payload {
            Payload::None => info!("REPORT | {}/{} | code={}", source.kind, source.id, report.code),
            Payload::One(v) => info!(
                "REPORT | {}/{} | code={} | {:?}",
                source.kind, source.id, report.code, v
            ),
            Payload::Array(items) => info!(
                "REPORT | {}/{} | code={} | {} items {:?}",
                source.kind,
                source.id,
                report.code,
                items.len(),
                items
            ),
        }
    }
}
