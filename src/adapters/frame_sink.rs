//! Postcard-framed report outbox.
//!
//! Each report is serialised as `(ModuleAddress, Report)` with postcard
//! into a fixed-capacity frame and queued for the serial transport to
//! drain. When the outbox is full the oldest frame is dropped.

use heapless::Deque;
use log::{error, warn};

use crate::app::events::{ModuleAddress, Report};
use crate::app::ports::ReportSink;

/// Upper bound of one encoded report (a full 15-element array of
/// 64-bit scalars, plus header bytes).
pub const FRAME_CAPACITY: usize = 192;

pub type Frame = heapless::Vec<u8, FRAME_CAPACITY>;

/// Outbox holding up to `N` frames.
#[derive(Debug, Default)]
pub struct FrameSink<const N: usize> {
    outbox: Deque<Frame, N>,
    dropped: u32,
}

impl<const N: usize> FrameSink<N> {
    pub fn new() -> Self {
        Self {
            outbox: Deque::new(),
            dropped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.outbox.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outbox.is_empty()
    }

    /// Frames discarded to make room since construction.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Oldest queued frame.
    pub fn pop(&mut self) -> Option<Frame> {
        self.outbox.pop_front()
    }

    /// Drain every queued frame, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Frame> + '_ {
        core::iter::from_fn(move || self.outbox.pop_front())
    }
}

/// Serialise one report into a frame.
pub fn encode(source: ModuleAddress, report: &Report) -> Result<Frame, postcard::Error> {
    let mut buf = [0u8; FRAME_CAPACITY];
    let used = postcard::to_slice(&(source, report), &mut buf)?;
    Frame::from_slice(used).map_err(|()| postcard::Error::SerializeBufferFull)
}

impl<const N: usize> ReportSink for FrameSink<N> {
    fn emit(&mut self, source: ModuleAddress, report: &Report) {
        let frame = match encode(source, report) {
            Ok(f) => f,
            Err(e) => {
                error!("report {} from {}/{}: encode failed: {}", report.code, source.kind, source.id, e);
                return;
            }
        };
        if self.outbox.is_full() {
            self.outbox.pop_front();
            self.dropped = self.dropped.wrapping_add(1);
            warn!("frame outbox full, dropped oldest ({} so far)", self.dropped);
        }
        // Room was made above.
        let _ = self.outbox.push_back(frame);
    }
}
