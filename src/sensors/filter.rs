//! Change filter shared by the analog-sensing drivers.
//!
//! Each check passes a fresh (averaged) reading through two gates:
//!
//! 1. **Delta gate**: a reading within `delta_threshold` of the last
//!    reported value is noise and produces nothing.
//! 2. **Band gate**: a reading inside the reportable band is reported as is.
//!    A reading outside it is collapsed to a single zero report; further
//!    out-of-band readings stay silent until an in-band one is reported.
//!
//! The memory belongs to one device instance and lives as long as it.

/// Values worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    /// `value >= threshold`.
    AtLeast(u16),
    /// `lower <= value <= upper`.
    Within { lower: u16, upper: u16 },
}

impl Band {
    pub fn contains(self, value: u16) -> bool {
        match self {
            Self::AtLeast(threshold) => value >= threshold,
            Self::Within { lower, upper } => (lower..=upper).contains(&value),
        }
    }
}

/// What a check should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing to send.
    Quiet,
    Report(u16),
    /// Send one zero to mark the drop out of band.
    Collapse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterMemory {
    last: u16,
    suppressed: bool,
}

impl FilterMemory {
    pub const fn new(initial: u16) -> Self {
        Self {
            last: initial,
            suppressed: false,
        }
    }

    pub fn last(&self) -> u16 {
        self.last
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Record that a zero has just been reported out of band (the setup
    /// baseline report counts).
    pub fn mark_suppressed(&mut self) {
        self.suppressed = true;
    }

    /// Delta gate. Adopts `signal` as the new reference when it passes.
    pub fn passes_delta(&mut self, signal: u16, delta_threshold: u16) -> bool {
        if signal.abs_diff(self.last) <= delta_threshold {
            return false;
        }
        self.last = signal;
        true
    }

    /// Zero-collapse for a reading that passed the delta gate but is not
    /// reportable. `true` exactly once per out-of-band run.
    pub fn collapse(&mut self) -> bool {
        !core::mem::replace(&mut self.suppressed, true)
    }

    /// Move the delta-gate reference without touching the zero-run state.
    pub fn reseed(&mut self, reference: u16) {
        self.last = reference;
    }

    /// A reportable reading ends any out-of-band run.
    pub fn clear(&mut self) {
        self.suppressed = false;
    }

    /// Both gates in one go.
    pub fn observe(&mut self, signal: u16, delta_threshold: u16, band: Band) -> Verdict {
        if !self.passes_delta(signal, delta_threshold) {
            return Verdict::Quiet;
        }
        if band.contains(signal) {
            self.clear();
            Verdict::Report(signal)
        } else if self.collapse() {
            Verdict::Collapse
        } else {
            Verdict::Quiet
        }
    }
}
