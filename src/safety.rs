//! Global output interlock.
//!
//! One flag per controller. While engaged, every command-time actuator
//! write across every device is refused with
//! [`ActuatorError::OutputLocked`](crate::error::ActuatorError::OutputLocked).
//!
//! ## Lifecycle
//!
//! 1. The external runtime engages or releases the lock (PC request,
//!    e-stop input, ISR).
//! 2. Drivers only read it, immediately before each write.
//! 3. A refused write aborts the current command; nothing retries it.
//!
//! Setup writes of safe initial levels do not consult the lock so that a
//! controller booting locked still reaches a defined pin state.

use core::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::error::ActuatorError;

/// Process-wide output lock. Can live in a `static`.
#[derive(Debug, Default)]
pub struct OutputLock {
    engaged: AtomicBool,
}

impl OutputLock {
    /// A released lock.
    pub const fn new() -> Self {
        Self {
            engaged: AtomicBool::new(false),
        }
    }

    /// A lock that starts engaged.
    pub const fn engaged() -> Self {
        Self {
            engaged: AtomicBool::new(true),
        }
    }

    pub fn engage(&self) {
        if !self.engaged.swap(true, Ordering::AcqRel) {
            info!("output lock engaged");
        }
    }

    pub fn release(&self) {
        if self.engaged.swap(false, Ordering::AcqRel) {
            info!("output lock released");
        }
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Acquire)
    }

    /// `Err(OutputLocked)` while engaged.
    pub fn check(&self) -> Result<(), ActuatorError> {
        if self.is_engaged() {
            Err(ActuatorError::OutputLocked)
        } else {
            Ok(())
        }
    }
}
