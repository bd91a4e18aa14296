//! Port traits: the boundary between device logic and the board.
//!
//! ```text
//!   HAL / ISR ──▶ port trait ──▶ driver (valve, lick, encoder, ...)
//! ```
//!
//! GPIO and PWM go straight through `embedded-hal` 1.0. The traits here
//! cover what `embedded-hal` does not: a monotonic microsecond clock, a
//! single-sample ADC read, a consumable pulse counter and the outbound
//! report channel. Drivers consume them via generics or `dyn`, so every
//! driver runs on the host against mocks.

use embedded_hal::digital::InputPin;

use super::events::{ModuleAddress, Report};

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Monotonic microsecond clock.
pub trait Clock {
    fn now_us(&self) -> u64;
}

/// Non-blocking elapsed check against a stage-entry anchor.
///
/// Uses wrapping subtraction so a counter rollover never stalls a wait.
#[inline]
pub fn elapsed(clock: &dyn Clock, anchor_us: u64, duration_us: u64) -> bool {
    clock.now_us().wrapping_sub(anchor_us) >= duration_us
}

// ───────────────────────────────────────────────────────────────
// Analog and digital sampling
// ───────────────────────────────────────────────────────────────

/// One ADC channel.
pub trait AnalogInput {
    type Error: core::fmt::Debug;

    /// Take a single conversion.
    fn read_raw(&mut self) -> Result<u16, Self::Error>;
}

impl<A: AnalogInput + ?Sized> AnalogInput for &mut A {
    type Error = A::Error;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        (**self).read_raw()
    }
}

/// Averaged analog read. A pool of 0 or 1 takes a single sample.
///
/// The mean is rounded half-up.
pub fn read_analog<A: AnalogInput + ?Sized>(pin: &mut A, pool: u8) -> Result<u16, A::Error> {
    let samples = u32::from(pool.max(1));
    let mut sum = 0u32;
    for _ in 0..samples {
        sum += u32::from(pin.read_raw()?);
    }
    Ok(((sum + samples / 2) / samples) as u16)
}

/// Majority-voted digital read. Ties resolve HIGH.
pub fn read_digital<I: InputPin + ?Sized>(pin: &mut I, pool: u8) -> Result<bool, I::Error> {
    let samples = u16::from(pool.max(1));
    let mut highs = 0u16;
    for _ in 0..samples {
        if pin.is_high()? {
            highs += 1;
        }
    }
    Ok(highs * 2 >= samples)
}

// ───────────────────────────────────────────────────────────────
// Pulse counter
// ───────────────────────────────────────────────────────────────

/// Hardware (or ISR-fed) signed pulse counter.
pub trait PulseCounter {
    /// Read the pulses accumulated since the last call and zero the counter
    /// in one step.
    fn take(&mut self) -> i32;

    /// Discard any accumulated pulses.
    fn reset(&mut self);
}

impl<C: PulseCounter + ?Sized> PulseCounter for &mut C {
    fn take(&mut self) -> i32 {
        (**self).take()
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

// ───────────────────────────────────────────────────────────────
// Report sink
// ───────────────────────────────────────────────────────────────

/// Outbound report channel towards the PC.
///
/// Adapters decide the transport: the serial logger, a postcard frame
/// queue, or a recording sink in tests.
pub trait ReportSink {
    fn emit(&mut self, source: ModuleAddress, report: &Report);
}
