//! ISR-fed 4x quadrature decoder.
//!
//! The A/B pin-change interrupt calls [`QuadratureCounter::on_edge`] with
//! both channel levels; the main loop drains the signed count with
//! [`PulseCounter::take`]. All state is atomic, so the counter can live in
//! a `static` shared between the ISR and the loop.
//!
//! Channel A leading channel B counts up (CCW from the shaft side).

use core::sync::atomic::{AtomicI32, AtomicU8, Ordering};

use crate::app::ports::PulseCounter;

/// Count step indexed by `previous_state * 4 + current_state`, where a state
/// is `a | b << 1`. Invalid double transitions (both channels changed)
/// count as 0.
const STEP: [i8; 16] = [0, 1, -1, 0, -1, 0, 0, 1, 1, 0, 0, -1, 0, -1, 1, 0];

#[derive(Debug, Default)]
pub struct QuadratureCounter {
    count: AtomicI32,
    state: AtomicU8,
}

impl QuadratureCounter {
    pub const fn new() -> Self {
        Self {
            count: AtomicI32::new(0),
            state: AtomicU8::new(0),
        }
    }

    /// Seed the channel state from the current pin levels (call once before
    /// enabling the interrupt).
    pub fn prime(&self, a: bool, b: bool) {
        self.state.store(encode(a, b), Ordering::Relaxed);
    }

    /// Called from the pin-change ISR with both channel levels.
    pub fn on_edge(&self, a: bool, b: bool) {
        let current = encode(a, b);
        let previous = self.state.swap(current, Ordering::Relaxed);
        let step = STEP[usize::from(previous * 4 + current)];
        if step != 0 {
            self.count.fetch_add(i32::from(step), Ordering::Relaxed);
        }
    }

    /// Pulses since the last drain, without draining.
    pub fn peek(&self) -> i32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Atomically drain the count.
    pub fn drain(&self) -> i32 {
        self.count.swap(0, Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.count.store(0, Ordering::Relaxed);
    }
}

const fn encode(a: bool, b: bool) -> u8 {
    (a as u8) | ((b as u8) << 1)
}

impl PulseCounter for QuadratureCounter {
    fn take(&mut self) -> i32 {
        self.drain()
    }

    fn reset(&mut self) {
        self.clear();
    }
}

impl PulseCounter for &QuadratureCounter {
    fn take(&mut self) -> i32 {
        self.drain()
    }

    fn reset(&mut self) {
        self.clear();
    }
}
