//! Pin bookkeeping and the deployed controller layouts.
//!
//! Single source of truth for every board pin assignment. Drivers never
//! hard-code a pin number: they receive a wiring record from here and claim
//! its pins through a [`PinRegistry`] at construction time, which rejects
//! nonexistent, reserved and doubly-claimed pins.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::app::events::ModuleAddress;
use crate::drivers::brake::BrakeWiring;
use crate::drivers::screen::ScreenWiring;
use crate::drivers::ttl::TtlWiring;
use crate::drivers::valve::ValveWiring;
use crate::error::LayoutError;
use crate::sensors::encoder::EncoderWiring;
use crate::sensors::lick::LickWiring;
use crate::sensors::torque::TorqueWiring;

// ---------------------------------------------------------------------------
// Board limits
// ---------------------------------------------------------------------------

/// Number of addressable digital pins on the controller board.
pub const PIN_COUNT: u8 = 42;

/// On-board LED; the runtime owns it for status blinking.
pub const LED_PIN: u8 = 13;

// ---------------------------------------------------------------------------
// Bound pin
// ---------------------------------------------------------------------------

/// A HAL pin paired with the board number it was claimed under.
#[derive(Debug)]
pub struct Bound<P> {
    number: u8,
    pin: P,
}

impl<P> Bound<P> {
    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn pin(&mut self) -> &mut P {
        &mut self.pin
    }

    pub fn into_inner(self) -> P {
        self.pin
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Tracks which pins on one controller are already in use.
#[derive(Debug, Default, Clone)]
pub struct PinRegistry {
    claimed: u64,
}

impl PinRegistry {
    pub const fn new() -> Self {
        Self { claimed: 0 }
    }

    /// Reserve `number` or explain why it cannot be used.
    pub fn claim(&mut self, number: u8) -> Result<(), LayoutError> {
        if number >= PIN_COUNT {
            return Err(LayoutError::PinOutOfRange(number));
        }
        if number == LED_PIN {
            return Err(LayoutError::ReservedPin(number));
        }
        let bit = 1u64 << number;
        if self.claimed & bit != 0 {
            return Err(LayoutError::DuplicatePin(number));
        }
        self.claimed |= bit;
        Ok(())
    }

    /// Claim `number` and wrap `pin` with it.
    pub fn bind<P>(&mut self, number: u8, pin: P) -> Result<Bound<P>, LayoutError> {
        self.claim(number)?;
        Ok(Bound { number, pin })
    }

    pub fn is_claimed(&self, number: u8) -> bool {
        number < PIN_COUNT && self.claimed & (1u64 << number) != 0
    }
}

// ---------------------------------------------------------------------------
// Absent line
// ---------------------------------------------------------------------------

/// Stand-in type for a line that is not wired (valve without a tone
/// buzzer, the unused direction of a TTL line). Writes are no-ops and
/// reads are LOW.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unused;

impl ErrorType for Unused {
    type Error = Infallible;
}

impl OutputPin for Unused {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

impl InputPin for Unused {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(false)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Actor controller: wheel brake, reward valve, VR screens
// ---------------------------------------------------------------------------

pub const ACTOR_BRAKE: BrakeWiring = BrakeWiring {
    address: ModuleAddress::new(3, 1),
    pin: 28,
    normally_engaged: false,
    start_engaged: true,
};

pub const ACTOR_VALVE: ValveWiring = ValveWiring {
    address: ModuleAddress::new(5, 1),
    pin: 29,
    normally_closed: true,
    start_closed: true,
    tone_pin: Some(9),
};

pub const ACTOR_SCREEN: ScreenWiring = ScreenWiring {
    address: ModuleAddress::new(7, 1),
    pins: [15, 19, 23],
    normally_closed: true,
};

// ---------------------------------------------------------------------------
// Sensor controller: frame TTL input, lick sensor, torque sensor
// ---------------------------------------------------------------------------

pub const SENSOR_TTL: TtlWiring = TtlWiring {
    address: ModuleAddress::new(1, 1),
    pin: 34,
};

pub const SENSOR_LICK: LickWiring = LickWiring {
    address: ModuleAddress::new(4, 1),
    pin: 21,
};

pub const SENSOR_TORQUE: TorqueWiring = TorqueWiring {
    address: ModuleAddress::new(6, 1),
    pin: 41,
    baseline: 2048,
    invert: true,
};

// ---------------------------------------------------------------------------
// Encoder controller: wheel encoder
// ---------------------------------------------------------------------------

pub const ENCODER_WHEEL: EncoderWiring = EncoderWiring {
    address: ModuleAddress::new(2, 1),
    pin_a: 33,
    pin_b: 34,
    pin_index: 35,
    invert: true,
};
