//! Unified error types for the rig module firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! runtime's handling of construction, setup and parameter failures uniform.
//! All variants are `Copy` so they can be returned from tick-rate code paths
//! without allocation.
//!
//! Command-time failures (locked output, wrong pin mode) never escape a
//! driver as `Err`: they are reported through an event code and abort the
//! active command only.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An actuator write failed or was refused.
    Actuator(ActuatorError),
    /// A sensor could not be read.
    Sensor(SensorError),
    /// A parameter record could not be decoded.
    Config(ConfigError),
    /// The pin layout handed to a driver constructor is invalid.
    Layout(LayoutError),
    /// Hardware initialisation failed. Fatal for the whole controller.
    Setup(SetupError),
    /// An event payload could not be built.
    Payload(PayloadError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Layout(e) => write!(f, "layout: {e}"),
            Self::Setup(e) => write!(f, "setup: {e}"),
            Self::Payload(e) => write!(f, "payload: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// The global output lock is engaged.
    OutputLocked,
    /// The command needs the opposite pin direction to the one wired.
    InvalidPinMode,
    /// The HAL rejected a GPIO or PWM write.
    PinWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutputLocked => write!(f, "output locked"),
            Self::InvalidPinMode => write!(f, "invalid pin mode"),
            Self::PinWriteFailed => write!(f, "pin write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error.
    AdcReadFailed,
    /// GPIO read returned an error.
    GpioReadFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::GpioReadFailed => write!(f, "GPIO read failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The received record does not match the packed layout size.
    WrongLength { expected: usize, actual: usize },
    /// A field holds a value the device cannot run with.
    InvalidValue(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongLength { expected, actual } => {
                write!(f, "expected {expected} bytes, got {actual}")
            }
            Self::InvalidValue(msg) => write!(f, "invalid value: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Layout errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// Pin number does not exist on the board.
    PinOutOfRange(u8),
    /// Pin is reserved for the on-board LED.
    ReservedPin(u8),
    /// Pin is already claimed by another line on this controller.
    DuplicatePin(u8),
    /// Pin number is wired but no line was handed over for it.
    MissingLine(u8),
    /// A line was handed over for a pin the wiring does not declare.
    UndeclaredLine,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PinOutOfRange(p) => write!(f, "pin {p} out of range"),
            Self::ReservedPin(p) => write!(f, "pin {p} is reserved for the LED"),
            Self::DuplicatePin(p) => write!(f, "pin {p} already in use"),
            Self::MissingLine(p) => write!(f, "pin {p} is wired but no line was given"),
            Self::UndeclaredLine => write!(f, "line given for an unwired pin"),
        }
    }
}

impl From<LayoutError> for Error {
    fn from(e: LayoutError) -> Self {
        Self::Layout(e)
    }
}

// ---------------------------------------------------------------------------
// Setup errors
// ---------------------------------------------------------------------------

/// The external runtime halts the controller on any of these: a device in
/// an unknown hardware state is unsafe to operate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupError {
    /// Writing the initial level of a pin failed.
    PinWriteFailed(u8),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PinWriteFailed(p) => write!(f, "initial write to pin {p} failed"),
        }
    }
}

impl From<SetupError> for Error {
    fn from(e: SetupError) -> Self {
        Self::Setup(e)
    }
}

// ---------------------------------------------------------------------------
// Payload errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// More elements than an array payload can carry.
    TooLong(usize),
    /// Array payloads must hold a single scalar type.
    MixedTypes,
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong(n) => write!(f, "{n} elements exceed the array cap"),
            Self::MixedTypes => write!(f, "array elements differ in type"),
        }
    }
}

impl From<PayloadError> for Error {
    fn from(e: PayloadError) -> Self {
        Self::Payload(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
