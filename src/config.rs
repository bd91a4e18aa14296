//! Per-device runtime parameters.
//!
//! Every record has a hard-coded default that a device restores at setup,
//! and a packed little-endian wire form that the PC overwrites wholesale.
//! Field order and width of each `*Raw` struct are the wire contract: the
//! PC side packs the same fields in the same order with no padding.
//!
//! The typed records also derive serde so host tooling can store and
//! diff them.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound on any packed record.
pub const MAX_RECORD_LEN: usize = 16;

/// Packed bytes of one record.
pub type Record = heapless::Vec<u8, MAX_RECORD_LEN>;

/// A parameter record with a fixed packed wire layout.
pub trait Parameters: Sized + Copy + Default {
    /// Packed twin whose memory image is the wire format.
    type Raw: Pod;

    const WIRE_SIZE: usize = core::mem::size_of::<Self::Raw>();

    fn from_raw(raw: Self::Raw) -> Result<Self, ConfigError>;

    fn to_raw(&self) -> Self::Raw;

    /// Decode a received record. The length must match exactly.
    fn decode(bytes: &[u8]) -> Result<Self, ConfigError> {
        let raw = bytemuck::try_pod_read_unaligned::<Self::Raw>(bytes).map_err(|_| {
            ConfigError::WrongLength {
                expected: Self::WIRE_SIZE,
                actual: bytes.len(),
            }
        })?;
        Self::from_raw(raw)
    }

    fn encode(&self) -> Record {
        let raw = self.to_raw();
        let mut out = Record::new();
        // WIRE_SIZE <= MAX_RECORD_LEN is asserted for every record below.
        let _ = out.extend_from_slice(bytemuck::bytes_of(&raw));
        out
    }
}

const fn flag(b: bool) -> u8 {
    b as u8
}

// ---------------------------------------------------------------------------
// Valve
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValveParams {
    /// Open time for one Pulse, µs.
    pub pulse_duration: u32,
    /// Closed time between calibration pulses, µs.
    pub calibration_delay: u32,
    pub calibration_count: u16,
    /// Total tone time measured from valve opening, µs.
    pub tone_duration: u32,
}

impl Default for ValveParams {
    fn default() -> Self {
        Self {
            pulse_duration: 35_590,
            calibration_delay: 200_000,
            calibration_count: 500,
            tone_duration: 300_000,
        }
    }
}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct ValveRaw {
    pulse_duration: u32,
    calibration_delay: u32,
    calibration_count: u16,
    tone_duration: u32,
}

impl Parameters for ValveParams {
    type Raw = ValveRaw;

    fn from_raw(raw: ValveRaw) -> Result<Self, ConfigError> {
        Ok(Self {
            pulse_duration: u32::from_le(raw.pulse_duration),
            calibration_delay: u32::from_le(raw.calibration_delay),
            calibration_count: u16::from_le(raw.calibration_count),
            tone_duration: u32::from_le(raw.tone_duration),
        })
    }

    fn to_raw(&self) -> ValveRaw {
        ValveRaw {
            pulse_duration: self.pulse_duration.to_le(),
            calibration_delay: self.calibration_delay.to_le(),
            calibration_count: self.calibration_count.to_le(),
            tone_duration: self.tone_duration.to_le(),
        }
    }
}

// ---------------------------------------------------------------------------
// TTL
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlParams {
    pub pulse_duration: u32,
    /// Samples per input read (majority vote).
    pub average_pool_size: u8,
}

impl Default for TtlParams {
    fn default() -> Self {
        Self {
            pulse_duration: 10_000,
            average_pool_size: 0,
        }
    }
}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct TtlRaw {
    pulse_duration: u32,
    average_pool_size: u8,
}

impl Parameters for TtlParams {
    type Raw = TtlRaw;

    fn from_raw(raw: TtlRaw) -> Result<Self, ConfigError> {
        Ok(Self {
            pulse_duration: u32::from_le(raw.pulse_duration),
            average_pool_size: raw.average_pool_size,
        })
    }

    fn to_raw(&self) -> TtlRaw {
        TtlRaw {
            pulse_duration: self.pulse_duration.to_le(),
            average_pool_size: self.average_pool_size,
        }
    }
}

// ---------------------------------------------------------------------------
// Brake
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrakeParams {
    /// 0 = no braking, 255 = full braking, independent of relay wiring.
    pub breaking_strength: u8,
}

impl Default for BrakeParams {
    fn default() -> Self {
        Self {
            breaking_strength: 128,
        }
    }
}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct BrakeRaw {
    breaking_strength: u8,
}

impl Parameters for BrakeParams {
    type Raw = BrakeRaw;

    fn from_raw(raw: BrakeRaw) -> Result<Self, ConfigError> {
        Ok(Self {
            breaking_strength: raw.breaking_strength,
        })
    }

    fn to_raw(&self) -> BrakeRaw {
        BrakeRaw {
            breaking_strength: self.breaking_strength,
        }
    }
}

// ---------------------------------------------------------------------------
// Speaker and screen (pulse duration only)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerParams {
    pub pulse_duration: u32,
}

impl Default for SpeakerParams {
    fn default() -> Self {
        Self {
            pulse_duration: 100_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenParams {
    /// How long the power-button relays are held closed, µs.
    pub pulse_duration: u32,
}

impl Default for ScreenParams {
    fn default() -> Self {
        Self {
            pulse_duration: 1_000_000,
        }
    }
}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct PulseRaw {
    pulse_duration: u32,
}

impl Parameters for SpeakerParams {
    type Raw = PulseRaw;

    fn from_raw(raw: PulseRaw) -> Result<Self, ConfigError> {
        Ok(Self {
            pulse_duration: u32::from_le(raw.pulse_duration),
        })
    }

    fn to_raw(&self) -> PulseRaw {
        PulseRaw {
            pulse_duration: self.pulse_duration.to_le(),
        }
    }
}

impl Parameters for ScreenParams {
    type Raw = PulseRaw;

    fn from_raw(raw: PulseRaw) -> Result<Self, ConfigError> {
        Ok(Self {
            pulse_duration: u32::from_le(raw.pulse_duration),
        })
    }

    fn to_raw(&self) -> PulseRaw {
        PulseRaw {
            pulse_duration: self.pulse_duration.to_le(),
        }
    }
}

// ---------------------------------------------------------------------------
// Lick sensor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LickParams {
    /// Readings below this are treated as no contact.
    pub signal_threshold: u16,
    pub delta_threshold: u16,
    pub average_pool_size: u8,
}

impl Default for LickParams {
    fn default() -> Self {
        Self {
            signal_threshold: 200,
            delta_threshold: 180,
            average_pool_size: 0,
        }
    }
}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct LickRaw {
    signal_threshold: u16,
    delta_threshold: u16,
    average_pool_size: u8,
}

impl Parameters for LickParams {
    type Raw = LickRaw;

    fn from_raw(raw: LickRaw) -> Result<Self, ConfigError> {
        Ok(Self {
            signal_threshold: u16::from_le(raw.signal_threshold),
            delta_threshold: u16::from_le(raw.delta_threshold),
            average_pool_size: raw.average_pool_size,
        })
    }

    fn to_raw(&self) -> LickRaw {
        LickRaw {
            signal_threshold: self.signal_threshold.to_le(),
            delta_threshold: self.delta_threshold.to_le(),
            average_pool_size: self.average_pool_size,
        }
    }
}

// ---------------------------------------------------------------------------
// Generic analog input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalogParams {
    pub lower_threshold: u16,
    pub upper_threshold: u16,
    pub delta_threshold: u16,
    pub average_pool_size: u8,
}

impl Default for AnalogParams {
    fn default() -> Self {
        Self {
            lower_threshold: 50,
            upper_threshold: 4095,
            delta_threshold: 50,
            average_pool_size: 5,
        }
    }
}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct AnalogRaw {
    lower_threshold: u16,
    upper_threshold: u16,
    delta_threshold: u16,
    average_pool_size: u8,
}

impl Parameters for AnalogParams {
    type Raw = AnalogRaw;

    fn from_raw(raw: AnalogRaw) -> Result<Self, ConfigError> {
        let params = Self {
            lower_threshold: u16::from_le(raw.lower_threshold),
            upper_threshold: u16::from_le(raw.upper_threshold),
            delta_threshold: u16::from_le(raw.delta_threshold),
            average_pool_size: raw.average_pool_size,
        };
        if params.lower_threshold > params.upper_threshold {
            return Err(ConfigError::InvalidValue("lower threshold above upper"));
        }
        Ok(params)
    }

    fn to_raw(&self) -> AnalogRaw {
        AnalogRaw {
            lower_threshold: self.lower_threshold.to_le(),
            upper_threshold: self.upper_threshold.to_le(),
            delta_threshold: self.delta_threshold.to_le(),
            average_pool_size: self.average_pool_size,
        }
    }
}

// ---------------------------------------------------------------------------
// Torque sensor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorqueParams {
    pub report_ccw: bool,
    pub report_cw: bool,
    /// Minimum distance from baseline worth reporting.
    pub signal_threshold: u16,
    pub delta_threshold: u16,
    pub average_pool_size: u8,
    /// ADC reading at zero torque.
    pub baseline: u16,
}

impl TorqueParams {
    /// Defaults for a sensor wired with the given zero-torque reading.
    pub fn with_baseline(baseline: u16) -> Self {
        Self {
            baseline,
            ..Self::default()
        }
    }
}

impl Default for TorqueParams {
    fn default() -> Self {
        Self {
            report_ccw: true,
            report_cw: true,
            signal_threshold: 100,
            delta_threshold: 70,
            average_pool_size: 5,
            baseline: 2048,
        }
    }
}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct TorqueRaw {
    report_ccw: u8,
    report_cw: u8,
    signal_threshold: u16,
    delta_threshold: u16,
    average_pool_size: u8,
    baseline: u16,
}

impl Parameters for TorqueParams {
    type Raw = TorqueRaw;

    fn from_raw(raw: TorqueRaw) -> Result<Self, ConfigError> {
        Ok(Self {
            report_ccw: raw.report_ccw != 0,
            report_cw: raw.report_cw != 0,
            signal_threshold: u16::from_le(raw.signal_threshold),
            delta_threshold: u16::from_le(raw.delta_threshold),
            average_pool_size: raw.average_pool_size,
            baseline: u16::from_le(raw.baseline),
        })
    }

    fn to_raw(&self) -> TorqueRaw {
        TorqueRaw {
            report_ccw: flag(self.report_ccw),
            report_cw: flag(self.report_cw),
            signal_threshold: self.signal_threshold.to_le(),
            delta_threshold: self.delta_threshold.to_le(),
            average_pool_size: self.average_pool_size,
            baseline: self.baseline.to_le(),
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderParams {
    pub report_ccw: bool,
    pub report_cw: bool,
    /// Pulses that must accumulate before a rotation is reported.
    pub delta_threshold: u32,
}

impl Default for EncoderParams {
    fn default() -> Self {
        Self {
            report_ccw: true,
            report_cw: true,
            delta_threshold: 15,
        }
    }
}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, packed)]
pub struct EncoderRaw {
    report_ccw: u8,
    report_cw: u8,
    delta_threshold: u32,
}

impl Parameters for EncoderParams {
    type Raw = EncoderRaw;

    fn from_raw(raw: EncoderRaw) -> Result<Self, ConfigError> {
        Ok(Self {
            report_ccw: raw.report_ccw != 0,
            report_cw: raw.report_cw != 0,
            delta_threshold: u32::from_le(raw.delta_threshold),
        })
    }

    fn to_raw(&self) -> EncoderRaw {
        EncoderRaw {
            report_ccw: flag(self.report_ccw),
            report_cw: flag(self.report_cw),
            delta_threshold: self.delta_threshold.to_le(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire sizes
// ---------------------------------------------------------------------------

const _: () = {
    use core::mem::size_of;
    assert!(size_of::<ValveRaw>() == 14);
    assert!(size_of::<TtlRaw>() == 5);
    assert!(size_of::<BrakeRaw>() == 1);
    assert!(size_of::<PulseRaw>() == 4);
    assert!(size_of::<LickRaw>() == 5);
    assert!(size_of::<AnalogRaw>() == 7);
    assert!(size_of::<TorqueRaw>() == 9);
    assert!(size_of::<EncoderRaw>() == 6);
    assert!(size_of::<ValveRaw>() <= MAX_RECORD_LEN);
};
