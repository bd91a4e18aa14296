//! Outbound reports and the wire-code enums every device defines.
//!
//! A report is a status/event code plus an optional typed payload. Codes
//! 0–50 belong to the external runtime; device event codes start at 51 and
//! device command codes start at 1.

use serde::{Deserialize, Serialize};

use crate::error::PayloadError;

/// Largest element count an array payload may carry.
pub const MAX_ARRAY_LEN: usize = 15;

// ───────────────────────────────────────────────────────────────
// Addressing
// ───────────────────────────────────────────────────────────────

/// (type, instance) pair identifying a module on one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleAddress {
    pub kind: u8,
    pub id: u8,
}

impl ModuleAddress {
    pub const fn new(kind: u8, id: u8) -> Self {
        Self { kind, id }
    }
}

// ───────────────────────────────────────────────────────────────
// Payloads
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )+
    };
}

scalar_from! {
    bool => Bool, u8 => U8, i8 => I8, u16 => U16, i16 => I16, u32 => U32,
    i32 => I32, u64 => U64, i64 => I64, f32 => F32, f64 => F64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    None,
    One(Scalar),
    Array(heapless::Vec<Scalar, MAX_ARRAY_LEN>),
}

impl Payload {
    /// Build an array payload. All elements must share one scalar type.
    pub fn array(items: &[Scalar]) -> Result<Self, PayloadError> {
        if let Some(first) = items.first() {
            let kind = core::mem::discriminant(first);
            if items.iter().any(|s| core::mem::discriminant(s) != kind) {
                return Err(PayloadError::MixedTypes);
            }
        }
        heapless::Vec::from_slice(items)
            .map(Self::Array)
            .map_err(|()| PayloadError::TooLong(items.len()))
    }
}

// ───────────────────────────────────────────────────────────────
// Report
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub code: u8,
    pub payload: Payload,
}

impl Report {
    /// Bare status code.
    pub fn code(code: impl Into<u8>) -> Self {
        Self {
            code: code.into(),
            payload: Payload::None,
        }
    }

    /// Status code with one scalar.
    pub fn with(code: impl Into<u8>, value: impl Into<Scalar>) -> Self {
        Self {
            code: code.into(),
            payload: Payload::One(value.into()),
        }
    }

    /// The single scalar, if this report carries exactly one.
    pub fn value(&self) -> Option<Scalar> {
        match self.payload {
            Payload::One(v) => Some(v),
            _ => None,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Wire-code enums
// ───────────────────────────────────────────────────────────────

/// Declare a `#[repr(u8)]` code enum with a fallible decode from the raw
/// byte (the unknown byte comes back as the error).
macro_rules! wire_codes {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        $vis enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(code: u8) -> ::core::result::Result<Self, Self::Error> {
                match code {
                    $($value => Ok(Self::$variant),)+
                    other => Err(other),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(code: $name) -> u8 {
                code as u8
            }
        }
    };
}

pub(crate) use wire_codes;
