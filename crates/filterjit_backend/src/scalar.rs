//! Typed register values.

use std::fmt;

use filterjit_foundation::sentinel::{LONG128_NULL, is_int_null, is_long_null};

use crate::ir::RegClass;

/// The value of a register at run time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    /// 32-bit integer (also booleans produced by comparisons).
    I32(i32),
    /// 64-bit integer.
    I64(i64),
    /// 128-bit value.
    I128(i128),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
}

impl Scalar {
    /// Register class that holds this value.
    #[must_use]
    pub const fn class(&self) -> RegClass {
        match self {
            Self::I32(_) => RegClass::Gp32,
            Self::I64(_) => RegClass::Gp64,
            Self::I128(_) => RegClass::V128,
            Self::F32(_) => RegClass::F32,
            Self::F64(_) => RegClass::F64,
        }
    }

    /// Interprets the value as a predicate outcome: non-zero is true.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match *self {
            Self::I32(v) => v != 0,
            Self::I64(v) => v != 0,
            Self::I128(v) => v != 0,
            Self::F32(v) => v != 0.0,
            Self::F64(v) => v != 0.0,
        }
    }

    /// Returns true if the value is its type's null sentinel.
    #[must_use]
    pub fn is_null(&self) -> bool {
        match *self {
            Self::I32(v) => is_int_null(v),
            Self::I64(v) => is_long_null(v),
            Self::I128(v) => v == LONG128_NULL,
            Self::F32(v) => v.is_nan(),
            Self::F64(v) => v.is_nan(),
        }
    }

    /// The value as `i32`, if it is one.
    #[must_use]
    pub const fn as_i32(&self) -> Option<i32> {
        match *self {
            Self::I32(v) => Some(v),
            _ => None,
        }
    }

    /// The value as `i64`, if it is one.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::I64(v) => Some(v),
            _ => None,
        }
    }

    /// The value as `f64`, if it is one.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F64(v) => Some(v),
            _ => None,
        }
    }

    /// The value as `f32`, if it is one.
    #[must_use]
    pub const fn as_f32(&self) -> Option<f32> {
        match *self {
            Self::F32(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{v}i32"),
            Self::I64(v) => write!(f, "{v}i64"),
            Self::I128(v) => write!(f, "{v:#034x}"),
            Self::F32(v) => write!(f, "{v}f32"),
            Self::F64(v) => write!(f, "{v}f64"),
        }
    }
}
