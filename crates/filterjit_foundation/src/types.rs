//! Data types addressed by compiled filters and their promotion rules.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

/// Value representation selected by an instruction's `options` field.
///
/// The three header types do not describe a runtime value. They select the
/// addressing scheme for variable-length columns and are turned into `i32`
/// or `i64` operands as soon as they are read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DataType {
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 128-bit value (wide constants, UUID-like columns). Equality only.
    I128,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// Header of a string column (4-byte length prefix in the data vector).
    StringHeader,
    /// Header of a binary column (8-byte length prefix in the data vector).
    BinaryHeader,
    /// Header of a varchar column (16-byte slot in the aux vector).
    VarcharHeader,
}

impl DataType {
    /// All data types, in wire-code order.
    pub const ALL: [DataType; 10] = [
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::I128,
        Self::F32,
        Self::F64,
        Self::StringHeader,
        Self::BinaryHeader,
        Self::VarcharHeader,
    ];

    /// Returns the wire code used in the `options` field of an instruction.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::I8 => 0,
            Self::I16 => 1,
            Self::I32 => 2,
            Self::I64 => 3,
            Self::I128 => 4,
            Self::F32 => 5,
            Self::F64 => 6,
            Self::StringHeader => 7,
            Self::BinaryHeader => 8,
            Self::VarcharHeader => 9,
        }
    }

    /// Decodes a wire code.
    ///
    /// # Errors
    /// Returns `InvalidInstruction` for an unknown code.
    pub fn from_code(code: i32) -> Result<Self, Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.code() == code)
            .ok_or_else(|| {
                Error::new(ErrorKind::InvalidInstruction {
                    position: None,
                    reason: format!("unknown data type code {code}"),
                })
            })
    }

    /// log2 of the storage width.
    #[must_use]
    pub const fn shift(self) -> u8 {
        match self {
            Self::I8 => 0,
            Self::I16 => 1,
            Self::I32 | Self::F32 | Self::StringHeader => 2,
            Self::I64 | Self::F64 | Self::BinaryHeader => 3,
            Self::I128 | Self::VarcharHeader => 4,
        }
    }

    /// Storage width in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        1 << self.shift()
    }

    /// Returns true for the header pseudo-types.
    #[must_use]
    pub const fn is_header(self) -> bool {
        matches!(
            self,
            Self::StringHeader | Self::BinaryHeader | Self::VarcharHeader
        )
    }

    /// Returns true for `f32` and `f64`.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Returns true for the 8/16/32/64-bit integers.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Returns true for integers handled by the 32-bit primitives.
    #[must_use]
    pub const fn is_int32_class(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32)
    }

    /// Returns true for 8- and 16-bit integers, which have no null sentinel.
    #[must_use]
    pub const fn is_narrow(self) -> bool {
        matches!(self, Self::I8 | Self::I16)
    }

    /// Promotion tier, or `None` for types that are never promoted.
    #[must_use]
    pub const fn tier(self) -> Option<Tier> {
        match self {
            Self::I8 | Self::I16 | Self::I32 => Some(Tier::Int32),
            Self::I64 => Some(Tier::Int64),
            Self::F32 => Some(Tier::Float32),
            Self::F64 => Some(Tier::Float64),
            _ => None,
        }
    }

    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::StringHeader => "string_header",
            Self::BinaryHeader => "binary_header",
            Self::VarcharHeader => "varchar_header",
        }
    }
}

impl TryFrom<i32> for DataType {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self, Error> {
        Self::from_code(code)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Numeric promotion tier.
///
/// Tiers are ordered from narrowest to widest; promotion only ever widens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// 8, 16 and 32-bit integers.
    Int32,
    /// 64-bit integers.
    Int64,
    /// 32-bit floats.
    Float32,
    /// 64-bit floats.
    Float64,
}

impl Tier {
    /// Canonical data type of the tier.
    #[must_use]
    pub const fn data_type(self) -> DataType {
        match self {
            Self::Int32 => DataType::I32,
            Self::Int64 => DataType::I64,
            Self::Float32 => DataType::F32,
            Self::Float64 => DataType::F64,
        }
    }
}

/// Returns the common type both operands of a binary operation widen to.
///
/// - same tier: no conversion (within the 32-bit integer tier the wider
///   declared type wins)
/// - integer vs wider integer: the narrower side widens
/// - integer vs float: the integer converts to the float width, except that
///   a 64-bit integer meets a 32-bit float at `f64`
/// - `f32` vs `f64`: `f64`
///
/// Header and 128-bit types are never promoted; they only combine with
/// themselves. `None` means the pair has no common type.
#[must_use]
pub fn promote(lhs: DataType, rhs: DataType) -> Option<DataType> {
    match (lhs.tier(), rhs.tier()) {
        (Some(l), Some(r)) if l == r => {
            if lhs.width() >= rhs.width() {
                Some(lhs)
            } else {
                Some(rhs)
            }
        }
        (Some(l), Some(r)) => {
            let tier = match (l.min(r), l.max(r)) {
                (Tier::Int64, Tier::Float32) => Tier::Float64,
                (_, wider) => wider,
            };
            Some(tier.data_type())
        }
        (None, None) if lhs == rhs => Some(lhs),
        _ => None,
    }
}

/// Provenance of an operand.
///
/// Row dependence is infectious: the result of a binary operation is
/// `Const` only if both inputs are.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataKind {
    /// Loaded from row or column storage.
    Memory,
    /// Originates from a literal.
    Const,
}

impl DataKind {
    /// Kind of a value computed from `self` and `other`.
    #[must_use]
    pub const fn combine(self, other: DataKind) -> DataKind {
        match (self, other) {
            (Self::Const, Self::Const) => Self::Const,
            _ => Self::Memory,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Const => write!(f, "const"),
        }
    }
}
