//! Column encoders.
//!
//! Fixed-width columns are a flat little-endian array. String and binary
//! columns keep `N + 1` 64-bit offsets in the aux vector and
//! length-prefixed payloads in the data vector; a null value still occupies
//! its header, which holds the type's null sentinel. Varchar columns keep a
//! 16-byte header slot per row in the aux vector and spill long values to
//! the data vector.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

use filterjit_foundation::DataType;
use filterjit_foundation::sentinel::{BINARY_NULL_HEADER, STRING_NULL_HEADER, VARCHAR_NULL_HEADER};

/// Bit flags in the low byte of a varchar header.
pub mod varchar_flags {
    /// The value is stored entirely in the aux slot.
    pub const INLINED: u8 = 1;
    /// The value is pure ASCII.
    pub const ASCII: u8 = 2;
    /// The value is null.
    pub const NULL: u8 = 4;
    /// Longest value that fits in an aux slot.
    pub const MAX_INLINED: usize = 9;
}

/// Width of a varchar aux slot in bytes.
const VARCHAR_SLOT: usize = 16;

/// A Rust type stored in a fixed-width column.
pub trait FixedValue: Copy {
    /// The column type.
    const DTYPE: DataType;

    /// Appends the little-endian encoding of `self`.
    fn write_le(self, out: &mut Vec<u8>);
}

macro_rules! fixed_value {
    ($t:ty, $dtype:expr) => {
        impl FixedValue for $t {
            const DTYPE: DataType = $dtype;

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    };
}

fixed_value!(i8, DataType::I8);
fixed_value!(i16, DataType::I16);
fixed_value!(i32, DataType::I32);
fixed_value!(i64, DataType::I64);
fixed_value!(i128, DataType::I128);
fixed_value!(f32, DataType::F32);
fixed_value!(f64, DataType::F64);

/// An encoded column.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    /// Fixed-width values, one per row.
    Fixed {
        /// Element type.
        dtype: DataType,
        /// Packed values.
        data: Vec<u8>,
    },
    /// Variable-length values with a length header in the data vector.
    VarSize {
        /// `StringHeader` or `BinaryHeader`.
        dtype: DataType,
        /// Length-prefixed payloads.
        data: Vec<u8>,
        /// `N + 1` little-endian `i64` offsets into `data`.
        offsets: Vec<u8>,
    },
    /// Varchar values with 16-byte header slots.
    Varchar {
        /// Spilled payloads of values too long to inline.
        data: Vec<u8>,
        /// One 16-byte slot per row.
        aux: Vec<u8>,
    },
}

impl Column {
    /// Encodes a fixed-width column.
    #[must_use]
    pub fn fixed<T: FixedValue>(values: &[T]) -> Self {
        let mut data = Vec::with_capacity(values.len() * T::DTYPE.width());
        for v in values {
            v.write_le(&mut data);
        }
        Self::Fixed {
            dtype: T::DTYPE,
            data,
        }
    }

    /// Encodes a string column. Headers hold the length in UTF-16 code
    /// units and payloads are UTF-16LE.
    #[must_use]
    pub fn string(values: &[Option<&str>]) -> Self {
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity((values.len() + 1) * 8);
        for value in values {
            push_offset(&mut offsets, data.len());
            match value {
                Some(s) => {
                    let units: Vec<u16> = s.encode_utf16().collect();
                    data.extend_from_slice(&(units.len() as i32).to_le_bytes());
                    for unit in units {
                        data.extend_from_slice(&unit.to_le_bytes());
                    }
                }
                None => data.extend_from_slice(&STRING_NULL_HEADER.to_le_bytes()),
            }
        }
        push_offset(&mut offsets, data.len());
        Self::VarSize {
            dtype: DataType::StringHeader,
            data,
            offsets,
        }
    }

    /// Encodes a binary column. Headers hold the length in bytes.
    #[must_use]
    pub fn binary(values: &[Option<&[u8]>]) -> Self {
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity((values.len() + 1) * 8);
        for value in values {
            push_offset(&mut offsets, data.len());
            match value {
                Some(bytes) => {
                    data.extend_from_slice(&(bytes.len() as i64).to_le_bytes());
                    data.extend_from_slice(bytes);
                }
                None => data.extend_from_slice(&BINARY_NULL_HEADER.to_le_bytes()),
            }
        }
        push_offset(&mut offsets, data.len());
        Self::VarSize {
            dtype: DataType::BinaryHeader,
            data,
            offsets,
        }
    }

    /// Encodes a varchar column.
    ///
    /// Slot layout: a header in the low bytes (`len << 4 | flags`), up to
    /// nine inlined bytes or a six-byte prefix, and the 48-bit offset of the
    /// spilled payload in bytes 10..16.
    #[must_use]
    pub fn varchar(values: &[Option<&str>]) -> Self {
        let mut data = Vec::new();
        let mut aux = Vec::with_capacity(values.len() * VARCHAR_SLOT);
        for value in values {
            let mut slot = [0u8; VARCHAR_SLOT];
            match value {
                None => {
                    slot[..8].copy_from_slice(&VARCHAR_NULL_HEADER.to_le_bytes());
                }
                Some(s) => {
                    let bytes = s.as_bytes();
                    let ascii = if s.is_ascii() { varchar_flags::ASCII } else { 0 };
                    if bytes.len() <= varchar_flags::MAX_INLINED {
                        slot[0] = ((bytes.len() as u8) << 4) | varchar_flags::INLINED | ascii;
                        slot[1..=bytes.len()].copy_from_slice(bytes);
                    } else {
                        let header = ((bytes.len() as u32) << 4) | u32::from(ascii);
                        slot[..4].copy_from_slice(&header.to_le_bytes());
                        slot[4..10].copy_from_slice(&bytes[..6]);
                        data.extend_from_slice(bytes);
                    }
                }
            }
            let spilled_at = match value {
                Some(s) if s.len() > varchar_flags::MAX_INLINED => data.len() - s.len(),
                _ => data.len(),
            };
            slot[10..].copy_from_slice(&(spilled_at as u64).to_le_bytes()[..6]);
            aux.extend_from_slice(&slot);
        }
        Self::Varchar { data, aux }
    }

    /// The column's addressing type.
    #[must_use]
    pub fn dtype(&self) -> DataType {
        match self {
            Self::Fixed { dtype, .. } | Self::VarSize { dtype, .. } => *dtype,
            Self::Varchar { .. } => DataType::VarcharHeader,
        }
    }

    /// Number of rows in the column.
    #[must_use]
    pub fn row_count(&self) -> usize {
        match self {
            Self::Fixed { dtype, data } => data.len() / dtype.width(),
            Self::VarSize { offsets, .. } => (offsets.len() / 8).saturating_sub(1),
            Self::Varchar { aux, .. } => aux.len() / VARCHAR_SLOT,
        }
    }

    /// The data vector, addressed through the data table.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        match self {
            Self::Fixed { data, .. } | Self::VarSize { data, .. } | Self::Varchar { data, .. } => {
                data
            }
        }
    }

    /// The aux vector, addressed through the aux table. Empty for fixed
    /// columns.
    #[must_use]
    pub fn aux(&self) -> &[u8] {
        match self {
            Self::Fixed { .. } => &[],
            Self::VarSize { offsets, .. } => offsets,
            Self::Varchar { aux, .. } => aux,
        }
    }
}

fn push_offset(offsets: &mut Vec<u8>, offset: usize) {
    offsets.extend_from_slice(&(offset as i64).to_le_bytes());
}
