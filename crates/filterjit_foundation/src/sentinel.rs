//! Null sentinels and float comparison tolerances.
//!
//! Columns encode missing values in-band. 8- and 16-bit integers have no
//! sentinel: every bit pattern is a real value.

/// Null `i32`.
pub const INT_NULL: i32 = i32::MIN;

/// Null `i64`.
pub const LONG_NULL: i64 = i64::MIN;

/// Null 128-bit value: both 64-bit halves are [`LONG_NULL`].
pub const LONG128_NULL: i128 = ((LONG_NULL as i128) << 64) | (LONG_NULL as u64 as i128);

/// Null `f32`.
pub const FLOAT_NULL: f32 = f32::NAN;

/// Null `f64`.
pub const DOUBLE_NULL: f64 = f64::NAN;

/// String header stored in the data vector for a null string.
pub const STRING_NULL_HEADER: i32 = -1;

/// Binary header stored in the data vector for a null binary value.
pub const BINARY_NULL_HEADER: i64 = -1;

/// Varchar header word stored in the aux vector for a null varchar.
pub const VARCHAR_NULL_HEADER: i64 = 4;

/// Tolerance for `f32` equality.
pub const FLOAT_EPSILON: f32 = 1e-7;

/// Tolerance for `f64` equality.
pub const DOUBLE_EPSILON: f64 = 1e-10;

/// Returns true if `v` is the `i32` null.
#[must_use]
pub const fn is_int_null(v: i32) -> bool {
    v == INT_NULL
}

/// Returns true if `v` is the `i64` null.
#[must_use]
pub const fn is_long_null(v: i64) -> bool {
    v == LONG_NULL
}
