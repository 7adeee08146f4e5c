//! The null-aware primitive library.
//!
//! One function per (operation, lane). Integer primitives take a
//! `null_check` flag: when set, a null sentinel on any input yields the
//! null sentinel (arithmetic) or `false` (ordering). Integer equality is bit
//! exact, so null equals null. Float primitives follow IEEE-754 and let NaN
//! propagate. Booleans are `i32` 0 or 1.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]
#![allow(clippy::fn_params_excessive_bools)]

use filterjit_foundation::sentinel::{
    DOUBLE_NULL, FLOAT_NULL, INT_NULL, LONG_NULL, is_int_null, is_long_null,
};

fn flag(b: bool) -> i32 {
    i32::from(b)
}

macro_rules! int_lane {
    ($t:ty, $null:expr, $is_null:path,
     $neg:ident, $add:ident, $sub:ident, $mul:ident, $div:ident,
     $eq:ident, $ne:ident, $gt:ident, $ge:ident, $lt:ident, $le:ident) => {
        #[doc = concat!("Negates an `", stringify!($t), "`.")]
        #[must_use]
        pub fn $neg(a: $t, null_check: bool) -> $t {
            if null_check && $is_null(a) { $null } else { a.wrapping_neg() }
        }

        #[doc = concat!("Adds two `", stringify!($t), "` values.")]
        #[must_use]
        pub fn $add(a: $t, b: $t, null_check: bool) -> $t {
            if null_check && ($is_null(a) || $is_null(b)) { $null } else { a.wrapping_add(b) }
        }

        #[doc = concat!("Subtracts two `", stringify!($t), "` values.")]
        #[must_use]
        pub fn $sub(a: $t, b: $t, null_check: bool) -> $t {
            if null_check && ($is_null(a) || $is_null(b)) { $null } else { a.wrapping_sub(b) }
        }

        #[doc = concat!("Multiplies two `", stringify!($t), "` values.")]
        #[must_use]
        pub fn $mul(a: $t, b: $t, null_check: bool) -> $t {
            if null_check && ($is_null(a) || $is_null(b)) { $null } else { a.wrapping_mul(b) }
        }

        #[doc = concat!("Divides two `", stringify!($t), "` values. A zero divisor yields null.")]
        #[must_use]
        pub fn $div(a: $t, b: $t, null_check: bool) -> $t {
            if b == 0 || (null_check && ($is_null(a) || $is_null(b))) {
                $null
            } else {
                a.wrapping_div(b)
            }
        }

        #[doc = concat!("`a == b` for `", stringify!($t), "`.")]
        #[must_use]
        pub fn $eq(a: $t, b: $t) -> i32 {
            flag(a == b)
        }

        #[doc = concat!("`a != b` for `", stringify!($t), "`.")]
        #[must_use]
        pub fn $ne(a: $t, b: $t) -> i32 {
            flag(a != b)
        }

        #[doc = concat!("`a > b` for `", stringify!($t), "`.")]
        #[must_use]
        pub fn $gt(a: $t, b: $t, null_check: bool) -> i32 {
            flag(a > b && !(null_check && ($is_null(a) || $is_null(b))))
        }

        #[doc = concat!("`a >= b` for `", stringify!($t), "`.")]
        #[must_use]
        pub fn $ge(a: $t, b: $t, null_check: bool) -> i32 {
            flag(a >= b && !(null_check && ($is_null(a) || $is_null(b))))
        }

        #[doc = concat!("`a < b` for `", stringify!($t), "`.")]
        #[must_use]
        pub fn $lt(a: $t, b: $t, null_check: bool) -> i32 {
            flag(a < b && !(null_check && ($is_null(a) || $is_null(b))))
        }

        #[doc = concat!("`a <= b` for `", stringify!($t), "`.")]
        #[must_use]
        pub fn $le(a: $t, b: $t, null_check: bool) -> i32 {
            flag(a <= b && !(null_check && ($is_null(a) || $is_null(b))))
        }
    };
}

int_lane!(
    i32, INT_NULL, is_int_null,
    int32_neg, int32_add, int32_sub, int32_mul, int32_div,
    int32_eq, int32_ne, int32_gt, int32_ge, int32_lt, int32_le
);

int_lane!(
    i64, LONG_NULL, is_long_null,
    int64_neg, int64_add, int64_sub, int64_mul, int64_div,
    int64_eq, int64_ne, int64_gt, int64_ge, int64_lt, int64_le
);

macro_rules! float_lane {
    ($t:ty, $neg:ident, $add:ident, $sub:ident, $mul:ident, $div:ident,
     $eq_eps:ident, $ne_eps:ident, $gt:ident, $ge:ident, $lt:ident, $le:ident) => {
        #[doc = concat!("Negates an `", stringify!($t), "`.")]
        #[must_use]
        pub fn $neg(a: $t) -> $t {
            -a
        }

        #[doc = concat!("Adds two `", stringify!($t), "` values.")]
        #[must_use]
        pub fn $add(a: $t, b: $t) -> $t {
            a + b
        }

        #[doc = concat!("Subtracts two `", stringify!($t), "` values.")]
        #[must_use]
        pub fn $sub(a: $t, b: $t) -> $t {
            a - b
        }

        #[doc = concat!("Multiplies two `", stringify!($t), "` values.")]
        #[must_use]
        pub fn $mul(a: $t, b: $t) -> $t {
            a * b
        }

        #[doc = concat!("Divides two `", stringify!($t), "` values.")]
        #[must_use]
        pub fn $div(a: $t, b: $t) -> $t {
            a / b
        }

        #[doc = concat!("Tolerant `", stringify!($t), "` equality: both NaN, exactly equal, or closer than `epsilon`.")]
        #[must_use]
        pub fn $eq_eps(a: $t, b: $t, epsilon: $t) -> i32 {
            flag((a.is_nan() && b.is_nan()) || a == b || (a - b).abs() < epsilon)
        }

        #[doc = concat!("Negation of the tolerant `", stringify!($t), "` equality.")]
        #[must_use]
        pub fn $ne_eps(a: $t, b: $t, epsilon: $t) -> i32 {
            1 - $eq_eps(a, b, epsilon)
        }

        #[doc = concat!("Strict `a > b` for `", stringify!($t), "`.")]
        #[must_use]
        pub fn $gt(a: $t, b: $t) -> i32 {
            flag(a > b)
        }

        #[doc = concat!("Strict `a >= b` for `", stringify!($t), "`.")]
        #[must_use]
        pub fn $ge(a: $t, b: $t) -> i32 {
            flag(a >= b)
        }

        #[doc = concat!("Strict `a < b` for `", stringify!($t), "`.")]
        #[must_use]
        pub fn $lt(a: $t, b: $t) -> i32 {
            flag(a < b)
        }

        #[doc = concat!("Strict `a <= b` for `", stringify!($t), "`.")]
        #[must_use]
        pub fn $le(a: $t, b: $t) -> i32 {
            flag(a <= b)
        }
    };
}

float_lane!(
    f32, float_neg, float_add, float_sub, float_mul, float_div,
    float_eq_epsilon, float_ne_epsilon, float_gt, float_ge, float_lt, float_le
);

float_lane!(
    f64, double_neg, double_add, double_sub, double_mul, double_div,
    double_eq_epsilon, double_ne_epsilon, double_gt, double_ge, double_lt, double_le
);

/// Logical negation of a boolean: `!a & 1`.
#[must_use]
pub fn int32_not(a: i32) -> i32 {
    !a & 1
}

/// Bitwise and.
#[must_use]
pub fn int32_and(a: i32, b: i32) -> i32 {
    a & b
}

/// Bitwise or.
#[must_use]
pub fn int32_or(a: i32, b: i32) -> i32 {
    a | b
}

/// 128-bit equality.
#[must_use]
pub fn int128_eq(a: i128, b: i128) -> i32 {
    flag(a == b)
}

/// 128-bit inequality.
#[must_use]
pub fn int128_ne(a: i128, b: i128) -> i32 {
    flag(a != b)
}

/// Sign-extends an `i32`, mapping null to null when checked.
#[must_use]
pub fn int32_to_int64(a: i32, null_check: bool) -> i64 {
    if null_check && is_int_null(a) { LONG_NULL } else { i64::from(a) }
}

/// Converts an `i32` to `f32`, mapping null to NaN when checked.
#[must_use]
pub fn int32_to_float(a: i32, null_check: bool) -> f32 {
    if null_check && is_int_null(a) { FLOAT_NULL } else { a as f32 }
}

/// Converts an `i32` to `f64`, mapping null to NaN when checked.
#[must_use]
pub fn int32_to_double(a: i32, null_check: bool) -> f64 {
    if null_check && is_int_null(a) { DOUBLE_NULL } else { f64::from(a) }
}

/// Converts an `i64` to `f64`, mapping null to NaN when checked.
#[must_use]
pub fn int64_to_double(a: i64, null_check: bool) -> f64 {
    if null_check && is_long_null(a) { DOUBLE_NULL } else { a as f64 }
}

/// Widens an `f32`.
#[must_use]
pub fn float_to_double(a: f32) -> f64 {
    f64::from(a)
}
