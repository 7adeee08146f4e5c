//! Integration tests for the null-aware primitive library
//!
//! Tests null propagation, tolerant float equality, and primitive dispatch.

use filterjit_backend::primitives::{
    double_eq_epsilon, double_gt, float_eq_epsilon, int32_div, int32_gt, int32_not,
    int32_to_double, int64_add, int64_eq,
};
use filterjit_backend::{ArithOp, CmpOp, Lane, Primitive, Scalar};
use filterjit_foundation::DataType;
use filterjit_foundation::sentinel::{DOUBLE_EPSILON, FLOAT_EPSILON, INT_NULL, LONG_NULL};
use proptest::prelude::*;

// =============================================================================
// Null Handling
// =============================================================================

#[test]
fn null_inputs_yield_null_or_false() {
    assert_eq!(int64_add(LONG_NULL, 1, true), LONG_NULL);
    assert_eq!(int64_add(LONG_NULL, 1, false), LONG_NULL + 1);
    assert_eq!(int32_gt(INT_NULL, -5, true), 0);
    assert_eq!(int32_gt(0, INT_NULL, false), 1);
    assert_eq!(int64_eq(LONG_NULL, LONG_NULL), 1);
}

#[test]
fn division_by_zero_is_null() {
    assert_eq!(int32_div(10, 0, false), INT_NULL);
    assert_eq!(int32_div(i32::MIN + 1, -1, true), i32::MAX);
}

#[test]
fn conversions_map_null_to_null() {
    assert!(int32_to_double(INT_NULL, true).is_nan());
    assert_eq!(int32_to_double(INT_NULL, false), f64::from(i32::MIN));
}

#[test]
fn not_is_boolean() {
    assert_eq!(int32_not(0), 1);
    assert_eq!(int32_not(1), 0);
    assert_eq!(int32_not(2), 1);
}

// =============================================================================
// Tolerant Equality
// =============================================================================

#[test]
fn epsilon_equality() {
    assert_eq!(double_eq_epsilon(f64::NAN, f64::NAN, DOUBLE_EPSILON), 1);
    assert_eq!(double_eq_epsilon(1.0, 1.0 + 1e-11, DOUBLE_EPSILON), 1);
    assert_eq!(double_eq_epsilon(1.0, 1.0 + 1e-9, DOUBLE_EPSILON), 0);
    assert_eq!(float_eq_epsilon(0.0, 5e-8, FLOAT_EPSILON), 1);
    assert_eq!(double_gt(f64::NAN, 0.0), 0);
}

// =============================================================================
// Dispatch
// =============================================================================

#[test]
fn lanes_follow_data_types() {
    assert_eq!(Lane::of(DataType::I8), Some(Lane::I32));
    assert_eq!(Lane::of(DataType::I64), Some(Lane::I64));
    assert_eq!(Lane::of(DataType::F32), Some(Lane::F32));
    assert_eq!(Lane::of(DataType::StringHeader), None);
}

#[test]
fn primitives_evaluate_scalars() {
    let add = Primitive::Arith {
        op: ArithOp::Add,
        lane: Lane::I64,
        null_check: true,
    };
    assert_eq!(add.eval(&[Scalar::I64(2), Scalar::I64(3)]).unwrap(), Scalar::I64(5));
    assert_eq!(add.name(), "int64_add");

    let eq = Primitive::EqEpsilon { lane: Lane::F64 };
    assert_eq!(
        eq.eval(&[Scalar::F64(0.1 + 0.2), Scalar::F64(0.3)]).unwrap(),
        Scalar::I32(1)
    );
}

#[test]
fn unsupported_signatures_are_rejected() {
    let lt = Primitive::Compare {
        op: CmpOp::Lt,
        lane: Lane::I128,
        null_check: true,
    };
    assert!(lt.signature().is_err());

    let eps = Primitive::EqEpsilon { lane: Lane::I32 };
    assert!(eps.signature().is_err());
}

proptest! {
    #[test]
    fn epsilon_equality_is_reflexive(x in -1.0e12f64..1.0e12) {
        prop_assert_eq!(double_eq_epsilon(x, x, DOUBLE_EPSILON), 1);
    }

    #[test]
    fn int_arithmetic_never_panics(a in any::<i64>(), b in any::<i64>(), check in any::<bool>()) {
        let _ = filterjit_backend::primitives::int64_div(a, b, check);
        let _ = filterjit_backend::primitives::int64_mul(a, b, check);
        let _ = filterjit_backend::primitives::int64_neg(a, check);
    }
}
