//! Inline Cranelift IR for the primitive library.
//!
//! Each lowering computes exactly what the matching function in
//! [`crate::primitives`] computes, including null propagation, the zero
//! divisor rule and wrapping overflow.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use cranelift_codegen::ir::condcodes::{FloatCC, IntCC};
use cranelift_codegen::ir::{InstBuilder, Type, Value, types};
use cranelift_frontend::FunctionBuilder;
use filterjit_foundation::sentinel::{
    DOUBLE_EPSILON, DOUBLE_NULL, FLOAT_EPSILON, FLOAT_NULL, INT_NULL, LONG_NULL,
};
use filterjit_foundation::{Error, Result};

use crate::ir::RegClass;
use crate::primitive::{ArithOp, CmpOp, Lane, Primitive};

/// Cranelift type of a register class.
pub(crate) fn clif_type(class: RegClass) -> Type {
    match class {
        RegClass::Gp32 => types::I32,
        RegClass::Gp64 => types::I64,
        RegClass::F32 => types::F32,
        RegClass::F64 => types::F64,
        RegClass::V128 => types::I128,
    }
}

/// An integer constant of type `ty`. Narrow immediates are passed
/// zero-extended, as the verifier requires.
pub(crate) fn int_const(b: &mut FunctionBuilder<'_>, ty: Type, value: i64) -> Value {
    if ty == types::I32 {
        b.ins().iconst(ty, i64::from(value as i32 as u32))
    } else {
        b.ins().iconst(ty, value)
    }
}

fn null_const(b: &mut FunctionBuilder<'_>, ty: Type) -> Value {
    let null = if ty == types::I32 {
        i64::from(INT_NULL)
    } else {
        LONG_NULL
    };
    int_const(b, ty, null)
}

/// `1` if `v` is its type's null sentinel, as an `i8`.
fn is_null(b: &mut FunctionBuilder<'_>, ty: Type, v: Value) -> Value {
    let null = null_const(b, ty);
    b.ins().icmp(IntCC::Equal, v, null)
}

fn either_null(b: &mut FunctionBuilder<'_>, ty: Type, x: Value, y: Value) -> Value {
    let x_null = is_null(b, ty, x);
    let y_null = is_null(b, ty, y);
    b.ins().bor(x_null, y_null)
}

/// Widens an `i8` flag to the `i32` boolean the library returns.
fn boolean(b: &mut FunctionBuilder<'_>, flag: Value) -> Value {
    b.ins().uextend(types::I32, flag)
}

fn int_arith(
    b: &mut FunctionBuilder<'_>,
    op: ArithOp,
    ty: Type,
    x: Value,
    y: Value,
    null_check: bool,
) -> Value {
    let raw = match op {
        ArithOp::Add => b.ins().iadd(x, y),
        ArithOp::Sub => b.ins().isub(x, y),
        ArithOp::Mul => b.ins().imul(x, y),
        ArithOp::Div => int_div(b, ty, x, y),
    };
    if null_check {
        let any = either_null(b, ty, x, y);
        let null = null_const(b, ty);
        b.ins().select(any, null, raw)
    } else {
        raw
    }
}

/// Wrapping division with a null result for a zero divisor.
///
/// `sdiv` traps on a zero divisor and on `MIN / -1`. Both cases divide by
/// one instead: the first is then replaced by null, and `MIN / 1` is the
/// wrapped quotient of the second.
fn int_div(b: &mut FunctionBuilder<'_>, ty: Type, x: Value, y: Value) -> Value {
    let zero = int_const(b, ty, 0);
    let one = int_const(b, ty, 1);
    let minus_one = int_const(b, ty, -1);
    let min = null_const(b, ty);

    let by_zero = b.ins().icmp(IntCC::Equal, y, zero);
    let x_min = b.ins().icmp(IntCC::Equal, x, min);
    let y_minus_one = b.ins().icmp(IntCC::Equal, y, minus_one);
    let overflow = b.ins().band(x_min, y_minus_one);
    let unsafe_divisor = b.ins().bor(by_zero, overflow);
    let divisor = b.ins().select(unsafe_divisor, one, y);
    let quotient = b.ins().sdiv(x, divisor);
    b.ins().select(by_zero, min, quotient)
}

fn int_cmp(
    b: &mut FunctionBuilder<'_>,
    op: CmpOp,
    ty: Type,
    x: Value,
    y: Value,
    null_check: bool,
) -> Value {
    let cc = match op {
        CmpOp::Eq => IntCC::Equal,
        CmpOp::Ne => IntCC::NotEqual,
        CmpOp::Gt => IntCC::SignedGreaterThan,
        CmpOp::Ge => IntCC::SignedGreaterThanOrEqual,
        CmpOp::Lt => IntCC::SignedLessThan,
        CmpOp::Le => IntCC::SignedLessThanOrEqual,
    };
    let flag = b.ins().icmp(cc, x, y);
    // Equality is bit exact, so null equals null.
    let flag = if null_check && !matches!(op, CmpOp::Eq | CmpOp::Ne) {
        let any = either_null(b, ty, x, y);
        let neither = b.ins().bxor_imm(any, 1);
        b.ins().band(flag, neither)
    } else {
        flag
    };
    boolean(b, flag)
}

fn float_arith(b: &mut FunctionBuilder<'_>, op: ArithOp, x: Value, y: Value) -> Value {
    match op {
        ArithOp::Add => b.ins().fadd(x, y),
        ArithOp::Sub => b.ins().fsub(x, y),
        ArithOp::Mul => b.ins().fmul(x, y),
        ArithOp::Div => b.ins().fdiv(x, y),
    }
}

/// Tolerant equality as an `i8` flag: both NaN, exactly equal, or closer
/// than the lane's epsilon.
fn float_eq_epsilon(b: &mut FunctionBuilder<'_>, lane: Lane, x: Value, y: Value) -> Value {
    let x_nan = b.ins().fcmp(FloatCC::Unordered, x, x);
    let y_nan = b.ins().fcmp(FloatCC::Unordered, y, y);
    let both_nan = b.ins().band(x_nan, y_nan);
    let exact = b.ins().fcmp(FloatCC::Equal, x, y);
    let diff = b.ins().fsub(x, y);
    let distance = b.ins().fabs(diff);
    let epsilon = if lane == Lane::F32 {
        b.ins().f32const(FLOAT_EPSILON)
    } else {
        b.ins().f64const(DOUBLE_EPSILON)
    };
    let close = b.ins().fcmp(FloatCC::LessThan, distance, epsilon);
    let same = b.ins().bor(exact, close);
    b.ins().bor(both_nan, same)
}

fn convert(
    b: &mut FunctionBuilder<'_>,
    from: Lane,
    to: Lane,
    x: Value,
    null_check: bool,
) -> Result<Value> {
    let converted = match (from, to) {
        (Lane::I32, Lane::I64) => b.ins().sextend(types::I64, x),
        (Lane::I32 | Lane::I64, Lane::F32) => b.ins().fcvt_from_sint(types::F32, x),
        (Lane::I32 | Lane::I64, Lane::F64) => b.ins().fcvt_from_sint(types::F64, x),
        (Lane::F32, Lane::F64) => return Ok(b.ins().fpromote(types::F64, x)),
        _ => return Err(Error::backend(format!("no conversion from {from:?} to {to:?}"))),
    };
    if !null_check {
        return Ok(converted);
    }
    let from_ty = clif_type(from.class());
    let null_in = is_null(b, from_ty, x);
    let null_out = match to {
        Lane::I64 => int_const(b, types::I64, LONG_NULL),
        Lane::F32 => b.ins().f32const(FLOAT_NULL),
        _ => b.ins().f64const(DOUBLE_NULL),
    };
    Ok(b.ins().select(null_in, null_out, converted))
}

/// Emits `primitive` applied to `args` and returns the result value.
///
/// # Errors
/// Returns `Backend` for a primitive/argument combination the library does
/// not provide.
pub(crate) fn primitive(
    b: &mut FunctionBuilder<'_>,
    primitive: Primitive,
    args: &[Value],
) -> Result<Value> {
    let value = match (primitive, args) {
        (Primitive::Not, &[x]) => {
            let inverted = b.ins().bnot(x);
            b.ins().band_imm(inverted, 1)
        }
        (Primitive::And, &[x, y]) => b.ins().band(x, y),
        (Primitive::Or, &[x, y]) => b.ins().bor(x, y),

        // The null sentinel is its own wrapping negation.
        (Primitive::Neg { lane: Lane::I32 | Lane::I64, .. }, &[x]) => b.ins().ineg(x),
        (Primitive::Neg { lane: Lane::F32 | Lane::F64, .. }, &[x]) => b.ins().fneg(x),

        (Primitive::Arith { op, lane: lane @ (Lane::I32 | Lane::I64), null_check }, &[x, y]) => {
            int_arith(b, op, clif_type(lane.class()), x, y, null_check)
        }
        (Primitive::Arith { op, lane: Lane::F32 | Lane::F64, .. }, &[x, y]) => {
            float_arith(b, op, x, y)
        }

        (Primitive::Compare { op, lane: lane @ (Lane::I32 | Lane::I64), null_check }, &[x, y]) => {
            int_cmp(b, op, clif_type(lane.class()), x, y, null_check)
        }
        (Primitive::Compare { op: op @ (CmpOp::Eq | CmpOp::Ne), lane: Lane::I128, .. }, &[x, y]) => {
            int_cmp(b, op, types::I128, x, y, false)
        }
        (
            Primitive::Compare {
                op: op @ (CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le),
                lane: Lane::F32 | Lane::F64,
                ..
            },
            &[x, y],
        ) => {
            let cc = match op {
                CmpOp::Gt => FloatCC::GreaterThan,
                CmpOp::Ge => FloatCC::GreaterThanOrEqual,
                CmpOp::Lt => FloatCC::LessThan,
                _ => FloatCC::LessThanOrEqual,
            };
            let flag = b.ins().fcmp(cc, x, y);
            boolean(b, flag)
        }

        (Primitive::EqEpsilon { lane: lane @ (Lane::F32 | Lane::F64) }, &[x, y]) => {
            let flag = float_eq_epsilon(b, lane, x, y);
            boolean(b, flag)
        }
        (Primitive::NeEpsilon { lane: lane @ (Lane::F32 | Lane::F64) }, &[x, y]) => {
            let flag = float_eq_epsilon(b, lane, x, y);
            let flag = b.ins().bxor_imm(flag, 1);
            boolean(b, flag)
        }

        (Primitive::Convert { from, to, null_check }, &[x]) => convert(b, from, to, x, null_check)?,

        _ => {
            return Err(Error::backend(format!(
                "no lowering for {primitive} with {} arguments",
                args.len()
            )));
        }
    };
    Ok(value)
}
