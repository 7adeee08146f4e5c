//! Type-directed dispatch to the primitive library.
//!
//! Binary operators first load both operands into registers, then widen
//! them to their common type, then pick the primitive by the operand lane.
//! Comparisons always produce a 32-bit boolean.

use filterjit_backend::{ArithOp, CmpOp, Emitter, Lane, Primitive, Reg};
use filterjit_foundation::{DataType, Error, ErrorKind, Result, promote};

use crate::materialize::{load_register, load_registers};
use crate::opcode::Opcode;
use crate::value::JitValue;

/// Widens two register operands to their common type.
///
/// Conversions skip the null check when the source is an 8- or 16-bit
/// integer, since those types have no null sentinel. Operands that already
/// share a type are returned unchanged.
///
/// # Errors
/// Returns `UnsupportedOperation` if the types have no common type, and
/// `Internal` if an operand that needs converting is not in a register.
pub fn convert<E: Emitter>(
    e: &mut E,
    lhs: JitValue,
    rhs: JitValue,
    null_check: bool,
) -> Result<(JitValue, JitValue)> {
    let target = promote(lhs.dtype(), rhs.dtype())
        .ok_or_else(|| Error::unsupported(format!("mixing with {}", rhs.dtype()), lhs.dtype()))?;
    let lhs = widen(e, lhs, target, null_check)?;
    let rhs = widen(e, rhs, target, null_check)?;
    Ok((lhs, rhs))
}

fn widen<E: Emitter>(
    e: &mut E,
    value: JitValue,
    target: DataType,
    null_check: bool,
) -> Result<JitValue> {
    if value.dtype() == target {
        return Ok(value);
    }
    let (Some(from), Some(to)) = (Lane::of(value.dtype()), Lane::of(target)) else {
        return Err(Error::unsupported(format!("convert to {target}"), value.dtype()));
    };
    if from == to {
        return Ok(value.with_dtype(target));
    }
    let primitive = Primitive::Convert {
        from,
        to,
        null_check: null_check && !value.dtype().is_narrow(),
    };
    let reg = e.call(primitive, &[value.reg()?])?;
    Ok(JitValue::register(reg, target, value.kind()))
}

fn common_lane(op: &str, lhs: &JitValue, rhs: &JitValue) -> Result<Lane> {
    match (Lane::of(lhs.dtype()), Lane::of(rhs.dtype())) {
        (Some(l), Some(r)) if l == r => Ok(l),
        _ => Err(Error::unsupported(op, lhs.dtype())),
    }
}

/// Arithmetic negation.
///
/// # Errors
/// Returns `UnsupportedOperation` for `i128` and header operands.
pub fn neg<E: Emitter>(e: &mut E, value: JitValue, null_check: bool) -> Result<JitValue> {
    let lane = Lane::of(value.dtype())
        .filter(|lane| *lane != Lane::I128)
        .ok_or_else(|| Error::unsupported("Neg", value.dtype()))?;
    let reg = e.call(Primitive::Neg { lane, null_check }, &[value.reg()?])?;
    Ok(JitValue::register(reg, value.dtype(), value.kind()))
}

/// Logical not of a boolean.
///
/// # Errors
/// Returns `UnsupportedOperation` unless the operand is a 32-bit class
/// integer.
pub fn not<E: Emitter>(e: &mut E, value: JitValue) -> Result<JitValue> {
    if !value.dtype().is_int32_class() {
        return Err(Error::unsupported("Not", value.dtype()));
    }
    let reg = e.call(Primitive::Not, &[value.reg()?])?;
    Ok(JitValue::register(reg, DataType::I32, value.kind()))
}

fn logical<E: Emitter>(
    e: &mut E,
    primitive: Primitive,
    lhs: JitValue,
    rhs: JitValue,
) -> Result<JitValue> {
    for side in [&lhs, &rhs] {
        if !side.dtype().is_int32_class() {
            return Err(Error::unsupported(primitive.name(), side.dtype()));
        }
    }
    let reg = e.call(primitive, &[lhs.reg()?, rhs.reg()?])?;
    Ok(JitValue::register(reg, DataType::I32, lhs.kind().combine(rhs.kind())))
}

/// Bitwise and of two booleans.
///
/// # Errors
/// Returns `UnsupportedOperation` unless both operands are 32-bit class
/// integers.
pub fn and<E: Emitter>(e: &mut E, lhs: JitValue, rhs: JitValue) -> Result<JitValue> {
    logical(e, Primitive::And, lhs, rhs)
}

/// Bitwise or of two booleans.
///
/// # Errors
/// Returns `UnsupportedOperation` unless both operands are 32-bit class
/// integers.
pub fn or<E: Emitter>(e: &mut E, lhs: JitValue, rhs: JitValue) -> Result<JitValue> {
    logical(e, Primitive::Or, lhs, rhs)
}

/// Comparison of two operands of a common type.
///
/// Floats compare with a tolerance: `eq`/`ne` use the epsilon primitives,
/// `gt`/`lt` require the operands to be not tolerantly equal and strictly
/// ordered, `ge`/`le` accept tolerant equality or the strict ordering.
///
/// # Errors
/// Returns `UnsupportedOperation` for orderings on `i128` and for operands
/// in different lanes.
pub fn cmp<E: Emitter>(
    e: &mut E,
    op: CmpOp,
    lhs: JitValue,
    rhs: JitValue,
    null_check: bool,
) -> Result<JitValue> {
    let name = format!("{op:?}");
    let lane = common_lane(&name, &lhs, &rhs)?;
    let (l, r) = (lhs.reg()?, rhs.reg()?);
    let reg = match lane {
        Lane::I32 | Lane::I64 => e.call(Primitive::Compare { op, lane, null_check }, &[l, r])?,
        Lane::I128 if matches!(op, CmpOp::Eq | CmpOp::Ne) => {
            e.call(Primitive::Compare { op, lane, null_check }, &[l, r])?
        }
        Lane::I128 => return Err(Error::unsupported(name, lhs.dtype())),
        Lane::F32 | Lane::F64 => float_cmp(e, op, lane, l, r, null_check)?,
    };
    Ok(JitValue::register(reg, DataType::I32, lhs.kind().combine(rhs.kind())))
}

fn copy<E: Emitter>(e: &mut E, reg: Reg) -> Result<Reg> {
    let fresh = e.new_reg(reg.class(), "copy");
    e.mov(fresh, reg.into())?;
    Ok(fresh)
}

fn float_cmp<E: Emitter>(
    e: &mut E,
    op: CmpOp,
    lane: Lane,
    l: Reg,
    r: Reg,
    null_check: bool,
) -> Result<Reg> {
    match op {
        CmpOp::Eq => e.call(Primitive::EqEpsilon { lane }, &[l, r]),
        CmpOp::Ne => e.call(Primitive::NeEpsilon { lane }, &[l, r]),
        CmpOp::Gt | CmpOp::Lt | CmpOp::Ge | CmpOp::Le => {
            let (l2, r2) = (copy(e, l)?, copy(e, r)?);
            let strict = matches!(op, CmpOp::Gt | CmpOp::Lt);
            let tolerant = if strict {
                e.call(Primitive::NeEpsilon { lane }, &[l, r])?
            } else {
                e.call(Primitive::EqEpsilon { lane }, &[l, r])?
            };
            let ordered = e.call(Primitive::Compare { op, lane, null_check }, &[l2, r2])?;
            let join = if strict { Primitive::And } else { Primitive::Or };
            e.call(join, &[tolerant, ordered])
        }
    }
}

/// Arithmetic on two operands of a common type. The result keeps that
/// type.
///
/// # Errors
/// Returns `UnsupportedOperation` for `i128` and for operands in different
/// lanes.
pub fn arith<E: Emitter>(
    e: &mut E,
    op: ArithOp,
    lhs: JitValue,
    rhs: JitValue,
    null_check: bool,
) -> Result<JitValue> {
    let name = format!("{op:?}");
    let lane = common_lane(&name, &lhs, &rhs)?;
    if lane == Lane::I128 {
        return Err(Error::unsupported(name, lhs.dtype()));
    }
    let reg = e.call(
        Primitive::Arith {
            op,
            lane,
            null_check,
        },
        &[lhs.reg()?, rhs.reg()?],
    )?;
    Ok(JitValue::register(reg, lhs.dtype(), lhs.kind().combine(rhs.kind())))
}

/// Emits a unary operator.
///
/// # Errors
/// See [`neg`] and [`not`]; `Internal` for a non-unary opcode.
pub fn unary<E: Emitter>(
    e: &mut E,
    opcode: Opcode,
    value: JitValue,
    null_check: bool,
) -> Result<JitValue> {
    let value = load_register(e, value, value.dtype())?;
    match opcode {
        Opcode::Neg => neg(e, value, null_check),
        Opcode::Not => not(e, value),
        other => Err(not_an_operator(other, "unary")),
    }
}

/// Emits a binary operator: materialize, widen, dispatch.
///
/// # Errors
/// See [`convert`], [`cmp`] and [`arith`]; `Internal` for a non-binary
/// opcode.
pub fn binary<E: Emitter>(
    e: &mut E,
    opcode: Opcode,
    lhs: JitValue,
    rhs: JitValue,
    null_check: bool,
) -> Result<JitValue> {
    let (lhs, rhs) = load_registers(e, lhs, rhs)?;
    let (lhs, rhs) = convert(e, lhs, rhs, null_check)?;
    match opcode {
        Opcode::And => and(e, lhs, rhs),
        Opcode::Or => or(e, lhs, rhs),
        Opcode::Eq => cmp(e, CmpOp::Eq, lhs, rhs, null_check),
        Opcode::Ne => cmp(e, CmpOp::Ne, lhs, rhs, null_check),
        Opcode::Lt => cmp(e, CmpOp::Lt, lhs, rhs, null_check),
        Opcode::Le => cmp(e, CmpOp::Le, lhs, rhs, null_check),
        Opcode::Gt => cmp(e, CmpOp::Gt, lhs, rhs, null_check),
        Opcode::Ge => cmp(e, CmpOp::Ge, lhs, rhs, null_check),
        Opcode::Add => arith(e, ArithOp::Add, lhs, rhs, null_check),
        Opcode::Sub => arith(e, ArithOp::Sub, lhs, rhs, null_check),
        Opcode::Mul => arith(e, ArithOp::Mul, lhs, rhs, null_check),
        Opcode::Div => arith(e, ArithOp::Div, lhs, rhs, null_check),
        other => Err(not_an_operator(other, "binary")),
    }
}

fn not_an_operator(opcode: Opcode, expected: &str) -> Error {
    Error::new(ErrorKind::Internal(format!(
        "{opcode} is not a {expected} operator"
    )))
}
