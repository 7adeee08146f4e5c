//! Moving operands into registers.

use filterjit_backend::{Emitter, Imm, Mem, Reg, RegClass};
use filterjit_foundation::{DataKind, DataType, Error, Result};

use crate::value::{JitValue, Storage};

/// Returns true if `value` is representable as `i32`.
#[must_use]
pub fn is_int32(value: i64) -> bool {
    i32::try_from(value).is_ok()
}

/// Returns true if `value` lies within the finite `f32` range.
#[must_use]
pub fn fits_f32(value: f64) -> bool {
    value.abs() <= f64::from(f32::MAX)
}

/// Places `value` in a register.
///
/// Registers are returned unchanged. Memory operands are loaded according
/// to their own type. Immediates are shaped by `dst`, the type of the
/// operation they feed.
///
/// # Errors
/// Returns `UnsupportedOperation` for operands no register class can hold,
/// and propagates backend errors.
pub fn load_register<E: Emitter>(e: &mut E, value: JitValue, dst: DataType) -> Result<JitValue> {
    match value.storage() {
        Storage::Reg(_) => Ok(value),
        Storage::Mem(mem) => mem_to_reg(e, mem, value.dtype(), value.kind()),
        Storage::Imm(imm) => imm_to_reg(e, imm, dst, value.kind()),
    }
}

/// Places both operands of a binary operation in registers.
///
/// When exactly one side is an immediate it takes the other side's type, so
/// `col_i16 + 1` stays in the 32-bit lane and `col_f64 > 3` compares
/// against a double constant.
///
/// # Errors
/// See [`load_register`].
pub fn load_registers<E: Emitter>(
    e: &mut E,
    lhs: JitValue,
    rhs: JitValue,
) -> Result<(JitValue, JitValue)> {
    let lt = if lhs.is_immediate() && !rhs.is_immediate() {
        rhs.dtype()
    } else {
        lhs.dtype()
    };
    let rt = if rhs.is_immediate() && !lhs.is_immediate() {
        lhs.dtype()
    } else {
        rhs.dtype()
    };
    let lhs = load_register(e, lhs, lt)?;
    let rhs = load_register(e, rhs, rt)?;
    Ok((lhs, rhs))
}

fn mem_to_reg<E: Emitter>(e: &mut E, mem: Mem, dtype: DataType, kind: DataKind) -> Result<JitValue> {
    let reg = match dtype {
        DataType::I8 | DataType::I16 => {
            let r = e.new_reg(RegClass::Gp32, dtype.name());
            e.movsx(r, mem)?;
            r
        }
        DataType::I32 => load(e, RegClass::Gp32, mem, dtype)?,
        DataType::I64 => load(e, RegClass::Gp64, mem, dtype)?,
        DataType::I128 => load(e, RegClass::V128, mem, dtype)?,
        DataType::F32 => load(e, RegClass::F32, mem, dtype)?,
        DataType::F64 => load(e, RegClass::F64, mem, dtype)?,
        _ => return Err(Error::unsupported("load", dtype)),
    };
    Ok(JitValue::register(reg, dtype, kind))
}

fn load<E: Emitter>(e: &mut E, class: RegClass, mem: Mem, dtype: DataType) -> Result<Reg> {
    let r = e.new_reg(class, dtype.name());
    e.mov(r, mem.into())?;
    Ok(r)
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn imm_to_reg<E: Emitter>(e: &mut E, imm: Imm, dst: DataType, kind: DataKind) -> Result<JitValue> {
    match imm {
        Imm::Int(value) if dst.is_float() => {
            let (class, constant) = if dst == DataType::F32 {
                (RegClass::F32, e.new_f32_const(value as f32)?)
            } else {
                (RegClass::F64, e.new_f64_const(value as f64)?)
            };
            let r = e.new_reg(class, "imm");
            e.mov(r, constant.into())?;
            Ok(JitValue::register(r, dst, kind))
        }
        Imm::Int(value) if dst.is_integer() => {
            if dst == DataType::I64 || !is_int32(value) {
                let r = e.new_reg(RegClass::Gp64, "imm");
                e.mov(r, imm.into())?;
                Ok(JitValue::register(r, DataType::I64, kind))
            } else {
                let r = e.new_reg(RegClass::Gp32, "imm");
                e.mov(r, imm.into())?;
                Ok(JitValue::register(r, dst, kind))
            }
        }
        Imm::Int(_) => Err(Error::unsupported("load immediate", dst)),
        Imm::Float(value) => {
            if dst == DataType::I64 || dst == DataType::F64 || !fits_f32(value) {
                let r = e.new_reg(RegClass::F64, "imm");
                let constant = e.new_f64_const(value)?;
                e.mov(r, constant.into())?;
                Ok(JitValue::register(r, DataType::F64, kind))
            } else {
                let r = e.new_reg(RegClass::F32, "imm");
                let constant = e.new_f32_const(value as f32)?;
                e.mov(r, constant.into())?;
                Ok(JitValue::register(r, DataType::F32, kind))
            }
        }
    }
}
