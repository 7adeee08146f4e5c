//! Turning leaf instructions into operands.
//!
//! Row storage is reached through the four frame registers. Column `c` has
//! its data vector base at `data_ptr[c]` and its aux vector base at
//! `aux_ptr[c]`; both tables hold 8-byte entries.
//!
//! Variable-length columns (string and binary) store `N + 1` offsets in the
//! aux vector and length-prefixed values in the data vector. The length of
//! a value is normally derived from two neighbouring offsets alone. Only a
//! derived length of zero is ambiguous: the value is empty or null, and the
//! header word in the data vector tells which.

use filterjit_backend::{AluOp, Emitter, FrameRegs, Imm, Mem, Reg, RegClass};
use filterjit_foundation::{DataKind, DataType, Error, Result};

use crate::opcode::Instruction;
use crate::value::JitValue;

/// Width of a base address table entry and of a variable slot.
const SLOT: i64 = 8;

fn width_u8(dtype: DataType) -> u8 {
    1 << dtype.shift()
}

/// Operand for scalar variable `index`: `vars + 8 * index`.
///
/// Narrow types read the low bytes of the slot.
///
/// # Errors
/// Returns `UnsupportedOperation` for header types.
pub fn read_variable(frame: FrameRegs, dtype: DataType, index: u32) -> Result<JitValue> {
    if dtype.is_header() {
        return Err(Error::unsupported("Var", dtype));
    }
    let mem = Mem::at(frame.vars_ptr, SLOT * i64::from(index), width_u8(dtype));
    Ok(JitValue::memory(mem, dtype, DataKind::Memory))
}

/// Operand for column `column` at the current row.
///
/// # Errors
/// Propagates backend errors.
pub fn read_column<E: Emitter>(e: &mut E, dtype: DataType, column: u32) -> Result<JitValue> {
    match dtype {
        DataType::StringHeader => read_varsize_length(e, column, 4),
        DataType::BinaryHeader => read_varsize_length(e, column, 8),
        DataType::VarcharHeader => read_varchar_header(e, column),
        _ => read_fixed(e, dtype, column),
    }
}

fn table_entry(table: Reg, column: u32) -> Mem {
    Mem::at(table, SLOT * i64::from(column), 8)
}

fn read_fixed<E: Emitter>(e: &mut E, dtype: DataType, column: u32) -> Result<JitValue> {
    let frame = e.frame();
    let base = e.new_reg(RegClass::Gp64, &format!("col{column}_data"));
    e.mov(base, table_entry(frame.data_ptr, column).into())?;

    let width = width_u8(dtype);
    let mem = if width <= 8 {
        Mem::indexed(base, frame.row_index, dtype.shift(), 0, width)
    } else {
        // Addressing modes scale by at most 8.
        let offset = e.new_reg(RegClass::Gp64, "row_offset");
        e.mov(offset, frame.row_index.into())?;
        e.alu(AluOp::Shl, offset, Imm::Int(i64::from(dtype.shift())).into())?;
        Mem::indexed(base, offset, 0, 0, width)
    };
    Ok(JitValue::memory(mem, dtype, DataKind::Memory))
}

fn read_varsize_length<E: Emitter>(e: &mut E, column: u32, header_size: u8) -> Result<JitValue> {
    let frame = e.frame();
    let offsets = e.new_reg(RegClass::Gp64, &format!("col{column}_offsets"));
    e.mov(offsets, table_entry(frame.aux_ptr, column).into())?;

    let offset = e.new_reg(RegClass::Gp64, "offset");
    e.mov(offset, Mem::indexed(offsets, frame.row_index, 3, 0, 8).into())?;
    let length = e.new_reg(RegClass::Gp64, "length");
    e.mov(length, Mem::indexed(offsets, frame.row_index, 3, SLOT, 8).into())?;
    e.alu(AluOp::Sub, length, offset.into())?;
    e.alu(AluOp::Sub, length, Imm::Int(i64::from(header_size)).into())?;

    let done = e.new_label();
    e.jump_if_nonzero(length, done)?;

    // Empty or null: the stored header decides.
    let data = e.new_reg(RegClass::Gp64, &format!("col{column}_data"));
    e.mov(data, table_entry(frame.data_ptr, column).into())?;
    let header = Mem::indexed(data, offset, 0, 0, header_size);
    if header_size == 4 {
        e.movsx(length, header)?;
    } else {
        e.mov(length, header.into())?;
    }
    e.bind(done)?;

    if header_size == 4 {
        let length32 = e.new_reg(RegClass::Gp32, "length32");
        e.mov(length32, length.into())?;
        Ok(JitValue::register(length32, DataType::I32, DataKind::Memory))
    } else {
        Ok(JitValue::register(length, DataType::I64, DataKind::Memory))
    }
}

fn read_varchar_header<E: Emitter>(e: &mut E, column: u32) -> Result<JitValue> {
    let frame = e.frame();
    let aux = e.new_reg(RegClass::Gp64, &format!("col{column}_aux"));
    e.mov(aux, table_entry(frame.aux_ptr, column).into())?;
    let offset = e.new_reg(RegClass::Gp64, "slot_offset");
    e.mov(offset, frame.row_index.into())?;
    e.alu(AluOp::Shl, offset, Imm::Int(4).into())?;
    Ok(JitValue::memory(
        Mem::indexed(aux, offset, 0, 0, 8),
        DataType::I64,
        DataKind::Memory,
    ))
}

/// Operand for an `Imm` instruction.
///
/// Integers and floats stay immediates. A 128-bit literal is placed in the
/// constant pool and addressed there.
///
/// # Errors
/// Returns `UnsupportedOperation` for header types, `InvalidInstruction`
/// for a payload of the wrong shape, and propagates backend errors.
pub fn read_immediate<E: Emitter>(e: &mut E, instruction: &Instruction) -> Result<JitValue> {
    let dtype = instruction.data_type()?;
    match dtype {
        DataType::I8 | DataType::I16 | DataType::I32 | DataType::I64 => Ok(JitValue::immediate(
            Imm::Int(instruction.int_value()?),
            dtype,
            DataKind::Const,
        )),
        DataType::F32 | DataType::F64 => Ok(JitValue::immediate(
            Imm::Float(instruction.float_value()),
            dtype,
            DataKind::Const,
        )),
        DataType::I128 => {
            let mem = e.new_i128_const(instruction.i128_value()?)?;
            Ok(JitValue::memory(mem, dtype, DataKind::Const))
        }
        _ => Err(Error::unsupported("Imm", dtype)),
    }
}
