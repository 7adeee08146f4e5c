//! Finalized register-machine routines.

use std::fmt;

use filterjit_foundation::{Error, Result};
use filterjit_storage::{Region, RowFrame};
use tracing::{instrument, trace};

use crate::ir::{AluOp, Base, FrameRegs, Imm, Label, Mem, Operand, Reg, RegClass};
use crate::primitive::Primitive;
use crate::scalar::Scalar;

/// One recorded operation.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Op {
    Mov { dst: Reg, src: Operand },
    Movsx { dst: Reg, src: Mem },
    Alu { op: AluOp, dst: Reg, src: Operand },
    JumpIfNonZero { reg: Reg, target: Label },
    Call { primitive: Primitive, args: Vec<Reg>, dst: Reg },
    Ret { value: Reg },
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mov { dst, src } => write!(f, "mov {dst}, {src}"),
            Self::Movsx { dst, src } => write!(f, "movsx {dst}, {src}"),
            Self::Alu { op, dst, src } => write!(f, "{op} {dst}, {src}"),
            Self::JumpIfNonZero { reg, target } => write!(f, "jnz {reg}, {target}"),
            Self::Call {
                primitive,
                args,
                dst,
            } => {
                write!(f, "call {primitive} {dst} <- (")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Self::Ret { value } => write!(f, "ret {value}"),
        }
    }
}

/// Where an address points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Space {
    Frame(Region),
    Const,
}

/// Contents of a register while a routine runs.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Slot {
    Empty,
    Int(i64),
    Addr(Space, i64),
    F32(f32),
    F64(f64),
    V128(i128),
}

impl From<Scalar> for Slot {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::I32(v) => Self::Int(i64::from(v)),
            Scalar::I64(v) => Self::Int(v),
            Scalar::I128(v) => Self::V128(v),
            Scalar::F32(v) => Self::F32(v),
            Scalar::F64(v) => Self::F64(v),
        }
    }
}

/// Keeps a `Gp32` register in `i32` range.
fn narrow(class: RegClass, value: i64) -> i64 {
    if class == RegClass::Gp32 {
        #[allow(clippy::cast_possible_truncation)]
        let low = value as i32;
        i64::from(low)
    } else {
        value
    }
}

/// An immutable routine produced by [`RegisterMachine::finish`].
///
/// Running it never mutates the program, so one `Program` can serve any
/// number of threads.
///
/// [`RegisterMachine::finish`]: crate::RegisterMachine::finish
#[derive(Clone, Debug)]
pub struct Program {
    pub(crate) ops: Vec<Op>,
    pub(crate) labels: Vec<usize>,
    pub(crate) pool: Vec<u8>,
    pub(crate) regs: Vec<(RegClass, String)>,
    pub(crate) frame: FrameRegs,
    pub(crate) result: RegClass,
}

impl Program {
    /// Class of the returned register.
    #[must_use]
    pub fn result_class(&self) -> RegClass {
        self.result
    }

    /// Number of recorded operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if no operations were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of virtual registers, including the four frame registers.
    #[must_use]
    pub fn register_count(&self) -> usize {
        self.regs.len()
    }

    /// The constant pool.
    #[must_use]
    pub fn constant_pool(&self) -> &[u8] {
        &self.pool
    }

    /// Number of calls into the primitive library.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, Op::Call { .. }))
            .count()
    }

    /// Evaluates the routine for `row`.
    ///
    /// # Errors
    /// Returns `OutOfBounds` if the routine addresses memory outside
    /// `frame`, or `Backend` if a register holds a value of the wrong shape.
    #[instrument(name = "backend::program::run", level = "trace", skip(self, frame))]
    pub fn run(&self, frame: &RowFrame<'_>, row: i64) -> Result<Scalar> {
        let mut slots = vec![Slot::Empty; self.regs.len()];
        slots[self.frame.data_ptr.id() as usize] = Slot::Addr(Space::Frame(Region::DataTable), 0);
        slots[self.frame.aux_ptr.id() as usize] = Slot::Addr(Space::Frame(Region::AuxTable), 0);
        slots[self.frame.vars_ptr.id() as usize] = Slot::Addr(Space::Frame(Region::Vars), 0);
        slots[self.frame.row_index.id() as usize] = Slot::Int(row);

        let mut pc = 0;
        while let Some(op) = self.ops.get(pc) {
            pc += 1;
            trace!(%op, "step");
            match op {
                Op::Mov { dst, src } => {
                    let value = match src {
                        Operand::Reg(r) => match slots[r.id() as usize] {
                            Slot::Int(v) => Slot::Int(narrow(dst.class(), v)),
                            other => other,
                        },
                        Operand::Mem(mem) => self.load(&slots, frame, dst.class(), mem)?,
                        Operand::Imm(Imm::Int(v)) => Slot::Int(narrow(dst.class(), *v)),
                        Operand::Imm(Imm::Float(v)) if dst.class() == RegClass::F32 => {
                            #[allow(clippy::cast_possible_truncation)]
                            let single = *v as f32;
                            Slot::F32(single)
                        }
                        Operand::Imm(Imm::Float(v)) => Slot::F64(*v),
                    };
                    slots[dst.id() as usize] = value;
                }
                Op::Movsx { dst, src } => {
                    let (space, offset) = self.address(&slots, src)?;
                    let raw = self.fetch(frame, space, offset, src.size)?;
                    let value = match src.size {
                        1 => i64::from(i8::from_le_bytes([raw[0]])),
                        2 => i64::from(i16::from_le_bytes([raw[0], raw[1]])),
                        4 => i64::from(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
                        _ => i64::from_le_bytes(first8(&raw)),
                    };
                    slots[dst.id() as usize] = Slot::Int(narrow(dst.class(), value));
                }
                Op::Alu { op, dst, src } => {
                    let rhs = match src {
                        Operand::Reg(r) => slots[r.id() as usize],
                        Operand::Imm(Imm::Int(v)) => Slot::Int(*v),
                        other => return Err(Error::backend(format!("bad alu source {other}"))),
                    };
                    let lhs = slots[dst.id() as usize];
                    slots[dst.id() as usize] = alu(*op, dst.class(), lhs, rhs)?;
                }
                Op::JumpIfNonZero { reg, target } => {
                    if slots[reg.id() as usize] != Slot::Int(0) {
                        pc = self.labels[target.0 as usize];
                    }
                }
                Op::Call {
                    primitive,
                    args,
                    dst,
                } => {
                    let values = args
                        .iter()
                        .map(|r| scalar(slots[r.id() as usize], *r))
                        .collect::<Result<Vec<_>>>()?;
                    let out = primitive.eval(&values)?;
                    slots[dst.id() as usize] = Slot::from(out);
                }
                Op::Ret { value } => return scalar(slots[value.id() as usize], *value),
            }
        }
        Err(Error::backend("routine ended without returning"))
    }

    fn address(&self, slots: &[Slot], mem: &Mem) -> Result<(Space, i64)> {
        let (space, base) = match mem.base {
            Base::ConstPool => (Space::Const, 0),
            Base::Reg(r) => match slots[r.id() as usize] {
                Slot::Addr(space, offset) => (space, offset),
                _ => return Err(Error::backend(format!("{r} does not hold an address"))),
            },
        };
        let index = match mem.index {
            None => 0,
            Some(r) => match slots[r.id() as usize] {
                Slot::Int(v) => v.wrapping_shl(u32::from(mem.shift)),
                _ => return Err(Error::backend(format!("{r} does not hold an index"))),
            },
        };
        Ok((space, base.wrapping_add(index).wrapping_add(mem.disp)))
    }

    fn fetch(&self, frame: &RowFrame<'_>, space: Space, offset: i64, size: u8) -> Result<[u8; 16]> {
        let size = usize::from(size);
        let bytes = match space {
            Space::Frame(region) => frame.read(region, offset, size)?,
            Space::Const => usize::try_from(offset)
                .ok()
                .and_then(|start| self.pool.get(start..start.checked_add(size)?))
                .ok_or_else(|| Error::out_of_bounds("constant pool", offset, self.pool.len()))?,
        };
        let mut raw = [0u8; 16];
        raw[..size].copy_from_slice(bytes);
        Ok(raw)
    }

    fn load(&self, slots: &[Slot], frame: &RowFrame<'_>, class: RegClass, mem: &Mem) -> Result<Slot> {
        let (space, offset) = self.address(slots, mem)?;
        if let Space::Frame(table @ (Region::DataTable | Region::AuxTable)) = space {
            let column = frame.table_entry(table, offset)?;
            return Ok(Slot::Addr(Space::Frame(column), 0));
        }
        let raw = self.fetch(frame, space, offset, mem.size)?;
        let low4 = [raw[0], raw[1], raw[2], raw[3]];
        Ok(match class {
            RegClass::Gp32 => Slot::Int(i64::from(i32::from_le_bytes(low4))),
            RegClass::Gp64 => Slot::Int(i64::from_le_bytes(first8(&raw))),
            RegClass::F32 => Slot::F32(f32::from_le_bytes(low4)),
            RegClass::F64 => Slot::F64(f64::from_le_bytes(first8(&raw))),
            RegClass::V128 => Slot::V128(i128::from_le_bytes(raw)),
        })
    }
}

fn first8(raw: &[u8; 16]) -> [u8; 8] {
    [raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7]]
}

fn alu(op: AluOp, class: RegClass, lhs: Slot, rhs: Slot) -> Result<Slot> {
    let out = match (op, lhs, rhs) {
        (AluOp::Add, Slot::Int(a), Slot::Int(b)) => Slot::Int(narrow(class, a.wrapping_add(b))),
        (AluOp::Sub, Slot::Int(a), Slot::Int(b)) => Slot::Int(narrow(class, a.wrapping_sub(b))),
        (AluOp::Shl, Slot::Int(a), Slot::Int(b)) => {
            let amount = u32::try_from(b & 63).unwrap_or_default();
            Slot::Int(narrow(class, a.wrapping_shl(amount)))
        }
        (AluOp::Add, Slot::Addr(space, a), Slot::Int(b))
        | (AluOp::Add, Slot::Int(b), Slot::Addr(space, a)) => Slot::Addr(space, a.wrapping_add(b)),
        (AluOp::Sub, Slot::Addr(space, a), Slot::Int(b)) => Slot::Addr(space, a.wrapping_sub(b)),
        _ => {
            return Err(Error::backend(format!(
                "{op} is undefined for {lhs:?} and {rhs:?}"
            )));
        }
    };
    Ok(out)
}

fn scalar(slot: Slot, reg: Reg) -> Result<Scalar> {
    match (reg.class(), slot) {
        (RegClass::Gp32, Slot::Int(v)) => {
            #[allow(clippy::cast_possible_truncation)]
            let low = v as i32;
            Ok(Scalar::I32(low))
        }
        (RegClass::Gp64, Slot::Int(v)) => Ok(Scalar::I64(v)),
        (RegClass::F32, Slot::F32(v)) => Ok(Scalar::F32(v)),
        (RegClass::F64, Slot::F64(v)) => Ok(Scalar::F64(v)),
        (RegClass::V128, Slot::V128(v)) => Ok(Scalar::I128(v)),
        (_, Slot::Empty) => Err(Error::backend(format!("{reg} read before written"))),
        _ => Err(Error::backend(format!("{reg} does not hold a value"))),
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "; {} ops, {} registers, {} pool bytes, returns {}",
            self.ops.len(),
            self.regs.len(),
            self.pool.len(),
            self.result.name()
        )?;
        for (id, (class, name)) in self.regs.iter().enumerate() {
            if !name.is_empty() {
                writeln!(f, "; %{id}:{} = {name}", class.name())?;
            }
        }
        for (pc, op) in self.ops.iter().enumerate() {
            for (label, _) in self.labels.iter().enumerate().filter(|(_, at)| **at == pc) {
                writeln!(f, "L{label}:")?;
            }
            writeln!(f, "    {op}")?;
        }
        Ok(())
    }
}
