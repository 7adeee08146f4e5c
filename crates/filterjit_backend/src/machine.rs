//! A portable backend that records a virtual-register program.

use std::collections::HashMap;

use filterjit_foundation::{Error, Result};
use tracing::{debug, trace};

use crate::emitter::Emitter;
use crate::ir::{AluOp, Base, FrameRegs, Imm, Label, Mem, Operand, Reg, RegClass};
use crate::primitive::Primitive;
use crate::program::{Op, Program};

/// Width in bytes of a register class.
fn class_width(class: RegClass) -> u8 {
    match class {
        RegClass::Gp32 | RegClass::F32 => 4,
        RegClass::Gp64 | RegClass::F64 => 8,
        RegClass::V128 => 16,
    }
}

/// Records emitted code and validates it as it goes.
///
/// Every operand is checked against the register classes the machine handed
/// out, so a finished [`Program`] never needs to re-validate shapes when it
/// runs.
///
/// # Example
///
/// ```
/// use filterjit_backend::{Emitter, Imm, RegClass, RegisterMachine, Scalar};
/// use filterjit_storage::RowFrame;
///
/// let mut m = RegisterMachine::new();
/// let r = m.new_reg(RegClass::Gp32, "answer");
/// m.mov(r, Imm::Int(42).into()).unwrap();
/// m.ret(r).unwrap();
/// let program = m.finish().unwrap();
/// assert_eq!(program.run(&RowFrame::default(), 0).unwrap(), Scalar::I32(42));
/// ```
#[derive(Debug)]
pub struct RegisterMachine {
    ops: Vec<Op>,
    labels: Vec<Option<usize>>,
    pool: Vec<u8>,
    pool_index: HashMap<Vec<u8>, i64>,
    regs: Vec<(RegClass, String)>,
    frame: FrameRegs,
    result: Option<RegClass>,
    name_registers: bool,
}

impl Default for RegisterMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterMachine {
    /// Creates a machine with the four frame registers allocated.
    #[must_use]
    pub fn new() -> Self {
        let names = ["data_ptr", "aux_ptr", "vars_ptr", "row_index"];
        let regs: Vec<(RegClass, String)> = names
            .iter()
            .map(|name| (RegClass::Gp64, (*name).to_string()))
            .collect();
        let frame = FrameRegs {
            data_ptr: Reg::new(0, RegClass::Gp64),
            aux_ptr: Reg::new(1, RegClass::Gp64),
            vars_ptr: Reg::new(2, RegClass::Gp64),
            row_index: Reg::new(3, RegClass::Gp64),
        };
        Self {
            ops: Vec::new(),
            labels: Vec::new(),
            pool: Vec::new(),
            pool_index: HashMap::new(),
            regs,
            frame,
            result: None,
            name_registers: true,
        }
    }

    /// Keeps or drops register names in listings.
    #[must_use]
    pub fn with_register_names(mut self, enabled: bool) -> Self {
        self.name_registers = enabled;
        self
    }

    /// Number of operations recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if nothing was recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Bytes in the constant pool so far.
    pub(crate) fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// Finalizes the routine.
    ///
    /// # Errors
    /// Returns `Backend` if no return was emitted or a jump targets a label
    /// that was never bound.
    pub fn finish(self) -> Result<Program> {
        let result = self
            .result
            .ok_or_else(|| Error::backend("routine has no return"))?;
        let labels = self
            .labels
            .iter()
            .enumerate()
            .map(|(id, at)| at.ok_or_else(|| Error::backend(format!("label L{id} never bound"))))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            ops = self.ops.len(),
            registers = self.regs.len(),
            pool = self.pool.len(),
            "finished program"
        );
        Ok(Program {
            ops: self.ops,
            labels,
            pool: self.pool,
            regs: self.regs,
            frame: self.frame,
            result,
        })
    }

    fn push(&mut self, op: Op) -> Result<()> {
        if self.result.is_some() {
            return Err(Error::backend(format!("{op} emitted after return")));
        }
        trace!(%op, "emit");
        self.ops.push(op);
        Ok(())
    }

    fn check_reg(&self, reg: Reg) -> Result<()> {
        match self.regs.get(reg.id() as usize) {
            Some((class, _)) if *class == reg.class() => Ok(()),
            _ => Err(Error::backend(format!("{reg} was not allocated here"))),
        }
    }

    fn check_gp(&self, reg: Reg) -> Result<()> {
        self.check_reg(reg)?;
        if reg.class().is_gp() {
            Ok(())
        } else {
            Err(Error::backend(format!("{reg} is not general purpose")))
        }
    }

    fn check_mem(&self, mem: &Mem) -> Result<()> {
        if let Base::Reg(base) = mem.base {
            self.check_reg(base)?;
            if base.class() != RegClass::Gp64 {
                return Err(Error::backend(format!("{base} cannot hold an address")));
            }
        }
        if let Some(index) = mem.index {
            self.check_gp(index)?;
        }
        if mem.shift > 3 {
            return Err(Error::backend(format!("scale shift {} too large", mem.shift)));
        }
        if !matches!(mem.size, 1 | 2 | 4 | 8 | 16) {
            return Err(Error::backend(format!("bad access width {}", mem.size)));
        }
        Ok(())
    }
}

impl Emitter for RegisterMachine {
    fn frame(&self) -> FrameRegs {
        self.frame
    }

    fn new_reg(&mut self, class: RegClass, name: &str) -> Reg {
        let id = u32::try_from(self.regs.len()).unwrap_or(u32::MAX);
        let name = if self.name_registers {
            name.to_string()
        } else {
            String::new()
        };
        self.regs.push((class, name));
        Reg::new(id, class)
    }

    fn new_label(&mut self) -> Label {
        let id = u32::try_from(self.labels.len()).unwrap_or(u32::MAX);
        self.labels.push(None);
        Label(id)
    }

    fn bind(&mut self, label: Label) -> Result<()> {
        if self.result.is_some() {
            return Err(Error::backend(format!("{label} bound after return")));
        }
        let at = self.ops.len();
        match self.labels.get_mut(label.0 as usize) {
            Some(slot) if slot.is_none() => {
                *slot = Some(at);
                Ok(())
            }
            Some(_) => Err(Error::backend(format!("{label} bound twice"))),
            None => Err(Error::backend(format!("{label} was not allocated here"))),
        }
    }

    fn new_const(&mut self, bytes: &[u8]) -> Result<Mem> {
        let size = u8::try_from(bytes.len())
            .ok()
            .filter(|s| matches!(s, 1 | 2 | 4 | 8 | 16))
            .ok_or_else(|| Error::backend(format!("bad constant width {}", bytes.len())))?;
        if let Some(&offset) = self.pool_index.get(bytes) {
            return Ok(Mem::constant(offset, size));
        }
        let align = bytes.len();
        let padded = self.pool.len().div_ceil(align) * align;
        self.pool.resize(padded, 0);
        let offset = i64::try_from(padded).map_err(|_| Error::backend("constant pool overflow"))?;
        self.pool.extend_from_slice(bytes);
        self.pool_index.insert(bytes.to_vec(), offset);
        Ok(Mem::constant(offset, size))
    }

    fn mov(&mut self, dst: Reg, src: Operand) -> Result<()> {
        self.check_reg(dst)?;
        let class = dst.class();
        match src {
            Operand::Reg(r) => {
                self.check_reg(r)?;
                if r.class() != class && !(r.class().is_gp() && class.is_gp()) {
                    return Err(Error::backend(format!("cannot move {r} into {dst}")));
                }
            }
            Operand::Mem(mem) => {
                self.check_mem(&mem)?;
                if mem.size != class_width(class) {
                    return Err(Error::backend(format!("cannot load {mem} into {dst}")));
                }
            }
            Operand::Imm(Imm::Int(v)) => {
                let fits = match class {
                    RegClass::Gp32 => i32::try_from(v).is_ok(),
                    RegClass::Gp64 => true,
                    _ => false,
                };
                if !fits {
                    return Err(Error::backend(format!("cannot move {v} into {dst}")));
                }
            }
            Operand::Imm(Imm::Float(v)) => {
                if !matches!(class, RegClass::F32 | RegClass::F64) {
                    return Err(Error::backend(format!("cannot move {v:?} into {dst}")));
                }
            }
        }
        self.push(Op::Mov { dst, src })
    }

    fn movsx(&mut self, dst: Reg, src: Mem) -> Result<()> {
        self.check_gp(dst)?;
        self.check_mem(&src)?;
        if src.size > class_width(dst.class()) {
            return Err(Error::backend(format!("cannot sign-extend {src} into {dst}")));
        }
        self.push(Op::Movsx { dst, src })
    }

    fn alu(&mut self, op: AluOp, dst: Reg, src: Operand) -> Result<()> {
        self.check_gp(dst)?;
        match src {
            Operand::Reg(r) if op != AluOp::Shl => self.check_gp(r)?,
            Operand::Imm(Imm::Int(_)) => {}
            other => return Err(Error::backend(format!("bad source {other} for {op}"))),
        }
        self.push(Op::Alu { op, dst, src })
    }

    fn jump_if_nonzero(&mut self, reg: Reg, target: Label) -> Result<()> {
        self.check_gp(reg)?;
        match self.labels.get(target.0 as usize) {
            Some(None) => self.push(Op::JumpIfNonZero { reg, target }),
            Some(Some(_)) => Err(Error::backend(format!("backward jump to {target}"))),
            None => Err(Error::backend(format!("{target} was not allocated here"))),
        }
    }

    fn call(&mut self, primitive: Primitive, args: &[Reg]) -> Result<Reg> {
        let (params, result) = primitive.signature()?;
        if params.len() != args.len() {
            return Err(Error::backend(format!(
                "{primitive} takes {} arguments, got {}",
                params.len(),
                args.len()
            )));
        }
        for (&arg, &param) in args.iter().zip(&params) {
            self.check_reg(arg)?;
            if arg.class() != param {
                return Err(Error::backend(format!(
                    "{primitive} expects {}, got {arg}",
                    param.name()
                )));
            }
        }
        let name = primitive.name();
        let dst = self.new_reg(result, &name);
        self.push(Op::Call {
            primitive,
            args: args.to_vec(),
            dst,
        })?;
        Ok(dst)
    }

    fn ret(&mut self, value: Reg) -> Result<()> {
        self.check_reg(value)?;
        self.push(Op::Ret { value })?;
        self.result = Some(value.class());
        Ok(())
    }
}
