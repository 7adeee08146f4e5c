//! A backend that emits native code through Cranelift.
//!
//! Every call is first validated and recorded by an inner
//! [`RegisterMachine`], which keeps the listing and the reference program,
//! and then lowered straight into Cranelift IR:
//!
//! - virtual registers become frontend [`Variable`]s, so values merging at
//!   a label need no explicit phis;
//! - labels become blocks, forward jumps become `brif`;
//! - the constant pool becomes a read-only data object;
//! - primitive calls are expanded inline (see [`crate::lower`]).
//!
//! Memory loads are bounds checked in the generated code. Address registers
//! carry the length of the region they point into; a failing check leaves
//! through a shared fault block that reports the offending access.

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{
    Block, BlockArg, Endianness, GlobalValue, InstBuilder, MemFlags, Type, Value, types,
};
use cranelift_frontend::{FunctionBuilder, Variable};
use filterjit_foundation::{Error, Result};
use filterjit_storage::Region;
use tracing::trace;

use crate::emitter::Emitter;
use crate::ir::{AluOp, Base, FrameRegs, Imm, Label, Mem, Operand, Reg, RegClass};
use crate::lower::{self, clif_type, int_const};
use crate::machine::RegisterMachine;
use crate::primitive::Primitive;
use crate::program::Program;

/// Byte size of a region descriptor: a pointer and a length.
const SPAN_SIZE: i64 = 16;

/// Flags for loads and stores of row data. Bounds are checked before every
/// access, but nothing guarantees alignment.
fn data_flags() -> MemFlags {
    MemFlags::new()
        .with_notrap()
        .with_endianness(Endianness::Little)
}

/// What a register holds, fixed by its first write.
#[derive(Clone, Copy, Debug)]
enum Shape {
    /// A plain value of the register's class.
    Value,
    /// The start of `region`, `len` bytes long.
    Address { len: Variable, region: Region },
    /// A base address table with `count` entries.
    Table { count: Variable, region: Region },
}

/// The emitted function body, ready to be linked.
#[derive(Debug)]
pub struct NativeBody {
    pub(crate) program: Program,
    pub(crate) sites: Vec<Region>,
}

/// Lowers emitted code into a Cranelift function.
///
/// Obtained from [`JitContext::emitter`]; finish it with
/// [`NativeEmitter::finish`] and hand the body to [`JitContext::link`].
///
/// [`JitContext::emitter`]: crate::JitContext::emitter
/// [`JitContext::link`]: crate::JitContext::link
pub struct NativeEmitter<'a> {
    machine: RegisterMachine,
    builder: FunctionBuilder<'a>,
    pool: GlobalValue,
    out: Value,
    vars: Vec<Option<Variable>>,
    shapes: Vec<Option<Shape>>,
    blocks: Vec<Block>,
    fault: Option<Block>,
    sites: Vec<Region>,
}

/// Entry values of the routine's parameters.
pub(crate) struct EntryValues {
    pub(crate) data_entries: Value,
    pub(crate) data_count: Value,
    pub(crate) aux_entries: Value,
    pub(crate) aux_count: Value,
    pub(crate) vars: Value,
    pub(crate) vars_len: Value,
    pub(crate) row: Value,
    pub(crate) out: Value,
}

impl<'a> NativeEmitter<'a> {
    /// Wraps a builder positioned in the entry block, after the parameters
    /// were unpacked into `entry`.
    pub(crate) fn new(
        builder: FunctionBuilder<'a>,
        pool: GlobalValue,
        entry: &EntryValues,
        name_registers: bool,
    ) -> Self {
        let machine = RegisterMachine::new().with_register_names(name_registers);
        let frame = machine.frame();
        let mut emitter = Self {
            machine,
            builder,
            pool,
            out: entry.out,
            vars: Vec::new(),
            shapes: Vec::new(),
            blocks: Vec::new(),
            fault: None,
            sites: Vec::new(),
        };
        emitter.define_table(
            frame.data_ptr,
            entry.data_entries,
            entry.data_count,
            Region::DataTable,
        );
        emitter.define_table(
            frame.aux_ptr,
            entry.aux_entries,
            entry.aux_count,
            Region::AuxTable,
        );
        emitter.define_address(frame.vars_ptr, entry.vars, entry.vars_len, Region::Vars);
        let row = emitter.var(frame.row_index);
        emitter.builder.def_var(row, entry.row);
        emitter.set_shape(frame.row_index, Shape::Value);
        emitter
    }

    /// Finishes the function body.
    ///
    /// # Errors
    /// Returns `Backend` if no return was emitted or a label was never
    /// bound.
    pub fn finish(self) -> Result<NativeBody> {
        let Self {
            machine,
            mut builder,
            out,
            fault,
            sites,
            ..
        } = self;
        let program = machine.finish()?;

        if let Some(fault) = fault {
            builder.switch_to_block(fault);
            let params = builder.block_params(fault).to_vec();
            builder.ins().store(data_flags(), params[1], out, 0);
            builder.ins().store(data_flags(), params[2], out, 8);
            builder.ins().return_(&[params[0]]);
        }
        builder.seal_all_blocks();
        builder.finalize();
        trace!(sites = sites.len(), "lowered routine");
        Ok(NativeBody { program, sites })
    }

    fn var(&mut self, reg: Reg) -> Variable {
        let id = reg.id() as usize;
        if self.vars.len() <= id {
            self.vars.resize(id + 1, None);
        }
        if let Some(var) = self.vars[id] {
            return var;
        }
        let var = self.builder.declare_var(clif_type(reg.class()));
        self.vars[id] = Some(var);
        var
    }

    fn shape(&self, reg: Reg) -> Option<Shape> {
        self.shapes.get(reg.id() as usize).copied().flatten()
    }

    fn set_shape(&mut self, reg: Reg, shape: Shape) {
        let id = reg.id() as usize;
        if self.shapes.len() <= id {
            self.shapes.resize(id + 1, None);
        }
        self.shapes[id] = Some(shape);
    }

    fn define_table(&mut self, reg: Reg, entries: Value, count: Value, region: Region) {
        let var = self.var(reg);
        self.builder.def_var(var, entries);
        let count_var = self.builder.declare_var(types::I64);
        self.builder.def_var(count_var, count);
        self.set_shape(reg, Shape::Table { count: count_var, region });
    }

    fn define_address(&mut self, reg: Reg, ptr: Value, len: Value, region: Region) {
        let var = self.var(reg);
        self.builder.def_var(var, ptr);
        let len_var = self.builder.declare_var(types::I64);
        self.builder.def_var(len_var, len);
        self.set_shape(reg, Shape::Address { len: len_var, region });
    }

    /// Reads a register holding a plain value.
    fn read_value(&mut self, reg: Reg) -> Result<Value> {
        match self.shape(reg) {
            Some(Shape::Value) => {
                let var = self.var(reg);
                Ok(self.builder.use_var(var))
            }
            Some(_) => Err(Error::backend(format!("{reg} holds an address"))),
            None => Err(Error::backend(format!("{reg} read before written"))),
        }
    }

    fn write_value(&mut self, reg: Reg, value: Value) -> Result<()> {
        match self.shape(reg) {
            None | Some(Shape::Value) => {
                self.set_shape(reg, Shape::Value);
                let var = self.var(reg);
                self.builder.def_var(var, value);
                Ok(())
            }
            Some(_) => Err(Error::backend(format!("{reg} already holds an address"))),
        }
    }

    fn write_address(&mut self, reg: Reg, ptr: Value, len: Value, region: Region) -> Result<()> {
        match self.shape(reg) {
            None => {
                self.define_address(reg, ptr, len, region);
                Ok(())
            }
            Some(Shape::Address { len: len_var, region: held }) if held == region => {
                let var = self.var(reg);
                self.builder.def_var(var, ptr);
                self.builder.def_var(len_var, len);
                Ok(())
            }
            Some(_) => Err(Error::backend(format!(
                "{reg} cannot also point into the {region}"
            ))),
        }
    }

    /// Converts between the two general purpose classes.
    fn retype(&mut self, value: Value, from: RegClass, to: RegClass) -> Value {
        match (from, to) {
            (RegClass::Gp32, RegClass::Gp64) => self.builder.ins().sextend(types::I64, value),
            (RegClass::Gp64, RegClass::Gp32) => self.builder.ins().ireduce(types::I32, value),
            _ => value,
        }
    }

    fn fault_block(&mut self) -> Block {
        if let Some(block) = self.fault {
            return block;
        }
        let block = self.builder.create_block();
        self.builder.append_block_param(block, types::I32);
        self.builder.append_block_param(block, types::I64);
        self.builder.append_block_param(block, types::I64);
        self.fault = Some(block);
        block
    }

    /// Continues only if `size` bytes at `offset` lie within `len`.
    fn bounds_check(&mut self, offset: Value, len: Value, size: u8, region: Region) -> Result<()> {
        self.sites.push(region);
        let site = i64::try_from(self.sites.len())
            .map_err(|_| Error::backend("too many memory accesses"))?;
        let size = i64::from(size);

        let b = &mut self.builder;
        let room = b.ins().icmp_imm(IntCC::UnsignedGreaterThanOrEqual, len, size);
        let limit = b.ins().iadd_imm(len, -size);
        let inside = b.ins().icmp(IntCC::UnsignedLessThanOrEqual, offset, limit);
        let ok = b.ins().band(room, inside);
        let site = int_const(b, types::I32, site);

        let fault = self.fault_block();
        let next = self.builder.create_block();
        self.builder.ins().brif(
            ok,
            next,
            &[],
            fault,
            &[BlockArg::Value(site), BlockArg::Value(offset), BlockArg::Value(len)],
        );
        self.builder.switch_to_block(next);
        self.builder.seal_block(next);
        Ok(())
    }

    /// Effective address of `mem` after its bounds check.
    fn address(&mut self, mem: &Mem) -> Result<Value> {
        let base = match mem.base {
            Base::ConstPool => return self.pool_address(mem),
            Base::Reg(base) => base,
        };
        let (len, region) = match self.shape(base) {
            Some(Shape::Address { len, region }) => (len, region),
            _ => return Err(Error::backend(format!("{base} does not hold an address"))),
        };

        let mut offset = self.builder.ins().iconst(types::I64, mem.disp);
        if let Some(index) = mem.index {
            let value = self.read_value(index)?;
            let value = self.retype(value, index.class(), RegClass::Gp64);
            let scaled = self.builder.ins().ishl_imm(value, i64::from(mem.shift));
            offset = self.builder.ins().iadd(scaled, offset);
        }
        let len = self.builder.use_var(len);
        self.bounds_check(offset, len, mem.size, region)?;

        let var = self.var(base);
        let start = self.builder.use_var(var);
        Ok(self.builder.ins().iadd(start, offset))
    }

    /// Constant pool entries are known while emitting, so they are checked
    /// here rather than at run time.
    fn pool_address(&mut self, mem: &Mem) -> Result<Value> {
        let pool_len = self.machine.pool_len();
        let end = mem
            .disp
            .checked_add(i64::from(mem.size))
            .and_then(|end| usize::try_from(end).ok());
        let in_pool = mem.index.is_none() && mem.disp >= 0 && end.is_some_and(|end| end <= pool_len);
        if !in_pool {
            return Err(Error::backend(format!("{mem} lies outside the constant pool")));
        }
        let pool = self.builder.ins().symbol_value(types::I64, self.pool);
        Ok(self.builder.ins().iadd_imm(pool, mem.disp))
    }

    /// `dst = table[column]`: the column's base address and length.
    fn load_table_entry(&mut self, dst: Reg, table: Reg, mem: &Mem) -> Result<()> {
        let Some(Shape::Table { count, region }) = self.shape(table) else {
            return Err(Error::backend(format!("{table} is not a base address table")));
        };
        let column = u32::try_from(mem.disp / 8)
            .ok()
            .filter(|_| mem.index.is_none() && mem.disp % 8 == 0 && dst.class() == RegClass::Gp64)
            .ok_or_else(|| Error::backend(format!("cannot load {mem} into {dst}")))?;

        let offset = self.builder.ins().iconst(types::I64, mem.disp);
        let count = self.builder.use_var(count);
        let len = self.builder.ins().ishl_imm(count, 3);
        self.bounds_check(offset, len, 8, region)?;

        let var = self.var(table);
        let entries = self.builder.use_var(var);
        let entry = self
            .builder
            .ins()
            .iadd_imm(entries, SPAN_SIZE * i64::from(column));
        let ptr = self.builder.ins().load(types::I64, MemFlags::trusted(), entry, 0);
        let size = self.builder.ins().load(types::I64, MemFlags::trusted(), entry, 8);
        let column_region = if region == Region::DataTable {
            Region::Data(column)
        } else {
            Region::Aux(column)
        };
        self.write_address(dst, ptr, size, column_region)
    }

    fn constant(&mut self, class: RegClass, imm: Imm) -> Result<Value> {
        let value = match (class, imm) {
            (RegClass::Gp32 | RegClass::Gp64, Imm::Int(v)) => {
                int_const(&mut self.builder, clif_type(class), v)
            }
            (RegClass::F32, Imm::Float(v)) => {
                #[allow(clippy::cast_possible_truncation)]
                let single = v as f32;
                self.builder.ins().f32const(single)
            }
            (RegClass::F64, Imm::Float(v)) => self.builder.ins().f64const(v),
            _ => return Err(Error::backend(format!("cannot materialize {imm} as {}", class.name()))),
        };
        Ok(value)
    }
}

fn narrow_type(size: u8) -> Type {
    match size {
        1 => types::I8,
        2 => types::I16,
        4 => types::I32,
        _ => types::I64,
    }
}

impl Emitter for NativeEmitter<'_> {
    fn frame(&self) -> FrameRegs {
        self.machine.frame()
    }

    fn new_reg(&mut self, class: RegClass, name: &str) -> Reg {
        let reg = self.machine.new_reg(class, name);
        self.var(reg);
        reg
    }

    fn new_label(&mut self) -> Label {
        let label = self.machine.new_label();
        self.blocks.push(self.builder.create_block());
        label
    }

    fn bind(&mut self, label: Label) -> Result<()> {
        self.machine.bind(label)?;
        let block = self.blocks[label.0 as usize];
        self.builder.ins().jump(block, &[]);
        self.builder.switch_to_block(block);
        // Jumps only go forward, so every predecessor is known by now.
        self.builder.seal_block(block);
        Ok(())
    }

    fn new_const(&mut self, bytes: &[u8]) -> Result<Mem> {
        self.machine.new_const(bytes)
    }

    fn mov(&mut self, dst: Reg, src: Operand) -> Result<()> {
        self.machine.mov(dst, src)?;
        match src {
            Operand::Reg(r) => match self.shape(r) {
                Some(Shape::Address { len, region }) => {
                    if dst.class() != RegClass::Gp64 {
                        return Err(Error::backend(format!("cannot narrow address {r}")));
                    }
                    let var = self.var(r);
                    let ptr = self.builder.use_var(var);
                    let len = self.builder.use_var(len);
                    self.write_address(dst, ptr, len, region)
                }
                Some(Shape::Table { .. }) => {
                    Err(Error::backend(format!("cannot copy the table in {r}")))
                }
                _ => {
                    let value = self.read_value(r)?;
                    let value = self.retype(value, r.class(), dst.class());
                    self.write_value(dst, value)
                }
            },
            Operand::Mem(mem) => {
                if let Base::Reg(base) = mem.base {
                    if matches!(self.shape(base), Some(Shape::Table { .. })) {
                        return self.load_table_entry(dst, base, &mem);
                    }
                }
                let addr = self.address(&mem)?;
                let value = self
                    .builder
                    .ins()
                    .load(clif_type(dst.class()), data_flags(), addr, 0);
                self.write_value(dst, value)
            }
            Operand::Imm(imm) => {
                let value = self.constant(dst.class(), imm)?;
                self.write_value(dst, value)
            }
        }
    }

    fn movsx(&mut self, dst: Reg, src: Mem) -> Result<()> {
        self.machine.movsx(dst, src)?;
        let addr = self.address(&src)?;
        let narrow = narrow_type(src.size);
        let wide = clif_type(dst.class());
        let loaded = self.builder.ins().load(narrow, data_flags(), addr, 0);
        let value = if narrow == wide {
            loaded
        } else {
            self.builder.ins().sextend(wide, loaded)
        };
        self.write_value(dst, value)
    }

    fn alu(&mut self, op: AluOp, dst: Reg, src: Operand) -> Result<()> {
        self.machine.alu(op, dst, src)?;
        let ty = clif_type(dst.class());
        let lhs = self.read_value(dst)?;
        let out = match (op, src) {
            (AluOp::Shl, Operand::Imm(Imm::Int(amount))) => {
                let amount = amount & 63;
                if amount >= i64::from(ty.bits()) {
                    int_const(&mut self.builder, ty, 0)
                } else {
                    self.builder.ins().ishl_imm(lhs, amount)
                }
            }
            (AluOp::Add | AluOp::Sub, src) => {
                let rhs = match src {
                    Operand::Reg(r) => {
                        let value = self.read_value(r)?;
                        self.retype(value, r.class(), dst.class())
                    }
                    Operand::Imm(Imm::Int(v)) => int_const(&mut self.builder, ty, v),
                    other => return Err(Error::backend(format!("bad source {other} for {op}"))),
                };
                if op == AluOp::Add {
                    self.builder.ins().iadd(lhs, rhs)
                } else {
                    self.builder.ins().isub(lhs, rhs)
                }
            }
            (_, other) => return Err(Error::backend(format!("bad source {other} for {op}"))),
        };
        self.write_value(dst, out)
    }

    fn jump_if_nonzero(&mut self, reg: Reg, target: Label) -> Result<()> {
        self.machine.jump_if_nonzero(reg, target)?;
        let cond = self.read_value(reg)?;
        let block = self.blocks[target.0 as usize];
        let next = self.builder.create_block();
        self.builder.ins().brif(cond, block, &[], next, &[]);
        self.builder.switch_to_block(next);
        self.builder.seal_block(next);
        Ok(())
    }

    fn call(&mut self, primitive: Primitive, args: &[Reg]) -> Result<Reg> {
        let dst = self.machine.call(primitive, args)?;
        let values = args
            .iter()
            .map(|&arg| self.read_value(arg))
            .collect::<Result<Vec<_>>>()?;
        let value = lower::primitive(&mut self.builder, primitive, &values)?;
        self.write_value(dst, value)?;
        Ok(dst)
    }

    fn ret(&mut self, value: Reg) -> Result<()> {
        self.machine.ret(value)?;
        let result = self.read_value(value)?;
        self.builder.ins().store(data_flags(), result, self.out, 0);
        let ok = self.builder.ins().iconst(types::I32, 0);
        self.builder.ins().return_(&[ok]);
        // Anything emitted before the next bind is unreachable.
        let rest = self.builder.create_block();
        self.builder.switch_to_block(rest);
        self.builder.seal_block(rest);
        Ok(())
    }
}
