//! The backend interface.

use filterjit_foundation::Result;

use crate::ir::{AluOp, FrameRegs, Label, Mem, Operand, Reg, RegClass};
use crate::primitive::Primitive;

/// Sink for the code of one compiled filter.
///
/// A routine takes four arguments, exposed through [`Emitter::frame`], and
/// returns one value. Control flow is limited to forward conditional jumps.
///
/// A primitive may write its result into the register of its first
/// argument. Callers that still need that argument afterwards must copy it
/// first.
pub trait Emitter {
    /// Registers holding the routine's arguments.
    fn frame(&self) -> FrameRegs;

    /// Allocates a virtual register. `name` is a debugging hint.
    fn new_reg(&mut self, class: RegClass, name: &str) -> Reg;

    /// Allocates an unbound label.
    fn new_label(&mut self) -> Label;

    /// Binds `label` to the current position.
    ///
    /// # Errors
    /// Fails if the label is unknown or already bound.
    fn bind(&mut self, label: Label) -> Result<()>;

    /// Places `bytes` in the constant pool and returns a memory operand of
    /// the same width addressing it.
    ///
    /// # Errors
    /// Fails for widths other than 1, 2, 4, 8 or 16 bytes.
    fn new_const(&mut self, bytes: &[u8]) -> Result<Mem>;

    /// Places an `f32` in the constant pool.
    ///
    /// # Errors
    /// See [`Emitter::new_const`].
    fn new_f32_const(&mut self, value: f32) -> Result<Mem> {
        self.new_const(&value.to_le_bytes())
    }

    /// Places an `f64` in the constant pool.
    ///
    /// # Errors
    /// See [`Emitter::new_const`].
    fn new_f64_const(&mut self, value: f64) -> Result<Mem> {
        self.new_const(&value.to_le_bytes())
    }

    /// Places a 128-bit value in the constant pool.
    ///
    /// # Errors
    /// See [`Emitter::new_const`].
    fn new_i128_const(&mut self, value: i128) -> Result<Mem> {
        self.new_const(&value.to_le_bytes())
    }

    /// Copies `src` into `dst`. Memory sources must be exactly as wide as
    /// `dst`'s class. Between the two general purpose classes the value is
    /// truncated or sign-extended.
    ///
    /// # Errors
    /// Fails if `src` cannot be moved into a register of `dst`'s class.
    fn mov(&mut self, dst: Reg, src: Operand) -> Result<()>;

    /// Loads a 1, 2, 4 or 8 byte integer into a general purpose register,
    /// sign-extending it.
    ///
    /// # Errors
    /// Fails for non general purpose `dst` or an unsupported width.
    fn movsx(&mut self, dst: Reg, src: Mem) -> Result<()>;

    /// Integer arithmetic `dst = dst op src` on a general purpose register.
    ///
    /// # Errors
    /// Fails for non general purpose operands or memory sources.
    fn alu(&mut self, op: AluOp, dst: Reg, src: Operand) -> Result<()>;

    /// Jumps forward to `target` if `reg` is non-zero.
    ///
    /// # Errors
    /// Fails if `reg` is not general purpose or `target` is unknown.
    fn jump_if_nonzero(&mut self, reg: Reg, target: Label) -> Result<()>;

    /// Calls a primitive and returns the register holding its result.
    ///
    /// # Errors
    /// Fails if the primitive does not exist or `args` do not match its
    /// signature.
    fn call(&mut self, primitive: Primitive, args: &[Reg]) -> Result<Reg>;

    /// Returns `value` from the routine.
    ///
    /// # Errors
    /// Fails if a return was already emitted.
    fn ret(&mut self, value: Reg) -> Result<()>;
}
