//! The instruction walker.
//!
//! One pass over the postfix stream with an operand stack. Leaves push
//! operands, operators pop theirs and push the result; nothing is ever
//! revisited.

use filterjit_backend::Emitter;
use filterjit_foundation::{Error, ErrorContext, Limit, Result};
use tracing::trace;

use crate::addressing::{read_column, read_immediate, read_variable};
use crate::config::CompileOptions;
use crate::dispatch;
use crate::materialize::load_register;
use crate::opcode::{Instruction, Opcode};
use crate::value::JitValue;

/// Translates instruction streams into code on an [`Emitter`].
pub struct FilterCompiler<E: Emitter> {
    emitter: E,
    options: CompileOptions,
    /// Evaluation stack.
    stack: Vec<JitValue>,
}

impl<E: Emitter> FilterCompiler<E> {
    /// Creates a compiler emitting into `emitter`.
    pub fn new(emitter: E, options: CompileOptions) -> Self {
        Self {
            emitter,
            options,
            stack: Vec::new(),
        }
    }

    /// The options in use.
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Gives the emitter back.
    pub fn into_emitter(self) -> E {
        self.emitter
    }

    /// Translates `instructions` and emits the return of their result.
    ///
    /// The walk stops at the first `Ret` or at the end of the stream, and
    /// exactly one value must be left on the stack at that point. The
    /// returned operand describes that value, already in a register.
    ///
    /// # Errors
    /// Returns `InvalidInstruction` for `Inv` or a bad payload,
    /// `StackUnderflow` when an operator lacks operands,
    /// `UnsupportedOperation` for type combinations without a primitive,
    /// `LimitExceeded` when the stack grows past the configured depth and
    /// `MalformedStream` when the walk does not end with one value. Errors
    /// raised while translating an instruction carry its position.
    pub fn compile(&mut self, instructions: &[Instruction]) -> Result<JitValue> {
        self.stack.clear();
        for (position, instruction) in instructions.iter().enumerate() {
            trace!(position, %instruction, depth = self.stack.len(), "translate");
            match self.step(position, instruction) {
                Ok(true) => break,
                Ok(false) => {}
                Err(err) => return Err(with_position(err, position, instruction.opcode)),
            }
        }
        self.finish()
    }

    /// Translates one instruction. Returns true at a terminal opcode.
    fn step(&mut self, position: usize, instruction: &Instruction) -> Result<bool> {
        let null_check = self.options.null_check;
        let value = match instruction.opcode {
            Opcode::Ret => return Ok(true),
            Opcode::Inv => {
                return Err(Error::invalid_instruction(Some(position), "reserved opcode"));
            }
            Opcode::Var => read_variable(
                self.emitter.frame(),
                instruction.data_type()?,
                instruction.index()?,
            )?,
            Opcode::Mem => read_column(
                &mut self.emitter,
                instruction.data_type()?,
                instruction.index()?,
            )?,
            Opcode::Imm => read_immediate(&mut self.emitter, instruction)?,
            op @ (Opcode::Neg | Opcode::Not) => {
                let operand = self.pop(position)?;
                dispatch::unary(&mut self.emitter, op, operand, null_check)?
            }
            op => {
                let rhs = self.pop(position)?;
                let lhs = self.pop(position)?;
                dispatch::binary(&mut self.emitter, op, lhs, rhs, null_check)?
            }
        };
        self.push(value)?;
        Ok(false)
    }

    fn finish(&mut self) -> Result<JitValue> {
        let value = match self.stack.as_slice() {
            [value] => *value,
            [] => return Err(Error::malformed("no value to return")),
            values => {
                return Err(Error::malformed(format!(
                    "{} values left on the stack",
                    values.len()
                )));
            }
        };
        self.stack.clear();
        let value = load_register(&mut self.emitter, value, value.dtype())?;
        self.emitter.ret(value.reg()?)?;
        Ok(value)
    }

    fn push(&mut self, value: JitValue) -> Result<()> {
        if self.stack.len() >= self.options.max_stack_depth {
            return Err(Error::limit_exceeded(Limit::StackDepth {
                limit: self.options.max_stack_depth,
            }));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self, position: usize) -> Result<JitValue> {
        self.stack
            .pop()
            .ok_or_else(|| Error::stack_underflow(position))
    }
}

fn with_position(err: Error, position: usize, opcode: Opcode) -> Error {
    if err.context.is_some() {
        return err;
    }
    err.with_context(
        ErrorContext::new()
            .with_position(position)
            .with_opcode(opcode.name()),
    )
}
