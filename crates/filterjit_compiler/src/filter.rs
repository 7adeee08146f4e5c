//! Compiled filters and the compilation entry points.

use std::fmt;
use std::ops::Range;

use filterjit_backend::{JitContext, NativeFrame, NativeRoutine, Program, Scalar};
use filterjit_foundation::{DataKind, DataType, Result};
use filterjit_storage::RowFrame;
use tracing::{debug, instrument};

use crate::compiler::FilterCompiler;
use crate::config::CompileOptions;
use crate::opcode::{Instruction, decode};

/// A filter predicate compiled to native code.
///
/// Immutable once built. The routine keeps no state between calls, so a
/// filter can be shared across threads and invoked concurrently. The
/// register program it was lowered from stays available as a reference
/// backend and for listings.
#[derive(Clone, Debug)]
pub struct CompiledFilter {
    routine: NativeRoutine,
    program: Program,
    result_type: DataType,
    result_kind: DataKind,
}

impl CompiledFilter {
    /// Type of the value the filter returns.
    #[must_use]
    pub fn result_type(&self) -> DataType {
        self.result_type
    }

    /// `Const` if the result does not depend on the row.
    #[must_use]
    pub fn result_kind(&self) -> DataKind {
        self.result_kind
    }

    /// The register program the routine was lowered from.
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The native routine.
    #[must_use]
    pub fn routine(&self) -> &NativeRoutine {
        &self.routine
    }

    /// Evaluates the filter against row `row` of `frame`.
    ///
    /// # Errors
    /// Returns `OutOfBounds` if the routine addresses memory outside
    /// `frame`.
    pub fn evaluate(&self, frame: &RowFrame<'_>, row: i64) -> Result<Scalar> {
        self.routine.run(&NativeFrame::new(frame), row)
    }

    /// Evaluates the filter as a predicate: non-zero means the row matches.
    ///
    /// # Errors
    /// See [`CompiledFilter::evaluate`].
    pub fn matches(&self, frame: &RowFrame<'_>, row: i64) -> Result<bool> {
        Ok(self.evaluate(frame, row)?.is_truthy())
    }

    /// Returns the rows in `rows` the filter matches, in order.
    ///
    /// # Errors
    /// Stops at the first row that fails to evaluate.
    #[instrument(name = "compiler::filter_rows", level = "debug", skip(self, frame))]
    pub fn filter_rows(&self, frame: &RowFrame<'_>, rows: Range<i64>) -> Result<Vec<i64>> {
        let native = NativeFrame::new(frame);
        let mut matched = Vec::new();
        for row in rows {
            if self.routine.run(&native, row)?.is_truthy() {
                matched.push(row);
            }
        }
        debug!(matched = matched.len(), "scan complete");
        Ok(matched)
    }
}

impl fmt::Display for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; returns {} ({})", self.result_type, self.result_kind)?;
        write!(f, "{}", self.program)
    }
}

/// Compiles an instruction stream into a [`CompiledFilter`].
///
/// # Errors
/// See [`FilterCompiler::compile`]. Backend errors surface as `Backend`.
///
/// # Example
///
/// ```
/// use filterjit_compiler::{CompileOptions, InstructionStream, Opcode, compile};
/// use filterjit_foundation::DataType;
/// use filterjit_storage::Table;
///
/// let mut table = Table::new();
/// table.add_fixed(&[3i64, 8, 12]).unwrap();
///
/// let stream = InstructionStream::new()
///     .mem(DataType::I64, 0)
///     .imm_i64(5)
///     .op(Opcode::Gt)
///     .ret();
/// let filter = compile(stream.as_slice(), &CompileOptions::default()).unwrap();
/// assert_eq!(filter.filter_rows(&table.frame(), 0..3).unwrap(), vec![1, 2]);
/// ```
#[instrument(
    name = "compiler::compile",
    level = "debug",
    skip_all,
    fields(instructions = instructions.len())
)]
pub fn compile(instructions: &[Instruction], options: &CompileOptions) -> Result<CompiledFilter> {
    let mut jit = JitContext::new()?;
    let emitter = jit.emitter(options.name_registers);
    let mut compiler = FilterCompiler::new(emitter, options.clone());
    let result = compiler.compile(instructions)?;
    let body = compiler.into_emitter().finish()?;
    let (program, routine) = jit.link(body)?;
    debug!(
        ops = program.len(),
        registers = program.register_count(),
        calls = program.call_count(),
        result = %result.dtype(),
        "compiled filter"
    );
    Ok(CompiledFilter {
        routine,
        program,
        result_type: result.dtype(),
        result_kind: result.kind(),
    })
}

/// Decodes a packed instruction buffer and compiles it.
///
/// # Errors
/// Returns `InvalidInstruction` for an undecodable buffer, otherwise see
/// [`compile`].
pub fn compile_bytes(bytes: &[u8], options: &CompileOptions) -> Result<CompiledFilter> {
    let instructions = decode(bytes)?;
    compile(&instructions, options)
}
