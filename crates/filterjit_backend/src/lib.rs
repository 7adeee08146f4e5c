//! Code emission for filterjit.
//!
//! The compiler core talks to its backend only through the [`Emitter`]
//! trait: typed virtual registers, labels, a constant pool, moves, address
//! arithmetic and calls into the null-aware [`Primitive`] library. This
//! crate provides:
//! - [`Emitter`] - The backend interface the compiler is generic over
//! - [`JitContext`] and [`NativeEmitter`] - The Cranelift backend, which
//!   lowers emitted code to a native [`NativeRoutine`]
//! - [`RegisterMachine`] - A portable backend recording a virtual-register
//!   program
//! - [`Program`] - The finalized, immutable register program, interpreted
//!   per row with every access bounds checked
//! - [`Primitive`] and [`primitives`] - The null-aware primitive library
//! - [`Scalar`] - A typed register value

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod emitter;
mod ir;
mod jit;
mod lower;
mod machine;
mod native;
mod primitive;
pub mod primitives;
mod program;
mod scalar;

pub use emitter::Emitter;
pub use ir::{AluOp, Base, FrameRegs, Imm, Label, Mem, Operand, Reg, RegClass};
pub use jit::{JitContext, NativeFrame, NativeRoutine};
pub use machine::RegisterMachine;
pub use native::{NativeBody, NativeEmitter};
pub use primitive::{ArithOp, CmpOp, Lane, Primitive};
pub use program::Program;
pub use scalar::Scalar;
