//! Single-pass filter compiler for filterjit.
//!
//! Translates postfix filter instruction streams into code on any
//! [`filterjit_backend::Emitter`]. This crate provides:
//! - [`Opcode`], [`Instruction`], [`InstructionStream`] - The instruction
//!   stream and its packed wire format ([`decode`], [`encode`])
//! - [`JitValue`] - Operands on the evaluation stack
//! - [`addressing`] - Variables, columns and literals as operands
//! - [`materialize`] - Moving operands into registers
//! - [`dispatch`] - Conversion and per-type primitive selection
//! - [`FilterCompiler`] - The instruction walker
//! - [`compile`] and [`CompiledFilter`] - The end-to-end entry point
//! - [`CompileOptions`] - Compilation settings

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod addressing;
mod compiler;
mod config;
pub mod dispatch;
mod filter;
pub mod materialize;
mod opcode;
mod value;

pub use compiler::FilterCompiler;
pub use config::CompileOptions;
pub use filter::{CompiledFilter, compile, compile_bytes};
pub use opcode::{Instruction, InstructionStream, Opcode, Payload, RECORD_SIZE, decode, encode};
pub use value::{JitValue, Storage};
