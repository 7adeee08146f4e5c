//! Integration tests for the instruction walker
//!
//! Tests stack discipline, terminal opcodes and error reporting.

use filterjit_backend::{RegisterMachine, Scalar};
use filterjit_compiler::{CompileOptions, FilterCompiler, InstructionStream, Opcode, compile};
use filterjit_foundation::{DataKind, DataType, ErrorKind};
use filterjit_storage::{RowFrame, Table};

fn options() -> CompileOptions {
    CompileOptions::default()
}

#[test]
fn constant_expression_is_const() {
    let stream = InstructionStream::new()
        .imm_i64(5)
        .imm_i64(3)
        .op(Opcode::Add)
        .ret();
    let filter = compile(stream.as_slice(), &options()).unwrap();
    assert_eq!(filter.result_type(), DataType::I64);
    assert_eq!(filter.result_kind(), DataKind::Const);
    assert_eq!(filter.evaluate(&RowFrame::default(), 0).unwrap(), Scalar::I64(8));
}

#[test]
fn column_operand_makes_result_memory() {
    let mut table = Table::new();
    table.add_fixed(&[40i64]).unwrap();
    let stream = InstructionStream::new()
        .mem(DataType::I64, 0)
        .imm_i64(3)
        .op(Opcode::Add)
        .ret();
    let filter = compile(stream.as_slice(), &options()).unwrap();
    assert_eq!(filter.result_kind(), DataKind::Memory);
    assert_eq!(filter.evaluate(&table.frame(), 0).unwrap(), Scalar::I64(43));
}

#[test]
fn nested_expression() {
    // (a - 2) * (b + 1) / 3 with a = 11, b = 2
    let mut table = Table::new();
    table.add_fixed(&[11i32]).unwrap();
    table.variables_mut().set_i64(0, 2);
    let stream = InstructionStream::new()
        .mem(DataType::I32, 0)
        .imm_i32(2)
        .op(Opcode::Sub)
        .var(DataType::I64, 0)
        .imm_i32(1)
        .op(Opcode::Add)
        .op(Opcode::Mul)
        .imm_i32(3)
        .op(Opcode::Div)
        .ret();
    let filter = compile(stream.as_slice(), &options()).unwrap();
    assert_eq!(filter.result_type(), DataType::I64);
    assert_eq!(filter.evaluate(&table.frame(), 0).unwrap(), Scalar::I64(9));
}

#[test]
fn binary_opcode_on_empty_stack_underflows() {
    let stream = InstructionStream::new().op(Opcode::Mul);
    let err = compile(stream.as_slice(), &options()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::StackUnderflow { position: 0 }));
}

#[test]
fn extra_values_are_malformed() {
    let stream = InstructionStream::new().imm_i32(1).imm_i32(2);
    let err = compile(stream.as_slice(), &options()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MalformedStream(_)));
}

#[test]
fn inv_stops_with_an_error() {
    let stream = InstructionStream::new()
        .imm_i32(1)
        .op(Opcode::Inv)
        .op(Opcode::Neg);
    let err = compile(stream.as_slice(), &options()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidInstruction { .. }));
    assert_eq!(err.context.unwrap().opcode.as_deref(), Some("Inv"));
}

#[test]
fn instructions_after_ret_are_ignored() {
    let stream = InstructionStream::new()
        .imm_i32(4)
        .ret()
        .op(Opcode::Inv);
    let filter = compile(stream.as_slice(), &options()).unwrap();
    assert_eq!(filter.evaluate(&RowFrame::default(), 0).unwrap(), Scalar::I32(4));
}

#[test]
fn unknown_type_codes_are_invalid() {
    let stream = InstructionStream::new().mem(DataType::I32, 0).ret();
    let mut bytes = stream.to_bytes();
    bytes[4..8].copy_from_slice(&42i32.to_le_bytes());
    let err = filterjit_compiler::compile_bytes(&bytes, &options()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidInstruction { .. }));
}

#[test]
fn walker_is_generic_over_the_emitter() {
    let mut compiler = FilterCompiler::new(RegisterMachine::new(), options());
    let stream = InstructionStream::new().imm_f32(1.5).op(Opcode::Neg);
    let value = compiler.compile(stream.as_slice()).unwrap();
    assert_eq!(value.dtype(), DataType::F32);
    let machine = compiler.into_emitter();
    assert!(!machine.is_empty());
    let program = machine.finish().unwrap();
    assert!(program.register_count() > 4);
    assert_eq!(program.run(&RowFrame::default(), 0).unwrap(), Scalar::F32(-1.5));
}
