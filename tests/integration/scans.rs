//! Integration tests for table scans
//!
//! Tests realistic predicates over mixed-type tables.

use filterjit::{CompileOptions, compile, compile_bytes};
use filterjit::compiler::{InstructionStream, Opcode};
use filterjit::foundation::DataType;
use filterjit::foundation::sentinel::{DOUBLE_NULL, INT_NULL};
use filterjit::storage::Table;

/// Columns: 0 id i64, 1 qty i32, 2 price f64, 3 name string, 4 tag varchar,
/// 5 flags i8.
fn inventory() -> Table {
    let mut table = Table::new();
    table.add_fixed(&[100i64, 101, 102, 103, 104, 105]).unwrap();
    table.add_fixed(&[3i32, INT_NULL, 12, 0, 7, 40]).unwrap();
    table
        .add_fixed(&[9.99f64, 1.5, DOUBLE_NULL, 20.0, 0.1 + 0.2, 2.0])
        .unwrap();
    table
        .add_string(&[Some("bolt"), Some("nut"), None, Some(""), Some("gear"), Some("cog")])
        .unwrap();
    table
        .add_varchar(&[Some("hw"), None, Some("hw"), Some("misc"), None, Some("a long tag value")])
        .unwrap();
    table.add_fixed(&[1i8, 0, 1, 1, 0, -1]).unwrap();
    table.variables_mut().set_f64(0, 0.3);
    table.variables_mut().set_i32(1, 5);
    table
}

#[test]
fn quantity_above_threshold() {
    let table = inventory();
    let stream = InstructionStream::new()
        .mem(DataType::I32, 1)
        .var(DataType::I32, 1)
        .op(Opcode::Gt)
        .ret();
    let filter = compile(stream.as_slice(), &CompileOptions::default()).unwrap();
    assert_eq!(filter.filter_rows(&table.frame(), 0..6).unwrap(), vec![2, 4, 5]);
}

#[test]
fn price_equals_variable_within_tolerance() {
    let table = inventory();
    let stream = InstructionStream::new()
        .mem(DataType::F64, 2)
        .var(DataType::F64, 0)
        .op(Opcode::Eq)
        .ret();
    let filter = compile(stream.as_slice(), &CompileOptions::default()).unwrap();
    assert_eq!(filter.filter_rows(&table.frame(), 0..6).unwrap(), vec![4]);
}

#[test]
fn total_value_with_nulls() {
    let table = inventory();
    // qty * price >= 20
    let stream = InstructionStream::new()
        .mem(DataType::I32, 1)
        .mem(DataType::F64, 2)
        .op(Opcode::Mul)
        .imm_i32(20)
        .op(Opcode::Ge)
        .ret();
    let filter = compile(stream.as_slice(), &CompileOptions::default()).unwrap();
    assert_eq!(filter.filter_rows(&table.frame(), 0..6).unwrap(), vec![0, 5]);
}

#[test]
fn named_and_tagged() {
    let table = inventory();
    // length(name) > 0 AND tag is not null AND flags != 0
    let stream = InstructionStream::new()
        .mem(DataType::StringHeader, 3)
        .imm_i32(0)
        .op(Opcode::Gt)
        .mem(DataType::VarcharHeader, 4)
        .imm_i64(4)
        .op(Opcode::Ne)
        .op(Opcode::And)
        .mem(DataType::I8, 5)
        .imm_i32(0)
        .op(Opcode::Ne)
        .op(Opcode::And)
        .ret();
    let filter = compile(stream.as_slice(), &CompileOptions::default()).unwrap();
    assert_eq!(filter.filter_rows(&table.frame(), 0..6).unwrap(), vec![0, 5]);
}

#[test]
fn packed_streams_compile_the_same() {
    let table = inventory();
    let stream = InstructionStream::new()
        .mem(DataType::I64, 0)
        .imm_i64(2)
        .op(Opcode::Sub)
        .imm_i64(101)
        .op(Opcode::Le)
        .ret();
    let options = CompileOptions::default().with_register_names(false);
    let direct = compile(stream.as_slice(), &options).unwrap();
    let packed = compile_bytes(&stream.to_bytes(), &options).unwrap();
    let frame = table.frame();
    assert_eq!(
        direct.filter_rows(&frame, 0..6).unwrap(),
        packed.filter_rows(&frame, 0..6).unwrap()
    );
    assert_eq!(direct.filter_rows(&frame, 0..6).unwrap(), vec![0, 1, 2, 3]);
    assert_eq!(direct.to_string(), packed.to_string());
}
