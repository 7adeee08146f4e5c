//! Integration tests for typed dispatch
//!
//! Tests promotion, tolerant float comparisons, variable-length headers and
//! wide values through complete compilations.

use filterjit_backend::Scalar;
use filterjit_compiler::{CompileOptions, InstructionStream, Opcode, compile};
use filterjit_foundation::sentinel::LONG128_NULL;
use filterjit_foundation::{DataType, ErrorKind};
use filterjit_storage::{RowFrame, Table};
use proptest::prelude::*;

fn eval(stream: &InstructionStream, frame: &RowFrame<'_>, row: i64) -> Scalar {
    compile(stream.as_slice(), &CompileOptions::default())
        .unwrap()
        .evaluate(frame, row)
        .unwrap()
}

/// One row holding `1` in every numeric type, in column order
/// i8, i16, i32, i64, f32, f64.
fn ones() -> Table {
    let mut table = Table::new();
    table.add_fixed(&[1i8]).unwrap();
    table.add_fixed(&[1i16]).unwrap();
    table.add_fixed(&[1i32]).unwrap();
    table.add_fixed(&[1i64]).unwrap();
    table.add_fixed(&[1.0f32]).unwrap();
    table.add_fixed(&[1.0f64]).unwrap();
    table
}

const NUMERIC: [DataType; 6] = [
    DataType::I8,
    DataType::I16,
    DataType::I32,
    DataType::I64,
    DataType::F32,
    DataType::F64,
];

// =============================================================================
// Promotion
// =============================================================================

#[test]
fn mixed_columns_add_in_the_promoted_type() {
    let table = ones();
    let frame = table.frame();
    for (i, &a) in NUMERIC.iter().enumerate() {
        for (j, &b) in NUMERIC.iter().enumerate() {
            let stream = InstructionStream::new()
                .mem(a, u32::try_from(i).unwrap())
                .mem(b, u32::try_from(j).unwrap())
                .op(Opcode::Add)
                .ret();
            let filter = compile(stream.as_slice(), &CompileOptions::default()).unwrap();
            let want = filterjit_foundation::promote(a, b).unwrap();
            assert_eq!(filter.result_type(), want, "{a} + {b}");
            let got = filter.evaluate(&frame, 0).unwrap();
            let two = match got {
                Scalar::I32(v) => f64::from(v),
                Scalar::I64(v) => v as f64,
                Scalar::F32(v) => f64::from(v),
                Scalar::F64(v) => v,
                Scalar::I128(_) => unreachable!(),
            };
            assert_eq!(two, 2.0, "{a} + {b}");
        }
    }
}

#[test]
fn long_meets_float_at_double() {
    let table = ones();
    let stream = InstructionStream::new()
        .mem(DataType::I64, 3)
        .mem(DataType::F32, 4)
        .op(Opcode::Mul)
        .ret();
    let filter = compile(stream.as_slice(), &CompileOptions::default()).unwrap();
    assert_eq!(filter.result_type(), DataType::F64);
}

#[test]
fn literals_take_the_column_type() {
    let mut table = Table::new();
    table.add_fixed(&[100i16]).unwrap();
    let stream = InstructionStream::new()
        .mem(DataType::I16, 0)
        .imm_i64(1)
        .op(Opcode::Add)
        .ret();
    let filter = compile(stream.as_slice(), &CompileOptions::default()).unwrap();
    assert_eq!(filter.result_type(), DataType::I16);
    assert_eq!(filter.evaluate(&table.frame(), 0).unwrap(), Scalar::I32(101));

    let mut table = Table::new();
    table.add_fixed(&[0.5f64]).unwrap();
    let stream = InstructionStream::new()
        .mem(DataType::F64, 0)
        .imm_i32(1)
        .op(Opcode::Lt)
        .ret();
    assert_eq!(eval(&stream, &table.frame(), 0), Scalar::I32(1));
}

// =============================================================================
// Float Comparisons
// =============================================================================

fn compare_literals(x: f64, y: f64, op: Opcode) -> Scalar {
    let stream = InstructionStream::new().imm_f64(x).imm_f64(y).op(op).ret();
    eval(&stream, &RowFrame::default(), 0)
}

proptest! {
    #[test]
    fn float_comparisons_are_reflexive(x in -1.0e9f64..1.0e9) {
        prop_assert_eq!(compare_literals(x, x, Opcode::Eq), Scalar::I32(1));
        prop_assert_eq!(compare_literals(x, x, Opcode::Ne), Scalar::I32(0));
        prop_assert_eq!(compare_literals(x, x, Opcode::Gt), Scalar::I32(0));
        prop_assert_eq!(compare_literals(x, x, Opcode::Lt), Scalar::I32(0));
        prop_assert_eq!(compare_literals(x, x, Opcode::Ge), Scalar::I32(1));
        prop_assert_eq!(compare_literals(x, x, Opcode::Le), Scalar::I32(1));
    }
}

#[test]
fn single_precision_uses_its_own_epsilon() {
    let mut table = Table::new();
    table.add_fixed(&[0.01f32]).unwrap();
    table.add_fixed(&[0.010_000_05f32]).unwrap();
    let stream = InstructionStream::new()
        .mem(DataType::F32, 0)
        .mem(DataType::F32, 1)
        .op(Opcode::Eq)
        .ret();
    assert_eq!(eval(&stream, &table.frame(), 0), Scalar::I32(1));

    let wider = InstructionStream::new()
        .mem(DataType::F32, 0)
        .imm_f64(0.010_000_05)
        .op(Opcode::Eq)
        .ret();
    assert_eq!(eval(&wider, &table.frame(), 0), Scalar::I32(1));
}

#[test]
fn nan_equals_nan() {
    assert_eq!(compare_literals(f64::NAN, f64::NAN, Opcode::Eq), Scalar::I32(1));
    assert_eq!(compare_literals(f64::NAN, 1.0, Opcode::Lt), Scalar::I32(0));
}

// =============================================================================
// Variable-Length Headers
// =============================================================================

#[test]
fn string_lengths() {
    let mut table = Table::new();
    table.add_string(&[None, Some(""), Some("ab")]).unwrap();
    let stream = InstructionStream::new().mem(DataType::StringHeader, 0).ret();
    let frame = table.frame();
    let got: Vec<Scalar> = (0..3).map(|row| eval(&stream, &frame, row)).collect();
    assert_eq!(got, [Scalar::I32(-1), Scalar::I32(0), Scalar::I32(4)]);
}

#[test]
fn binary_lengths() {
    let mut table = Table::new();
    table
        .add_binary(&[Some(&b"abcd"[..]), None, Some(&b""[..])])
        .unwrap();
    let stream = InstructionStream::new().mem(DataType::BinaryHeader, 0).ret();
    let frame = table.frame();
    let got: Vec<Scalar> = (0..3).map(|row| eval(&stream, &frame, row)).collect();
    assert_eq!(got, [Scalar::I64(4), Scalar::I64(-1), Scalar::I64(0)]);
}

#[test]
fn varchar_header_compares_as_long() {
    let mut table = Table::new();
    table.add_varchar(&[None, Some("v")]).unwrap();
    let stream = InstructionStream::new()
        .mem(DataType::VarcharHeader, 0)
        .imm_i64(4)
        .op(Opcode::Ne)
        .ret();
    let frame = table.frame();
    assert_eq!(eval(&stream, &frame, 0), Scalar::I32(0));
    assert_eq!(eval(&stream, &frame, 1), Scalar::I32(1));
}

// =============================================================================
// Wide Values
// =============================================================================

#[test]
fn i128_equality() {
    let mut table = Table::new();
    table.add_fixed(&[7i128, LONG128_NULL, -7]).unwrap();
    let stream = InstructionStream::new()
        .mem(DataType::I128, 0)
        .imm_i128(7)
        .op(Opcode::Eq)
        .ret();
    let frame = table.frame();
    let got: Vec<Scalar> = (0..3).map(|row| eval(&stream, &frame, row)).collect();
    assert_eq!(got, [Scalar::I32(1), Scalar::I32(0), Scalar::I32(0)]);

    let stream = InstructionStream::new().mem(DataType::I128, 0).ret();
    assert_eq!(eval(&stream, &frame, 1), Scalar::I128(LONG128_NULL));
}

#[test]
fn i128_ordering_is_unsupported() {
    let stream = InstructionStream::new()
        .imm_i128(1)
        .imm_i128(2)
        .op(Opcode::Ge)
        .ret();
    let err = compile(stream.as_slice(), &CompileOptions::default()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnsupportedOperation { .. }));
}

#[test]
fn logic_on_comparisons() {
    let mut table = Table::new();
    table.add_fixed(&[1i32, 5, 9]).unwrap();
    // 2 < x AND NOT (x > 8)
    let stream = InstructionStream::new()
        .imm_i32(2)
        .mem(DataType::I32, 0)
        .op(Opcode::Lt)
        .mem(DataType::I32, 0)
        .imm_i32(8)
        .op(Opcode::Gt)
        .op(Opcode::Not)
        .op(Opcode::And)
        .ret();
    let filter = compile(stream.as_slice(), &CompileOptions::default()).unwrap();
    assert_eq!(filter.filter_rows(&table.frame(), 0..3).unwrap(), vec![1]);
}
