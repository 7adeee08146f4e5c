//! Integration tests for the Cranelift backend
//!
//! Tests that every primitive lowers to code computing what the primitive
//! library computes, and that routines read rows and fault like programs.

use filterjit_backend::{
    AluOp, ArithOp, CmpOp, Emitter, Imm, JitContext, Lane, Mem, NativeFrame, NativeRoutine,
    Primitive, RegClass, Scalar,
};
use filterjit_foundation::ErrorKind;
use filterjit_foundation::sentinel::{INT_NULL, LONG_NULL};
use filterjit_storage::{RowFrame, Table};
use proptest::prelude::*;

// =============================================================================
// Helpers
// =============================================================================

/// Every primitive the library provides.
fn primitives() -> Vec<Primitive> {
    let lanes = [Lane::I32, Lane::I64, Lane::F32, Lane::F64, Lane::I128];
    let ariths = [ArithOp::Add, ArithOp::Sub, ArithOp::Mul, ArithOp::Div];
    let cmps = [CmpOp::Eq, CmpOp::Ne, CmpOp::Gt, CmpOp::Ge, CmpOp::Lt, CmpOp::Le];

    let mut all = vec![Primitive::Not, Primitive::And, Primitive::Or];
    for lane in lanes {
        for null_check in [false, true] {
            all.push(Primitive::Neg { lane, null_check });
            for op in ariths {
                all.push(Primitive::Arith { op, lane, null_check });
            }
            for op in cmps {
                all.push(Primitive::Compare { op, lane, null_check });
            }
            for to in lanes {
                all.push(Primitive::Convert { from: lane, to, null_check });
            }
        }
        all.push(Primitive::EqEpsilon { lane });
        all.push(Primitive::NeEpsilon { lane });
    }
    all.retain(|p| p.signature().is_ok());
    all
}

fn scalar(class: RegClass) -> BoxedStrategy<Scalar> {
    match class {
        RegClass::Gp32 => prop_oneof![
            Just(INT_NULL),
            Just(0),
            Just(1),
            Just(-1),
            -8i32..8,
            any::<i32>(),
        ]
        .prop_map(Scalar::I32)
        .boxed(),
        RegClass::Gp64 => prop_oneof![
            Just(LONG_NULL),
            Just(0),
            Just(-1),
            -8i64..8,
            any::<i64>(),
        ]
        .prop_map(Scalar::I64)
        .boxed(),
        RegClass::F32 => prop_oneof![
            Just(f32::NAN),
            Just(0.0f32),
            -4.0f32..4.0,
            any::<f32>(),
        ]
        .prop_map(Scalar::F32)
        .boxed(),
        RegClass::F64 => prop_oneof![
            Just(f64::NAN),
            Just(-0.0f64),
            -4.0f64..4.0,
            any::<f64>(),
        ]
        .prop_map(Scalar::F64)
        .boxed(),
        RegClass::V128 => prop_oneof![Just(0i128), Just(-1i128), any::<i128>()]
            .prop_map(Scalar::I128)
            .boxed(),
    }
}

fn call_with_args() -> impl Strategy<Value = (Primitive, Vec<Scalar>)> {
    prop::sample::select(primitives()).prop_flat_map(|primitive| {
        let (params, _) = primitive.signature().unwrap();
        let args: Vec<_> = params.into_iter().map(scalar).collect();
        (Just(primitive), args)
    })
}

/// Compiles a routine that applies `primitive` to literal `args`.
fn routine_for(primitive: Primitive, args: &[Scalar]) -> NativeRoutine {
    let mut jit = JitContext::new().unwrap();
    let mut e = jit.emitter(false);
    let mut regs = Vec::new();
    for arg in args {
        let reg = e.new_reg(arg.class(), "arg");
        match *arg {
            Scalar::I32(v) => e.mov(reg, Imm::Int(i64::from(v)).into()).unwrap(),
            Scalar::I64(v) => e.mov(reg, Imm::Int(v).into()).unwrap(),
            Scalar::F32(v) => e.mov(reg, Imm::Float(f64::from(v)).into()).unwrap(),
            Scalar::F64(v) => e.mov(reg, Imm::Float(v).into()).unwrap(),
            Scalar::I128(v) => {
                let mem = e.new_i128_const(v).unwrap();
                e.mov(reg, mem.into()).unwrap();
            }
        }
        regs.push(reg);
    }
    let out = e.call(primitive, &regs).unwrap();
    e.ret(out).unwrap();
    let body = e.finish().unwrap();
    jit.link(body).unwrap().1
}

fn same_value(a: Scalar, b: Scalar) -> bool {
    match (a, b) {
        (Scalar::F32(x), Scalar::F32(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Scalar::F64(x), Scalar::F64(y)) => x == y || (x.is_nan() && y.is_nan()),
        _ => a == b,
    }
}

// =============================================================================
// Primitive Lowering
// =============================================================================

#[test]
fn every_primitive_lowers() {
    let all = primitives();
    assert!(all.len() > 40);
    for primitive in all {
        let (params, _) = primitive.signature().unwrap();
        let args: Vec<Scalar> = params
            .iter()
            .map(|class| match class {
                RegClass::Gp32 => Scalar::I32(3),
                RegClass::Gp64 => Scalar::I64(3),
                RegClass::F32 => Scalar::F32(3.0),
                RegClass::F64 => Scalar::F64(3.0),
                RegClass::V128 => Scalar::I128(3),
            })
            .collect();
        let routine = routine_for(primitive, &args);
        let frame = RowFrame::default();
        let got = routine.run(&NativeFrame::new(&frame), 0).unwrap();
        assert!(
            same_value(got, primitive.eval(&args).unwrap()),
            "{primitive}: {got:?}"
        );
    }
}

#[test]
fn null_sentinels_survive_lowering() {
    let frame = RowFrame::default();
    let native = NativeFrame::new(&frame);
    let add = Primitive::Arith { op: ArithOp::Add, lane: Lane::I32, null_check: true };
    let routine = routine_for(add, &[Scalar::I32(INT_NULL), Scalar::I32(1)]);
    assert_eq!(routine.run(&native, 0).unwrap(), Scalar::I32(INT_NULL));

    let widen = Primitive::Convert { from: Lane::I32, to: Lane::F64, null_check: true };
    let routine = routine_for(widen, &[Scalar::I32(INT_NULL)]);
    let Scalar::F64(widened) = routine.run(&native, 0).unwrap() else {
        panic!("expected a double");
    };
    assert!(widened.is_nan());

    let gt = Primitive::Compare { op: CmpOp::Gt, lane: Lane::I64, null_check: true };
    let routine = routine_for(gt, &[Scalar::I64(0), Scalar::I64(LONG_NULL)]);
    assert_eq!(routine.run(&native, 0).unwrap(), Scalar::I32(0));
}

proptest! {
    #[test]
    fn lowered_primitives_match_the_library((primitive, args) in call_with_args()) {
        let routine = routine_for(primitive, &args);
        let frame = RowFrame::default();
        let got = routine.run(&NativeFrame::new(&frame), 0).unwrap();
        let want = primitive.eval(&args).unwrap();
        prop_assert!(same_value(got, want), "{primitive} {args:?}: native {got:?}, library {want:?}");
    }
}

// =============================================================================
// Rows and Faults
// =============================================================================

fn column_minus_variable() -> (filterjit_backend::Program, NativeRoutine) {
    let mut jit = JitContext::new().unwrap();
    let mut e = jit.emitter(true);
    let frame = e.frame();
    let base = e.new_reg(RegClass::Gp64, "base");
    e.mov(base, Mem::at(frame.data_ptr, 0, 8).into()).unwrap();
    let value = e.new_reg(RegClass::Gp64, "value");
    e.mov(value, Mem::indexed(base, frame.row_index, 3, 0, 8).into())
        .unwrap();
    let var = e.new_reg(RegClass::Gp64, "var");
    e.mov(var, Mem::at(frame.vars_ptr, 0, 8).into()).unwrap();
    e.alu(AluOp::Add, var, Imm::Int(1).into()).unwrap();
    let diff = e
        .call(
            Primitive::Arith { op: ArithOp::Sub, lane: Lane::I64, null_check: true },
            &[value, var],
        )
        .unwrap();
    e.ret(diff).unwrap();
    let body = e.finish().unwrap();
    jit.link(body).unwrap()
}

#[test]
fn routines_read_rows_like_programs() {
    let mut table = Table::new();
    table.add_fixed(&[10i64, 20, LONG_NULL]).unwrap();
    table.variables_mut().set_i64(0, 5);
    let (program, routine) = column_minus_variable();
    assert!(program.to_string().contains("base"));

    let frame = table.frame();
    let native = NativeFrame::new(&frame);
    let got: Vec<Scalar> = (0..3).map(|row| routine.run(&native, row).unwrap()).collect();
    assert_eq!(got, [Scalar::I64(4), Scalar::I64(14), Scalar::I64(LONG_NULL)]);
    for row in 0..3 {
        assert_eq!(routine.run(&native, row).unwrap(), program.run(&frame, row).unwrap());
    }
}

#[test]
fn routines_fault_like_programs() {
    let mut table = Table::new();
    table.add_fixed(&[10i64, 20]).unwrap();
    let (program, routine) = column_minus_variable();
    let frame = table.frame();
    let native = NativeFrame::new(&frame);

    for row in [2, -1, i64::MAX] {
        let err = routine.run(&native, row).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::OutOfBounds { .. }), "row {row}");
        assert!(program.run(&frame, row).is_err());
    }

    // No variables: the row read succeeds and the variable read faults.
    let empty: &[u8] = &[];
    let column: Vec<u8> = 7i64.to_le_bytes().to_vec();
    let frame = RowFrame::new(vec![column.as_slice()], vec![empty], empty);
    let err = routine.run(&NativeFrame::new(&frame), 0).unwrap_err();
    match err.kind {
        ErrorKind::OutOfBounds { region, offset, len } => {
            assert_eq!(region, "variables");
            assert_eq!(offset, 0);
            assert_eq!(len, 0);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn a_routine_needs_a_return() {
    let mut jit = JitContext::new().unwrap();
    let e = jit.emitter(false);
    let err = e.finish().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Backend(_)));
}
