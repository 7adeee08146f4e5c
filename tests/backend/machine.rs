//! Integration tests for the register machine
//!
//! Tests emission validation, labels, the constant pool and execution.

use filterjit_backend::{
    AluOp, Emitter, Imm, Mem, Primitive, RegClass, RegisterMachine, Scalar,
};
use filterjit_foundation::ErrorKind;
use filterjit_storage::{RowFrame, Table};

#[test]
fn forward_jumps_skip_code() {
    let mut m = RegisterMachine::new();
    let r = m.new_reg(RegClass::Gp64, "r");
    m.mov(r, Imm::Int(1).into()).unwrap();
    let done = m.new_label();
    m.jump_if_nonzero(r, done).unwrap();
    m.mov(r, Imm::Int(99).into()).unwrap();
    m.bind(done).unwrap();
    m.ret(r).unwrap();
    let program = m.finish().unwrap();
    assert_eq!(program.run(&RowFrame::default(), 0).unwrap(), Scalar::I64(1));
}

#[test]
fn unbound_labels_fail_to_finish() {
    let mut m = RegisterMachine::new();
    let r = m.new_reg(RegClass::Gp64, "r");
    m.mov(r, Imm::Int(0).into()).unwrap();
    let never = m.new_label();
    m.jump_if_nonzero(r, never).unwrap();
    m.ret(r).unwrap();
    assert!(m.finish().is_err());
}

#[test]
fn a_program_needs_a_return() {
    let m = RegisterMachine::new();
    assert!(m.finish().is_err());
}

#[test]
fn moves_check_widths() {
    let mut m = RegisterMachine::new();
    let f = m.new_reg(RegClass::F64, "f");
    let narrow = Mem::at(m.frame().vars_ptr, 0, 4);
    let err = m.mov(f, narrow.into()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Backend(_)));
}

#[test]
fn constants_are_shared() {
    let mut m = RegisterMachine::new();
    let a = m.new_f64_const(2.5).unwrap();
    let b = m.new_f64_const(2.5).unwrap();
    assert_eq!(a, b);
}

#[test]
fn primitive_calls_run_against_rows() {
    let mut table = Table::new();
    table.add_fixed(&[10i64, 20, 30]).unwrap();
    table.variables_mut().set_i64(0, 5);

    let mut m = RegisterMachine::new();
    let frame = m.frame();
    let base = m.new_reg(RegClass::Gp64, "base");
    m.mov(base, Mem::at(frame.data_ptr, 0, 8).into()).unwrap();
    let value = m.new_reg(RegClass::Gp64, "value");
    m.mov(value, Mem::indexed(base, frame.row_index, 3, 0, 8).into())
        .unwrap();
    let var = m.new_reg(RegClass::Gp64, "var");
    m.mov(var, Mem::at(frame.vars_ptr, 0, 8).into()).unwrap();
    m.alu(AluOp::Add, var, Imm::Int(1).into()).unwrap();
    let sum = m
        .call(
            Primitive::Arith {
                op: filterjit_backend::ArithOp::Sub,
                lane: filterjit_backend::Lane::I64,
                null_check: true,
            },
            &[value, var],
        )
        .unwrap();
    m.ret(sum).unwrap();
    let program = m.finish().unwrap();
    assert_eq!(program.call_count(), 1);

    let frame = table.frame();
    let got: Vec<Scalar> = (0..3).map(|row| program.run(&frame, row).unwrap()).collect();
    assert_eq!(got, [Scalar::I64(4), Scalar::I64(14), Scalar::I64(24)]);
    assert!(program.run(&frame, 3).is_err());
}

#[test]
fn listings_show_register_names() {
    let mut m = RegisterMachine::new().with_register_names(true);
    let r = m.new_reg(RegClass::Gp32, "answer");
    m.mov(r, Imm::Int(42).into()).unwrap();
    m.ret(r).unwrap();
    let listing = m.finish().unwrap().to_string();
    assert!(listing.contains("answer"));
}
