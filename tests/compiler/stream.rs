//! Integration tests for the instruction stream
//!
//! Tests wire codes and the packed record format.

use filterjit_compiler::{Instruction, InstructionStream, Opcode, Payload, RECORD_SIZE, decode, encode};
use filterjit_foundation::{DataType, ErrorKind};

#[test]
fn opcode_wire_codes() {
    let codes: Vec<i32> = Opcode::ALL.iter().map(|op| op.code()).collect();
    assert_eq!(codes, (-1..=17).collect::<Vec<_>>());
    assert_eq!(Opcode::from_code(14).unwrap(), Opcode::Add);
    assert!(Opcode::from_code(18).is_err());
}

#[test]
fn records_are_little_endian() {
    let stream = InstructionStream::new().mem(DataType::I16, 5);
    let bytes = stream.to_bytes();
    assert_eq!(bytes.len(), RECORD_SIZE);
    assert_eq!(&bytes[..4], &2i32.to_le_bytes());
    assert_eq!(&bytes[4..8], &1i32.to_le_bytes());
    assert_eq!(&bytes[8..16], &5i64.to_le_bytes());
}

#[test]
fn float_literals_decode_as_floats() {
    let stream = InstructionStream::new().imm_f64(0.75).imm_i128(-2).op(Opcode::Eq);
    let decoded = decode(&encode(stream.as_slice())).unwrap();
    assert_eq!(decoded[0].payload, Payload::Float(0.75));
    assert_eq!(decoded[1].i128_value().unwrap(), -2);
    assert_eq!(decoded[2], Instruction::op(Opcode::Eq));
}

#[test]
fn unknown_opcodes_are_rejected_with_their_position() {
    let mut bytes = InstructionStream::new().imm_i32(1).imm_i32(2).to_bytes();
    bytes[RECORD_SIZE..RECORD_SIZE + 4].copy_from_slice(&99i32.to_le_bytes());
    let err = decode(&bytes).unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::InvalidInstruction {
            position: Some(1),
            ..
        }
    ));
}

#[test]
fn truncated_buffers_are_rejected() {
    let bytes = InstructionStream::new().ret().to_bytes();
    assert!(decode(&bytes[..RECORD_SIZE - 1]).is_err());
    assert!(decode(&[]).unwrap().is_empty());
}

#[test]
fn streams_display_in_postfix_order() {
    let stream = InstructionStream::new()
        .mem(DataType::I32, 0)
        .imm_i32(3)
        .op(Opcode::Lt)
        .ret();
    let text = stream.to_string();
    assert!(text.starts_with("Mem(i32, 0)"));
    assert!(text.ends_with("Ret"));
}
