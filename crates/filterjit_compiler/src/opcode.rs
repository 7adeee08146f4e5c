//! The postfix filter instruction set.
//!
//! A filter is a flat stream of instructions evaluated left to right over an
//! operand stack. Leaves push operands, operators pop them:
//!
//! ```text
//! price > 100.0   =>   Mem(f64, 0)  Imm(f64, 100.0)  Gt  Ret
//! ```

use std::fmt;

use filterjit_foundation::{DataType, Error, ErrorKind, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Size of one packed instruction record.
pub const RECORD_SIZE: usize = 24;

/// An instruction opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Opcode {
    /// Reserved; never valid in a stream.
    Inv,
    /// Stop; the top of the stack is the result.
    Ret,
    /// Push scalar variable `payload.lo`.
    Var,
    /// Push column `payload.lo` at the current row.
    Mem,
    /// Push a literal.
    Imm,
    /// `[a] -> [-a]`
    Neg,
    /// `[a] -> [!a]`
    Not,
    /// `[a, b] -> [a & b]`
    And,
    /// `[a, b] -> [a | b]`
    Or,
    /// `[a, b] -> [a == b]`
    Eq,
    /// `[a, b] -> [a != b]`
    Ne,
    /// `[a, b] -> [a < b]`
    Lt,
    /// `[a, b] -> [a <= b]`
    Le,
    /// `[a, b] -> [a > b]`
    Gt,
    /// `[a, b] -> [a >= b]`
    Ge,
    /// `[a, b] -> [a + b]`
    Add,
    /// `[a, b] -> [a - b]`
    Sub,
    /// `[a, b] -> [a * b]`
    Mul,
    /// `[a, b] -> [a / b]`
    Div,
}

impl Opcode {
    /// All opcodes, in wire-code order.
    pub const ALL: [Opcode; 19] = [
        Self::Inv,
        Self::Ret,
        Self::Var,
        Self::Mem,
        Self::Imm,
        Self::Neg,
        Self::Not,
        Self::And,
        Self::Or,
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Le,
        Self::Gt,
        Self::Ge,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
    ];

    /// Wire code of the opcode.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Inv => -1,
            Self::Ret => 0,
            Self::Var => 1,
            Self::Mem => 2,
            Self::Imm => 3,
            Self::Neg => 4,
            Self::Not => 5,
            Self::And => 6,
            Self::Or => 7,
            Self::Eq => 8,
            Self::Ne => 9,
            Self::Lt => 10,
            Self::Le => 11,
            Self::Gt => 12,
            Self::Ge => 13,
            Self::Add => 14,
            Self::Sub => 15,
            Self::Mul => 16,
            Self::Div => 17,
        }
    }

    /// Decodes a wire code.
    ///
    /// # Errors
    /// Returns `InvalidInstruction` for an unknown code.
    pub fn from_code(code: i32) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.code() == code)
            .ok_or_else(|| Error::invalid_instruction(None, format!("unknown opcode {code}")))
    }

    /// Number of operands popped, or `None` for the terminal opcodes.
    #[must_use]
    pub const fn arity(self) -> Option<usize> {
        match self {
            Self::Inv | Self::Ret => None,
            Self::Var | Self::Mem | Self::Imm => Some(0),
            Self::Neg | Self::Not => Some(1),
            _ => Some(2),
        }
    }

    /// Returns true for opcodes that stop the walk.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Inv | Self::Ret)
    }

    /// Name used in errors and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Inv => "Inv",
            Self::Ret => "Ret",
            Self::Var => "Var",
            Self::Mem => "Mem",
            Self::Imm => "Imm",
            Self::Neg => "Neg",
            Self::Not => "Not",
            Self::And => "And",
            Self::Or => "Or",
            Self::Eq => "Eq",
            Self::Ne => "Ne",
            Self::Lt => "Lt",
            Self::Le => "Le",
            Self::Gt => "Gt",
            Self::Ge => "Ge",
            Self::Add => "Add",
            Self::Sub => "Sub",
            Self::Mul => "Mul",
            Self::Div => "Div",
        }
    }
}

impl TryFrom<i32> for Opcode {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        Self::from_code(code)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The 16-byte instruction payload.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Payload {
    /// Two 64-bit words: an integer literal or index in `lo`, or the low
    /// and high halves of a 128-bit literal.
    Int {
        /// Low word.
        lo: i64,
        /// High word.
        hi: i64,
    },
    /// A float literal.
    Float(f64),
}

impl Default for Payload {
    fn default() -> Self {
        Self::Int { lo: 0, hi: 0 }
    }
}

/// One instruction of a filter stream.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Instruction {
    /// What to do.
    pub opcode: Opcode,
    /// Data type wire code for leaves; unused by operators.
    pub options: i32,
    /// Literal or index.
    pub payload: Payload,
}

impl Instruction {
    /// Creates an instruction.
    #[must_use]
    pub const fn new(opcode: Opcode, options: i32, payload: Payload) -> Self {
        Self {
            opcode,
            options,
            payload,
        }
    }

    /// An operator instruction without options or payload.
    #[must_use]
    pub const fn op(opcode: Opcode) -> Self {
        Self::new(opcode, 0, Payload::Int { lo: 0, hi: 0 })
    }

    /// The data type selected by `options`.
    ///
    /// # Errors
    /// Returns `InvalidInstruction` for an unknown type code.
    pub fn data_type(&self) -> Result<DataType> {
        DataType::from_code(self.options)
    }

    /// The payload as a variable or column index.
    ///
    /// # Errors
    /// Returns `InvalidInstruction` for a float payload or an index outside
    /// `0..=u32::MAX`.
    pub fn index(&self) -> Result<u32> {
        let lo = self.int_value()?;
        u32::try_from(lo)
            .map_err(|_| Error::invalid_instruction(None, format!("index {lo} out of range")))
    }

    /// The payload as an integer literal.
    ///
    /// # Errors
    /// Returns `InvalidInstruction` for a float payload.
    pub fn int_value(&self) -> Result<i64> {
        match self.payload {
            Payload::Int { lo, .. } => Ok(lo),
            Payload::Float(_) => Err(Error::invalid_instruction(
                None,
                format!("{} expects an integer payload", self.opcode),
            )),
        }
    }

    /// The payload as a 128-bit literal.
    ///
    /// # Errors
    /// Returns `InvalidInstruction` for a float payload.
    pub fn i128_value(&self) -> Result<i128> {
        match self.payload {
            // Reassembles the two halves; `lo` contributes its raw bits.
            #[allow(clippy::cast_sign_loss)]
            Payload::Int { lo, hi } => Ok((i128::from(hi) << 64) | i128::from(lo as u64)),
            Payload::Float(_) => Err(Error::invalid_instruction(
                None,
                format!("{} expects an integer payload", self.opcode),
            )),
        }
    }

    /// The payload as a float literal. Integer payloads are converted.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn float_value(&self) -> f64 {
        match self.payload {
            Payload::Float(v) => v,
            Payload::Int { lo, .. } => lo as f64,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.opcode.code().to_le_bytes());
        out.extend_from_slice(&self.options.to_le_bytes());
        match self.payload {
            Payload::Int { lo, hi } => {
                out.extend_from_slice(&lo.to_le_bytes());
                out.extend_from_slice(&hi.to_le_bytes());
            }
            Payload::Float(v) => {
                out.extend_from_slice(&v.to_le_bytes());
                out.extend_from_slice(&[0; 8]);
            }
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode.arity() {
            Some(0) => {
                let dtype = DataType::from_code(self.options)
                    .map_or_else(|_| format!("?{}", self.options), |t| t.to_string());
                match self.payload {
                    Payload::Int { lo, hi: 0 } => write!(f, "{}({dtype}, {lo})", self.opcode),
                    Payload::Int { lo, hi } => {
                        write!(f, "{}({dtype}, {hi:#x}:{lo:#x})", self.opcode)
                    }
                    Payload::Float(v) => write!(f, "{}({dtype}, {v:?})", self.opcode),
                }
            }
            _ => write!(f, "{}", self.opcode),
        }
    }
}

fn word<const N: usize>(record: &[u8], at: usize) -> [u8; N] {
    let mut out = [0; N];
    out.copy_from_slice(&record[at..at + N]);
    out
}

/// Decodes a packed little-endian stream of 24-byte records
/// `{i32 opcode, i32 options, 16-byte payload}`.
///
/// For `Imm` of type `f32` or `f64` the first eight payload bytes hold an
/// `f64`; every other payload is two `i64` words.
///
/// # Errors
/// Returns `InvalidInstruction` if the buffer length is not a multiple of
/// the record size, or a record holds an unknown opcode, or a float literal
/// has an unknown type code.
pub fn decode(bytes: &[u8]) -> Result<Vec<Instruction>> {
    if bytes.len() % RECORD_SIZE != 0 {
        return Err(Error::invalid_instruction(
            None,
            format!("stream of {} bytes is not a whole number of records", bytes.len()),
        ));
    }
    bytes
        .chunks_exact(RECORD_SIZE)
        .enumerate()
        .map(|(position, record)| {
            let opcode = Opcode::from_code(i32::from_le_bytes(word(record, 0)))
                .map_err(|e| at_position(e, position))?;
            let options = i32::from_le_bytes(word(record, 4));
            let is_float = opcode == Opcode::Imm
                && DataType::from_code(options).is_ok_and(DataType::is_float);
            let payload = if is_float {
                Payload::Float(f64::from_le_bytes(word(record, 8)))
            } else {
                Payload::Int {
                    lo: i64::from_le_bytes(word(record, 8)),
                    hi: i64::from_le_bytes(word(record, 16)),
                }
            };
            Ok(Instruction::new(opcode, options, payload))
        })
        .collect()
}

/// Packs instructions into the format read by [`decode`].
#[must_use]
pub fn encode(instructions: &[Instruction]) -> Vec<u8> {
    let mut out = Vec::with_capacity(instructions.len() * RECORD_SIZE);
    for instruction in instructions {
        instruction.encode_into(&mut out);
    }
    out
}

fn at_position(err: Error, position: usize) -> Error {
    match err.kind {
        ErrorKind::InvalidInstruction { reason, .. } => {
            Error::invalid_instruction(Some(position), reason)
        }
        kind => Error::new(kind),
    }
}

/// Builder for instruction streams.
///
/// ```
/// use filterjit_compiler::{InstructionStream, Opcode};
/// use filterjit_foundation::DataType;
///
/// // v0 + 1 > col2
/// let stream = InstructionStream::new()
///     .var(DataType::I64, 0)
///     .imm_int(DataType::I64, 1)
///     .op(Opcode::Add)
///     .mem(DataType::I64, 2)
///     .op(Opcode::Gt)
///     .ret();
/// assert_eq!(stream.len(), 6);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstructionStream {
    instructions: Vec<Instruction>,
}

impl InstructionStream {
    /// Creates an empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends any instruction.
    #[must_use]
    pub fn push(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Pushes scalar variable `index`.
    #[must_use]
    pub fn var(self, dtype: DataType, index: u32) -> Self {
        self.push(Instruction::new(
            Opcode::Var,
            dtype.code(),
            Payload::Int {
                lo: i64::from(index),
                hi: 0,
            },
        ))
    }

    /// Pushes column `column` at the current row.
    #[must_use]
    pub fn mem(self, dtype: DataType, column: u32) -> Self {
        self.push(Instruction::new(
            Opcode::Mem,
            dtype.code(),
            Payload::Int {
                lo: i64::from(column),
                hi: 0,
            },
        ))
    }

    /// Pushes an integer literal of type `dtype`.
    #[must_use]
    pub fn imm_int(self, dtype: DataType, value: i64) -> Self {
        self.push(Instruction::new(
            Opcode::Imm,
            dtype.code(),
            Payload::Int { lo: value, hi: 0 },
        ))
    }

    /// Pushes an `i32` literal.
    #[must_use]
    pub fn imm_i32(self, value: i32) -> Self {
        self.imm_int(DataType::I32, i64::from(value))
    }

    /// Pushes an `i64` literal.
    #[must_use]
    pub fn imm_i64(self, value: i64) -> Self {
        self.imm_int(DataType::I64, value)
    }

    /// Pushes an `f32` literal.
    #[must_use]
    pub fn imm_f32(self, value: f32) -> Self {
        self.push(Instruction::new(
            Opcode::Imm,
            DataType::F32.code(),
            Payload::Float(f64::from(value)),
        ))
    }

    /// Pushes an `f64` literal.
    #[must_use]
    pub fn imm_f64(self, value: f64) -> Self {
        self.push(Instruction::new(
            Opcode::Imm,
            DataType::F64.code(),
            Payload::Float(value),
        ))
    }

    /// Pushes a 128-bit literal.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn imm_i128(self, value: i128) -> Self {
        self.push(Instruction::new(
            Opcode::Imm,
            DataType::I128.code(),
            Payload::Int {
                lo: value as i64,
                hi: (value >> 64) as i64,
            },
        ))
    }

    /// Appends an operator.
    #[must_use]
    pub fn op(self, opcode: Opcode) -> Self {
        self.push(Instruction::op(opcode))
    }

    /// Appends `Ret`.
    #[must_use]
    pub fn ret(self) -> Self {
        self.op(Opcode::Ret)
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true for an empty stream.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// The instructions.
    #[must_use]
    pub fn as_slice(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Packs the stream with [`encode`].
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(&self.instructions)
    }

    /// Consumes the builder.
    #[must_use]
    pub fn build(self) -> Vec<Instruction> {
        self.instructions
    }
}

impl AsRef<[Instruction]> for InstructionStream {
    fn as_ref(&self) -> &[Instruction] {
        &self.instructions
    }
}

impl fmt::Display for InstructionStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instruction) in self.instructions.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{instruction}")?;
        }
        Ok(())
    }
}
