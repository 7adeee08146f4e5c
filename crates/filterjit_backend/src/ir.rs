//! Operands of the emission interface.

use std::fmt;

/// Register class of a virtual register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegClass {
    /// 32-bit general purpose.
    Gp32,
    /// 64-bit general purpose (integers and addresses).
    Gp64,
    /// Scalar single-precision float.
    F32,
    /// Scalar double-precision float.
    F64,
    /// 128-bit vector.
    V128,
}

impl RegClass {
    /// Returns true for the general purpose classes.
    #[must_use]
    pub const fn is_gp(self) -> bool {
        matches!(self, Self::Gp32 | Self::Gp64)
    }

    /// Short name used in listings.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gp32 => "gp32",
            Self::Gp64 => "gp64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::V128 => "v128",
        }
    }
}

/// A typed virtual register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Reg {
    id: u32,
    class: RegClass,
}

impl Reg {
    /// Creates a register handle. Backends hand these out; the compiler
    /// never fabricates them.
    #[must_use]
    pub const fn new(id: u32, class: RegClass) -> Self {
        Self { id, class }
    }

    /// Register number, unique within one emission.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.id
    }

    /// Register class.
    #[must_use]
    pub const fn class(self) -> RegClass {
        self.class
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}:{}", self.id, self.class.name())
    }
}

/// A control point that a forward jump can target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Label(pub(crate) u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Base of a memory operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Base {
    /// Address held in a register.
    Reg(Reg),
    /// Start of the constant pool.
    ConstPool,
}

/// Memory operand: `base + (index << shift) + disp`, `size` bytes wide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Mem {
    /// Base address.
    pub base: Base,
    /// Optional scaled index register.
    pub index: Option<Reg>,
    /// Index scale as a shift, at most 3.
    pub shift: u8,
    /// Byte displacement.
    pub disp: i64,
    /// Access width in bytes.
    pub size: u8,
}

impl Mem {
    /// `[base + disp]`.
    #[must_use]
    pub const fn at(base: Reg, disp: i64, size: u8) -> Self {
        Self {
            base: Base::Reg(base),
            index: None,
            shift: 0,
            disp,
            size,
        }
    }

    /// `[base + (index << shift) + disp]`.
    #[must_use]
    pub const fn indexed(base: Reg, index: Reg, shift: u8, disp: i64, size: u8) -> Self {
        Self {
            base: Base::Reg(base),
            index: Some(index),
            shift,
            disp,
            size,
        }
    }

    /// An entry of the constant pool.
    #[must_use]
    pub const fn constant(offset: i64, size: u8) -> Self {
        Self {
            base: Base::ConstPool,
            index: None,
            shift: 0,
            disp: offset,
            size,
        }
    }
}

impl fmt::Display for Mem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", size_name(self.size))?;
        match self.base {
            Base::Reg(r) => write!(f, "{r}")?,
            Base::ConstPool => write!(f, "pool")?,
        }
        if let Some(index) = self.index {
            write!(f, " + {index}")?;
            if self.shift > 0 {
                write!(f, " << {}", self.shift)?;
            }
        }
        if self.disp != 0 {
            write!(f, " + {}", self.disp)?;
        }
        write!(f, "]")
    }
}

fn size_name(size: u8) -> &'static str {
    match size {
        1 => "byte",
        2 => "word",
        4 => "dword",
        8 => "qword",
        16 => "xmmword",
        _ => "ptr",
    }
}

/// Immediate literal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Imm {
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
}

impl fmt::Display for Imm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
        }
    }
}

/// Source operand of a move or ALU operation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    /// A register.
    Reg(Reg),
    /// A memory location.
    Mem(Mem),
    /// An immediate.
    Imm(Imm),
}

impl From<Reg> for Operand {
    fn from(reg: Reg) -> Self {
        Self::Reg(reg)
    }
}

impl From<Mem> for Operand {
    fn from(mem: Mem) -> Self {
        Self::Mem(mem)
    }
}

impl From<Imm> for Operand {
    fn from(imm: Imm) -> Self {
        Self::Imm(imm)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reg(r) => write!(f, "{r}"),
            Self::Mem(m) => write!(f, "{m}"),
            Self::Imm(i) => write!(f, "{i}"),
        }
    }
}

/// Integer ALU operation used for address arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AluOp {
    /// `dst += src`
    Add,
    /// `dst -= src`
    Sub,
    /// `dst <<= src`
    Shl,
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Sub => write!(f, "sub"),
            Self::Shl => write!(f, "shl"),
        }
    }
}

/// Registers holding the compiled routine's arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRegs {
    /// Base address table of the data vectors.
    pub data_ptr: Reg,
    /// Base address table of the aux vectors.
    pub aux_ptr: Reg,
    /// The scalar variable table.
    pub vars_ptr: Reg,
    /// The current row.
    pub row_index: Reg,
}
