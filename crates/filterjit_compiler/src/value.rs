//! Operands on the evaluation stack.

use std::fmt;

use filterjit_backend::{Imm, Mem, Reg};
use filterjit_foundation::{DataKind, DataType, Error, ErrorKind, Result};

/// Where an operand currently lives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Storage {
    /// In a virtual register.
    Reg(Reg),
    /// At a memory location (row storage, variables, constant pool).
    Mem(Mem),
    /// An immediate literal not yet placed anywhere.
    Imm(Imm),
}

/// An operand: its storage, its data type and its provenance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JitValue {
    storage: Storage,
    dtype: DataType,
    kind: DataKind,
}

impl JitValue {
    /// An operand held in a register.
    #[must_use]
    pub const fn register(reg: Reg, dtype: DataType, kind: DataKind) -> Self {
        Self {
            storage: Storage::Reg(reg),
            dtype,
            kind,
        }
    }

    /// An operand at a memory location.
    #[must_use]
    pub const fn memory(mem: Mem, dtype: DataType, kind: DataKind) -> Self {
        Self {
            storage: Storage::Mem(mem),
            dtype,
            kind,
        }
    }

    /// An immediate operand.
    #[must_use]
    pub const fn immediate(imm: Imm, dtype: DataType, kind: DataKind) -> Self {
        Self {
            storage: Storage::Imm(imm),
            dtype,
            kind,
        }
    }

    /// Data type.
    #[must_use]
    pub const fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Provenance.
    #[must_use]
    pub const fn kind(&self) -> DataKind {
        self.kind
    }

    /// Storage.
    #[must_use]
    pub const fn storage(&self) -> Storage {
        self.storage
    }

    /// Returns true if the operand is in a register.
    #[must_use]
    pub const fn is_register(&self) -> bool {
        matches!(self.storage, Storage::Reg(_))
    }

    /// Returns true if the operand is in memory.
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self.storage, Storage::Mem(_))
    }

    /// Returns true if the operand is an immediate.
    #[must_use]
    pub const fn is_immediate(&self) -> bool {
        matches!(self.storage, Storage::Imm(_))
    }

    /// The register holding the operand.
    ///
    /// # Errors
    /// Returns `Internal` if the operand is not in a register.
    pub fn reg(&self) -> Result<Reg> {
        match self.storage {
            Storage::Reg(r) => Ok(r),
            _ => Err(self.wrong_storage("a register")),
        }
    }

    /// The memory location of the operand.
    ///
    /// # Errors
    /// Returns `Internal` if the operand is not in memory.
    pub fn mem(&self) -> Result<Mem> {
        match self.storage {
            Storage::Mem(m) => Ok(m),
            _ => Err(self.wrong_storage("in memory")),
        }
    }

    /// The immediate literal.
    ///
    /// # Errors
    /// Returns `Internal` if the operand is not an immediate.
    pub fn imm(&self) -> Result<Imm> {
        match self.storage {
            Storage::Imm(i) => Ok(i),
            _ => Err(self.wrong_storage("an immediate")),
        }
    }

    /// The same operand under another data type.
    #[must_use]
    pub const fn with_dtype(self, dtype: DataType) -> Self {
        Self { dtype, ..self }
    }

    fn wrong_storage(&self, expected: &str) -> Error {
        Error::new(ErrorKind::Internal(format!("{self} is not {expected}")))
    }
}

impl fmt::Display for JitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.storage {
            Storage::Reg(r) => write!(f, "{r}")?,
            Storage::Mem(m) => write!(f, "{m}")?,
            Storage::Imm(i) => write!(f, "{i}")?,
        }
        write!(f, " as {} ({})", self.dtype, self.kind)
    }
}
