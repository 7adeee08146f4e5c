//! Error types for filter compilation and execution.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::types::DataType;

/// Result alias used across filterjit.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for filterjit operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates an invalid instruction error.
    #[must_use]
    pub fn invalid_instruction(position: Option<usize>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInstruction {
            position,
            reason: reason.into(),
        })
    }

    /// Creates an unsupported operation error.
    #[must_use]
    pub fn unsupported(op: impl Into<String>, dtype: DataType) -> Self {
        Self::new(ErrorKind::UnsupportedOperation {
            op: op.into(),
            dtype,
        })
    }

    /// Creates a stack underflow error.
    #[must_use]
    pub fn stack_underflow(position: usize) -> Self {
        Self::new(ErrorKind::StackUnderflow { position })
    }

    /// Creates a malformed stream error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedStream(reason.into()))
    }

    /// Creates an out-of-bounds access error.
    #[must_use]
    pub fn out_of_bounds(region: impl Into<String>, offset: i64, len: usize) -> Self {
        Self::new(ErrorKind::OutOfBounds {
            region: region.into(),
            offset,
            len,
        })
    }

    /// Creates a backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Backend(message.into()))
    }

    /// Creates a limit exceeded error.
    #[must_use]
    pub fn limit_exceeded(limit: Limit) -> Self {
        Self::new(ErrorKind::LimitExceeded(limit))
    }

    /// Returns true if this is a stack underflow.
    #[must_use]
    pub fn is_stack_underflow(&self) -> bool {
        matches!(self.kind, ErrorKind::StackUnderflow { .. })
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// The stream holds a reserved or undecodable instruction.
    #[error("invalid instruction{}: {reason}", at(.position))]
    InvalidInstruction {
        /// Index of the instruction in the stream, when known.
        position: Option<usize>,
        /// What was wrong with it.
        reason: String,
    },

    /// A type/opcode combination outside the dispatch tables.
    #[error("unsupported operation: {op} on {dtype}")]
    UnsupportedOperation {
        /// The operation that was requested.
        op: String,
        /// The operand type it was requested for.
        dtype: DataType,
    },

    /// An operator found fewer operands on the stack than it needs.
    #[error("stack underflow at instruction {position}")]
    StackUnderflow {
        /// Index of the instruction that underflowed.
        position: usize,
    },

    /// The stream did not reduce to exactly one value.
    #[error("malformed instruction stream: {0}")]
    MalformedStream(String),

    /// A configured compilation limit was exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(Limit),

    /// A compiled filter addressed memory outside the row storage it was given.
    #[error("out of bounds: offset {offset} in {region} (length {len})")]
    OutOfBounds {
        /// The storage region that was addressed.
        region: String,
        /// The offending byte offset.
        offset: i64,
        /// Length of the region in bytes.
        len: usize,
    },

    /// The code-emission backend rejected an operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

fn at(position: &Option<usize>) -> String {
    position.map(|p| format!(" at {p}")).unwrap_or_default()
}

/// Compilation limits that can be exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Limit {
    /// Maximum evaluation stack depth exceeded.
    StackDepth {
        /// The configured limit.
        limit: usize,
    },
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackDepth { limit } => write!(f, "max stack depth ({limit}) exceeded"),
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Index of the instruction being compiled.
    pub position: Option<usize>,
    /// Opcode of the instruction being compiled.
    pub opcode: Option<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the instruction position.
    #[must_use]
    pub fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    /// Sets the opcode name.
    #[must_use]
    pub fn with_opcode(mut self, opcode: impl Into<String>) -> Self {
        self.opcode = Some(opcode.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.opcode, self.position) {
            (Some(op), Some(pos)) => write!(f, "(in {op} at {pos})"),
            (Some(op), None) => write!(f, "(in {op})"),
            (None, Some(pos)) => write!(f, "(at {pos})"),
            (None, None) => Ok(()),
        }
    }
}
