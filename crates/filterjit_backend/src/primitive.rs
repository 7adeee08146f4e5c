//! Descriptors for calls into the primitive library.

use std::fmt;

use filterjit_foundation::sentinel::{DOUBLE_EPSILON, FLOAT_EPSILON};
use filterjit_foundation::{DataType, Error, Result};

use crate::ir::RegClass;
use crate::primitives as p;
use crate::scalar::Scalar;

/// Operand width of a primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lane {
    /// 32-bit integer.
    I32,
    /// 64-bit integer.
    I64,
    /// 128-bit value.
    I128,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl Lane {
    /// Register class of values in this lane.
    #[must_use]
    pub const fn class(self) -> RegClass {
        match self {
            Self::I32 => RegClass::Gp32,
            Self::I64 => RegClass::Gp64,
            Self::I128 => RegClass::V128,
            Self::F32 => RegClass::F32,
            Self::F64 => RegClass::F64,
        }
    }

    /// Lane that operates on values of `dtype`.
    ///
    /// 8- and 16-bit integers are widened on load and share the 32-bit lane.
    #[must_use]
    pub const fn of(dtype: DataType) -> Option<Self> {
        match dtype {
            DataType::I8 | DataType::I16 | DataType::I32 => Some(Self::I32),
            DataType::I64 => Some(Self::I64),
            DataType::I128 => Some(Self::I128),
            DataType::F32 => Some(Self::F32),
            DataType::F64 => Some(Self::F64),
            _ => None,
        }
    }

    const fn prefix(self) -> &'static str {
        match self {
            Self::I32 => "int32",
            Self::I64 => "int64",
            Self::I128 => "int128",
            Self::F32 => "float",
            Self::F64 => "double",
        }
    }

    const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

/// Binary arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArithOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
}

impl ArithOp {
    const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
        }
    }
}

/// Comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
}

impl CmpOp {
    const fn name(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
        }
    }

    const fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }
}

/// A callable entry of the primitive library.
///
/// Not every combination is valid; [`Primitive::signature`] rejects the
/// ones the library does not provide. Boolean results are `Gp32` values
/// 0 or 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Arithmetic negation.
    Neg {
        /// Operand width.
        lane: Lane,
        /// Propagate integer nulls.
        null_check: bool,
    },
    /// Logical not of a boolean.
    Not,
    /// Bitwise and of two booleans.
    And,
    /// Bitwise or of two booleans.
    Or,
    /// Binary arithmetic on two operands of one lane.
    Arith {
        /// The operation.
        op: ArithOp,
        /// Operand width.
        lane: Lane,
        /// Propagate integer nulls.
        null_check: bool,
    },
    /// Exact comparison. Floats support only the four orderings.
    Compare {
        /// The comparison.
        op: CmpOp,
        /// Operand width.
        lane: Lane,
        /// Null inputs make orderings false.
        null_check: bool,
    },
    /// Tolerant float equality using the lane's epsilon.
    EqEpsilon {
        /// `F32` or `F64`.
        lane: Lane,
    },
    /// Tolerant float inequality using the lane's epsilon.
    NeEpsilon {
        /// `F32` or `F64`.
        lane: Lane,
    },
    /// Widening conversion.
    Convert {
        /// Source lane.
        from: Lane,
        /// Destination lane.
        to: Lane,
        /// Map the source null to the destination null.
        null_check: bool,
    },
}

impl Primitive {
    /// Argument classes and result class.
    ///
    /// # Errors
    /// Returns `Backend` for a combination the library does not provide.
    pub fn signature(&self) -> Result<(Vec<RegClass>, RegClass)> {
        let sig = match *self {
            Self::Not => (vec![RegClass::Gp32], RegClass::Gp32),
            Self::And | Self::Or => (vec![RegClass::Gp32; 2], RegClass::Gp32),
            Self::Neg { lane, .. } | Self::Arith { lane, .. } if lane != Lane::I128 => {
                let arity = if matches!(self, Self::Neg { .. }) { 1 } else { 2 };
                (vec![lane.class(); arity], lane.class())
            }
            Self::Compare { op, lane, .. }
                if !(lane == Lane::I128 && !op.is_equality())
                    && !(lane.is_float() && op.is_equality()) =>
            {
                (vec![lane.class(); 2], RegClass::Gp32)
            }
            Self::EqEpsilon { lane } | Self::NeEpsilon { lane } if lane.is_float() => {
                (vec![lane.class(); 2], RegClass::Gp32)
            }
            Self::Convert { from, to, .. }
                if matches!(
                    (from, to),
                    (Lane::I32, Lane::I64 | Lane::F32 | Lane::F64)
                        | (Lane::I64 | Lane::F32, Lane::F64)
                ) =>
            {
                (vec![from.class()], to.class())
            }
            _ => return Err(Error::backend(format!("no primitive {self}"))),
        };
        Ok(sig)
    }

    /// Library symbol name, e.g. `int32_add` or `double_eq_epsilon`.
    #[must_use]
    pub fn name(&self) -> String {
        match *self {
            Self::Neg { lane, .. } => format!("{}_neg", lane.prefix()),
            Self::Not => "int32_not".to_string(),
            Self::And => "int32_and".to_string(),
            Self::Or => "int32_or".to_string(),
            Self::Arith { op, lane, .. } => format!("{}_{}", lane.prefix(), op.name()),
            Self::Compare { op, lane, .. } => format!("{}_{}", lane.prefix(), op.name()),
            Self::EqEpsilon { lane } => format!("{}_eq_epsilon", lane.prefix()),
            Self::NeEpsilon { lane } => format!("{}_ne_epsilon", lane.prefix()),
            Self::Convert { from, to, .. } => {
                let to = match to {
                    Lane::I64 => "int64",
                    other => other.prefix(),
                };
                format!("{}_to_{to}", from.prefix())
            }
        }
    }

    /// Applies the primitive to argument values.
    ///
    /// # Errors
    /// Returns `Backend` if the arguments do not match the signature.
    pub fn eval(&self, args: &[Scalar]) -> Result<Scalar> {
        use Scalar as S;

        let out = match (*self, args) {
            (Self::Not, [S::I32(a)]) => S::I32(p::int32_not(*a)),
            (Self::And, [S::I32(a), S::I32(b)]) => S::I32(p::int32_and(*a, *b)),
            (Self::Or, [S::I32(a), S::I32(b)]) => S::I32(p::int32_or(*a, *b)),

            (Self::Neg { null_check, .. }, [S::I32(a)]) => S::I32(p::int32_neg(*a, null_check)),
            (Self::Neg { null_check, .. }, [S::I64(a)]) => S::I64(p::int64_neg(*a, null_check)),
            (Self::Neg { .. }, [S::F32(a)]) => S::F32(p::float_neg(*a)),
            (Self::Neg { .. }, [S::F64(a)]) => S::F64(p::double_neg(*a)),

            (Self::Arith { op, null_check, .. }, [S::I32(a), S::I32(b)]) => {
                S::I32(arith_i32(op, *a, *b, null_check))
            }
            (Self::Arith { op, null_check, .. }, [S::I64(a), S::I64(b)]) => {
                S::I64(arith_i64(op, *a, *b, null_check))
            }
            (Self::Arith { op, .. }, [S::F32(a), S::F32(b)]) => S::F32(arith_f32(op, *a, *b)),
            (Self::Arith { op, .. }, [S::F64(a), S::F64(b)]) => S::F64(arith_f64(op, *a, *b)),

            (Self::Compare { op, null_check, .. }, [S::I32(a), S::I32(b)]) => {
                S::I32(cmp_i32(op, *a, *b, null_check))
            }
            (Self::Compare { op, null_check, .. }, [S::I64(a), S::I64(b)]) => {
                S::I32(cmp_i64(op, *a, *b, null_check))
            }
            (Self::Compare { op: CmpOp::Eq, .. }, [S::I128(a), S::I128(b)]) => {
                S::I32(p::int128_eq(*a, *b))
            }
            (Self::Compare { op: CmpOp::Ne, .. }, [S::I128(a), S::I128(b)]) => {
                S::I32(p::int128_ne(*a, *b))
            }
            (Self::Compare { op, .. }, [S::F32(a), S::F32(b)]) if !op.is_equality() => {
                S::I32(cmp_f32(op, *a, *b))
            }
            (Self::Compare { op, .. }, [S::F64(a), S::F64(b)]) if !op.is_equality() => {
                S::I32(cmp_f64(op, *a, *b))
            }

            (Self::EqEpsilon { .. }, [S::F32(a), S::F32(b)]) => {
                S::I32(p::float_eq_epsilon(*a, *b, FLOAT_EPSILON))
            }
            (Self::EqEpsilon { .. }, [S::F64(a), S::F64(b)]) => {
                S::I32(p::double_eq_epsilon(*a, *b, DOUBLE_EPSILON))
            }
            (Self::NeEpsilon { .. }, [S::F32(a), S::F32(b)]) => {
                S::I32(p::float_ne_epsilon(*a, *b, FLOAT_EPSILON))
            }
            (Self::NeEpsilon { .. }, [S::F64(a), S::F64(b)]) => {
                S::I32(p::double_ne_epsilon(*a, *b, DOUBLE_EPSILON))
            }

            (Self::Convert { to: Lane::I64, null_check, .. }, [S::I32(a)]) => {
                S::I64(p::int32_to_int64(*a, null_check))
            }
            (Self::Convert { to: Lane::F32, null_check, .. }, [S::I32(a)]) => {
                S::F32(p::int32_to_float(*a, null_check))
            }
            (Self::Convert { to: Lane::F64, null_check, .. }, [S::I32(a)]) => {
                S::F64(p::int32_to_double(*a, null_check))
            }
            (Self::Convert { to: Lane::F64, null_check, .. }, [S::I64(a)]) => {
                S::F64(p::int64_to_double(*a, null_check))
            }
            (Self::Convert { to: Lane::F64, .. }, [S::F32(a)]) => S::F64(p::float_to_double(*a)),

            _ => {
                let shown: Vec<String> = args.iter().map(ToString::to_string).collect();
                return Err(Error::backend(format!(
                    "{self} cannot be applied to ({})",
                    shown.join(", ")
                )));
            }
        };
        Ok(out)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())?;
        match self {
            Self::Neg { null_check: false, .. }
            | Self::Arith { null_check: false, .. }
            | Self::Compare { null_check: false, .. }
            | Self::Convert { null_check: false, .. } => f.write_str("_unchecked"),
            _ => Ok(()),
        }
    }
}

fn arith_i32(op: ArithOp, a: i32, b: i32, null_check: bool) -> i32 {
    match op {
        ArithOp::Add => p::int32_add(a, b, null_check),
        ArithOp::Sub => p::int32_sub(a, b, null_check),
        ArithOp::Mul => p::int32_mul(a, b, null_check),
        ArithOp::Div => p::int32_div(a, b, null_check),
    }
}

fn arith_i64(op: ArithOp, a: i64, b: i64, null_check: bool) -> i64 {
    match op {
        ArithOp::Add => p::int64_add(a, b, null_check),
        ArithOp::Sub => p::int64_sub(a, b, null_check),
        ArithOp::Mul => p::int64_mul(a, b, null_check),
        ArithOp::Div => p::int64_div(a, b, null_check),
    }
}

fn arith_f32(op: ArithOp, a: f32, b: f32) -> f32 {
    match op {
        ArithOp::Add => p::float_add(a, b),
        ArithOp::Sub => p::float_sub(a, b),
        ArithOp::Mul => p::float_mul(a, b),
        ArithOp::Div => p::float_div(a, b),
    }
}

fn arith_f64(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => p::double_add(a, b),
        ArithOp::Sub => p::double_sub(a, b),
        ArithOp::Mul => p::double_mul(a, b),
        ArithOp::Div => p::double_div(a, b),
    }
}

fn cmp_i32(op: CmpOp, a: i32, b: i32, null_check: bool) -> i32 {
    match op {
        CmpOp::Eq => p::int32_eq(a, b),
        CmpOp::Ne => p::int32_ne(a, b),
        CmpOp::Gt => p::int32_gt(a, b, null_check),
        CmpOp::Ge => p::int32_ge(a, b, null_check),
        CmpOp::Lt => p::int32_lt(a, b, null_check),
        CmpOp::Le => p::int32_le(a, b, null_check),
    }
}

fn cmp_i64(op: CmpOp, a: i64, b: i64, null_check: bool) -> i32 {
    match op {
        CmpOp::Eq => p::int64_eq(a, b),
        CmpOp::Ne => p::int64_ne(a, b),
        CmpOp::Gt => p::int64_gt(a, b, null_check),
        CmpOp::Ge => p::int64_ge(a, b, null_check),
        CmpOp::Lt => p::int64_lt(a, b, null_check),
        CmpOp::Le => p::int64_le(a, b, null_check),
    }
}

// Callers guarantee `op` is an ordering.
fn cmp_f32(op: CmpOp, a: f32, b: f32) -> i32 {
    match op {
        CmpOp::Gt => p::float_gt(a, b),
        CmpOp::Ge => p::float_ge(a, b),
        CmpOp::Lt => p::float_lt(a, b),
        _ => p::float_le(a, b),
    }
}

fn cmp_f64(op: CmpOp, a: f64, b: f64) -> i32 {
    match op {
        CmpOp::Gt => p::double_gt(a, b),
        CmpOp::Ge => p::double_ge(a, b),
        CmpOp::Lt => p::double_lt(a, b),
        _ => p::double_le(a, b),
    }
}
