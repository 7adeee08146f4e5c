//! Columnar storage layout for filterjit.
//!
//! Compiled filters address row data through three tables: a per-column
//! base table for fixed-width data and length-prefixed payloads, a
//! per-column aux table for variable-length offsets or headers, and a flat
//! table of 8-byte scalar variables. This crate provides:
//! - [`Column`] - Encoders for fixed, string, binary and varchar columns
//! - [`Table`] - An owned set of columns plus [`Variables`]
//! - [`RowFrame`] - The borrowed view a compiled filter runs against

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod column;
mod frame;
mod table;
mod variables;

pub use column::{Column, FixedValue, varchar_flags};
pub use frame::{Region, RowFrame};
pub use table::Table;
pub use variables::Variables;
