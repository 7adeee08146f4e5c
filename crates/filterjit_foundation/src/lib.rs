//! Core types and errors for filterjit.
//!
//! This crate provides:
//! - [`DataType`] - Value representations addressed by compiled filters
//! - [`DataKind`] - Provenance of an operand (row memory or literal)
//! - [`Tier`] and [`promote`] - The numeric promotion matrix
//! - [`sentinel`] - Null sentinels and float comparison tolerances
//! - [`Error`] - Typed compilation and execution errors

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
pub mod sentinel;
mod types;

pub use error::{Error, ErrorContext, ErrorKind, Limit, Result};
pub use types::{DataKind, DataType, Tier, promote};
