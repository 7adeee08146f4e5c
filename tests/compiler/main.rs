//! Integration tests for Layer 3: Compiler
//!
//! Tests for the instruction stream, the walker and typed dispatch.

mod dispatch;
mod stream;
mod walker;
