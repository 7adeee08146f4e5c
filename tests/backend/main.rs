//! Integration tests for Layer 2: Backend
//!
//! Tests for the primitive library, the register machine and the Cranelift
//! backend.

mod machine;
mod native;
mod primitives;
