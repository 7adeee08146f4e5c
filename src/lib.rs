//! filterjit - Single-pass JIT compiler for columnar filter predicates
//!
//! This crate re-exports all layers of the filterjit system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: filterjit_compiler   — Instruction stream, addressing, dispatch, walker
//! Layer 2: filterjit_backend    — Emitter trait, Cranelift and register-machine backends, primitives
//! Layer 1: filterjit_storage    — Columnar row storage and variables
//! Layer 0: filterjit_foundation — Data types, promotion, null sentinels, errors
//! ```

pub use filterjit_backend as backend;
pub use filterjit_compiler as compiler;
pub use filterjit_foundation as foundation;
pub use filterjit_storage as storage;

pub use filterjit_compiler::{CompileOptions, CompiledFilter, compile, compile_bytes};
