//! Cross-layer integration tests
//!
//! Compiles filters once and runs them across whole tables, including from
//! several threads at once.

mod concurrency;
mod scans;
