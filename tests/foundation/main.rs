//! Integration tests for Layer 0: Foundation
//!
//! Tests for data types, the promotion matrix, null sentinels and errors.

mod errors;
