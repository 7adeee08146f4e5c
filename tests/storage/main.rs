//! Integration tests for Layer 1: Storage
//!
//! Tests for column layouts, tables, variables and the row frame.

mod frames;
mod tables;
