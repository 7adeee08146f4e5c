//! Integration tests for tables and column layouts
//!
//! Tests the byte layouts compiled filters rely on.

use filterjit_foundation::DataType;
use filterjit_foundation::sentinel::{BINARY_NULL_HEADER, STRING_NULL_HEADER};
use filterjit_storage::{Column, Table, Variables};

fn offsets(column: &Column) -> Vec<i64> {
    column
        .aux()
        .chunks_exact(8)
        .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

// =============================================================================
// Variable-Length Columns
// =============================================================================

#[test]
fn every_string_value_carries_a_header() {
    let column = Column::string(&[Some("ab"), Some(""), None, Some("xyz")]);
    assert_eq!(offsets(&column), vec![0, 8, 12, 16, 26]);

    let data = column.data();
    assert_eq!(&data[12..16], &STRING_NULL_HEADER.to_le_bytes());
    assert_eq!(&data[8..12], &0i32.to_le_bytes());
}

#[test]
fn binary_nulls_store_the_sentinel() {
    let column = Column::binary(&[None, Some(&b"\xff"[..])]);
    assert_eq!(offsets(&column), vec![0, 8, 17]);
    assert_eq!(&column.data()[..8], &BINARY_NULL_HEADER.to_le_bytes());
}

#[test]
fn varchar_slots_are_sixteen_bytes() {
    let column = Column::varchar(&[Some("a"), None, Some("0123456789abc")]);
    assert_eq!(column.dtype(), DataType::VarcharHeader);
    assert_eq!(column.aux().len(), 48);
    assert_eq!(column.row_count(), 3);
    assert_eq!(column.data(), b"0123456789abc");
}

// =============================================================================
// Tables
// =============================================================================

#[test]
fn table_columns_share_a_row_count() {
    let mut table = Table::new();
    table.add_fixed(&[1.5f64, 2.5]).unwrap();
    table.add_varchar(&[None, Some("x")]).unwrap();
    assert!(table.add_fixed(&[1i8]).is_err());
    assert_eq!(table.row_count(), Some(2));
    assert_eq!(table.column(1).unwrap().dtype(), DataType::VarcharHeader);
    assert!(table.column(2).is_none());
}

#[test]
fn variables_occupy_eight_byte_slots() {
    let mut vars = Variables::new();
    vars.set_i16(2, -5);
    assert_eq!(vars.len(), 3);
    let bytes = vars.as_bytes();
    assert_eq!(bytes.len(), 24);
    assert_eq!(&bytes[16..18], &(-5i16).to_le_bytes());
    assert!(bytes[18..24].iter().all(|&b| b == 0));

    vars.set_f64(0, 0.5);
    assert_eq!(&vars.as_bytes()[..8], &0.5f64.to_le_bytes());
}
