//! Integration tests for the row frame
//!
//! Tests that every access through a frame is bounds-checked.

use filterjit_foundation::ErrorKind;
use filterjit_storage::{Region, Table};

#[test]
fn frame_exposes_one_entry_per_column() {
    let mut table = Table::new();
    table.add_fixed(&[1i32, 2]).unwrap();
    table.add_string(&[Some("a"), None]).unwrap();
    let frame = table.frame();
    assert_eq!(frame.column_count(), 2);
    assert_eq!(frame.aux_count(), 2);
    assert!(frame.bytes(Region::Aux(0)).unwrap().is_empty());
    assert_eq!(frame.bytes(Region::Aux(1)).unwrap().len(), 24);
}

#[test]
fn table_entries_resolve_to_regions() {
    let mut table = Table::new();
    table.add_fixed(&[1i64]).unwrap();
    let frame = table.frame();
    assert_eq!(frame.table_entry(Region::DataTable, 0).unwrap(), Region::Data(0));
    let err = frame.table_entry(Region::DataTable, 8).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::OutOfBounds { .. }));
}

#[test]
fn reads_are_bounds_checked() {
    let mut table = Table::new();
    table.add_fixed(&[7i32, 8]).unwrap();
    table.variables_mut().set_i64(0, 3);
    let frame = table.frame();

    assert_eq!(frame.read(Region::Data(0), 4, 4).unwrap(), &8i32.to_le_bytes());
    assert_eq!(frame.read(Region::Vars, 0, 8).unwrap(), &3i64.to_le_bytes());
    assert!(frame.read(Region::Data(0), 6, 4).is_err());
    assert!(frame.read(Region::Data(0), -4, 4).is_err());
    assert!(frame.read(Region::Data(1), 0, 1).is_err());
    assert!(frame.read(Region::Vars, i64::MAX, 8).is_err());
}
