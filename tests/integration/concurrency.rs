//! Integration tests for sharing compiled filters
//!
//! A compiled filter is immutable and evaluated concurrently without locks.

use std::sync::Arc;
use std::thread;

use filterjit::compiler::{InstructionStream, Opcode};
use filterjit::foundation::DataType;
use filterjit::storage::Table;
use filterjit::{CompileOptions, CompiledFilter, compile};

fn even_filter() -> CompiledFilter {
    // x - (x / 2) * 2 == 0
    let stream = InstructionStream::new()
        .mem(DataType::I64, 0)
        .mem(DataType::I64, 0)
        .imm_i64(2)
        .op(Opcode::Div)
        .imm_i64(2)
        .op(Opcode::Mul)
        .op(Opcode::Sub)
        .imm_i64(0)
        .op(Opcode::Eq)
        .ret();
    compile(stream.as_slice(), &CompileOptions::default()).unwrap()
}

#[test]
fn one_filter_many_threads() {
    let values: Vec<i64> = (0..4_000).collect();
    let mut table = Table::new();
    table.add_fixed(&values).unwrap();
    let table = Arc::new(table);
    let filter = Arc::new(even_filter());

    let handles: Vec<_> = (0..4)
        .map(|chunk| {
            let table = Arc::clone(&table);
            let filter = Arc::clone(&filter);
            thread::spawn(move || {
                let start = chunk * 1_000;
                filter
                    .filter_rows(&table.frame(), start..start + 1_000)
                    .unwrap()
            })
        })
        .collect();

    let mut matched = Vec::new();
    for handle in handles {
        matched.extend(handle.join().unwrap());
    }
    assert_eq!(matched.len(), 2_000);
    assert!(matched.iter().all(|row| row % 2 == 0));
}

#[test]
fn independent_compilations_agree() {
    let handles: Vec<_> = (0..4)
        .map(|_| thread::spawn(|| even_filter().to_string()))
        .collect();
    let listings: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(listings.windows(2).all(|w| w[0] == w[1]));
}
