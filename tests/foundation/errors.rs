//! Integration tests for Error types
//!
//! Tests error construction, display, context, and error kinds.

use filterjit_foundation::{DataType, Error, ErrorContext, ErrorKind, Limit};

// =============================================================================
// Error Construction
// =============================================================================

#[test]
fn error_unsupported_operation() {
    let err = Error::unsupported("Lt", DataType::I128);
    assert!(matches!(
        err.kind,
        ErrorKind::UnsupportedOperation {
            dtype: DataType::I128,
            ..
        }
    ));
    assert_eq!(format!("{err}"), "unsupported operation: Lt on i128");
}

#[test]
fn error_stack_underflow() {
    let err = Error::stack_underflow(4);
    assert!(err.is_stack_underflow());
    assert!(format!("{err}").contains('4'));
}

#[test]
fn error_malformed_stream() {
    let err = Error::malformed("2 values left on the stack");
    assert!(matches!(err.kind, ErrorKind::MalformedStream(_)));
    assert!(format!("{err}").contains("2 values"));
}

#[test]
fn error_limit_exceeded() {
    let err = Error::limit_exceeded(Limit::StackDepth { limit: 8 });
    assert!(matches!(
        err.kind,
        ErrorKind::LimitExceeded(Limit::StackDepth { limit: 8 })
    ));
}

#[test]
fn error_backend() {
    let err = Error::backend("label bound twice");
    assert!(matches!(err.kind, ErrorKind::Backend(_)));
    assert!(!err.is_stack_underflow());
}

// =============================================================================
// Error Context
// =============================================================================

#[test]
fn context_is_optional() {
    let err = Error::invalid_instruction(Some(0), "reserved opcode");
    assert!(err.context.is_none());

    let err = err.with_context(ErrorContext::new().with_opcode("Inv"));
    assert_eq!(format!("{}", err.context.unwrap()), "(in Inv)");
}

#[test]
fn errors_are_std_errors() {
    fn assert_error<E: std::error::Error + Send + Sync + 'static>() {}
    assert_error::<Error>();
}
