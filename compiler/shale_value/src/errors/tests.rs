use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_message_matches_kind() {
    let err = no_conversion("abc", "System.String", "System.Int32");
    assert_eq!(err.message, err.kind.to_string());
    assert_eq!(
        err.message,
        "cannot convert value \"abc\" of type \"System.String\" to type \"System.Int32\""
    );
}

#[test]
fn test_conversion_predicate() {
    assert!(no_conversion("x", "a", "b").is_conversion());
    assert!(!member_not_found("Foo", "System.Int32").is_conversion());
    assert!(member_not_found("Foo", "System.Int32").is_member_not_found());
}

#[test]
fn test_cycle_chain_rendering() {
    let err = cycle_detected("A", &["A".to_string(), "B".to_string(), "A".to_string()]);
    assert_eq!(
        err.kind,
        ErrorKind::CycleDetected {
            member: "A".to_string(),
            chain: "A -> B -> A".to_string()
        }
    );
}

#[test]
fn test_notes_in_display() {
    let err = divide_by_zero().with_note("while evaluating 1 / 0");
    assert_eq!(
        err.to_string(),
        "attempted to divide by zero\n  note: while evaluating 1 / 0"
    );
}

#[test]
fn test_shape_error_becomes_invalid_shape() {
    let err: EvalError = shale_ir::ShapeError::MissingName { kind: "get-member" }.into();
    assert!(matches!(err.kind, ErrorKind::InvalidShape { .. }));
    assert!(err.message.contains("requires a member name"));
}
