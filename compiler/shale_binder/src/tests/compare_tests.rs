//! Tests for comparison resolution: scalar, broadcast and containment.

use pretty_assertions::assert_eq;
use shale_ir::{ComparisonOp, ShapeFlags};
use shale_value::{ErrorKind, HostTypeBuilder, Value};

use crate::{Engine, EvalContext};

fn compare(op: ComparisonOp, left: Value, right: Value) -> Value {
    Engine::new()
        .compare(&EvalContext::new(), op, &left, &right)
        .unwrap()
}

fn ints(items: &[i32]) -> Value {
    Value::array(items.iter().copied().map(Value::Int32).collect())
}

#[test]
fn test_numeric_across_kinds() {
    assert_eq!(
        compare(ComparisonOp::Eq, Value::Int32(1), Value::Double(1.0)),
        Value::Bool(true)
    );
    assert_eq!(
        compare(ComparisonOp::Lt, Value::Int64(-1), Value::UInt64(0)),
        Value::Bool(true)
    );
}

#[test]
fn test_string_case_sensitivity() {
    assert_eq!(
        compare(ComparisonOp::Eq, Value::string("ABC"), Value::string("abc")),
        Value::Bool(true)
    );
    let engine = Engine::new();
    let sensitive = engine
        .compare_with(
            &EvalContext::new(),
            ComparisonOp::Eq,
            ShapeFlags::CASE_SENSITIVE,
            &Value::string("ABC"),
            &Value::string("abc"),
        )
        .unwrap();
    assert_eq!(sensitive, Value::Bool(false));
}

#[test]
fn test_left_operand_decides_conversion() {
    assert_eq!(
        compare(ComparisonOp::Eq, Value::string("01"), Value::Int32(1)),
        Value::Bool(false)
    );
    assert_eq!(
        compare(ComparisonOp::Eq, Value::Int32(1), Value::string("01")),
        Value::Bool(true)
    );
}

#[test]
fn test_null_comparisons() {
    assert_eq!(compare(ComparisonOp::Eq, Value::Null, Value::Null), Value::Bool(true));
    assert_eq!(
        compare(ComparisonOp::Eq, Value::Null, Value::Int32(0)),
        Value::Bool(false)
    );
    assert_eq!(
        compare(ComparisonOp::Lt, Value::Null, Value::Int32(1)),
        Value::Bool(true)
    );
    assert_eq!(
        compare(ComparisonOp::Ge, Value::Int32(-1), Value::Null),
        Value::Bool(false)
    );
}

#[test]
fn test_broadcast_filters_elements() {
    assert_eq!(compare(ComparisonOp::Eq, ints(&[1, 2, 3, 2]), Value::Int32(2)), ints(&[2, 2]));
    assert_eq!(compare(ComparisonOp::Gt, ints(&[1, 2, 3]), Value::Int32(5)), ints(&[]));
}

#[test]
fn test_scalar_only_does_not_broadcast() {
    let engine = Engine::new();
    let items = ints(&[1]);
    let result = engine
        .compare_with(
            &EvalContext::new(),
            ComparisonOp::Eq,
            ShapeFlags::SCALAR_ONLY,
            &items,
            &items,
        )
        .unwrap();
    assert_eq!(result, Value::Bool(true));
    let other = engine
        .compare_with(
            &EvalContext::new(),
            ComparisonOp::Eq,
            ShapeFlags::SCALAR_ONLY,
            &items,
            &ints(&[1]),
        )
        .unwrap();
    assert_eq!(other, Value::Bool(false));
}

#[test]
fn test_containment() {
    assert_eq!(
        compare(ComparisonOp::Contains, ints(&[1, 2, 3]), Value::string("2")),
        Value::Bool(true)
    );
    assert_eq!(
        compare(ComparisonOp::NotIn, Value::Int32(9), ints(&[1, 2, 3])),
        Value::Bool(true)
    );
    assert_eq!(
        compare(ComparisonOp::In, Value::string("B"), Value::array(vec![Value::string("b")])),
        Value::Bool(true)
    );
}

#[test]
fn test_non_ascii_right_operand() {
    let five = || Value::Int32(5);
    assert_eq!(compare(ComparisonOp::Eq, five(), Value::string("a€")), Value::Bool(false));
    assert_eq!(compare(ComparisonOp::Ne, five(), Value::string("1€")), Value::Bool(true));
    assert_eq!(
        compare(ComparisonOp::Eq, ints(&[5, 6]), Value::string("5€")),
        ints(&[])
    );
    let err = Engine::new()
        .compare(&EvalContext::new(), ComparisonOp::Gt, &five(), &Value::string("a€"))
        .unwrap_err();
    assert!(err.is_conversion());
}

#[test]
fn test_huge_integer_literals_keep_their_order() {
    let small = Value::string("100000000000000000000000000000000");
    let large = Value::string("170000000000000000000000000000000000000");
    assert_eq!(
        compare(ComparisonOp::Lt, Value::Double(1e32), large.clone()),
        Value::Bool(true)
    );
    assert_eq!(compare(ComparisonOp::Eq, Value::Double(1e32), small), Value::Bool(true));
    assert_eq!(compare(ComparisonOp::Eq, Value::Double(1e32), large), Value::Bool(false));
}

#[test]
fn test_ordering_conversion_failure_raises() {
    let err = Engine::new()
        .compare(
            &EvalContext::new(),
            ComparisonOp::Lt,
            &Value::Int32(1),
            &Value::string("one"),
        )
        .unwrap_err();
    assert!(err.is_conversion());
}

#[test]
fn test_host_comparers() {
    let engine = Engine::new();
    let ordered = HostTypeBuilder::new("Contoso.Version")
        .typed_comparer(|l, r| {
            let a = l.as_host_object()?.payload::<u32>()?;
            let b = r.as_host_object()?.payload::<u32>()?;
            Some(a.cmp(b))
        })
        .build();
    let v1 = Value::host(ordered.clone(), 1_u32);
    let v2 = Value::host(ordered, 2_u32);
    let ctx = EvalContext::new();
    assert_eq!(
        engine.compare(&ctx, ComparisonOp::Lt, &v1, &v2).unwrap(),
        Value::Bool(true)
    );

    let opaque = HostTypeBuilder::new("Contoso.Opaque").build();
    let a = Value::host(opaque.clone(), ());
    let b = Value::host(opaque, ());
    assert_eq!(
        engine.compare(&ctx, ComparisonOp::Eq, &a, &a).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        engine.compare(&ctx, ComparisonOp::Eq, &a, &b).unwrap(),
        Value::Bool(false)
    );
    let err = engine.compare(&ctx, ComparisonOp::Lt, &a, &b).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NotComparable { .. }));
}
