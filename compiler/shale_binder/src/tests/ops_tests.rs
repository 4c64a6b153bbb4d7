//! Tests for binary and unary operator resolution.

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use shale_ir::{BinaryOp, OperationShape, ScalarType, UnaryOp};
use shale_value::{ErrorKind, HostTypeBuilder, ParamType, Value};

use crate::{Engine, EvalContext};

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, shale_value::EvalError> {
    Engine::new().binary(&EvalContext::new(), op, &left, &right)
}

#[test]
fn test_int_arithmetic() {
    assert_eq!(
        binary(BinaryOp::Add, Value::Int32(2), Value::Int32(3)).unwrap(),
        Value::Int32(5)
    );
    assert_eq!(
        binary(BinaryOp::Rem, Value::Int32(7), Value::Int32(2)).unwrap(),
        Value::Int32(1)
    );
    assert_eq!(
        binary(BinaryOp::Div, Value::Int32(7), Value::Int32(2)).unwrap(),
        Value::Double(3.5)
    );
}

#[test]
fn test_mixed_kinds_promote() {
    assert_eq!(
        binary(BinaryOp::Add, Value::Int32(1), Value::Int64(2)).unwrap(),
        Value::Int64(3)
    );
    assert_eq!(
        binary(BinaryOp::Mul, Value::Int32(2), Value::Decimal(Decimal::new(15, 1))).unwrap(),
        Value::Decimal(Decimal::new(30, 1))
    );
    assert_eq!(
        binary(BinaryOp::Add, Value::Bool(true), Value::Int32(1)).unwrap(),
        Value::Int32(2)
    );
}

#[test]
fn test_negative_signed_with_unsigned() {
    assert_eq!(
        binary(BinaryOp::Add, Value::Int32(-1), Value::UInt32(5)).unwrap(),
        Value::Int64(4)
    );
    assert_eq!(
        binary(BinaryOp::Add, Value::Int32(1), Value::UInt32(5)).unwrap(),
        Value::UInt32(6)
    );
}

#[test]
fn test_sign_guard_separates_rules() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let site = engine.call_site(&OperationShape::binary(BinaryOp::Add)).unwrap();
    let positive = site
        .invoke(&engine, &ctx, &[Value::Int32(1), Value::UInt32(5)])
        .unwrap();
    let negative = site
        .invoke(&engine, &ctx, &[Value::Int32(-1), Value::UInt32(5)])
        .unwrap();
    assert_eq!(positive, Value::UInt32(6));
    assert_eq!(negative, Value::Int64(4));
    assert_eq!(site.binder().stats().rules, 2);
}

#[test]
fn test_string_operand_parses() {
    assert_eq!(
        binary(BinaryOp::Add, Value::string("3"), Value::Int32(4)).unwrap(),
        Value::Int32(7)
    );
    assert_eq!(
        binary(BinaryOp::Sub, Value::Int32(10), Value::string("0x4")).unwrap(),
        Value::Int32(6)
    );
    let err = binary(BinaryOp::Add, Value::string("abc"), Value::Int32(4)).unwrap_err();
    assert!(err.is_conversion());
}

#[test]
fn test_non_ascii_operand_is_a_conversion_error() {
    for text in ["1€", "a€", "€", "2ü"] {
        let err = binary(BinaryOp::Add, Value::string(text), Value::Int32(4)).unwrap_err();
        assert!(err.is_conversion(), "{text}: {err:?}");
    }
    let err = binary(BinaryOp::Sub, Value::Int32(4), Value::string("1€")).unwrap_err();
    assert!(err.is_conversion());
}

#[test]
fn test_integer_literal_beyond_decimal_range() {
    assert_eq!(
        binary(
            BinaryOp::Add,
            Value::string("100000000000000000000000000000000"),
            Value::Int32(0)
        )
        .unwrap(),
        Value::Double(1e32)
    );
    assert_eq!(
        binary(
            BinaryOp::Add,
            Value::string("170000000000000000000000000000000000000"),
            Value::Int32(0)
        )
        .unwrap(),
        Value::Double(1.7e38)
    );
}

#[test]
fn test_string_concat_and_repeat() {
    assert_eq!(
        binary(BinaryOp::Add, Value::string("ab"), Value::string("cd")).unwrap(),
        Value::string("abcd")
    );
    assert_eq!(
        binary(BinaryOp::Add, Value::string("n="), Value::Bool(true)).unwrap(),
        Value::string("n=True")
    );
    assert_eq!(
        binary(BinaryOp::Mul, Value::string("ab"), Value::Int32(3)).unwrap(),
        Value::string("ababab")
    );
    assert!(binary(BinaryOp::Mul, Value::string("ab"), Value::Int32(-1)).is_err());
}

#[test]
fn test_repetition_is_bounded() {
    let items = Value::array((1..=4).map(Value::Int32).collect());
    let err = binary(BinaryOp::Mul, items, Value::Int32(i32::MAX)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Native { .. }));
    let err = binary(BinaryOp::Mul, Value::string("ab"), Value::Int32(i32::MAX)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Native { .. }));
    // Nothing to repeat, nothing to allocate.
    assert_eq!(
        binary(BinaryOp::Mul, Value::string(""), Value::Int32(i32::MAX)).unwrap(),
        Value::string("")
    );
}

#[test]
fn test_null_operands() {
    assert_eq!(
        binary(BinaryOp::Add, Value::Null, Value::string("x")).unwrap(),
        Value::string("x")
    );
    assert_eq!(
        binary(BinaryOp::Sub, Value::Null, Value::Int32(5)).unwrap(),
        Value::Int32(-5)
    );
    assert_eq!(
        binary(BinaryOp::Mul, Value::Int32(5), Value::Null).unwrap(),
        Value::Int32(0)
    );
}

#[test]
fn test_collection_operators() {
    let items = Value::array(vec![Value::Int32(1), Value::Int32(2)]);
    assert_eq!(
        binary(BinaryOp::Add, items.clone(), Value::Int32(3)).unwrap(),
        Value::array(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)])
    );
    assert_eq!(
        binary(BinaryOp::Add, items.clone(), items.clone()).unwrap(),
        Value::array(vec![
            Value::Int32(1),
            Value::Int32(2),
            Value::Int32(1),
            Value::Int32(2)
        ])
    );
    assert_eq!(
        binary(BinaryOp::Mul, items, Value::Int32(2)).unwrap(),
        Value::array(vec![
            Value::Int32(1),
            Value::Int32(2),
            Value::Int32(1),
            Value::Int32(2)
        ])
    );
}

#[test]
fn test_dictionary_merge_rejects_duplicates() {
    let left = Value::dictionary_from([(Value::string("a"), Value::Int32(1))]);
    let right = Value::dictionary_from([(Value::string("b"), Value::Int32(2))]);
    let merged = binary(BinaryOp::Add, left.clone(), right).unwrap();
    assert_eq!(merged.collection_len(), Some(2));

    let clash = Value::dictionary_from([(Value::string("A"), Value::Int32(9))]);
    let err = binary(BinaryOp::Add, left, clash).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::DuplicateKey { .. }));
}

#[test]
fn test_undefined_operator() {
    let err = binary(BinaryOp::Sub, Value::array(vec![]), Value::Int32(1)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::OperatorNotDefined { .. }));
}

#[test]
fn test_bitwise_and_shift() {
    assert_eq!(
        binary(BinaryOp::BitOr, Value::Int32(5), Value::Int32(2)).unwrap(),
        Value::Int32(7)
    );
    assert_eq!(
        binary(BinaryOp::Shl, Value::Int32(1), Value::Int32(4)).unwrap(),
        Value::Int32(16)
    );
}

#[test]
fn test_host_operator_method() {
    let engine = Engine::new();
    let money = HostTypeBuilder::new("Contoso.Money")
        .static_method(
            "op_Addition",
            vec![ParamType::Object, ParamType::Scalar(ScalarType::Int32)],
            |_, args| {
                let bonus = args.get(1).and_then(Value::as_i64).unwrap_or(0);
                Ok(Value::Int64(100 + bonus))
            },
        )
        .build();
    engine.register_host_type(money.clone());
    let m = Value::host(money, ());
    let result = engine
        .binary(&EvalContext::new(), BinaryOp::Add, &m, &Value::Int32(5))
        .unwrap();
    assert_eq!(result, Value::Int64(105));
    let err = engine
        .binary(&EvalContext::new(), BinaryOp::Sub, &m, &Value::Int32(5))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::OperatorNotDefined { .. }));
}

#[test]
fn test_unary_operators() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    assert_eq!(
        engine.unary(&ctx, UnaryOp::Neg, &Value::string("4")).unwrap(),
        Value::Int32(-4)
    );
    assert_eq!(
        engine.unary(&ctx, UnaryOp::Not, &Value::string("")).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        engine.unary(&ctx, UnaryOp::Neg, &Value::Null).unwrap(),
        Value::Int32(0)
    );
    assert!(engine.unary(&ctx, UnaryOp::Neg, &Value::array(vec![])).is_err());
}
