//! Tests for the promotion lattice and raw numeric operations.

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use shale_ir::{BinaryOp, UnaryOp};
use shale_value::{ErrorKind, Value};

use crate::numeric::{arith, bitwise, promote, promote_bitwise, sign_matters, unary};
use crate::{Engine, EvalContext, Num, NumKind};

#[test]
fn test_promote_picks_widest() {
    assert_eq!(promote(NumKind::Int32, false, NumKind::Int64, false), NumKind::Int64);
    assert_eq!(promote(NumKind::Decimal, false, NumKind::Double, false), NumKind::Double);
    assert_eq!(promote(NumKind::Int32, false, NumKind::UInt32, false), NumKind::UInt32);
}

#[test]
fn test_promote_negative_signed_leaves_unsigned() {
    assert_eq!(promote(NumKind::Int32, true, NumKind::UInt32, false), NumKind::Int64);
    assert_eq!(promote(NumKind::Int64, true, NumKind::UInt64, false), NumKind::Decimal);
    // Bitwise promotion never leaves the integers.
    assert_eq!(
        promote_bitwise(NumKind::Int64, true, NumKind::UInt64, false),
        NumKind::Int64
    );
}

#[test]
fn test_sign_matters_only_against_wider_unsigned() {
    assert!(sign_matters(NumKind::Int32, NumKind::UInt32));
    assert!(sign_matters(NumKind::Int32, NumKind::UInt64));
    assert!(!sign_matters(NumKind::Int64, NumKind::UInt32));
    assert!(!sign_matters(NumKind::UInt32, NumKind::Int32));
}

#[test]
fn test_integer_overflow_moves_to_double() {
    let sum = arith(BinaryOp::Add, Num::I32(i32::MAX), Num::I32(1)).unwrap();
    assert_eq!(sum, Num::F64(f64::from(i32::MAX) + 1.0));
}

#[test]
fn test_inexact_division_yields_double() {
    assert_eq!(arith(BinaryOp::Div, Num::I32(6), Num::I32(3)).unwrap(), Num::I32(2));
    assert_eq!(arith(BinaryOp::Div, Num::I32(7), Num::I32(2)).unwrap(), Num::F64(3.5));
}

#[test]
fn test_division_by_zero() {
    let err = arith(BinaryOp::Div, Num::I32(1), Num::I32(0)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DivideByZero);
    let err = arith(BinaryOp::Rem, Num::Dec(Decimal::ONE), Num::Dec(Decimal::ZERO)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DivideByZero);
    let inf = arith(BinaryOp::Div, Num::F64(1.0), Num::F64(0.0)).unwrap();
    assert_eq!(inf, Num::F64(f64::INFINITY));
}

#[test]
fn test_decimal_addition_overflow_raises() {
    let err = arith(BinaryOp::Add, Num::Dec(Decimal::MAX), Num::Dec(Decimal::MAX)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ArithmeticOverflow { .. }));
}

#[test]
fn test_decimal_division_overflow_retries_in_double() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let max = Value::Decimal(Decimal::MAX);
    let tenth = Value::Decimal(Decimal::new(1, 1));
    match engine.binary(&ctx, BinaryOp::Div, &max, &tenth).unwrap() {
        Value::Double(d) => assert!(d.is_finite() && d > 7.9e29, "{d}"),
        other => panic!("expected a double, got {other:?}"),
    }
    // A string divisor parses as decimal against a decimal, then overflows
    // the same way.
    let half = Value::string("0.5");
    match engine.binary(&ctx, BinaryOp::Div, &max, &half).unwrap() {
        Value::Double(d) => assert!(d.is_finite() && d > 1.5e29, "{d}"),
        other => panic!("expected a double, got {other:?}"),
    }
}

#[test]
fn test_decimal_remainder_of_extreme_operands() {
    // The remainder never exceeds the divisor, so it stays decimal.
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let max = Value::Decimal(Decimal::MAX);
    let rem = engine
        .binary(&ctx, BinaryOp::Rem, &max, &Value::Decimal(Decimal::new(1, 1)))
        .unwrap();
    assert!(matches!(rem, Value::Decimal(d) if d.is_zero()), "{rem:?}");
    let rem = engine
        .binary(&ctx, BinaryOp::Rem, &max, &Value::Decimal(Decimal::from(10)))
        .unwrap();
    assert_eq!(rem, Value::Decimal(Decimal::from(5)));
    let err = engine
        .binary(&ctx, BinaryOp::Rem, &max, &Value::Decimal(Decimal::ZERO))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::DivideByZero);
}

#[test]
fn test_decimal_keeps_precision() {
    let a = Num::Dec(Decimal::new(1, 1));
    let b = Num::Dec(Decimal::new(2, 1));
    assert_eq!(arith(BinaryOp::Add, a, b).unwrap(), Num::Dec(Decimal::new(3, 1)));
}

#[test]
fn test_shift_masks_count() {
    assert_eq!(
        bitwise(BinaryOp::Shl, Num::I32(1), Num::I32(33), NumKind::Int32),
        Some(Num::I32(2))
    );
    assert_eq!(
        bitwise(BinaryOp::Shr, Num::I64(-8), Num::I32(1), NumKind::Int64),
        Some(Num::I64(-4))
    );
}

#[test]
fn test_bitwise_rounds_fractions() {
    assert_eq!(
        bitwise(BinaryOp::BitAnd, Num::F64(6.5), Num::I64(3), NumKind::Int64),
        Some(Num::I64(2))
    );
}

#[test]
fn test_negation_widens_at_minimum() {
    assert_eq!(
        unary(UnaryOp::Neg, Num::I32(i32::MIN)),
        Some(Num::I64(-i64::from(i32::MIN)))
    );
    assert_eq!(unary(UnaryOp::Neg, Num::U32(5)), Some(Num::I64(-5)));
    assert_eq!(unary(UnaryOp::BitNot, Num::I32(0)), Some(Num::I32(-1)));
    assert_eq!(unary(UnaryOp::Not, Num::I32(0)), None);
}

#[test]
fn test_compare_across_kinds() {
    use std::cmp::Ordering;
    assert_eq!(Num::I32(1).compare(Num::U64(1)), Some(Ordering::Equal));
    assert_eq!(
        Num::Dec(Decimal::new(15, 1)).compare(Num::I64(2)),
        Some(Ordering::Less)
    );
    assert_eq!(Num::F64(f64::NAN).compare(Num::I32(0)), None);
}
