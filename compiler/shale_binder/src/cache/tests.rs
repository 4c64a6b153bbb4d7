use super::*;
use pretty_assertions::assert_eq;
use shale_ir::{BinaryOp, SharedInterner};
use shale_value::native_error;

use crate::invalidation::VersionCounter;

fn typed_rule(sample: &Value) -> Arc<Rule> {
    let mut guard = Guard::new();
    guard.type_of(0, sample);
    Arc::new(Rule::new(guard, Plan::Raise(native_error("marker"))))
}

fn binder() -> Binder {
    Binder::new(OperationShape::unary(shale_ir::UnaryOp::Neg))
}

#[test]
fn test_lookup_finds_matching_rule() {
    let binder = binder();
    binder.insert(&typed_rule(&Value::Int32(1)), 4);
    let ctx = EvalContext::new();
    assert!(binder.lookup(&[Value::Int32(7)], &ctx).is_some());
    assert!(binder.lookup(&[Value::string("7")], &ctx).is_none());
}

#[test]
fn test_bound_collapses_to_general_rule() {
    let binder = binder();
    binder.insert(&typed_rule(&Value::Int32(1)), 2);
    binder.insert(&typed_rule(&Value::Int64(1)), 2);
    assert!(!binder.stats().megamorphic);

    binder.insert(&typed_rule(&Value::Double(1.0)), 2);
    let stats = binder.stats();
    assert!(stats.megamorphic);
    assert_eq!(stats.rules, 1);

    // The general rule matches anything and re-resolves.
    let rule = binder
        .lookup(&[Value::Bool(true)], &EvalContext::new())
        .unwrap();
    assert!(rule.plan.is_dynamic());

    // Megamorphic binders ignore later inserts.
    binder.insert(&typed_rule(&Value::Int32(1)), 2);
    assert_eq!(binder.stats().rules, 1);
}

#[test]
fn test_insert_drops_stale_rules() {
    let binder = binder();
    let counter = VersionCounter::new();
    let mut guard = Guard::new();
    guard.type_of(0, &Value::Int32(1));
    guard.version(counter.clone());
    binder.insert(&Arc::new(Rule::new(guard, Plan::Raise(native_error("old")))), 4);
    assert_eq!(binder.stats().rules, 1);

    counter.bump();
    binder.insert(&typed_rule(&Value::Int64(1)), 4);
    assert_eq!(binder.stats().rules, 1);
    assert!(binder
        .lookup(&[Value::Int32(1)], &EvalContext::new())
        .is_none());
}

#[test]
fn test_registry_interns_by_shape() {
    let interner = SharedInterner::new();
    let registry = BinderRegistry::new();
    let a = registry.get_or_create(&OperationShape::binary(BinaryOp::Add), &interner);
    let b = registry.get_or_create(&OperationShape::binary(BinaryOp::Add), &interner);
    let c = registry.get_or_create(&OperationShape::binary(BinaryOp::Sub), &interner);
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_registry_indexes_member_names_case_insensitively() {
    let interner = SharedInterner::new();
    let registry = BinderRegistry::new();
    registry.get_or_create(&OperationShape::get_member(interner.intern("Length")), &interner);
    registry.get_or_create(&OperationShape::set_member(interner.intern("length")), &interner);
    registry.get_or_create(&OperationShape::get_member(interner.intern("Count")), &interner);
    assert_eq!(registry.binders_for_member("LENGTH").len(), 2);
    assert!(registry.binders_for_member("Missing").is_empty());
    assert_eq!(registry.count_for_member("length"), 2);
    assert_eq!(registry.count_for_member("count"), 1);
    assert_eq!(registry.count_for_member("Missing"), 0);
}

#[test]
fn test_call_site_counts_hits() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let site = engine
        .call_site(&OperationShape::binary(BinaryOp::Add))
        .unwrap();
    for i in 0..5 {
        let result = site
            .invoke(&engine, &ctx, &[Value::Int32(i), Value::Int32(1)])
            .unwrap();
        assert_eq!(result.as_i64(), Some(i64::from(i) + 1));
    }
    let stats = site.binder().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 4);
    assert_eq!(stats.rules, 1);
}

#[test]
fn test_call_site_checks_arity() {
    let engine = Engine::new();
    let site = engine
        .call_site(&OperationShape::binary(BinaryOp::Add))
        .unwrap();
    let err = site
        .invoke(&engine, &EvalContext::new(), &[Value::Int32(1)])
        .unwrap_err();
    assert!(matches!(err.kind, shale_value::ErrorKind::InvalidShape { .. }));
}
