use super::*;
use shale_value::Member;

fn ctx() -> EvalContext {
    EvalContext::new()
}

#[test]
fn test_type_guard_distinguishes_types() {
    let mut guard = Guard::new();
    guard.types_of(&[Value::Int32(1), Value::string("a")]);
    assert!(guard.holds(&[Value::Int32(9), Value::string("b")], &ctx()));
    assert!(!guard.holds(&[Value::Int64(9), Value::string("b")], &ctx()));
    assert!(!guard.holds(&[Value::Int32(9)], &ctx()));
}

#[test]
fn test_type_guard_pins_wrapper() {
    let mut guard = Guard::new();
    guard.type_of(0, &Value::Int32(1));
    assert!(!guard.holds(&[Value::wrap(Value::Int32(1))], &ctx()));
}

#[test]
fn test_sign_guard() {
    let mut guard = Guard::new();
    guard.sign_of(0, &Value::Int32(-4));
    assert!(guard.holds(&[Value::Int32(-1)], &ctx()));
    assert!(!guard.holds(&[Value::Int32(0)], &ctx()));
}

#[test]
fn test_version_guard_goes_stale() {
    let counter = VersionCounter::new();
    let mut guard = Guard::new();
    guard.version(counter.clone());
    assert!(guard.holds(&[], &ctx()));
    assert!(!guard.is_stale());
    counter.bump();
    assert!(!guard.holds(&[], &ctx()));
    assert!(guard.is_stale());
}

#[test]
fn test_adjunct_guard() {
    let value = Value::wrap(Value::Int32(1));
    let mut guard = Guard::new();
    guard.adjunct_of(0, &value);
    assert!(guard.holds(std::slice::from_ref(&value), &ctx()));
    assert!(guard.holds(&[Value::Int32(1)], &ctx()));
    if let Some(w) = value.wrapper() {
        w.adjunct_mut().type_names.push("Tagged".into());
        w.adjunct_mut().members.insert(Member::note("x", Value::Null));
    }
    assert!(!guard.holds(std::slice::from_ref(&value), &ctx()));
}

#[test]
fn test_identity_and_length() {
    let a = Value::array(vec![Value::Int32(1), Value::Int32(2)]);
    let mut guard = Guard::new();
    guard.identity(0, a.identity().unwrap_or_default());
    guard.push(GuardAtom::ArrayLength { arg: 0, len: 2 });
    assert!(guard.holds(std::slice::from_ref(&a), &ctx()));
    let b = Value::array(vec![Value::Int32(1), Value::Int32(2)]);
    assert!(!guard.holds(&[b], &ctx()));
}

#[test]
fn test_language_mode_guard() {
    let mut guard = Guard::new();
    guard.push(GuardAtom::LanguageModeIs(LanguageMode::Full));
    assert!(guard.holds(&[], &ctx()));
    let constrained = ctx().with_language_mode(LanguageMode::Constrained);
    assert!(!guard.holds(&[], &constrained));
}

#[test]
fn test_never_and_always() {
    assert!(Guard::always().holds(&[], &ctx()));
    assert!(!Guard::never().holds(&[], &ctx()));
    assert!(Guard::never().is_never());
    assert!(Guard::new().holds(&[Value::Null], &ctx()));
}
