use super::*;
use pretty_assertions::assert_eq;

fn invariant() -> Culture {
    Culture::invariant()
}

#[test]
fn test_truthiness_of_collections() {
    assert!(!is_truthy(&Value::array(vec![])));
    assert!(!is_truthy(&Value::array(vec![Value::Int32(0)])));
    assert!(is_truthy(&Value::array(vec![Value::Int32(0), Value::Int32(0)])));
    // Single elements unwrap recursively.
    let nested = Value::array(vec![Value::array(vec![Value::Bool(false)])]);
    assert!(!is_truthy(&nested));
    assert!(is_truthy(&Value::dictionary(false)));
}

#[test]
fn test_truthiness_of_scalars() {
    assert!(!is_truthy(&Value::Null));
    assert!(!is_truthy(&Value::string("")));
    assert!(is_truthy(&Value::string("0")));
    assert!(!is_truthy(&Value::Int32(0)));
    assert!(is_truthy(&Value::Double(0.1)));
    assert!(!is_truthy(&Value::Char('\0')));
}

#[test]
fn test_to_string_scalars() {
    assert_eq!(to_string(&Value::Bool(true), &invariant()), "True");
    assert_eq!(to_string(&Value::Null, &invariant()), "");
    assert_eq!(to_string(&Value::Double(1.5), &invariant()), "1.5");
    assert_eq!(to_string(&Value::Double(1.0e20), &invariant()), "1E+20");
    assert_eq!(to_string(&Value::Double(f64::NAN), &invariant()), "NaN");
}

#[test]
fn test_to_string_uses_culture() {
    let comma = Culture::invariant()
        .with_decimal_separator(',')
        .with_list_separator(";");
    assert_eq!(to_string(&Value::Double(0.5), &comma), "0,5");
    let items = Value::array(vec![Value::Int32(1), Value::Double(2.5)]);
    assert_eq!(to_string(&items, &comma), "1;2,5");
}

#[test]
fn test_to_string_nested_collection_shows_type() {
    let items = Value::array(vec![Value::Int32(1), Value::array(vec![Value::Int32(2)])]);
    assert_eq!(to_string(&items, &invariant()), "1 System.Object[]");
}

#[test]
fn test_scalar_conversion_rounds_to_even() {
    let two = convert_to_scalar(&Value::Double(2.5), ScalarType::Int32, &invariant()).unwrap();
    assert_eq!(two, Value::Int32(2));
    let four = convert_to_scalar(&Value::Double(3.5), ScalarType::Int32, &invariant()).unwrap();
    assert_eq!(four, Value::Int32(4));
}

#[test]
fn test_scalar_conversion_parses_strings() {
    let n = convert_to_scalar(&Value::string(" 42 "), ScalarType::Int64, &invariant()).unwrap();
    assert_eq!(n, Value::Int64(42));
    let err = convert_to_scalar(&Value::string("abc"), ScalarType::Int32, &invariant()).unwrap_err();
    assert!(err.is_conversion());
}

#[test]
fn test_scalar_conversion_overflow_fails() {
    let err =
        convert_to_scalar(&Value::Int64(i64::MAX), ScalarType::Int32, &invariant()).unwrap_err();
    assert!(err.is_conversion());
    let err = convert_to_scalar(&Value::Int32(-1), ScalarType::UInt32, &invariant()).unwrap_err();
    assert!(err.is_conversion());
}

#[test]
fn test_char_conversion() {
    assert_eq!(
        convert_to_scalar(&Value::string("x"), ScalarType::Char, &invariant()).unwrap(),
        Value::Char('x')
    );
    assert_eq!(
        convert_to_scalar(&Value::Int32(65), ScalarType::Char, &invariant()).unwrap(),
        Value::Char('A')
    );
    assert!(convert_to_scalar(&Value::string("xy"), ScalarType::Char, &invariant()).is_err());
}

#[test]
fn test_to_array_shapes() {
    assert_eq!(to_array(&Value::Null), Value::Null);
    assert_eq!(to_array(&Value::Int32(3)), Value::array(vec![Value::Int32(3)]));
    let list = Value::list(vec![Value::Int32(1), Value::Int32(2)]);
    assert_eq!(
        to_array(&list),
        Value::array(vec![Value::Int32(1), Value::Int32(2)])
    );
}

#[test]
fn test_elements_of_skips_dictionaries() {
    assert_eq!(elements_of(&Value::dictionary(false)).unwrap(), None);
    assert_eq!(elements_of(&Value::Int32(1)).unwrap(), None);
    assert_eq!(
        elements_of(&Value::array(vec![Value::Int32(1)])).unwrap(),
        Some(vec![Value::Int32(1)])
    );
}

#[test]
fn test_preview_truncates() {
    let long = Value::string("x".repeat(100));
    let text = preview(&long);
    assert_eq!(text.chars().count(), 43);
    assert!(text.ends_with("..."));
}

#[test]
fn test_named_conversion_through_engine() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let n = engine
        .convert_to_named(&ctx, "System.Int32", &Value::string("12"))
        .unwrap();
    assert_eq!(n, Value::Int32(12));
    let err = engine
        .convert_to_named(&ctx, "No.Such.Type", &Value::Int32(1))
        .unwrap_err();
    assert!(err.is_conversion());
}

#[test]
fn test_host_conversion_by_constructor_and_properties() {
    use crate::tests::fixture::{widget_name, widget_type};

    let engine = Engine::new();
    engine.register_host_type(widget_type());
    let ctx = EvalContext::new();
    let built = engine
        .convert_to_named(&ctx, "Contoso.Widget", &Value::string("cog"))
        .unwrap();
    assert_eq!(widget_name(&built), "cog");

    let bag = Value::dictionary_from([
        (Value::string("Name"), Value::string("gear")),
        (Value::string("Size"), Value::string("4")),
    ]);
    let filled = engine.convert_to_named(&ctx, "Widget", &bag).unwrap();
    assert_eq!(widget_name(&filled), "gear");
    assert_eq!(engine.get_member(&ctx, &filled, "Size").unwrap(), Value::Int32(4));

    let same = engine.convert_to_named(&ctx, "Contoso.Widget", &built).unwrap();
    assert_eq!(same.identity(), built.identity());
}
