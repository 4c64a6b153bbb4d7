use super::*;
use pretty_assertions::assert_eq;

fn base_type() -> HostTypeRef {
    HostTypeBuilder::new("Contoso.Shape")
        .property("Sides", |_, _| Ok(Value::Int32(0)))
        .method("Describe", vec![], |_, _| Ok(Value::string("shape")))
        .build()
}

#[test]
fn test_short_name_from_full_name() {
    let ty = HostTypeBuilder::new("Contoso.Geometry.Square").build();
    assert_eq!(ty.name(), "Square");
    assert_eq!(ty.full_name(), "Contoso.Geometry.Square");
}

#[test]
fn test_ids_are_unique() {
    let a = HostTypeBuilder::new("A").build();
    let b = HostTypeBuilder::new("A").build();
    assert_ne!(a.id(), b.id());
}

#[test]
fn test_property_lookup_walks_base_chain() {
    let base = base_type();
    let derived = HostTypeBuilder::new("Contoso.Square")
        .base(base.clone())
        .property("Side", |_, _| Ok(Value::Int32(4)))
        .build();

    assert!(derived.find_property("side").is_some());
    let sides = derived.find_property("SIDES");
    assert_eq!(sides.map(|p| p.declaring_type), Some(base.id()));
    assert_eq!(
        derived.type_names(),
        vec!["Contoso.Square", "Contoso.Shape"]
    );
    assert!(derived.is_assignable_to(base.id()));
    assert!(!base.is_assignable_to(derived.id()));
}

#[test]
fn test_method_overloads_merge_across_levels() {
    let base = base_type();
    let derived = HostTypeBuilder::new("Contoso.Square")
        .base(base)
        .method(
            "Describe",
            vec![ParamType::Scalar(ScalarType::Int32)],
            |_, _| Ok(Value::string("square")),
        )
        .build();

    let method = derived.find_method("describe", false);
    assert_eq!(method.map(|m| m.overloads.len()), Some(2));
    assert!(derived.find_method("Describe", true).is_none());
}

#[test]
fn test_params_array_arity() {
    let ty = HostTypeBuilder::new("Contoso.Text")
        .overload(
            "Join",
            true,
            vec![ParamType::Scalar(ScalarType::String), ParamType::Array],
            true,
            Visibility::Public,
            Arc::new(|_: &Value, _: &[Value]| -> EvalResult { Ok(Value::Null) }),
        )
        .build();
    let join = ty.find_method("Join", true);
    let overload = join.as_ref().and_then(|m| m.overloads.first());
    assert!(overload.is_some_and(|o| o.accepts_arity(1)));
    assert!(overload.is_some_and(|o| o.accepts_arity(5)));
    assert!(overload.is_some_and(|o| !o.accepts_arity(0)));
}

#[test]
fn test_payload_downcast() {
    let ty = HostTypeBuilder::new("Contoso.Counter").build();
    let obj = HostObject::new(ty, 41_u32);
    assert_eq!(obj.payload::<u32>(), Some(&41));
    assert_eq!(obj.payload::<i64>(), None);
}
