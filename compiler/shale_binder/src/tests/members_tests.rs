//! Tests for member get, set, invoke and construction.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use shale_ir::{OperationShape, TypeName};
use shale_value::{ErrorKind, Member, NativeFn, Value};

use super::fixture::{widget, widget_name, widget_type};
use crate::{Engine, EvalContext, LanguageMode};

#[test]
fn test_native_property_is_case_insensitive() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let w = widget("gizmo");
    assert_eq!(engine.get_member(&ctx, &w, "Name").unwrap(), Value::string("gizmo"));
    assert_eq!(engine.get_member(&ctx, &w, "NAME").unwrap(), Value::string("gizmo"));
    assert_eq!(
        engine.get_member(&ctx, &Value::string("abc"), "length").unwrap(),
        Value::Int32(3)
    );
}

#[test]
fn test_missing_property_and_strict_mode() {
    let engine = Engine::new();
    let w = widget("gizmo");
    assert_eq!(
        engine.get_member(&EvalContext::new(), &w, "Nope").unwrap(),
        Value::Null
    );
    let err = engine
        .get_member(&EvalContext::new().with_strict_mode(2), &w, "Nope")
        .unwrap_err();
    assert!(err.is_member_not_found());
}

#[test]
fn test_count_of_singletons() {
    let engine = Engine::new();
    let ctx = EvalContext::new().with_strict_mode(3);
    assert_eq!(engine.get_member(&ctx, &Value::Int32(5), "Count").unwrap(), Value::Int32(1));
    assert_eq!(engine.get_member(&ctx, &Value::Null, "Length").unwrap(), Value::Int32(0));
}

#[test]
fn test_dictionary_keys_as_members() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let table = Value::dictionary_from([(Value::string("color"), Value::string("red"))]);
    assert_eq!(engine.get_member(&ctx, &table, "Color").unwrap(), Value::string("red"));
    // The native property wins over a key.
    assert_eq!(engine.get_member(&ctx, &table, "Count").unwrap(), Value::Int32(1));
    engine
        .set_member(&ctx, &table, "size", Value::Int32(4))
        .unwrap();
    assert_eq!(engine.get_member(&ctx, &table, "Size").unwrap(), Value::Int32(4));
}

#[test]
fn test_native_set_converts_and_checks() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let w = widget("gizmo");
    engine.set_member(&ctx, &w, "Size", Value::string("12")).unwrap();
    assert_eq!(engine.get_member(&ctx, &w, "Size").unwrap(), Value::Int32(12));
    assert!(engine
        .set_member(&ctx, &w, "Size", Value::string("twelve"))
        .unwrap_err()
        .is_conversion());

    let err = engine.set_member(&ctx, &w, "Count", Value::Int32(1)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ReadOnlyMember { .. }));
    let err = engine.get_member(&ctx, &w, "Span").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ByRefLikeMember { .. }));
    let err = engine.set_member(&ctx, &w, "Nope", Value::Int32(1)).unwrap_err();
    assert!(err.is_member_not_found());
}

#[test]
fn test_type_table_change_invalidates_call_site() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let site = engine
        .call_site(&OperationShape::get_member(engine.intern("Flavor")))
        .unwrap();
    let w = widget("gizmo");
    assert_eq!(site.invoke(&engine, &ctx, &[w.clone()]).unwrap(), Value::Null);

    engine.add_type_member("Contoso.Widget", Member::note("Flavor", Value::string("mint")));
    assert_eq!(
        site.invoke(&engine, &ctx, &[w.clone()]).unwrap(),
        Value::string("mint")
    );
    let err = engine
        .set_member(&ctx, &w, "Flavor", Value::string("lime"))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ReadOnlyMember { .. }));

    engine.remove_type_member("Contoso.Widget", "flavor");
    assert_eq!(site.invoke(&engine, &ctx, &[w]).unwrap(), Value::Null);
}

#[test]
fn test_type_table_script_method() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    engine.add_type_member(
        "System.Int32",
        Member::script_method(
            "Twice",
            Arc::new(|recv: &Value, _: &[Value]| Ok(Value::Int64(recv.as_i64().unwrap_or(0) * 2))),
        ),
    );
    assert_eq!(
        engine.invoke_member(&ctx, &Value::Int32(21), "Twice", &[]).unwrap(),
        Value::Int64(42)
    );
    // Script methods don't read as properties.
    assert_eq!(engine.get_member(&ctx, &Value::Int32(21), "Twice").unwrap(), Value::Null);
}

#[test]
fn test_instance_members() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let w = engine.add_instance_member(&widget("gizmo"), Member::note("Tag", Value::Int32(5)));
    assert_eq!(engine.get_member(&ctx, &w, "tag").unwrap(), Value::Int32(5));
    engine.set_member(&ctx, &w, "Tag", Value::Int32(6)).unwrap();
    assert_eq!(engine.get_member(&ctx, &w, "Tag").unwrap(), Value::Int32(6));
    // Native members still resolve through the wrapper.
    assert_eq!(engine.get_member(&ctx, &w, "Name").unwrap(), Value::string("gizmo"));

    let plain = widget("other");
    assert_eq!(engine.get_member(&ctx, &plain, "Tag").unwrap(), Value::Null);
}

#[test]
fn test_instance_members_stay_on_the_object() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let w = widget("gizmo");
    let alias = w.clone();
    let returned = engine.add_instance_member(&w, Member::note("Tag", Value::Int32(5)));
    assert_eq!(returned.identity(), w.identity());
    assert_eq!(engine.get_member(&ctx, &alias, "Tag").unwrap(), Value::Int32(5));

    engine.set_member(&ctx, &alias, "tag", Value::Int32(7)).unwrap();
    assert_eq!(engine.get_member(&ctx, &w, "Tag").unwrap(), Value::Int32(7));
    // Wrapping the object later keeps what it already carries.
    let wrapped = engine.with_type_name(&w, "Contoso.Special");
    assert_eq!(engine.get_member(&ctx, &wrapped, "Tag").unwrap(), Value::Int32(7));

    let list = Value::list(vec![Value::Int32(1)]);
    let first: NativeFn = Arc::new(|recv: &Value, _: &[Value]| {
        let items = recv.collection_items().unwrap_or_default();
        Ok(items.first().cloned().unwrap_or(Value::Null))
    });
    engine.add_instance_member(&list, Member::script_method("First", first));
    assert_eq!(engine.invoke_member(&ctx, &list, "First", &[]).unwrap(), Value::Int32(1));
    let other = Value::list(vec![Value::Int32(1)]);
    assert!(engine.invoke_member(&ctx, &other, "First", &[]).is_err());
}

#[test]
fn test_instance_member_shadows_dictionary_key() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let table = Value::dictionary_from([(Value::string("color"), Value::string("red"))]);
    assert_eq!(engine.get_member(&ctx, &table, "Color").unwrap(), Value::string("red"));
    engine.add_instance_member(&table, Member::note("Color", Value::string("blue")));
    assert_eq!(engine.get_member(&ctx, &table, "Color").unwrap(), Value::string("blue"));
    assert_eq!(
        engine.get_index(&ctx, &table, &[Value::string("color")]).unwrap(),
        Value::string("red")
    );
}

#[test]
fn test_alias_chains() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let w = engine.add_instance_member(&widget("gizmo"), Member::alias("Title", "Name"));
    assert_eq!(engine.get_member(&ctx, &w, "Title").unwrap(), Value::string("gizmo"));
    engine.set_member(&ctx, &w, "Title", Value::string("sprocket")).unwrap();
    assert_eq!(widget_name(&w), "sprocket");

    let looped = engine.add_instance_member(&widget("x"), Member::alias("A", "B"));
    let looped = engine.add_instance_member(&looped, Member::alias("B", "A"));
    let err = engine.get_member(&ctx, &looped, "A").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::CycleDetected { .. }));
}

#[test]
fn test_member_enumeration() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let widgets = Value::array(vec![widget("a"), widget("b")]);
    assert_eq!(
        engine.get_member(&ctx, &widgets, "Name").unwrap(),
        Value::array(vec![Value::string("a"), Value::string("b")])
    );
    let single = Value::array(vec![widget("only")]);
    assert_eq!(
        engine.get_member(&ctx, &single, "Name").unwrap(),
        Value::string("only")
    );

    let disabled = Engine::builder().member_enumeration(false).build();
    assert_eq!(disabled.get_member(&ctx, &widgets, "Name").unwrap(), Value::Null);
}

#[test]
fn test_overload_selection() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let w = widget("gizmo");
    let describe = |arg: Value| engine.invoke_member(&ctx, &w, "Describe", &[arg]).unwrap();
    assert_eq!(describe(Value::Int32(1)), Value::string("int"));
    assert_eq!(describe(Value::string("s")), Value::string("string"));
    assert_eq!(describe(Value::Int64(1)), Value::string("double"));

    let err = engine
        .invoke_member(&ctx, &w, "Pick", &[Value::Int32(1)])
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::AmbiguousOverload { .. }));
    assert_eq!(
        engine.invoke_member(&ctx, &w, "Pick", &[Value::Int64(1)]).unwrap(),
        Value::string("long")
    );
}

#[test]
fn test_static_members_and_construction() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let ty = Value::type_object(widget_type());
    assert_eq!(engine.get_static(&ctx, &ty, "Default").unwrap(), Value::Int32(42));
    let created = engine
        .invoke_static(&ctx, &ty, "Create", &[Value::string("made")])
        .unwrap();
    assert_eq!(widget_name(&created), "made");

    assert_eq!(widget_name(&engine.construct(&ctx, &ty, &[]).unwrap()), "");
    let named = engine.construct(&ctx, &ty, &[Value::string("built")]).unwrap();
    assert_eq!(widget_name(&named), "built");
    assert!(engine.construct(&ctx, &Value::Int32(1), &[]).is_err());
}

#[test]
fn test_private_members_need_class_scope() {
    let engine = Engine::new();
    engine.register_host_type(widget_type());
    let ctx = EvalContext::new();
    let w = widget("gizmo");
    assert_eq!(engine.get_member(&ctx, &w, "Secret").unwrap(), Value::Null);

    let scoped = OperationShape::get_member(engine.intern("Secret"))
        .with_class_scope(TypeName::new(engine.interner(), "Contoso.Widget"));
    assert_eq!(
        engine.resolve_or_invoke(&ctx, &scoped, &[w]).unwrap(),
        Value::string("hidden")
    );
}

#[test]
fn test_language_modes() {
    let engine = Engine::new();
    let w = widget("gizmo");
    let constrained = EvalContext::new().with_language_mode(LanguageMode::Constrained);
    let err = engine.get_member(&constrained, &w, "Name").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SecurityModeViolation { .. }));
    // Built-in types stay reachable.
    assert_eq!(
        engine.get_member(&constrained, &Value::string("ab"), "Length").unwrap(),
        Value::Int32(2)
    );

    let audit = EvalContext::new().with_language_mode(LanguageMode::ConstrainedAudit);
    assert_eq!(engine.get_member(&audit, &w, "Name").unwrap(), Value::string("gizmo"));

    let full = EvalContext::new();
    assert_eq!(engine.get_member(&full, &w, "Name").unwrap(), Value::string("gizmo"));
    assert!(engine.tighten_language_mode(LanguageMode::Constrained));
    assert!(!engine.tighten_language_mode(LanguageMode::Full));
    let err = engine.get_member(&full, &w, "Name").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SecurityModeViolation { .. }));
}

#[test]
fn test_deserialized_wrapper_skips_native_members() {
    let engine = Engine::new();
    let ctx = EvalContext::new();
    let restored = Value::wrap_deserialized(widget("gizmo"));
    assert_eq!(engine.get_member(&ctx, &restored, "Name").unwrap(), Value::Null);
    let restored = engine.add_instance_member(&restored, Member::note("Name", Value::string("saved")));
    assert_eq!(
        engine.get_member(&ctx, &restored, "Name").unwrap(),
        Value::string("saved")
    );
}
