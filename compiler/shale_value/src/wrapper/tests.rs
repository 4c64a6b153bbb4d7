use super::*;

#[test]
fn test_member_set_case_insensitive() {
    let mut set = MemberSet::new();
    set.insert(Member::note("Foo", Value::Int32(1)));
    assert!(set.get("foo").is_some());
    assert!(set.get("FOO").is_some());
    assert_eq!(set.len(), 1);
}

#[test]
fn test_member_set_replace_keeps_order() {
    let mut set = MemberSet::new();
    set.insert(Member::note("A", Value::Int32(1)));
    set.insert(Member::note("B", Value::Int32(2)));
    let replaced = set.insert(Member::note("a", Value::Int32(3)));
    assert!(replaced.is_some());
    let names: Vec<&str> = set.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["a", "B"]);
}

#[test]
fn test_member_set_remove_reindexes() {
    let mut set = MemberSet::new();
    set.insert(Member::note("A", Value::Int32(1)));
    set.insert(Member::note("B", Value::Int32(2)));
    set.insert(Member::note("C", Value::Int32(3)));
    assert!(set.remove("b").is_some());
    assert!(set.get("C").is_some());
    assert!(set.get("B").is_none());
    assert_eq!(set.len(), 2);
}

#[test]
fn test_wrapper_flags() {
    let wrapped = Value::wrap(Value::Int32(5));
    let Some(wrapper) = wrapped.wrapper() else {
        panic!("expected wrapper");
    };
    assert!(!wrapper.has_instance_members());
    assert!(!wrapper.has_custom_type_names());
    wrapper.adjunct_mut().type_names.push("Contoso.Tagged".into());
    assert!(wrapper.has_custom_type_names());
    assert!(!wrapper.is_deserialized());
}

#[test]
fn test_member_kinds() {
    let note = Member::note("N", Value::Null);
    assert!(note.is_property());
    let func: crate::host::NativeFn = std::sync::Arc::new(|_, _| Ok(Value::Null));
    let method = Member::script_method("M", func);
    assert!(!method.is_property());
    assert!(Member::alias("A", "N").into_static().is_static);
}
