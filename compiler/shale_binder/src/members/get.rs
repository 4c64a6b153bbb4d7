//! Member get resolution.

use shale_ir::{OperationShape, ShapeFlags};
use shale_value::{by_ref_like_member, write_only_member, HostProperty, HostTypeRef, MemberKind, Value};

use super::{is_visible, type_table_member, with_instance_probe, MemberPlan};
use crate::cache::Rule;
use crate::context::EvalContext;
use crate::convert::is_enumerable;
use crate::engine::Engine;
use crate::guard::Guard;
use crate::plan::Plan;

fn is_count_name(name: &str) -> bool {
    name.eq_ignore_ascii_case("Length") || name.eq_ignore_ascii_case("Count")
}

fn missing(name: &str, target: &Value) -> Plan {
    Plan::Member(MemberPlan::Missing {
        name: name.to_string(),
        type_name: target.type_name().into_owned(),
    })
}

/// Plan for reading a native property.
pub(super) fn native_get(
    engine: &Engine,
    guard: &mut Guard,
    ctx: &EvalContext,
    descriptor: &HostTypeRef,
    property: &HostProperty,
) -> Plan {
    if property.by_ref_like {
        return Plan::Raise(by_ref_like_member(
            property.name.as_str(),
            descriptor.full_name(),
        ));
    }
    let Some(getter) = &property.getter else {
        return Plan::Raise(write_only_member(property.name.as_str()));
    };
    let plan = Plan::Member(MemberPlan::NativeGet {
        getter: getter.clone(),
        is_static: property.is_static,
    });
    engine
        .check_language(guard, ctx, descriptor, "property access", &property.name)
        .apply(plan)
}

#[tracing::instrument(level = "trace", skip_all, fields(member = name))]
pub(super) fn bind(
    engine: &Engine,
    shape: &OperationShape,
    ctx: &EvalContext,
    name: &str,
    args: &[Value],
) -> Rule {
    let target = args.first().unwrap_or(&Value::Null);
    let mut guard = Guard::new();
    guard.type_of(0, target);
    guard.adjunct_of(0, target);
    if target.wrapper().is_some_and(|w| w.has_custom_type_names()) {
        // Type names live on the object, not in its type key.
        guard.forbid_caching();
    }

    if shape.is_static() {
        let plan = bind_static(engine, &mut guard, shape, ctx, name, target);
        return Rule::new(guard, plan);
    }

    let plan = resolve(engine, &mut guard, shape, ctx, name, target);
    let plan = with_instance_probe(engine, &mut guard, target, name, plan);
    Rule::new(guard, plan)
}

fn resolve(
    engine: &Engine,
    guard: &mut Guard,
    shape: &OperationShape,
    ctx: &EvalContext,
    name: &str,
    target: &Value,
) -> Plan {
    if target.is_null() {
        return if is_count_name(name) {
            Plan::Member(MemberPlan::Const(Value::Int32(0)))
        } else {
            missing(name, target)
        };
    }

    let type_names = target.type_names();
    if let Some(member) = type_table_member(engine, guard, &type_names, name, false) {
        match member.kind {
            MemberKind::NoteProperty(value) => return Plan::Member(MemberPlan::Const(value)),
            MemberKind::AliasProperty { target: first, conversion } => {
                return Plan::Member(MemberPlan::Alias {
                    name: member.name,
                    target: first,
                    conversion,
                })
            }
            MemberKind::ScriptProperty {
                getter: Some(getter),
                ..
            } => return Plan::Member(MemberPlan::ScriptGet(getter)),
            MemberKind::ScriptProperty { getter: None, .. } => {
                return Plan::Raise(write_only_member(member.name.as_str()))
            }
            MemberKind::ScriptMethod(_) => {}
        }
    }

    let deserialized = target.wrapper().is_some_and(|w| w.is_deserialized());
    if !deserialized {
        let descriptor = engine.descriptor_for(target);
        if let Some(property) = descriptor
            .find_property(name)
            .filter(|p| !p.is_static)
            .filter(|p| is_visible(engine, guard, shape, p.visibility, p.declaring_type))
        {
            return native_get(engine, guard, ctx, &descriptor, property);
        }
    }

    if let Value::Dictionary(_) = target.base() {
        return Plan::Member(MemberPlan::DictGet {
            name: name.to_string(),
        });
    }

    if engine.config().member_enumeration
        && !shape.flags.contains(ShapeFlags::NON_ENUMERATING)
        && is_enumerable(target)
    {
        return Plan::Member(MemberPlan::Broadcast);
    }

    if is_count_name(name) {
        return Plan::Member(MemberPlan::Const(Value::Int32(1)));
    }
    missing(name, target)
}

fn bind_static(
    engine: &Engine,
    guard: &mut Guard,
    shape: &OperationShape,
    ctx: &EvalContext,
    name: &str,
    target: &Value,
) -> Plan {
    let descriptor = match target.as_type() {
        Some(ty) => {
            if let Some(id) = target.base().identity() {
                guard.identity(0, id);
            }
            ty.clone()
        }
        None => engine.descriptor_for(target),
    };
    let type_names: Vec<String> = descriptor.type_names().into_iter().map(String::from).collect();
    if let Some(member) = type_table_member(engine, guard, &type_names, name, true) {
        match member.kind {
            MemberKind::NoteProperty(value) => return Plan::Member(MemberPlan::Const(value)),
            MemberKind::ScriptProperty {
                getter: Some(getter),
                ..
            } => return Plan::Member(MemberPlan::ScriptGet(getter)),
            MemberKind::ScriptProperty { getter: None, .. } => {
                return Plan::Raise(write_only_member(member.name.as_str()))
            }
            MemberKind::AliasProperty { .. } | MemberKind::ScriptMethod(_) => {}
        }
    }
    if let Some(property) = descriptor
        .find_property(name)
        .filter(|p| p.is_static)
        .filter(|p| is_visible(engine, guard, shape, p.visibility, p.declaring_type))
    {
        return native_get(engine, guard, ctx, &descriptor, property);
    }
    Plan::Member(MemberPlan::Missing {
        name: name.to_string(),
        type_name: descriptor.full_name().to_string(),
    })
}
