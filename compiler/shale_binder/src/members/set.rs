//! Member set resolution.
//!
//! Mirrors get resolution, minus member enumeration: a set that resolves to
//! nothing raises regardless of strict mode.

use shale_ir::OperationShape;
use shale_value::{
    by_ref_like_member, member_not_found, null_target, read_only_member, HostProperty,
    HostTypeRef, MemberKind, Value,
};

use super::{is_visible, type_table_member, with_instance_probe, MemberPlan};
use crate::cache::Rule;
use crate::context::EvalContext;
use crate::engine::Engine;
use crate::guard::Guard;
use crate::plan::Plan;

fn native_set(
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
    let Some(setter) = &property.setter else {
        return Plan::Raise(read_only_member(property.name.as_str()));
    };
    let plan = Plan::Member(MemberPlan::NativeSet {
        setter: setter.clone(),
        value_type: property.value_type.clone(),
        is_static: property.is_static,
    });
    engine
        .check_language(guard, ctx, descriptor, "property assignment", &property.name)
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
        guard.forbid_caching();
    }
    if target.is_null() {
        return Rule::new(guard, Plan::Raise(null_target("set a property on")));
    }

    let plan = if shape.is_static() {
        bind_static(engine, &mut guard, shape, ctx, name, target)
    } else {
        let plan = resolve(engine, &mut guard, shape, ctx, name, target);
        with_instance_probe(engine, &mut guard, target, name, plan)
    };
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
    let type_names = target.type_names();
    if let Some(member) = type_table_member(engine, guard, &type_names, name, false) {
        match member.kind {
            MemberKind::NoteProperty(_)
            | MemberKind::ScriptProperty { setter: None, .. } => {
                return Plan::Raise(read_only_member(member.name.as_str()))
            }
            MemberKind::AliasProperty { target: first, .. } => {
                return Plan::Member(MemberPlan::AliasSet {
                    name: member.name,
                    target: first,
                })
            }
            MemberKind::ScriptProperty {
                setter: Some(setter),
                ..
            } => return Plan::Member(MemberPlan::ScriptSet(setter)),
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
            return native_set(engine, guard, ctx, &descriptor, property);
        }
    }

    if let Value::Dictionary(_) = target.base() {
        return Plan::Member(MemberPlan::DictSet {
            name: name.to_string(),
        });
    }
    Plan::Raise(member_not_found(name, target.type_name()))
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
            MemberKind::ScriptProperty {
                setter: Some(setter),
                ..
            } => return Plan::Member(MemberPlan::ScriptSet(setter)),
            MemberKind::ScriptMethod(_) | MemberKind::AliasProperty { .. } => {}
            _ => return Plan::Raise(read_only_member(member.name.as_str())),
        }
    }
    if let Some(property) = descriptor
        .find_property(name)
        .filter(|p| p.is_static)
        .filter(|p| is_visible(engine, guard, shape, p.visibility, p.declaring_type))
    {
        return native_set(engine, guard, ctx, &descriptor, property);
    }
    Plan::Raise(member_not_found(name, descriptor.full_name()))
}
