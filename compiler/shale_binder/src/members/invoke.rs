//! Method invocation and construction.

use shale_ir::{OperationShape, ShapeFlags};
use shale_value::{member_not_found, null_target, HostMethod, HostTypeRef, MemberKind, Overload, Value};

use super::{is_visible, overload, type_table_member, with_instance_probe, MemberPlan};
use crate::cache::Rule;
use crate::context::EvalContext;
use crate::convert::is_enumerable;
use crate::engine::Engine;
use crate::guard::Guard;
use crate::plan::Plan;

/// Choose among `method`'s overloads visible from the call site.
fn choose(
    engine: &Engine,
    guard: &mut Guard,
    shape: &OperationShape,
    ctx: &EvalContext,
    descriptor: &HostTypeRef,
    method: &HostMethod,
    args: &[Value],
) -> Option<Plan> {
    let visible: Vec<Overload> = method
        .overloads
        .iter()
        .filter(|o| o.accepts_arity(args.len()))
        .filter(|o| is_visible(engine, guard, shape, o.visibility, o.declaring_type))
        .cloned()
        .collect();
    let chosen = match overload::select(engine, &visible, args, shape.constraints.as_ref(), &method.name) {
        Ok(Some(chosen)) => chosen.clone(),
        Ok(None) => return None,
        Err(err) => return Some(Plan::Raise(err)),
    };
    let plan = Plan::Member(MemberPlan::CallOverload {
        overload: chosen,
        is_static: method.is_static,
    });
    Some(
        engine
            .check_language(guard, ctx, descriptor, "method invocation", &method.name)
            .apply(plan),
    )
}

#[tracing::instrument(level = "trace", skip_all, fields(member = name, argc = args.len().saturating_sub(1)))]
pub(super) fn bind(
    engine: &Engine,
    shape: &OperationShape,
    ctx: &EvalContext,
    name: &str,
    args: &[Value],
) -> Rule {
    let target = args.first().unwrap_or(&Value::Null);
    let mut guard = Guard::new();
    guard.types_of(args);
    guard.adjunct_of(0, target);
    if target.wrapper().is_some_and(|w| w.has_custom_type_names()) {
        guard.forbid_caching();
    }
    if target.is_null() {
        return Rule::new(guard, Plan::Raise(null_target("invoke a method on")));
    }

    let plan = if shape.is_static() {
        bind_static(engine, &mut guard, shape, ctx, name, args)
    } else {
        let plan = resolve(engine, &mut guard, shape, ctx, name, args);
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
    args: &[Value],
) -> Plan {
    let target = args.first().unwrap_or(&Value::Null);
    let call_args = args.get(1..).unwrap_or_default();
    let type_names = target.type_names();
    if let Some(member) = type_table_member(engine, guard, &type_names, name, false) {
        if let MemberKind::ScriptMethod(func) = member.kind {
            return Plan::Member(MemberPlan::CallScript(func));
        }
    }

    let deserialized = target.wrapper().is_some_and(|w| w.is_deserialized());
    if !deserialized {
        let descriptor = engine.descriptor_for(target);
        let method = descriptor
            .find_method(name, false)
            .or_else(|| engine.builtins().object.find_method(name, false));
        if let Some(method) = method {
            if let Some(plan) = choose(engine, guard, shape, ctx, &descriptor, &method, call_args) {
                return plan;
            }
        }
    }

    if engine.config().member_enumeration
        && !shape.flags.contains(ShapeFlags::NON_ENUMERATING)
        && is_enumerable(target)
    {
        return Plan::Member(MemberPlan::BroadcastInvoke);
    }
    Plan::Raise(member_not_found(name, target.type_name()))
}

fn bind_static(
    engine: &Engine,
    guard: &mut Guard,
    shape: &OperationShape,
    ctx: &EvalContext,
    name: &str,
    args: &[Value],
) -> Plan {
    let target = args.first().unwrap_or(&Value::Null);
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
        if let MemberKind::ScriptMethod(func) = member.kind {
            return Plan::Member(MemberPlan::CallScript(func));
        }
    }
    if let Some(method) = descriptor.find_method(name, true) {
        let call_args = args.get(1..).unwrap_or_default();
        if let Some(plan) = choose(engine, guard, shape, ctx, &descriptor, &method, call_args) {
            return plan;
        }
    }
    Plan::Raise(member_not_found(name, descriptor.full_name()))
}

/// `[Type]::new(...)`.
#[tracing::instrument(level = "trace", skip_all, fields(argc = args.len().saturating_sub(1)))]
pub(super) fn bind_construct(
    engine: &Engine,
    shape: &OperationShape,
    ctx: &EvalContext,
    args: &[Value],
) -> Rule {
    let target = args.first().unwrap_or(&Value::Null);
    let mut guard = Guard::new();
    guard.types_of(args);
    let Some(ty) = target.as_type() else {
        let err = if target.is_null() {
            null_target("construct an instance of")
        } else {
            member_not_found("new", target.type_name())
        };
        return Rule::new(guard, Plan::Raise(err));
    };
    if let Some(id) = target.base().identity() {
        guard.identity(0, id);
    }

    let call_args = args.get(1..).unwrap_or_default();
    let visible: Vec<Overload> = ty
        .constructors()
        .iter()
        .filter(|c| c.accepts_arity(call_args.len()))
        .filter(|c| is_visible(engine, &mut guard, shape, c.visibility, c.declaring_type))
        .cloned()
        .collect();
    let plan = match overload::select(engine, &visible, call_args, shape.constraints.as_ref(), "new") {
        Ok(Some(constructor)) => Plan::Member(MemberPlan::Construct(constructor.clone())),
        Ok(None) => Plan::Raise(member_not_found("new", ty.full_name())),
        Err(err) => Plan::Raise(err),
    };
    let plan = engine
        .check_language(&mut guard, ctx, ty, "type construction", ty.full_name())
        .apply(plan);
    Rule::new(guard, plan)
}
