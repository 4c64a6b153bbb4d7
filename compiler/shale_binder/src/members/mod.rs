//! Member resolution engine.
//!
//! # Resolution Order
//!
//! Instance access on `(value, name)` consults, in order:
//! 1. members attached to this exact object (its wrapper's adjunct, or
//!    the instance registry for unwrapped heap objects)
//! 2. type-table members under each of the value's type names
//! 3. native reflection members, honoring the caller's class scope
//! 4. keys of a keyed collection
//! 5. the elements of an enumerable target (member enumeration)
//!
//! Static access (`[Type]::Name`) consults only the type table and the
//! native static members. Anything unresolved becomes a `Missing` plan that
//! reads the strict mode at run time, except `Length` and `Count`, which
//! answer `1` for any non-null singleton and `0` for null.
//!
//! Instance members are checked at run time by an `InstanceProbe` plan, and
//! only once some object has carried a member by that name: until then the
//! rule embeds the name's instance counter instead.

mod alias;
mod get;
mod invoke;
pub(crate) mod overload;
mod set;
mod type_table;

pub use type_table::TypeTable;

use std::fmt;

use shale_ir::{OperationKind, OperationShape, ShapeFlags};
use shale_value::{
    member_not_found, read_only_member, write_only_member, EvalError, EvalResult, HostTypeId,
    Member, MemberKind, NativeFn, Overload, ParamType, Value, Visibility,
};

use crate::cache::Rule;
use crate::context::EvalContext;
use crate::convert::{convert_param, elements_of};
use crate::engine::Engine;
use crate::guard::Guard;
use crate::instance::InstanceMembers;
use crate::plan::Plan;

/// Plans for member get, set, invoke and construction.
pub enum MemberPlan {
    Const(Value),
    Alias {
        name: String,
        target: String,
        conversion: Option<shale_ir::ScalarType>,
    },
    /// Script getter; receives the target as given (wrapper included).
    ScriptGet(NativeFn),
    NativeGet { getter: NativeFn, is_static: bool },
    DictGet { name: String },
    /// Get the member from every element.
    Broadcast,
    Missing { name: String, type_name: String },

    AliasSet { name: String, target: String },
    ScriptSet(NativeFn),
    NativeSet {
        setter: NativeFn,
        value_type: ParamType,
        is_static: bool,
    },
    DictSet { name: String },

    /// Script method; receives the target as given.
    CallScript(NativeFn),
    CallOverload { overload: Overload, is_static: bool },
    /// Invoke the method on every element.
    BroadcastInvoke,
    Construct(Overload),
}

impl MemberPlan {
    pub(crate) fn run(
        &self,
        engine: &Engine,
        shape: &OperationShape,
        ctx: &EvalContext,
        args: &[Value],
    ) -> EvalResult {
        let target = args.first().unwrap_or(&Value::Null);
        let value = args.get(1).unwrap_or(&Value::Null);
        match self {
            MemberPlan::Const(v) => Ok(v.clone()),
            MemberPlan::Alias {
                name,
                target: first,
                conversion,
            } => alias::read(engine, ctx, target, name, first, *conversion),
            MemberPlan::ScriptGet(getter) => getter(target, &[]),
            MemberPlan::NativeGet { getter, is_static } => {
                getter(receiver(target, *is_static), &[])
            }
            MemberPlan::DictGet { name } => match target.base() {
                Value::Dictionary(d) => Ok(d.get_str(name).unwrap_or(Value::Null)),
                _ => Ok(Value::Null),
            },
            MemberPlan::Broadcast => broadcast_get(engine, shape, ctx, target),
            MemberPlan::Missing { name, type_name } => {
                if ctx.strict_mode.missing_property_raises() {
                    Err(member_not_found(name.as_str(), type_name.as_str()))
                } else {
                    Ok(Value::Null)
                }
            }
            MemberPlan::AliasSet { name, target: first } => {
                alias::write(engine, ctx, target, name, first, value)
            }
            MemberPlan::ScriptSet(setter) => {
                setter(target, std::slice::from_ref(value))?;
                Ok(value.clone())
            }
            MemberPlan::NativeSet {
                setter,
                value_type,
                is_static,
            } => {
                let converted = convert_param(engine, value, value_type, &ctx.culture)?;
                setter(receiver(target, *is_static), &[converted])?;
                Ok(value.clone())
            }
            MemberPlan::DictSet { name } => {
                if let Value::Dictionary(d) = target.base() {
                    d.insert(Value::string(name), value.clone());
                }
                Ok(value.clone())
            }
            MemberPlan::CallScript(func) => func(target, args.get(1..).unwrap_or_default()),
            MemberPlan::CallOverload { overload, is_static } => overload::call(
                engine,
                ctx,
                receiver(target, *is_static),
                overload,
                args.get(1..).unwrap_or_default(),
                shape.constraints.as_ref(),
            ),
            MemberPlan::BroadcastInvoke => broadcast_invoke(engine, shape, ctx, args),
            MemberPlan::Construct(constructor) => overload::call(
                engine,
                ctx,
                &Value::Null,
                constructor,
                args.get(1..).unwrap_or_default(),
                shape.constraints.as_ref(),
            ),
        }
    }
}

/// Native implementations see the debased target, or null when static.
fn receiver(target: &Value, is_static: bool) -> &Value {
    if is_static {
        &Value::Null
    } else {
        target.base()
    }
}

fn element_shape(shape: &OperationShape) -> OperationShape {
    shape.clone().with_flags(ShapeFlags::NON_ENUMERATING)
}

/// Keep non-null results, flattening one level of collections. One result
/// comes back as a scalar, several as an array.
fn gather(results: Vec<Value>) -> Option<Value> {
    let mut gathered = Vec::with_capacity(results.len());
    for result in results {
        match result.collection_items() {
            Some(items) => gathered.extend(items),
            None if result.is_null() => {}
            None => gathered.push(result),
        }
    }
    match gathered.len() {
        0 => None,
        1 => gathered.pop(),
        _ => Some(Value::array(gathered)),
    }
}

fn broadcast_get(
    engine: &Engine,
    shape: &OperationShape,
    ctx: &EvalContext,
    target: &Value,
) -> EvalResult {
    let items = elements_of(target)?.unwrap_or_default();
    let per_element = element_shape(shape);
    let lenient = ctx.clone().with_strict_mode(0);
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        results.push(engine.dispatch(&per_element, &lenient, &[item])?);
    }
    match gather(results) {
        Some(value) => Ok(value),
        None if ctx.strict_mode.missing_property_raises() => {
            let name = shape.name.map_or("", |n| engine.interner().lookup(n));
            Err(member_not_found(name, target.type_name()))
        }
        None => Ok(Value::Null),
    }
}

fn broadcast_invoke(
    engine: &Engine,
    shape: &OperationShape,
    ctx: &EvalContext,
    args: &[Value],
) -> EvalResult {
    let target = args.first().unwrap_or(&Value::Null);
    let items = elements_of(target)?.unwrap_or_default();
    let per_element = element_shape(shape);
    let mut element_args = args.to_vec();
    let mut results = Vec::with_capacity(items.len());
    for item in items {
        element_args[0] = item;
        results.push(engine.dispatch(&per_element, ctx, &element_args)?);
    }
    Ok(gather(results).unwrap_or(Value::Null))
}

/// Read an adjunct or type-table member. `None` for script methods, which
/// are not readable as properties.
pub(crate) fn read_member(
    engine: &Engine,
    ctx: &EvalContext,
    target: &Value,
    member: &Member,
) -> Result<Option<Value>, EvalError> {
    match &member.kind {
        MemberKind::NoteProperty(v) => Ok(Some(v.clone())),
        MemberKind::AliasProperty {
            target: first,
            conversion,
        } => alias::read(engine, ctx, target, &member.name, first, *conversion).map(Some),
        MemberKind::ScriptProperty {
            getter: Some(getter),
            ..
        } => getter(target, &[]).map(Some),
        MemberKind::ScriptProperty { getter: None, .. } => {
            Err(write_only_member(member.name.as_str()))
        }
        MemberKind::ScriptMethod(_) => Ok(None),
    }
}

/// Member called `name` attached to this exact object: the wrapper's
/// adjunct first, then the registry entry of the underlying heap object
/// (skipped for deserialized wrappers, which expose only their adjunct).
pub(crate) fn attached_member(engine: &Engine, target: &Value, name: &str) -> Option<Member> {
    match target.wrapper() {
        Some(w) if w.is_deserialized() => w.instance_member(name),
        Some(w) => w
            .instance_member(name)
            .or_else(|| engine.instances().get(w.base(), name)),
        None => engine.instances().get(target, name),
    }
}

/// Store a new value in the attached note property `name`.
fn store_note(engine: &Engine, target: &Value, name: &str, value: Value) {
    if let Some(wrapper) = target.wrapper() {
        if let Some(slot) = wrapper.adjunct_mut().members.get_mut(name) {
            slot.kind = MemberKind::NoteProperty(value);
            return;
        }
    }
    engine.instances().set_note(target.base(), name, value);
}

/// Run the operation against a member attached to this object, if the
/// object carries one called `name`.
pub(crate) fn probe_instance(
    engine: &Engine,
    shape: &OperationShape,
    ctx: &EvalContext,
    args: &[Value],
    name: &str,
) -> Result<Option<Value>, EvalError> {
    let Some(target) = args.first() else {
        return Ok(None);
    };
    let Some(member) = attached_member(engine, target, name) else {
        return Ok(None);
    };
    match shape.kind {
        OperationKind::GetMember => read_member(engine, ctx, target, &member),
        OperationKind::SetMember => {
            let value = args.get(1).cloned().unwrap_or(Value::Null);
            match &member.kind {
                MemberKind::NoteProperty(_) => {
                    store_note(engine, target, name, value.clone());
                    Ok(Some(value))
                }
                MemberKind::AliasProperty { target: first, .. } => {
                    alias::write(engine, ctx, target, &member.name, first, &value).map(Some)
                }
                MemberKind::ScriptProperty {
                    setter: Some(setter),
                    ..
                } => {
                    setter(target, std::slice::from_ref(&value))?;
                    Ok(Some(value))
                }
                MemberKind::ScriptProperty { setter: None, .. } => {
                    Err(read_only_member(member.name.as_str()))
                }
                MemberKind::ScriptMethod(_) => Ok(None),
            }
        }
        OperationKind::InvokeMember => match &member.kind {
            MemberKind::ScriptMethod(func) => {
                func(target, args.get(1..).unwrap_or_default()).map(Some)
            }
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Instance members: when any object has ever carried `name`, wrap `plan`
/// so the target's own members are checked first. Only wrapped values and
/// heap objects can carry them.
fn with_instance_probe(
    engine: &Engine,
    guard: &mut Guard,
    target: &Value,
    name: &str,
    plan: Plan,
) -> Plan {
    if !target.is_wrapped() && !InstanceMembers::can_hold(target) {
        return plan;
    }
    let seen = guard.version(engine.bus().instance_counter(name));
    if seen == 0 {
        plan
    } else {
        Plan::InstanceProbe {
            name: name.to_string(),
            then: Box::new(plan),
        }
    }
}

/// First type-table member called `name` across `type_names`.
///
/// Every type name's counter is recorded before the table is read.
fn type_table_member(
    engine: &Engine,
    guard: &mut Guard,
    type_names: &[String],
    name: &str,
    is_static: bool,
) -> Option<Member> {
    for type_name in type_names {
        guard.version(engine.bus().type_counter(type_name));
    }
    type_names
        .iter()
        .find_map(|ty| engine.type_table().lookup(ty, name, is_static))
}

/// Visibility of a native member from the shape's class scope.
fn is_visible(
    engine: &Engine,
    guard: &mut Guard,
    shape: &OperationShape,
    visibility: Visibility,
    declaring_type: HostTypeId,
) -> bool {
    if visibility == Visibility::Public {
        return true;
    }
    let Some(scope) = shape.class_scope else {
        return false;
    };
    guard.version(engine.bus().host_type_counter());
    let Some(scope_type) = engine.lookup_type(engine.interner().lookup(scope.spelling)) else {
        return false;
    };
    match visibility {
        Visibility::Private => scope_type.id() == declaring_type,
        Visibility::Protected => scope_type.is_assignable_to(declaring_type),
        Visibility::Public => true,
    }
}

/// Resolve a member operation for the observed arguments.
pub(crate) fn bind(engine: &Engine, shape: &OperationShape, ctx: &EvalContext, args: &[Value]) -> Rule {
    let name = shape.name.map_or("", |n| engine.interner().lookup(n));
    match shape.kind {
        OperationKind::SetMember => set::bind(engine, shape, ctx, name, args),
        OperationKind::InvokeMember => invoke::bind(engine, shape, ctx, name, args),
        OperationKind::Construct => invoke::bind_construct(engine, shape, ctx, args),
        _ => get::bind(engine, shape, ctx, name, args),
    }
}

impl fmt::Debug for MemberPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberPlan::Const(v) => write!(f, "Const({v:?})"),
            MemberPlan::Alias { name, target, .. } => write!(f, "Alias({name} -> {target})"),
            MemberPlan::ScriptGet(_) => write!(f, "ScriptGet"),
            MemberPlan::NativeGet { is_static, .. } => write!(f, "NativeGet(static={is_static})"),
            MemberPlan::DictGet { name } => write!(f, "DictGet({name})"),
            MemberPlan::Broadcast => write!(f, "Broadcast"),
            MemberPlan::Missing { name, type_name } => write!(f, "Missing({type_name}.{name})"),
            MemberPlan::AliasSet { name, target } => write!(f, "AliasSet({name} -> {target})"),
            MemberPlan::ScriptSet(_) => write!(f, "ScriptSet"),
            MemberPlan::NativeSet { is_static, .. } => write!(f, "NativeSet(static={is_static})"),
            MemberPlan::DictSet { name } => write!(f, "DictSet({name})"),
            MemberPlan::CallScript(_) => write!(f, "CallScript"),
            MemberPlan::CallOverload { overload, is_static } => write!(
                f,
                "CallOverload({} params, static={is_static})",
                overload.params.len()
            ),
            MemberPlan::BroadcastInvoke => write!(f, "BroadcastInvoke"),
            MemberPlan::Construct(c) => write!(f, "Construct({} params)", c.params.len()),
        }
    }
}
