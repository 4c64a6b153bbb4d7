//! Overload ranking and invocation.
//!
//! Each candidate gets a cost per argument; the cheapest total wins. Costs
//! grow with how lossy the conversion is:
//!
//! | conversion                        | cost |
//! |-----------------------------------|------|
//! | exact type / collection to array  | 0    |
//! | numeric widening, derived type    | 1    |
//! | any value to `object`, null       | 2    |
//! | narrowing, parsing, to bool/char  | 3    |
//! | to string                         | 4    |
//!
//! A `params` signature costs one more than its fixed arguments, so a
//! signature that takes the arguments as written is preferred.

use shale_ir::{InvocationConstraints, ScalarType, TypeConstraint};
use shale_value::{ambiguous_overload, EvalError, EvalResult, HostTypeRef, Overload, ParamType, Value};

use crate::context::EvalContext;
use crate::convert::{apply_constraint, convert_param, to_array};
use crate::engine::Engine;
use crate::numeric::NumKind;

/// What overload ranking sees of one argument.
enum ArgShape {
    Null,
    Scalar(ScalarType),
    Collection,
    Host(HostTypeRef),
    /// Keyed collections, type objects and declared `[object]` arguments.
    Opaque,
}

fn arg_shape(engine: &Engine, value: &Value, constraint: Option<TypeConstraint>) -> ArgShape {
    match constraint {
        Some(TypeConstraint::Scalar(scalar)) => return ArgShape::Scalar(scalar),
        Some(TypeConstraint::Array) => return ArgShape::Collection,
        Some(TypeConstraint::Object) => return ArgShape::Opaque,
        Some(TypeConstraint::Named(name)) => {
            let spelling = engine.interner().lookup(name.spelling);
            if let Some(scalar) = ScalarType::from_name(spelling) {
                return ArgShape::Scalar(scalar);
            }
            if let Some(ty) = engine.lookup_type(spelling) {
                return ArgShape::Host(ty);
            }
        }
        None => {}
    }
    match value.base() {
        Value::Null => ArgShape::Null,
        Value::Array(_) | Value::List(_) => ArgShape::Collection,
        Value::Object(o) => ArgShape::Host(o.host_type().clone()),
        Value::Dictionary(_) | Value::Type(_) => ArgShape::Opaque,
        scalar => scalar.scalar_type().map_or(ArgShape::Opaque, ArgShape::Scalar),
    }
}

fn scalar_cost(from: ScalarType, to: ScalarType) -> u32 {
    if from == to {
        return 0;
    }
    if to == ScalarType::String {
        return 4;
    }
    match (NumKind::of(from), NumKind::of(to)) {
        (Some(f), Some(t)) if from.is_numeric() && to.is_numeric() => {
            let sign_lost = f.is_signed_integer() && t.is_unsigned();
            if f <= t && !sign_lost {
                1
            } else {
                3
            }
        }
        _ => 3,
    }
}

/// Cost of passing `arg` where `param` is declared; `None` when it can't be
/// converted at all.
fn param_cost(arg: &ArgShape, param: &ParamType, declared_object: bool) -> Option<u32> {
    match param {
        ParamType::Object => Some(if declared_object { 0 } else { 2 }),
        ParamType::Array => Some(match arg {
            ArgShape::Collection => 0,
            ArgShape::Null => 1,
            _ => 2,
        }),
        ParamType::Host(id) => match arg {
            ArgShape::Host(ty) if ty.id() == *id => Some(0),
            ArgShape::Host(ty) if ty.is_assignable_to(*id) => Some(1),
            ArgShape::Null => Some(1),
            _ => None,
        },
        ParamType::Scalar(to) => match arg {
            ArgShape::Scalar(from) => Some(scalar_cost(*from, *to)),
            ArgShape::Null => Some(2),
            _ => match to {
                ScalarType::String => Some(4),
                ScalarType::Bool => Some(3),
                _ => None,
            },
        },
    }
}

fn fixed_params(overload: &Overload) -> usize {
    if overload.params_array {
        overload.params.len().saturating_sub(1)
    } else {
        overload.params.len()
    }
}

fn total_cost(
    engine: &Engine,
    overload: &Overload,
    args: &[Value],
    constraints: Option<&InvocationConstraints>,
) -> Option<u32> {
    if !overload.accepts_arity(args.len()) {
        return None;
    }
    let mut total = 0;
    for (i, param) in overload.params.iter().take(fixed_params(overload)).enumerate() {
        let constraint = constraints.and_then(|c| c.arg(i));
        let value = args.get(i).unwrap_or(&Value::Null);
        let shape = arg_shape(engine, value, constraint);
        total += param_cost(&shape, param, constraint == Some(TypeConstraint::Object))?;
    }
    if overload.params_array {
        total += 1;
    }
    Some(total)
}

fn same_signature(a: &Overload, b: &Overload) -> bool {
    a.params_array == b.params_array && a.params == b.params
}

/// Pick the cheapest overload for `args`.
///
/// `Ok(None)` when nothing accepts the arguments; an error when two
/// distinct signatures tie for cheapest. A signature redeclared further up
/// the type hierarchy is shadowed by the most derived declaration (listed
/// first).
pub(crate) fn select<'a>(
    engine: &Engine,
    candidates: &'a [Overload],
    args: &[Value],
    constraints: Option<&InvocationConstraints>,
    method: &str,
) -> Result<Option<&'a Overload>, EvalError> {
    let mut best: Option<(&'a Overload, u32)> = None;
    let mut tied = false;
    for (i, candidate) in candidates.iter().enumerate() {
        if candidates[..i].iter().any(|earlier| same_signature(earlier, candidate)) {
            continue;
        }
        let Some(cost) = total_cost(engine, candidate, args, constraints) else {
            continue;
        };
        match best {
            Some((_, best_cost)) if cost > best_cost => {}
            Some((_, best_cost)) if cost == best_cost => tied = true,
            _ => {
                best = Some((candidate, cost));
                tied = false;
            }
        }
    }
    if tied {
        tracing::debug!(method, argc = args.len(), "ambiguous overload");
        return Err(ambiguous_overload(method, args.len()));
    }
    Ok(best.map(|(overload, _)| overload))
}

/// Convert `args` to `overload`'s parameters and call it.
///
/// Trailing arguments of a `params` signature are packed into one
/// `object[]`, unless exactly one collection was passed in that position.
pub(crate) fn call(
    engine: &Engine,
    ctx: &EvalContext,
    receiver: &Value,
    overload: &Overload,
    args: &[Value],
    constraints: Option<&InvocationConstraints>,
) -> EvalResult {
    let fixed = fixed_params(overload);
    let constrained = |i: usize, value: &Value| {
        apply_constraint(engine, ctx, value, constraints.and_then(|c| c.arg(i)))
    };
    let mut converted = Vec::with_capacity(overload.params.len());
    for (i, param) in overload.params.iter().take(fixed).enumerate() {
        let value = constrained(i, args.get(i).unwrap_or(&Value::Null))?;
        converted.push(convert_param(engine, &value, param, &ctx.culture)?);
    }
    if overload.params_array {
        let rest = args.get(fixed..).unwrap_or_default();
        let packed = match rest {
            [single] if single.collection_items().is_some() => to_array(single),
            _ => {
                let mut items = Vec::with_capacity(rest.len());
                for (j, value) in rest.iter().enumerate() {
                    items.push(constrained(fixed + j, value)?);
                }
                Value::array(items)
            }
        };
        converted.push(packed);
    }
    (overload.func)(receiver, &converted)
}
