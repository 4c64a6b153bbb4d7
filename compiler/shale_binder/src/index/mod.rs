//! Indexing engine.
//!
//! Single indices address one element of a string, rank-1 array, list or
//! keyed collection, or go through a host type's indexer. Several indices,
//! or one enumerable index, slice: every index is applied on its own through
//! a single-index operation and the results are kept in order (see
//! [`slice`]).
//!
//! Negative indices count from the end wherever a length is known: strings,
//! arrays (per dimension), lists, and host indexers taking one integer on a
//! type that also exposes `Count` or `Length`.

mod slice;

use std::fmt;

use shale_ir::{OperationKind, OperationShape, ScalarType};
use shale_value::{
    index_out_of_range, member_not_found, null_target, read_only_member, write_only_member,
    EvalError, EvalResult, HostIndexer, HostTypeRef, NativeFn, ParamType, Value,
};

use crate::cache::Rule;
use crate::context::EvalContext;
use crate::convert::{conversion_error, convert_param, convert_to_scalar, preview};
use crate::engine::Engine;
use crate::guard::{Guard, GuardAtom};
use crate::plan::Plan;

/// How a target is addressed.
pub enum Access {
    /// One index into a string, rank-1 array, list or keyed collection. A
    /// scalar target answers index `0` and `-1` with itself.
    Element,
    /// One integer per dimension of a multi-dimensional array.
    Coordinates,
    /// A single array index holding one integer per dimension.
    PackedCoordinates,
    HostIndexer {
        indexer: HostIndexer,
        /// `Count`/`Length` getter used to resolve negative indices.
        count: Option<NativeFn>,
    },
    /// Apply each index on its own and collect the results.
    Slice,
}

/// Plans for `OperationKind::GetIndex` and `OperationKind::SetIndex`.
pub enum IndexPlan {
    Get(Access),
    Set(Access),
}

impl IndexPlan {
    pub(crate) fn run(&self, engine: &Engine, ctx: &EvalContext, args: &[Value]) -> EvalResult {
        let target = args.first().unwrap_or(&Value::Null);
        match self {
            IndexPlan::Get(access) => {
                let indices = args.get(1..).unwrap_or_default();
                get(engine, ctx, access, target, indices)
            }
            IndexPlan::Set(access) => {
                let end = args.len().saturating_sub(1);
                let indices = args.get(1..end).unwrap_or_default();
                let value = args.last().unwrap_or(&Value::Null);
                set(engine, ctx, access, target, indices, value)
            }
        }
    }
}

fn get(
    engine: &Engine,
    ctx: &EvalContext,
    access: &Access,
    target: &Value,
    indices: &[Value],
) -> EvalResult {
    let first = indices.first().unwrap_or(&Value::Null);
    match access {
        Access::Element => element_get(ctx, target, first),
        Access::Coordinates => cell_get(ctx, target, indices),
        Access::PackedCoordinates => match packed(first) {
            Some(coords) => cell_get(ctx, target, &coords),
            None => slice::get(engine, ctx, target, indices),
        },
        Access::HostIndexer { indexer, count } => {
            let Some(getter) = &indexer.getter else {
                return Err(write_only_member("Item"));
            };
            let converted = indexer_args(ctx, engine, target, indexer, count.as_ref(), indices)?;
            getter(target.base(), &converted)
        }
        Access::Slice => slice::get(engine, ctx, target, indices),
    }
}

fn set(
    engine: &Engine,
    ctx: &EvalContext,
    access: &Access,
    target: &Value,
    indices: &[Value],
    value: &Value,
) -> EvalResult {
    let first = indices.first().unwrap_or(&Value::Null);
    match access {
        Access::Element => element_set(ctx, target, first, value),
        Access::Coordinates => cell_set(ctx, target, indices, value),
        Access::PackedCoordinates => match packed(first) {
            Some(coords) => cell_set(ctx, target, &coords, value),
            None => slice::set(engine, ctx, target, indices, value),
        },
        Access::HostIndexer { indexer, count } => {
            let Some(setter) = &indexer.setter else {
                return Err(read_only_member("Item"));
            };
            let mut converted =
                indexer_args(ctx, engine, target, indexer, count.as_ref(), indices)?;
            converted.push(convert_param(engine, value, &indexer.value_type, &ctx.culture)?);
            setter(target.base(), &converted)?;
            Ok(value.clone())
        }
        Access::Slice => slice::set(engine, ctx, target, indices, value),
    }
}

/// Integer value of an index expression.
fn index_value(ctx: &EvalContext, index: &Value) -> Result<i64, EvalError> {
    match convert_to_scalar(index, ScalarType::Int64, &ctx.culture)? {
        Value::Int64(n) => Ok(n),
        _ => Err(conversion_error(index, ScalarType::Int64.full_name())),
    }
}

/// Position `raw` within `len` elements, counting negatives from the end.
fn resolve(raw: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let position = if raw < 0 { raw + len } else { raw };
    if (0..len).contains(&position) {
        usize::try_from(position).ok()
    } else {
        None
    }
}

fn out_of_range(ctx: &EvalContext, raw: impl fmt::Display, target: &Value) -> EvalResult {
    if ctx.strict_mode.out_of_range_raises() {
        Err(index_out_of_range(raw, target.type_name()))
    } else {
        Ok(Value::Null)
    }
}

fn element_get(ctx: &EvalContext, target: &Value, index: &Value) -> EvalResult {
    match target.base() {
        Value::Dictionary(d) => Ok(d.get(index.base()).unwrap_or(Value::Null)),
        Value::Str(s) => {
            let raw = index_value(ctx, index)?;
            match resolve(raw, s.chars().count()).and_then(|i| s.chars().nth(i)) {
                Some(c) => Ok(Value::Char(c)),
                None => out_of_range(ctx, raw, target),
            }
        }
        Value::Array(a) => {
            let raw = index_value(ctx, index)?;
            match resolve(raw, a.len()).and_then(|i| a.get(i)) {
                Some(item) => Ok(item),
                None => out_of_range(ctx, raw, target),
            }
        }
        Value::List(l) => {
            let raw = index_value(ctx, index)?;
            match resolve(raw, l.len()).and_then(|i| l.get(i)) {
                Some(item) => Ok(item),
                None => out_of_range(ctx, raw, target),
            }
        }
        _ => {
            let raw = index_value(ctx, index)?;
            if raw == 0 || raw == -1 {
                Ok(target.clone())
            } else {
                out_of_range(ctx, raw, target)
            }
        }
    }
}

/// Typed arrays convert stored values to their element type.
fn element_value(ctx: &EvalContext, element: Option<ScalarType>, value: &Value) -> EvalResult {
    match element {
        Some(scalar) => convert_to_scalar(value, scalar, &ctx.culture),
        None => Ok(value.clone()),
    }
}

fn element_set(ctx: &EvalContext, target: &Value, index: &Value, value: &Value) -> EvalResult {
    match target.base() {
        Value::Dictionary(d) => {
            d.insert(index.base().clone(), value.clone());
        }
        Value::Array(a) => {
            let raw = index_value(ctx, index)?;
            let stored = element_value(ctx, a.element_type(), value)?;
            if !resolve(raw, a.len()).is_some_and(|i| a.set(i, stored)) {
                return Err(index_out_of_range(raw, target.type_name()));
            }
        }
        Value::List(l) => {
            let raw = index_value(ctx, index)?;
            if !resolve(raw, l.len()).is_some_and(|i| l.set(i, value.clone())) {
                return Err(index_out_of_range(raw, target.type_name()));
            }
        }
        _ => return Err(member_not_found("Item", target.type_name())),
    }
    Ok(value.clone())
}

/// Coordinates from a single array index, when it holds one scalar per
/// dimension.
fn packed(index: &Value) -> Option<Vec<Value>> {
    let items = index.collection_items()?;
    if items.iter().any(|i| i.collection_items().is_some()) {
        None
    } else {
        Some(items)
    }
}

/// Flat position of `coords` in a multi-dimensional array, or the
/// offending coordinate when one is out of range.
fn flat_position(
    ctx: &EvalContext,
    dims: &[usize],
    coords: &[Value],
) -> Result<Result<usize, String>, EvalError> {
    let mut resolved = Vec::with_capacity(coords.len());
    let mut raw = Vec::with_capacity(coords.len());
    for (coord, len) in coords.iter().zip(dims) {
        let n = index_value(ctx, coord)?;
        raw.push(n.to_string());
        match resolve(n, *len) {
            Some(i) => resolved.push(i),
            None => return Ok(Err(raw.join(","))),
        }
    }
    if coords.len() != dims.len() {
        return Ok(Err(raw.join(",")));
    }
    let mut flat = 0;
    for (i, len) in resolved.iter().zip(dims) {
        flat = flat * len + i;
    }
    Ok(Ok(flat))
}

fn cell_get(ctx: &EvalContext, target: &Value, coords: &[Value]) -> EvalResult {
    let Value::Array(a) = target.base() else {
        return element_get(ctx, target, coords.first().unwrap_or(&Value::Null));
    };
    match flat_position(ctx, a.dims(), coords)? {
        Ok(flat) => Ok(a.get(flat).unwrap_or(Value::Null)),
        Err(raw) => out_of_range(ctx, raw, target),
    }
}

fn cell_set(ctx: &EvalContext, target: &Value, coords: &[Value], value: &Value) -> EvalResult {
    let Value::Array(a) = target.base() else {
        return element_set(ctx, target, coords.first().unwrap_or(&Value::Null), value);
    };
    let stored = element_value(ctx, a.element_type(), value)?;
    match flat_position(ctx, a.dims(), coords)? {
        Ok(flat) => {
            if a.set(flat, stored) {
                Ok(value.clone())
            } else {
                Err(index_out_of_range(flat, target.type_name()))
            }
        }
        Err(raw) => Err(index_out_of_range(raw, target.type_name())),
    }
}

fn is_integer_param(param: &ParamType) -> bool {
    matches!(
        param,
        ParamType::Scalar(ScalarType::Int32 | ScalarType::Int64 | ScalarType::UInt32 | ScalarType::UInt64)
    )
}

/// Convert indices to the indexer's parameter types, resolving a negative
/// single integer index against the count property.
fn indexer_args(
    ctx: &EvalContext,
    engine: &Engine,
    target: &Value,
    indexer: &HostIndexer,
    count: Option<&NativeFn>,
    indices: &[Value],
) -> Result<Vec<Value>, EvalError> {
    let mut converted = Vec::with_capacity(indices.len());
    for (index, param) in indices.iter().zip(&indexer.params) {
        converted.push(convert_param(engine, index, param, &ctx.culture)?);
    }
    if let (Some(count), [only], [param]) =
        (count, converted.as_mut_slice(), indexer.params.as_slice())
    {
        if let Some(raw) = only.as_i64().filter(|n| *n < 0) {
            let len = count(target.base(), &[])?.as_i64().unwrap_or(0);
            *only = convert_param(engine, &Value::Int64(raw + len), param, &ctx.culture)?;
        }
    }
    Ok(converted)
}

fn host_access(
    engine: &Engine,
    guard: &mut Guard,
    ctx: &EvalContext,
    ty: &HostTypeRef,
    indices: &[Value],
    single: bool,
) -> Plan {
    let indexer = ty.indexers().find(|ix| ix.params.len() == indices.len());
    let access = match indexer {
        Some(indexer) if indices.len() > 1 || single => {
            let count = if matches!(indexer.params.as_slice(), [param] if is_integer_param(param)) {
                ["Count", "Length"]
                    .into_iter()
                    .find_map(|name| ty.find_property(name))
                    .filter(|p| !p.is_static)
                    .and_then(|p| p.getter.clone())
            } else {
                None
            };
            Access::HostIndexer {
                indexer: indexer.clone(),
                count,
            }
        }
        _ if !single => Access::Slice,
        _ => return Plan::Raise(member_not_found("Item", ty.full_name())),
    };
    engine
        .check_language(guard, ctx, ty, "indexer access", ty.full_name())
        .apply(Plan::Index(IndexPlan::Get(access)))
}

/// Resolve a get-index or set-index operation.
#[tracing::instrument(level = "trace", skip_all, fields(indices = args.len().saturating_sub(1)))]
pub(crate) fn bind(
    engine: &Engine,
    shape: &OperationShape,
    ctx: &EvalContext,
    args: &[Value],
) -> Rule {
    let is_set = matches!(shape.kind, OperationKind::SetIndex);
    let keys_end = if is_set {
        args.len().saturating_sub(1)
    } else {
        args.len()
    };
    let target = args.first().unwrap_or(&Value::Null);
    let indices = args.get(1..keys_end).unwrap_or_default();
    let mut guard = Guard::new();
    guard.types_of(args.get(..keys_end).unwrap_or_default());

    if target.is_null() {
        return Rule::new(guard, Plan::Raise(null_target("index into")));
    }

    let single = matches!(indices, [one] if one.collection_items().is_none());
    let plan = match target.base() {
        Value::Array(a) if a.rank() > 1 => {
            let rank = a.rank();
            if indices.len() == rank && indices.iter().all(|i| i.collection_items().is_none()) {
                Plan::Index(IndexPlan::Get(Access::Coordinates))
            } else if let [Value::Array(index)] = indices {
                if index.len() == rank {
                    guard.push(GuardAtom::ArrayLength { arg: 1, len: rank });
                    Plan::Index(IndexPlan::Get(Access::PackedCoordinates))
                } else {
                    Plan::Index(IndexPlan::Get(Access::Slice))
                }
            } else if single {
                let index = indices.first().unwrap_or(&Value::Null);
                Plan::Raise(index_out_of_range(preview(index), target.type_name()))
            } else {
                Plan::Index(IndexPlan::Get(Access::Slice))
            }
        }
        Value::Str(_) if is_set && single => {
            Plan::Raise(member_not_found("Item", target.type_name()))
        }
        Value::Object(o) => {
            let ty = o.host_type().clone();
            host_access(engine, &mut guard, ctx, &ty, indices, single)
        }
        Value::Type(_) => Plan::Raise(member_not_found("Item", target.type_name())),
        _ if single => Plan::Index(IndexPlan::Get(Access::Element)),
        _ if is_set && target.scalar_type().is_some() => {
            Plan::Raise(member_not_found("Item", target.type_name()))
        }
        _ => Plan::Index(IndexPlan::Get(Access::Slice)),
    };
    let plan = if is_set { into_set(plan) } else { plan };
    Rule::new(guard, plan)
}

/// Turn a get plan chosen by `bind` into the matching set plan.
fn into_set(plan: Plan) -> Plan {
    match plan {
        Plan::Index(IndexPlan::Get(access)) => Plan::Index(IndexPlan::Set(access)),
        Plan::Audit { event, then } => Plan::Audit {
            event,
            then: Box::new(into_set(*then)),
        },
        other => other,
    }
}

impl fmt::Debug for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Element => write!(f, "element"),
            Access::Coordinates => write!(f, "coordinates"),
            Access::PackedCoordinates => write!(f, "packed coordinates"),
            Access::HostIndexer { indexer, count } => write!(
                f,
                "indexer({} params{})",
                indexer.params.len(),
                if count.is_some() { ", counted" } else { "" }
            ),
            Access::Slice => write!(f, "slice"),
        }
    }
}

impl fmt::Debug for IndexPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexPlan::Get(access) => write!(f, "GetIndex({access:?})"),
            IndexPlan::Set(access) => write!(f, "SetIndex({access:?})"),
        }
    }
}
