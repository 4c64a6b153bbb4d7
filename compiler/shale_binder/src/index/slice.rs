//! Slicing: one single-index operation per index, results kept in order.
//!
//! Below strict mode 3 a position whose index can't be converted or is out
//! of range yields null and the remaining positions still run. Any other
//! error aborts the slice.

use shale_ir::OperationShape;
use shale_stack::ensure_sufficient_stack;
use shale_value::{ErrorKind, EvalError, EvalResult, Value};

use crate::context::EvalContext;
use crate::engine::Engine;

/// The individual indices of a slice: the elements of a single enumerable
/// index, or the indices as written.
fn positions(indices: &[Value]) -> Vec<Value> {
    match indices {
        [single] => single
            .collection_items()
            .unwrap_or_else(|| vec![single.clone()]),
        many => many.to_vec(),
    }
}

fn degrades(ctx: &EvalContext, err: &EvalError) -> bool {
    !ctx.strict_mode.out_of_range_raises()
        && (err.is_conversion() || matches!(err.kind, ErrorKind::IndexOutOfRange { .. }))
}

fn settle(ctx: &EvalContext, result: EvalResult) -> EvalResult {
    match result {
        Err(err) if degrades(ctx, &err) => {
            tracing::trace!(error = %err, "slice element degraded to null");
            Ok(Value::Null)
        }
        other => other,
    }
}

pub(super) fn get(
    engine: &Engine,
    ctx: &EvalContext,
    target: &Value,
    indices: &[Value],
) -> EvalResult {
    let shape = OperationShape::get_index(1);
    let positions = positions(indices);
    let mut results = Vec::with_capacity(positions.len());
    for index in positions {
        let args = [target.clone(), index];
        let result = ensure_sufficient_stack(|| engine.dispatch(&shape, ctx, &args));
        results.push(settle(ctx, result)?);
    }
    Ok(Value::array(results))
}

/// Assign through every index. A collection value supplies one element per
/// position (null once it runs out); any other value is stored everywhere.
/// Returns what each position ended up assigned.
pub(super) fn set(
    engine: &Engine,
    ctx: &EvalContext,
    target: &Value,
    indices: &[Value],
    value: &Value,
) -> EvalResult {
    let shape = OperationShape::set_index(1);
    let positions = positions(indices);
    let spread = value.collection_items();
    let mut results = Vec::with_capacity(positions.len());
    for (i, index) in positions.into_iter().enumerate() {
        let item = match &spread {
            Some(items) => items.get(i).cloned().unwrap_or(Value::Null),
            None => value.clone(),
        };
        let args = [target.clone(), index, item];
        let result = ensure_sufficient_stack(|| engine.dispatch(&shape, ctx, &args));
        results.push(settle(ctx, result)?);
    }
    Ok(Value::array(results))
}
