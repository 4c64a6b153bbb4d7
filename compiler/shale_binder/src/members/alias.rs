//! Alias chains.
//!
//! An alias forwards to another member of the same object, which may itself
//! be an alias. Chains are walked iteratively with the names seen so far;
//! revisiting a name raises `CycleDetected` instead of recursing.

use shale_ir::ScalarType;
use shale_stack::ensure_sufficient_stack;
use shale_value::{cycle_detected, same_name, EvalError, EvalResult, MemberKind, Value};

use crate::context::EvalContext;
use crate::convert::convert_to_scalar;
use crate::engine::Engine;

/// Alias target of `name` on `target`, from instance members first, then
/// the type table.
fn alias_step(engine: &Engine, target: &Value, name: &str) -> Option<String> {
    let member = super::attached_member(engine, target, name).or_else(|| {
        target
            .type_names()
            .iter()
            .find_map(|ty| engine.type_table().lookup(ty, name, false))
    })?;
    match member.kind {
        MemberKind::AliasProperty { target, .. } => Some(target),
        _ => None,
    }
}

/// Follow the chain starting at alias `origin` (which points at `first`)
/// to the first member that is not an alias.
pub(crate) fn terminal(
    engine: &Engine,
    target: &Value,
    origin: &str,
    first: &str,
) -> Result<String, EvalError> {
    let mut chain = vec![origin.to_string()];
    let mut current = first.to_string();
    loop {
        if chain.iter().any(|seen| same_name(seen, &current)) {
            chain.push(current);
            tracing::debug!(member = origin, "alias cycle");
            return Err(cycle_detected(origin, &chain));
        }
        chain.push(current.clone());
        match alias_step(engine, target, &current) {
            Some(next) => current = next,
            None => return Ok(current),
        }
    }
}

/// Read through alias `origin`, applying its conversion to the result.
pub(crate) fn read(
    engine: &Engine,
    ctx: &EvalContext,
    target: &Value,
    origin: &str,
    first: &str,
    conversion: Option<ScalarType>,
) -> EvalResult {
    let name = terminal(engine, target, origin, first)?;
    let value = ensure_sufficient_stack(|| engine.get_member(ctx, target, &name))?;
    match conversion {
        Some(scalar) => convert_to_scalar(&value, scalar, &ctx.culture),
        None => Ok(value),
    }
}

/// Write through alias `origin`.
pub(crate) fn write(
    engine: &Engine,
    ctx: &EvalContext,
    target: &Value,
    origin: &str,
    first: &str,
    value: &Value,
) -> EvalResult {
    let name = terminal(engine, target, origin, first)?;
    ensure_sufficient_stack(|| engine.set_member(ctx, target, &name, value.clone()))
}
