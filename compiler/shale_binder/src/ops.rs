//! Arithmetic, bitwise and unary operator resolution.
//!
//! The left operand picks the operator family: a collection appends or
//! repeats, a keyed collection merges, a string concatenates or repeats,
//! a number does arithmetic. String operands meeting numbers are parsed
//! lazily, using the other operand's kind as a hint, and the operation is
//! dispatched again with the parsed value.

use std::fmt;

use shale_ir::{BinaryOp, OperationShape, ScalarType, UnaryOp};
use shale_stack::ensure_sufficient_stack;
use shale_value::{
    duplicate_key, member_not_found, native_error, operator_not_defined, EvalError, EvalResult,
    HostMethod, HostType, Value,
};

use crate::cache::Rule;
use crate::context::{Culture, EvalContext};
use crate::convert::{self, conversion_error, parse_number};
use crate::engine::Engine;
use crate::guard::{is_negative, Guard};
use crate::members::overload;
use crate::numeric::{self, promote, promote_bitwise, sign_matters, Num, NumKind};
use crate::plan::Plan;

/// Plans for `Binary` and `Unary` shapes.
pub enum OperatorPlan {
    /// Both operands numeric; computed in `kind`.
    Arith { op: BinaryOp, kind: NumKind },
    Bitwise { op: BinaryOp, kind: NumKind },
    /// Parse the string operand at `side`, then dispatch again.
    ParseOperand { side: usize },
    /// Replace the null operand at `side` with `0`, then dispatch again.
    NullOperand { side: usize },
    /// Result is the operand at `side`, unchanged.
    PassThrough { side: usize },
    StringConcat,
    StringRepeat,
    CollectionAppend,
    CollectionRepeat,
    DictMerge,
    /// Static operator method of a host type (`op_Addition`, ...).
    HostOperator { method: HostMethod, type_name: String },
    Unary { op: UnaryOp },
    Not,
}

impl OperatorPlan {
    pub(crate) fn run(
        &self,
        engine: &Engine,
        shape: &OperationShape,
        ctx: &EvalContext,
        args: &[Value],
    ) -> EvalResult {
        let left = args.first().unwrap_or(&Value::Null);
        let right = args.get(1).unwrap_or(&Value::Null);
        match self {
            OperatorPlan::Arith { op, kind } => {
                let (l, r) = numeric_pair(left, right, *kind)?;
                numeric::arith(*op, l, r).map(Num::into_value)
            }
            OperatorPlan::Bitwise { op, kind } => {
                let (Some(l), Some(r)) = (Num::from_value(left), Num::from_value(right)) else {
                    return Err(conversion_error(left, kind.scalar().full_name()));
                };
                numeric::bitwise(*op, l, r, *kind)
                    .map(Num::into_value)
                    .ok_or_else(|| conversion_error(left, kind.scalar().full_name()))
            }
            OperatorPlan::ParseOperand { side } => {
                let hint = if args.len() > 1 {
                    args.get(1 - side)
                        .and_then(Value::scalar_type)
                        .and_then(NumKind::of)
                } else {
                    None
                };
                let operand = &args[*side];
                let text = operand.as_str().unwrap_or_default();
                let parsed = parse_number(text, hint).ok_or_else(|| {
                    conversion_error(operand, hint.unwrap_or(NumKind::Int32).scalar().full_name())
                })?;
                redispatch(engine, shape, ctx, args, *side, parsed.into_value())
            }
            OperatorPlan::NullOperand { side } => {
                redispatch(engine, shape, ctx, args, *side, Value::Int32(0))
            }
            OperatorPlan::PassThrough { side } => Ok(args[*side].clone()),
            OperatorPlan::StringConcat => {
                let mut text = convert::to_string(left, &ctx.culture);
                text.push_str(&convert::to_string(right, &ctx.culture));
                Ok(Value::string(text))
            }
            OperatorPlan::StringRepeat => {
                let count = repeat_count(right, &ctx.culture)?;
                let text = left.as_str().unwrap_or_default();
                repeated_len(text.len(), count, MAX_REPEATED_BYTES)?;
                Ok(Value::string(text.repeat(count)))
            }
            OperatorPlan::CollectionAppend => {
                let mut items = left.collection_items().unwrap_or_default();
                match right.base() {
                    Value::Array(_) | Value::List(_) => {
                        items.extend(right.collection_items().unwrap_or_default());
                    }
                    _ => items.push(right.clone()),
                }
                Ok(Value::array(items))
            }
            OperatorPlan::CollectionRepeat => {
                let count = repeat_count(right, &ctx.culture)?;
                let items = left.collection_items().unwrap_or_default();
                let len = repeated_len(items.len(), count, MAX_REPEATED_ITEMS)?;
                let mut repeated = Vec::with_capacity(len);
                for _ in 0..count {
                    repeated.extend(items.iter().cloned());
                }
                Ok(Value::array(repeated))
            }
            OperatorPlan::DictMerge => merge_dictionaries(left, right, &ctx.culture),
            OperatorPlan::HostOperator { method, type_name } => {
                match overload::select(engine, &method.overloads, args, None, &method.name)? {
                    Some(chosen) => overload::call(engine, ctx, &Value::Null, chosen, args, None),
                    None => Err(member_not_found(&method.name, type_name.as_str())),
                }
            }
            OperatorPlan::Unary { op } => Num::from_value(left)
                .and_then(|n| numeric::unary(*op, n))
                .map(Num::into_value)
                .ok_or_else(|| operator_not_defined(op.as_symbol(), left.type_name(), "")),
            OperatorPlan::Not => Ok(Value::Bool(!convert::is_truthy(left))),
        }
    }
}

fn numeric_pair(left: &Value, right: &Value, kind: NumKind) -> Result<(Num, Num), EvalError> {
    let to = kind.scalar().full_name();
    let l = Num::from_value(left)
        .and_then(|n| n.convert_to(kind))
        .ok_or_else(|| conversion_error(left, to))?;
    let r = Num::from_value(right)
        .and_then(|n| n.convert_to(kind))
        .ok_or_else(|| conversion_error(right, to))?;
    Ok((l, r))
}

fn redispatch(
    engine: &Engine,
    shape: &OperationShape,
    ctx: &EvalContext,
    args: &[Value],
    side: usize,
    replacement: Value,
) -> EvalResult {
    let mut next = args.to_vec();
    next[side] = replacement;
    ensure_sufficient_stack(|| engine.dispatch(shape, ctx, &next))
}

/// Largest string `*` may build, in bytes.
pub(crate) const MAX_REPEATED_BYTES: usize = 1 << 28;
/// Largest collection `*` may build, in elements.
pub(crate) const MAX_REPEATED_ITEMS: usize = 1 << 24;

fn repeated_len(unit: usize, count: usize, limit: usize) -> Result<usize, EvalError> {
    unit.checked_mul(count)
        .filter(|&len| len <= limit)
        .ok_or_else(|| {
            native_error(format!(
                "repeating {unit} elements {count} times exceeds the limit of {limit}"
            ))
        })
}

fn repeat_count(value: &Value, culture: &Culture) -> Result<usize, EvalError> {
    let count = convert::convert_to_scalar(value, ScalarType::Int32, culture)?;
    match count {
        Value::Int32(n) => usize::try_from(n).map_err(|_| {
            native_error(format!("the repetition count {n} must not be negative"))
        }),
        _ => Err(conversion_error(value, ScalarType::Int32.full_name())),
    }
}

fn merge_dictionaries(left: &Value, right: &Value, culture: &Culture) -> EvalResult {
    let (Value::Dictionary(l), Value::Dictionary(r)) = (left.base(), right.base()) else {
        return Err(operator_not_defined("+", left.type_name(), right.type_name()));
    };
    let merged = Value::dictionary(l.is_case_sensitive());
    if let Value::Dictionary(target) = &merged {
        for (key, value) in l.entries() {
            target.insert(key, value);
        }
        for (key, value) in r.entries() {
            if !target.try_add(key.clone(), value) {
                return Err(duplicate_key(convert::to_string(&key, culture)));
            }
        }
    }
    Ok(merged)
}

/// Operand kind for arithmetic: numerics plus bool and char.
fn operand_kind(value: &Value) -> Option<NumKind> {
    value.scalar_type().and_then(NumKind::of)
}

fn host_operator_name(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "op_Addition",
        BinaryOp::Sub => "op_Subtraction",
        BinaryOp::Mul => "op_Multiply",
        BinaryOp::Div => "op_Division",
        BinaryOp::Rem => "op_Modulus",
        BinaryOp::BitAnd => "op_BitwiseAnd",
        BinaryOp::BitOr => "op_BitwiseOr",
        BinaryOp::BitXor => "op_ExclusiveOr",
        BinaryOp::Shl => "op_LeftShift",
        BinaryOp::Shr => "op_RightShift",
    }
}

fn unary_operator_name(op: UnaryOp) -> Option<&'static str> {
    match op {
        UnaryOp::Neg => Some("op_UnaryNegation"),
        UnaryOp::Plus => Some("op_UnaryPlus"),
        UnaryOp::BitNot => Some("op_OnesComplement"),
        UnaryOp::Not => None,
    }
}

fn host_operator(
    engine: &Engine,
    guard: &mut Guard,
    ctx: &EvalContext,
    ty: &HostType,
    name: &str,
) -> Option<Plan> {
    let method = ty.find_method(name, true)?;
    let check = engine.check_language(guard, ctx, ty, "method invocation", name);
    Some(check.apply(Plan::Operator(OperatorPlan::HostOperator {
        method,
        type_name: ty.full_name().to_string(),
    })))
}

/// Resolve a binary operator for the observed operands.
#[tracing::instrument(level = "trace", skip_all, fields(op = op.as_symbol()))]
pub(crate) fn bind_binary(
    engine: &Engine,
    ctx: &EvalContext,
    op: BinaryOp,
    args: &[Value],
) -> Rule {
    let left = args.first().unwrap_or(&Value::Null);
    let right = args.get(1).unwrap_or(&Value::Null);
    let mut guard = Guard::new();
    guard.types_of(args);
    let plan = binary_plan(engine, &mut guard, ctx, op, left, right);
    Rule::new(guard, plan)
}

fn binary_plan(
    engine: &Engine,
    guard: &mut Guard,
    ctx: &EvalContext,
    op: BinaryOp,
    left: &Value,
    right: &Value,
) -> Plan {
    let undefined = || {
        Plan::Raise(operator_not_defined(
            op.as_symbol(),
            left.type_name(),
            right.type_name(),
        ))
    };
    let plan = match left.base() {
        Value::Null if op == BinaryOp::Add => OperatorPlan::PassThrough { side: 1 },
        Value::Null => OperatorPlan::NullOperand { side: 0 },
        Value::Array(_) | Value::List(_) => match op {
            BinaryOp::Add => OperatorPlan::CollectionAppend,
            BinaryOp::Mul => OperatorPlan::CollectionRepeat,
            _ => return undefined(),
        },
        Value::Dictionary(_) => match (op, right.base()) {
            (BinaryOp::Add, Value::Dictionary(_)) => OperatorPlan::DictMerge,
            _ => return undefined(),
        },
        Value::Str(_) => match op {
            BinaryOp::Add if right.type_key().is_numeric() => {
                OperatorPlan::ParseOperand { side: 0 }
            }
            BinaryOp::Add => OperatorPlan::StringConcat,
            BinaryOp::Mul => OperatorPlan::StringRepeat,
            _ => OperatorPlan::ParseOperand { side: 0 },
        },
        Value::Object(o) => {
            return host_operator(engine, guard, ctx, o.host_type(), host_operator_name(op))
                .unwrap_or_else(undefined);
        }
        Value::Type(_) | Value::Wrapped(_) => return undefined(),
        scalar => {
            let Some(left_kind) = operand_kind(scalar) else {
                return undefined();
            };
            match right.base() {
                Value::Str(_) => OperatorPlan::ParseOperand { side: 1 },
                Value::Null => OperatorPlan::NullOperand { side: 1 },
                Value::Object(o) => {
                    return host_operator(engine, guard, ctx, o.host_type(), host_operator_name(op))
                        .unwrap_or_else(undefined);
                }
                other => match operand_kind(other) {
                    Some(right_kind) => {
                        numeric_plan(guard, op, left, left_kind, right, right_kind)
                    }
                    None => return undefined(),
                },
            }
        }
    };
    Plan::Operator(plan)
}

fn numeric_plan(
    guard: &mut Guard,
    op: BinaryOp,
    left: &Value,
    left_kind: NumKind,
    right: &Value,
    right_kind: NumKind,
) -> OperatorPlan {
    if op.is_shift() {
        return OperatorPlan::Bitwise {
            op,
            kind: left_kind.for_bitwise(),
        };
    }
    let (lk, rk) = if op.is_bitwise() {
        (left_kind.for_bitwise(), right_kind.for_bitwise())
    } else {
        (left_kind, right_kind)
    };
    if sign_matters(lk, rk) {
        guard.sign_of(0, left);
    }
    if sign_matters(rk, lk) {
        guard.sign_of(1, right);
    }
    let (ln, rn) = (is_negative(left), is_negative(right));
    if op.is_bitwise() {
        OperatorPlan::Bitwise {
            op,
            kind: promote_bitwise(lk, ln, rk, rn),
        }
    } else {
        OperatorPlan::Arith {
            op,
            kind: promote(lk, ln, rk, rn),
        }
    }
}

/// Resolve a unary operator for the observed operand.
#[tracing::instrument(level = "trace", skip_all, fields(op = op.as_symbol()))]
pub(crate) fn bind_unary(engine: &Engine, ctx: &EvalContext, op: UnaryOp, args: &[Value]) -> Rule {
    let operand = args.first().unwrap_or(&Value::Null);
    let mut guard = Guard::new();
    guard.type_of(0, operand);
    let undefined = || Plan::Raise(operator_not_defined(op.as_symbol(), operand.type_name(), ""));
    let plan = match operand.base() {
        _ if op == UnaryOp::Not => Plan::Operator(OperatorPlan::Not),
        Value::Null => Plan::Operator(OperatorPlan::NullOperand { side: 0 }),
        Value::Str(_) => Plan::Operator(OperatorPlan::ParseOperand { side: 0 }),
        Value::Object(o) => unary_operator_name(op)
            .and_then(|name| host_operator(engine, &mut guard, ctx, o.host_type(), name))
            .unwrap_or_else(undefined),
        other if operand_kind(other).is_some() => Plan::Operator(OperatorPlan::Unary { op }),
        _ => undefined(),
    };
    Rule::new(guard, plan)
}

impl fmt::Debug for OperatorPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorPlan::Arith { op, kind } => write!(f, "Arith({} as {kind:?})", op.as_symbol()),
            OperatorPlan::Bitwise { op, kind } => {
                write!(f, "Bitwise({} as {kind:?})", op.as_symbol())
            }
            OperatorPlan::ParseOperand { side } => write!(f, "ParseOperand(#{side})"),
            OperatorPlan::NullOperand { side } => write!(f, "NullOperand(#{side})"),
            OperatorPlan::PassThrough { side } => write!(f, "PassThrough(#{side})"),
            OperatorPlan::StringConcat => write!(f, "StringConcat"),
            OperatorPlan::StringRepeat => write!(f, "StringRepeat"),
            OperatorPlan::CollectionAppend => write!(f, "CollectionAppend"),
            OperatorPlan::CollectionRepeat => write!(f, "CollectionRepeat"),
            OperatorPlan::DictMerge => write!(f, "DictMerge"),
            OperatorPlan::HostOperator { method, type_name } => {
                write!(f, "HostOperator({type_name}::{})", method.name)
            }
            OperatorPlan::Unary { op } => write!(f, "Unary({})", op.as_symbol()),
            OperatorPlan::Not => write!(f, "Not"),
        }
    }
}
