//! Equality, ordering and containment.
//!
//! The left operand decides the comparison domain: the right operand is
//! converted to the left operand's type (numbers parse strings, strings
//! stringify everything) before comparing. A collection on the left filters
//! its elements unless the shape pins the comparison to scalar mode.

use std::cmp::Ordering;
use std::fmt;

use shale_ir::{fold_case, ComparisonOp, OperationShape, ShapeFlags};
use shale_value::{not_comparable, EvalError, EvalResult, HostType, Value};

use crate::cache::Rule;
use crate::context::EvalContext;
use crate::convert::{self, conversion_error, elements_of, is_enumerable, parse_number};
use crate::engine::Engine;
use crate::guard::Guard;
use crate::numeric::{Num, NumKind};
use crate::plan::Plan;

pub enum ComparePlan {
    /// Both operands numeric scalars.
    Numeric { op: ComparisonOp },
    /// Both operands strings.
    String { op: ComparisonOp, ignore_case: bool },
    /// Anything else that compares as one pair of values.
    Scalar { op: ComparisonOp, ignore_case: bool },
    /// Left operand is enumerable: keep the elements that satisfy `op`.
    Broadcast { op: ComparisonOp, ignore_case: bool },
    Containment { op: ComparisonOp, ignore_case: bool },
}

impl ComparePlan {
    pub(crate) fn run(
        &self,
        _engine: &Engine,
        _shape: &OperationShape,
        ctx: &EvalContext,
        args: &[Value],
    ) -> EvalResult {
        let left = args.first().unwrap_or(&Value::Null);
        let right = args.get(1).unwrap_or(&Value::Null);
        match self {
            ComparePlan::Numeric { op } => {
                let relation = match (Num::from_value(left), Num::from_value(right)) {
                    (Some(l), Some(r)) => l.compare(r).map_or(Relation::Unordered, Relation::Ordered),
                    _ => Relation::Unordered,
                };
                relation.test(*op, left, right).map(Value::Bool)
            }
            ComparePlan::String { op, ignore_case } => {
                let ordering = compare_strings(
                    left.as_str().unwrap_or_default(),
                    right.as_str().unwrap_or_default(),
                    *ignore_case,
                );
                Relation::Ordered(ordering).test(*op, left, right).map(Value::Bool)
            }
            ComparePlan::Scalar { op, ignore_case } => {
                compare_scalar(ctx, *op, left, right, *ignore_case).map(Value::Bool)
            }
            ComparePlan::Broadcast { op, ignore_case } => {
                let items = elements_of(left)?.unwrap_or_default();
                let mut matched = Vec::new();
                for item in items {
                    if compare_scalar(ctx, *op, &item, right, *ignore_case)? {
                        matched.push(item);
                    }
                }
                Ok(Value::array(matched))
            }
            ComparePlan::Containment { op, ignore_case } => {
                let (collection, needle) = match op {
                    ComparisonOp::In | ComparisonOp::NotIn => (right, left),
                    _ => (left, right),
                };
                let found = contains(ctx, collection, needle, *ignore_case)?;
                let negated = matches!(op, ComparisonOp::NotContains | ComparisonOp::NotIn);
                Ok(Value::Bool(found != negated))
            }
        }
    }
}

/// What can be determined about a pair of values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Relation {
    Ordered(Ordering),
    /// Only equality is known.
    EqualOnly(bool),
    /// Never equal, never ordered (NaN).
    Unordered,
}

impl Relation {
    fn test(self, op: ComparisonOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
        let equal = match self {
            Relation::Ordered(o) => o == Ordering::Equal,
            Relation::EqualOnly(eq) => eq,
            Relation::Unordered => false,
        };
        match op {
            ComparisonOp::Eq => Ok(equal),
            ComparisonOp::Ne => Ok(!equal),
            _ => match self {
                Relation::Ordered(o) => Ok(match op {
                    ComparisonOp::Lt => o == Ordering::Less,
                    ComparisonOp::Le => o != Ordering::Greater,
                    ComparisonOp::Gt => o == Ordering::Greater,
                    _ => o != Ordering::Less,
                }),
                Relation::Unordered => Ok(false),
                Relation::EqualOnly(_) => Err(not_comparable(
                    convert::preview(left),
                    convert::preview(right),
                )),
            },
        }
    }
}

fn compare_strings(left: &str, right: &str, ignore_case: bool) -> Ordering {
    if ignore_case {
        fold_case(left).cmp(&fold_case(right))
    } else {
        left.cmp(right)
    }
}

/// Compare one pair of values under `op` (`-eq` through `-ge`).
///
/// Equality answers `false` (and `-ne` answers `true`) when the right
/// operand cannot be converted to the left operand's type; ordering raises.
pub fn compare_scalar(
    ctx: &EvalContext,
    op: ComparisonOp,
    left: &Value,
    right: &Value,
    ignore_case: bool,
) -> Result<bool, EvalError> {
    match relate(ctx, op, left, right, ignore_case) {
        Ok(relation) => relation.test(op, left, right),
        Err(err) if op.is_equality() && err.is_conversion() => Ok(op == ComparisonOp::Ne),
        Err(err) => Err(err),
    }
}

fn relate(
    ctx: &EvalContext,
    op: ComparisonOp,
    left: &Value,
    right: &Value,
    ignore_case: bool,
) -> Result<Relation, EvalError> {
    let (l, r) = (left.base(), right.base());
    Ok(match (l, r) {
        (Value::Null, Value::Null) => Relation::Ordered(Ordering::Equal),
        (Value::Null, other) => null_relation(op, other),
        (other, Value::Null) => null_relation(op, other).reverse(),
        (Value::Bool(a), _) => Relation::Ordered(a.cmp(&convert::is_truthy(r))),
        (Value::Char(a), _) => match r {
            Value::Str(s) => Relation::Ordered(compare_strings(&a.to_string(), s, ignore_case)),
            Value::Char(b) => Relation::Ordered(compare_strings(
                &a.to_string(),
                &b.to_string(),
                ignore_case,
            )),
            other => numeric_relation(l, other)?,
        },
        (Value::Str(s), _) => {
            let other = convert::to_string(r, &ctx.culture);
            Relation::Ordered(compare_strings(s, &other, ignore_case))
        }
        (Value::Object(o), _) => host_relation(o.host_type(), l, r),
        (Value::Array(_) | Value::List(_) | Value::Dictionary(_) | Value::Type(_), _) => {
            Relation::EqualOnly(l.identity().is_some() && l.identity() == r.identity())
        }
        _ => numeric_relation(l, r)?,
    })
}

impl Relation {
    fn reverse(self) -> Relation {
        match self {
            Relation::Ordered(o) => Relation::Ordered(o.reverse()),
            other => other,
        }
    }
}

/// Null on the left against a non-null value.
fn null_relation(op: ComparisonOp, other: &Value) -> Relation {
    if op.is_equality() {
        return Relation::EqualOnly(false);
    }
    match other {
        Value::Str(s) if s.is_empty() => Relation::Ordered(Ordering::Equal),
        Value::Str(_) => Relation::Ordered(Ordering::Less),
        _ => match Num::from_value(other) {
            Some(n) => Num::I32(0)
                .compare(n)
                .map_or(Relation::Unordered, Relation::Ordered),
            None => Relation::Ordered(Ordering::Less),
        },
    }
}

fn numeric_relation(left: &Value, right: &Value) -> Result<Relation, EvalError> {
    let Some(l) = Num::from_value(left) else {
        return Ok(Relation::EqualOnly(left == right));
    };
    let r = match right {
        Value::Str(s) => parse_number(s, Some(l.kind())),
        Value::Object(o) => {
            return Ok(host_relation(o.host_type(), right, left).reverse());
        }
        other => Num::from_value(other),
    };
    let Some(r) = r else {
        let to = left
            .scalar_type()
            .and_then(NumKind::of)
            .map_or("System.Double", |k| k.scalar().full_name());
        return Err(conversion_error(right, to));
    };
    Ok(l.compare(r).map_or(Relation::Unordered, Relation::Ordered))
}

/// Typed comparer when both sides share the type, then the generic
/// comparer, then value equality, then identity.
fn host_relation(ty: &HostType, left: &Value, right: &Value) -> Relation {
    let same_type = right
        .as_host_object()
        .is_some_and(|o| o.host_type().id() == ty.id());
    if same_type {
        if let Some(ordering) = ty.typed_comparer().and_then(|cmp| cmp(left, right)) {
            return Relation::Ordered(ordering);
        }
    }
    if let Some(ordering) = ty.comparer().and_then(|cmp| cmp(left, right)) {
        return Relation::Ordered(ordering);
    }
    if let Some(equal) = ty.equality() {
        return Relation::EqualOnly(equal(left, right));
    }
    Relation::EqualOnly(left.identity().is_some() && left.identity() == right.identity())
}

fn contains(
    ctx: &EvalContext,
    collection: &Value,
    needle: &Value,
    ignore_case: bool,
) -> Result<bool, EvalError> {
    let items = match elements_of(collection)? {
        Some(items) => items,
        None => vec![collection.clone()],
    };
    for item in &items {
        if compare_scalar(ctx, ComparisonOp::Eq, item, needle, ignore_case)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Resolve a comparison for the observed operands.
#[tracing::instrument(level = "trace", skip_all, fields(op = op.as_symbol()))]
pub(crate) fn bind(shape: &OperationShape, op: ComparisonOp, args: &[Value]) -> Rule {
    let left = args.first().unwrap_or(&Value::Null);
    let right = args.get(1).unwrap_or(&Value::Null);
    let mut guard = Guard::new();
    guard.types_of(args);
    let ignore_case = !shape.is_case_sensitive();
    let plan = if op.is_containment() {
        ComparePlan::Containment { op, ignore_case }
    } else if !shape.flags.contains(ShapeFlags::SCALAR_ONLY) && is_enumerable(left) {
        ComparePlan::Broadcast { op, ignore_case }
    } else if left.type_key().is_numeric() && right.type_key().is_numeric() {
        ComparePlan::Numeric { op }
    } else if left.as_str().is_some() && right.as_str().is_some() {
        ComparePlan::String { op, ignore_case }
    } else {
        ComparePlan::Scalar { op, ignore_case }
    };
    Rule::new(guard, Plan::Compare(plan))
}

impl fmt::Debug for ComparePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, op, ignore_case) = match self {
            ComparePlan::Numeric { op } => ("Numeric", op, false),
            ComparePlan::String { op, ignore_case } => ("String", op, *ignore_case),
            ComparePlan::Scalar { op, ignore_case } => ("Scalar", op, *ignore_case),
            ComparePlan::Broadcast { op, ignore_case } => ("Broadcast", op, *ignore_case),
            ComparePlan::Containment { op, ignore_case } => ("Containment", op, *ignore_case),
        };
        write!(f, "{name}({}", op.as_symbol())?;
        if ignore_case {
            write!(f, ", ignore case")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;

    fn eq(left: Value, right: Value) -> bool {
        compare_scalar(&EvalContext::new(), ComparisonOp::Eq, &left, &right, true).unwrap()
    }

    #[test]
    fn test_relation_of_nan_is_unordered() {
        let ctx = EvalContext::new();
        let nan = Value::Double(f64::NAN);
        assert!(!compare_scalar(&ctx, ComparisonOp::Eq, &nan, &nan, true).unwrap());
        assert!(compare_scalar(&ctx, ComparisonOp::Ne, &nan, &nan, true).unwrap());
        assert!(!compare_scalar(&ctx, ComparisonOp::Lt, &nan, &Value::Int32(1), true).unwrap());
    }

    #[test]
    fn test_right_operand_takes_left_type() {
        assert!(eq(Value::Int32(10), Value::string("10")));
        assert!(eq(Value::string("10"), Value::Int32(10)));
        assert!(eq(Value::Bool(true), Value::string("yes")));
        assert!(!eq(Value::Int32(10), Value::string("ten")));
    }

    #[test]
    fn test_char_compares_as_text() {
        assert!(eq(Value::Char('a'), Value::string("A")));
        assert!(eq(Value::Char('a'), Value::Int32(97)));
    }
}
