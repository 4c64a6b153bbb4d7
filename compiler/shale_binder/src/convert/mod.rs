//! Conversion engine.
//!
//! Truthiness, culture-aware string forms, scalar conversions with range
//! checks, and conversions to host types through a single-argument
//! constructor or by initialising properties from a keyed collection.
//!
//! Conversions act on the debased value; the wrapper is dropped unless the
//! target is `[object]`.

mod parse;

use rust_decimal::Decimal;
use shale_ir::{OperationShape, ScalarType, TypeConstraint};
use shale_value::{
    native_error, no_conversion, DictValue, EvalError, EvalResult, HostTypeRef, Overload,
    ParamType, Value,
};
use std::fmt;

use crate::cache::Rule;
use crate::context::{Culture, EvalContext};
use crate::engine::Engine;
use crate::guard::Guard;
use crate::members::overload;
use crate::numeric::{Num, NumKind};
use crate::plan::Plan;

pub use parse::parse_number;

/// Script truthiness.
///
/// A collection with one element takes that element's truthiness, so
/// `if (@(0))` is false and `if (@(0, 0))` is true.
pub fn is_truthy(value: &Value) -> bool {
    let mut current = value.base().clone();
    loop {
        let single = match &current {
            Value::Null => return false,
            Value::Bool(b) => return *b,
            Value::Char(c) => return *c != '\0',
            Value::Str(s) => return !s.is_empty(),
            Value::Array(_) | Value::List(_) => {
                let items = current.collection_items().unwrap_or_default();
                match items.len() {
                    0 => return false,
                    1 => items.into_iter().next(),
                    _ => return true,
                }
            }
            Value::Dictionary(_) | Value::Object(_) | Value::Type(_) | Value::Wrapped(_) => {
                return true
            }
            numeric => return Num::from_value(numeric).is_some_and(|n| !n.is_zero()),
        };
        match single {
            Some(next) => current = next.base().clone(),
            None => return false,
        }
    }
}

/// String form of a value under `culture`.
pub fn to_string(value: &Value, culture: &Culture) -> String {
    match value.base() {
        Value::Null | Value::Wrapped(_) => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Char(c) => c.to_string(),
        Value::Int32(n) => n.to_string(),
        Value::UInt32(n) => n.to_string(),
        Value::Int64(n) => n.to_string(),
        Value::UInt64(n) => n.to_string(),
        Value::Decimal(d) => localize(d.to_string(), culture),
        Value::Double(d) => format_double(*d, culture),
        Value::Str(s) => s.to_string(),
        Value::Array(_) | Value::List(_) => {
            let items = value.collection_items().unwrap_or_default();
            let parts: Vec<String> = items
                .iter()
                .map(|item| {
                    if item.base().collection_items().is_some() {
                        item.type_name().into_owned()
                    } else {
                        to_string(item, culture)
                    }
                })
                .collect();
            parts.join(&culture.list_separator)
        }
        Value::Dictionary(_) => value.type_name().into_owned(),
        Value::Object(o) => o
            .host_type()
            .to_string_fn()
            .and_then(|f| f(value.base(), &[]).ok())
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| o.host_type().full_name().to_string()),
        Value::Type(ty) => ty.full_name().to_string(),
    }
}

fn localize(text: String, culture: &Culture) -> String {
    if culture.decimal_separator == '.' {
        text
    } else {
        text.replace('.', &culture.decimal_separator.to_string())
    }
}

/// Shortest round-trip form; exponent notation outside `[1e-5, 1e15)`.
pub fn format_double(d: f64, culture: &Culture) -> String {
    if d.is_nan() {
        return "NaN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let abs = d.abs();
    let text = if abs != 0.0 && !(1.0e-5..1.0e15).contains(&abs) {
        let raw = format!("{d:e}");
        match raw.split_once('e') {
            Some((mantissa, exponent)) => {
                let exponent: i32 = exponent.parse().unwrap_or(0);
                let sign = if exponent < 0 { '-' } else { '+' };
                format!("{mantissa}E{sign}{:02}", exponent.unsigned_abs())
            }
            None => raw,
        }
    } else {
        format!("{d}")
    };
    localize(text, culture)
}

/// Short form of a value for error messages.
pub(crate) fn preview(value: &Value) -> String {
    const LIMIT: usize = 40;
    let text = to_string(value, &Culture::invariant());
    if text.chars().count() > LIMIT {
        let mut cut: String = text.chars().take(LIMIT).collect();
        cut.push_str("...");
        cut
    } else {
        text
    }
}

pub(crate) fn conversion_error(value: &Value, to: &str) -> EvalError {
    no_conversion(preview(value), value.type_name(), to)
}

/// Numeric view of a value, parsing strings with `hint` and treating null
/// as zero.
pub fn to_num(value: &Value, hint: Option<NumKind>) -> Option<Num> {
    match value.base() {
        Value::Null => Some(Num::I32(0)),
        Value::Str(s) => parse_number(s, hint),
        other => Num::from_value(other),
    }
}

/// Convert to a built-in scalar type.
pub fn convert_to_scalar(value: &Value, target: ScalarType, culture: &Culture) -> EvalResult {
    let base = value.base();
    match target {
        ScalarType::String => Ok(Value::string(to_string(base, culture))),
        ScalarType::Bool => Ok(Value::Bool(is_truthy(base))),
        ScalarType::Char => match base {
            Value::Char(c) => Ok(Value::Char(*c)),
            Value::Null => Ok(Value::Char('\0')),
            Value::Str(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err(conversion_error(value, target.full_name())),
                }
            }
            other => Num::from_value(other)
                .and_then(|n| n.convert_to(NumKind::UInt32))
                .and_then(|n| match n {
                    Num::U32(code) => char::from_u32(code),
                    _ => None,
                })
                .map(Value::Char)
                .ok_or_else(|| conversion_error(value, target.full_name())),
        },
        numeric => {
            let Some(kind) = NumKind::of(numeric) else {
                return Err(conversion_error(value, numeric.full_name()));
            };
            to_num(base, Some(kind))
                .and_then(|n| n.convert_to(kind))
                .map(Num::into_value)
                .ok_or_else(|| conversion_error(value, numeric.full_name()))
        }
    }
}

/// Rank-1 `object[]` view. Null stays null; a scalar becomes a one-element
/// array holding the value as given (wrapper included).
pub fn to_array(value: &Value) -> Value {
    match value.base() {
        Value::Null => Value::Null,
        Value::Array(a) if a.rank() == 1 && a.element_type().is_none() => value.base().clone(),
        Value::Array(_) | Value::List(_) => {
            Value::array(value.collection_items().unwrap_or_default())
        }
        _ => Value::array(vec![value.clone()]),
    }
}

/// Elements of an enumerable value: arrays, lists and host objects with an
/// enumerator. `None` for everything else (keyed collections included).
pub fn elements_of(value: &Value) -> Result<Option<Vec<Value>>, EvalError> {
    match value.base() {
        Value::Array(_) | Value::List(_) => Ok(value.collection_items()),
        Value::Object(o) => match o.host_type().enumerator() {
            Some(enumerate) => {
                let produced = enumerate(value.base(), &[])?;
                Ok(Some(
                    produced.collection_items().unwrap_or_else(|| vec![produced]),
                ))
            }
            None => Ok(None),
        },
        _ => Ok(None),
    }
}

pub(crate) fn is_enumerable(value: &Value) -> bool {
    match value.base() {
        Value::Array(_) | Value::List(_) => true,
        Value::Object(o) => o.host_type().enumerator().is_some(),
        _ => false,
    }
}

/// Convert an argument to a declared parameter type.
pub fn convert_param(
    engine: &Engine,
    value: &Value,
    param: &ParamType,
    culture: &Culture,
) -> EvalResult {
    match param {
        ParamType::Object => Ok(value.clone()),
        ParamType::Scalar(scalar) => convert_to_scalar(value, *scalar, culture),
        ParamType::Array => Ok(to_array(value)),
        ParamType::Host(id) => match value.base() {
            Value::Null => Ok(Value::Null),
            Value::Object(o) if o.host_type().is_assignable_to(*id) => Ok(value.base().clone()),
            _ => {
                let to = engine
                    .host_type_by_id(*id)
                    .map_or_else(|| format!("host type #{}", id.raw()), |t| t.full_name().to_string());
                Err(conversion_error(value, &to))
            }
        },
    }
}

/// Apply an explicit cast written at an invocation site.
pub(crate) fn apply_constraint(
    engine: &Engine,
    ctx: &EvalContext,
    value: &Value,
    constraint: Option<TypeConstraint>,
) -> EvalResult {
    match constraint {
        None | Some(TypeConstraint::Object) => Ok(value.clone()),
        Some(TypeConstraint::Scalar(scalar)) => convert_to_scalar(value, scalar, &ctx.culture),
        Some(TypeConstraint::Array) => Ok(to_array(value)),
        Some(named @ TypeConstraint::Named(_)) => engine.convert(ctx, named, value),
    }
}

/// Plans for `OperationKind::Convert`.
pub enum ConvertPlan {
    Identity,
    Scalar(ScalarType),
    Array,
    /// Already an instance of the target host type.
    HostInstance,
    /// Single-argument constructor of the target type.
    HostConstructor(Overload),
    /// Parameterless constructor, then one property set per key.
    FromDictionary { ty: HostTypeRef, constructor: Overload },
}

impl ConvertPlan {
    pub(crate) fn run(&self, engine: &Engine, ctx: &EvalContext, args: &[Value]) -> EvalResult {
        let value = args.first().unwrap_or(&Value::Null);
        match self {
            ConvertPlan::Identity | ConvertPlan::HostInstance => Ok(value.clone()),
            ConvertPlan::Scalar(scalar) => convert_to_scalar(value, *scalar, &ctx.culture),
            ConvertPlan::Array => Ok(to_array(value)),
            ConvertPlan::HostConstructor(constructor) => {
                overload::call(engine, ctx, &Value::Null, constructor, args, None)
            }
            ConvertPlan::FromDictionary { ty, constructor } => {
                let Value::Dictionary(dict) = value.base() else {
                    return Err(conversion_error(value, ty.full_name()));
                };
                initialise_from(engine, ctx, constructor, dict)
            }
        }
    }
}

fn initialise_from(
    engine: &Engine,
    ctx: &EvalContext,
    constructor: &Overload,
    dict: &DictValue,
) -> EvalResult {
    let instance = (constructor.func)(&Value::Null, &[])?;
    for (key, value) in dict.entries() {
        let property = to_string(&key, &ctx.culture);
        engine.set_member(ctx, &instance, &property, value)?;
    }
    Ok(instance)
}

impl fmt::Debug for ConvertPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertPlan::Identity => write!(f, "Convert(identity)"),
            ConvertPlan::Scalar(scalar) => write!(f, "Convert({})", scalar.accelerator()),
            ConvertPlan::Array => write!(f, "Convert(object[])"),
            ConvertPlan::HostInstance => write!(f, "Convert(instance)"),
            ConvertPlan::HostConstructor(_) => write!(f, "Convert(constructor)"),
            ConvertPlan::FromDictionary { ty, .. } => {
                write!(f, "Convert(properties of {})", ty.full_name())
            }
        }
    }
}

fn is_array_spelling(name: &str) -> bool {
    ["array", "object[]", "System.Object[]", "System.Array"]
        .iter()
        .any(|s| s.eq_ignore_ascii_case(name))
}

fn is_object_spelling(name: &str) -> bool {
    name.eq_ignore_ascii_case("object") || name.eq_ignore_ascii_case("System.Object")
}

/// Resolve a conversion to `target` for the observed value.
#[tracing::instrument(level = "trace", skip_all, fields(target = ?target))]
pub(crate) fn bind(
    engine: &Engine,
    _shape: &OperationShape,
    ctx: &EvalContext,
    target: TypeConstraint,
    args: &[Value],
) -> Rule {
    let value = args.first().unwrap_or(&Value::Null);
    let mut guard = Guard::new();
    guard.type_of(0, value);

    let plan = match target {
        TypeConstraint::Object => ConvertPlan::Identity,
        TypeConstraint::Scalar(scalar) => ConvertPlan::Scalar(scalar),
        TypeConstraint::Array => ConvertPlan::Array,
        TypeConstraint::Named(name) => {
            let spelling = engine.interner().lookup(name.spelling);
            if let Some(scalar) = ScalarType::from_name(spelling) {
                ConvertPlan::Scalar(scalar)
            } else if is_array_spelling(spelling) {
                ConvertPlan::Array
            } else if is_object_spelling(spelling) {
                ConvertPlan::Identity
            } else {
                guard.version(engine.bus().host_type_counter());
                let Some(ty) = engine.lookup_type(spelling) else {
                    return Rule::new(
                        guard,
                        Plan::Raise(no_conversion(preview(value), value.type_name(), spelling)),
                    );
                };
                let check = engine.check_language(&mut guard, ctx, &ty, "type conversion", ty.full_name());
                let plan = match bind_host(engine, value, &ty) {
                    Ok(plan) => Plan::Convert(plan),
                    Err(err) => Plan::Raise(err),
                };
                return Rule::new(guard, check.apply(plan));
            }
        }
    };
    Rule::new(guard, Plan::Convert(plan))
}

fn bind_host(engine: &Engine, value: &Value, ty: &HostTypeRef) -> Result<ConvertPlan, EvalError> {
    match value.base() {
        Value::Null => return Ok(ConvertPlan::Identity),
        Value::Object(o) if o.host_type().is_assignable_to(ty.id()) => {
            return Ok(ConvertPlan::HostInstance)
        }
        Value::Dictionary(_) => {
            if let Some(constructor) = ty.constructors().iter().find(|c| c.params.is_empty()) {
                return Ok(ConvertPlan::FromDictionary {
                    ty: ty.clone(),
                    constructor: constructor.clone(),
                });
            }
        }
        _ => {}
    }
    let candidates: Vec<Overload> = ty
        .constructors()
        .iter()
        .filter(|c| c.params.len() == 1 && !c.params_array)
        .cloned()
        .collect();
    match overload::select(engine, &candidates, std::slice::from_ref(value), None, ty.name())? {
        Some(constructor) => Ok(ConvertPlan::HostConstructor(constructor.clone())),
        None => Err(conversion_error(value, ty.full_name())),
    }
}

/// Decimal view used by numeric conversions in builtins.
pub(crate) fn to_decimal(value: &Value) -> Result<Decimal, EvalError> {
    match to_num(value, Some(NumKind::Decimal)).and_then(|n| n.convert_to(NumKind::Decimal)) {
        Some(Num::Dec(d)) => Ok(d),
        _ => Err(conversion_error(value, ScalarType::Decimal.full_name())),
    }
}

/// Extract a string argument, converting scalars.
pub(crate) fn arg_string(args: &[Value], index: usize) -> Result<String, EvalError> {
    args.get(index)
        .map(|v| to_string(v, &Culture::invariant()))
        .ok_or_else(|| native_error(format!("missing argument {index}")))
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
