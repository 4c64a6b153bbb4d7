//! Reflection descriptors for the built-in value types.
//!
//! Member resolution treats every value as an instance of some host type,
//! so strings, numbers, arrays and the keyed collections get descriptors
//! here. All of them are reachable in constrained language mode.

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use shale_ir::{ComparisonOp, ScalarType};
use shale_value::{
    arithmetic_overflow, duplicate_key, index_out_of_range, native_error, no_conversion,
    EvalError, EvalResult, HostTypeBuilder, HostTypeRef, ParamType, Value, Visibility,
};

use crate::compare::compare_scalar;
use crate::context::{Culture, EvalContext};
use crate::convert::{arg_string, parse_number, to_decimal, to_string};
use crate::numeric::{Num, NumKind};

const STRING: ParamType = ParamType::Scalar(ScalarType::String);
const INT: ParamType = ParamType::Scalar(ScalarType::Int32);
const LONG: ParamType = ParamType::Scalar(ScalarType::Int64);
const DECIMAL: ParamType = ParamType::Scalar(ScalarType::Decimal);
const DOUBLE: ParamType = ParamType::Scalar(ScalarType::Double);

const SCALARS: [ScalarType; 9] = [
    ScalarType::Bool,
    ScalarType::Char,
    ScalarType::Int32,
    ScalarType::UInt32,
    ScalarType::Int64,
    ScalarType::UInt64,
    ScalarType::Decimal,
    ScalarType::Double,
    ScalarType::String,
];

/// Descriptors for the built-in types.
pub struct Builtins {
    pub object: HostTypeRef,
    pub string: HostTypeRef,
    /// Non-string scalars, in `SCALARS` order minus `String`.
    scalars: Vec<(ScalarType, HostTypeRef)>,
    pub array: HostTypeRef,
    pub list: HostTypeRef,
    pub dictionary: HostTypeRef,
    pub math: HostTypeRef,
    pub runtime_type: HostTypeRef,
}

impl Builtins {
    pub fn new() -> Self {
        let object = object_type();
        let scalars = SCALARS
            .into_iter()
            .filter(|s| *s != ScalarType::String)
            .map(|s| (s, scalar_type(s, &object)))
            .collect();
        Builtins {
            string: string_type(&object),
            array: array_type(&object),
            list: list_type(&object),
            dictionary: dictionary_type(&object),
            math: math_type(&object),
            runtime_type: runtime_type(&object),
            scalars,
            object,
        }
    }

    /// Descriptor of a scalar type.
    pub fn scalar(&self, scalar: ScalarType) -> &HostTypeRef {
        if scalar == ScalarType::String {
            return &self.string;
        }
        self.scalars
            .iter()
            .find(|(s, _)| *s == scalar)
            .map_or(&self.object, |(_, ty)| ty)
    }

    /// Descriptor every member lookup on `value` starts from.
    pub fn descriptor_for(&self, value: &Value) -> HostTypeRef {
        let ty = match value.base() {
            Value::Null | Value::Wrapped(_) => &self.object,
            Value::Str(_) => &self.string,
            Value::Array(_) => &self.array,
            Value::List(_) => &self.list,
            Value::Dictionary(_) => &self.dictionary,
            Value::Type(_) => &self.runtime_type,
            Value::Object(o) => return o.host_type().clone(),
            scalar => scalar
                .scalar_type()
                .map_or(&self.object, |s| self.scalar(s)),
        };
        ty.clone()
    }

    /// Every built-in descriptor, with the extra names it is known by.
    pub fn all(&self) -> Vec<(HostTypeRef, Vec<&'static str>)> {
        let mut all = vec![
            (self.object.clone(), vec!["object"]),
            (self.string.clone(), vec!["string"]),
            (self.array.clone(), vec!["array"]),
            (self.list.clone(), vec!["arraylist"]),
            (self.dictionary.clone(), vec!["hashtable"]),
            (self.math.clone(), vec![]),
            (self.runtime_type.clone(), vec!["type"]),
        ];
        for (scalar, ty) in &self.scalars {
            all.push((ty.clone(), vec![scalar.accelerator()]));
        }
        all
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}

fn receiver_str(recv: &Value) -> Result<&str, EvalError> {
    recv.as_str()
        .ok_or_else(|| native_error(format!("expected a string receiver, got {}", recv.type_name())))
}

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&Value::Null)
}

fn arg_i64(args: &[Value], index: usize) -> Result<i64, EvalError> {
    arg(args, index)
        .as_i64()
        .ok_or_else(|| native_error(format!("argument {index} must be an integer")))
}

fn arg_f64(args: &[Value], index: usize) -> Result<f64, EvalError> {
    Num::from_value(arg(args, index))
        .map(Num::to_f64)
        .ok_or_else(|| native_error(format!("argument {index} must be numeric")))
}

fn char_count(s: &str) -> usize {
    s.chars().count()
}

fn count_value(len: usize) -> Value {
    i32::try_from(len).map_or_else(|_| Value::Int64(i64::try_from(len).unwrap_or(i64::MAX)), Value::Int32)
}

fn object_type() -> HostTypeRef {
    HostTypeBuilder::new("System.Object")
        .allowed_in_constrained(true)
        .method("ToString", vec![], |recv, _| {
            Ok(Value::string(to_string(recv, &Culture::invariant())))
        })
        .method("Equals", vec![ParamType::Object], |recv, args| {
            compare_scalar(&EvalContext::new(), ComparisonOp::Eq, recv, arg(args, 0), true)
                .map(Value::Bool)
        })
        .build()
}

fn string_type(object: &HostTypeRef) -> HostTypeRef {
    HostTypeBuilder::new("System.String")
        .base(object.clone())
        .allowed_in_constrained(true)
        .property("Length", |recv, _| Ok(count_value(char_count(receiver_str(recv)?))))
        .static_property("Empty", |_, _| Ok(Value::string("")))
        .method("ToUpper", vec![], |recv, _| {
            Ok(Value::string(receiver_str(recv)?.to_uppercase()))
        })
        .method("ToLower", vec![], |recv, _| {
            Ok(Value::string(receiver_str(recv)?.to_lowercase()))
        })
        .method("Trim", vec![], |recv, _| Ok(Value::string(receiver_str(recv)?.trim())))
        .method("Contains", vec![STRING], |recv, args| {
            Ok(Value::Bool(receiver_str(recv)?.contains(&arg_string(args, 0)?)))
        })
        .method("StartsWith", vec![STRING], |recv, args| {
            Ok(Value::Bool(receiver_str(recv)?.starts_with(&arg_string(args, 0)?)))
        })
        .method("EndsWith", vec![STRING], |recv, args| {
            Ok(Value::Bool(receiver_str(recv)?.ends_with(&arg_string(args, 0)?)))
        })
        .method("IndexOf", vec![STRING], |recv, args| {
            let s = receiver_str(recv)?;
            let needle = arg_string(args, 0)?;
            Ok(s
                .find(&needle)
                .map_or(Value::Int32(-1), |byte| count_value(char_count(&s[..byte]))))
        })
        .method("Substring", vec![INT], |recv, args| {
            let s = receiver_str(recv)?;
            let start = char_offset(s, arg_i64(args, 0)?)?;
            Ok(Value::string(s.chars().skip(start).collect::<String>()))
        })
        .method("Substring", vec![INT, INT], |recv, args| {
            let s = receiver_str(recv)?;
            let start = char_offset(s, arg_i64(args, 0)?)?;
            let len = usize::try_from(arg_i64(args, 1)?)
                .ok()
                .filter(|len| start + len <= char_count(s))
                .ok_or_else(|| index_out_of_range(arg(args, 1).as_i64().unwrap_or(0), "System.String"))?;
            Ok(Value::string(s.chars().skip(start).take(len).collect::<String>()))
        })
        .method("Replace", vec![STRING, STRING], |recv, args| {
            let s = receiver_str(recv)?;
            let from = arg_string(args, 0)?;
            if from.is_empty() {
                return Err(native_error("string cannot be of zero length"));
            }
            Ok(Value::string(s.replace(&from, &arg_string(args, 1)?)))
        })
        .method("Split", vec![STRING], |recv, args| {
            let separators: Vec<char> = arg_string(args, 0)?.chars().collect();
            let parts = receiver_str(recv)?
                .split(|c: char| separators.contains(&c))
                .map(Value::string)
                .collect();
            Ok(Value::array(parts))
        })
        .static_method("IsNullOrEmpty", vec![STRING], |_, args| {
            Ok(Value::Bool(arg(args, 0).as_str().map_or(true, str::is_empty)))
        })
        .overload(
            "Join",
            true,
            vec![STRING, ParamType::Array],
            true,
            Visibility::Public,
            Arc::new(|_: &Value, args: &[Value]| {
                let separator = arg_string(args, 0)?;
                let culture = Culture::invariant();
                let parts: Vec<String> = arg(args, 1)
                    .collection_items()
                    .unwrap_or_default()
                    .iter()
                    .map(|v| to_string(v, &culture))
                    .collect();
                Ok(Value::string(parts.join(&separator)))
            }),
        )
        .build()
}

/// Character position `start` within `s`, rejecting offsets past the end.
fn char_offset(s: &str, start: i64) -> Result<usize, EvalError> {
    usize::try_from(start)
        .ok()
        .filter(|start| *start <= char_count(s))
        .ok_or_else(|| index_out_of_range(start, "System.String"))
}

fn scalar_bounds(scalar: ScalarType) -> Option<(Value, Value)> {
    Some(match scalar {
        ScalarType::Int32 => (Value::Int32(i32::MIN), Value::Int32(i32::MAX)),
        ScalarType::UInt32 => (Value::UInt32(u32::MIN), Value::UInt32(u32::MAX)),
        ScalarType::Int64 => (Value::Int64(i64::MIN), Value::Int64(i64::MAX)),
        ScalarType::UInt64 => (Value::UInt64(u64::MIN), Value::UInt64(u64::MAX)),
        ScalarType::Decimal => (Value::Decimal(Decimal::MIN), Value::Decimal(Decimal::MAX)),
        ScalarType::Double => (Value::Double(f64::MIN), Value::Double(f64::MAX)),
        ScalarType::Char => (Value::Char('\0'), Value::Char(char::MAX)),
        ScalarType::Bool | ScalarType::String => return None,
    })
}

fn scalar_type(scalar: ScalarType, object: &HostTypeRef) -> HostTypeRef {
    let mut builder = HostTypeBuilder::new(scalar.full_name())
        .base(object.clone())
        .allowed_in_constrained(true);
    if let Some((min, max)) = scalar_bounds(scalar) {
        builder = builder
            .static_property("MinValue", move |_, _| Ok(min.clone()))
            .static_property("MaxValue", move |_, _| Ok(max.clone()));
    }
    if let Some(kind) = NumKind::of(scalar).filter(|_| scalar.is_numeric()) {
        builder = builder.static_method("Parse", vec![STRING], move |_, args| {
            let text = arg_string(args, 0)?;
            parse_number(&text, Some(kind))
                .and_then(|n| n.convert_to(kind))
                .map(Num::into_value)
                .ok_or_else(|| no_conversion(text.as_str(), "System.String", scalar.full_name()))
        });
    } else if scalar == ScalarType::Bool {
        builder = builder.static_method("Parse", vec![STRING], |_, args| {
            let text = arg_string(args, 0)?;
            match text.trim() {
                t if t.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                t if t.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                _ => Err(no_conversion(text.as_str(), "System.String", "System.Boolean")),
            }
        });
    }
    builder.build()
}

fn array_type(object: &HostTypeRef) -> HostTypeRef {
    HostTypeBuilder::new("System.Array")
        .base(object.clone())
        .allowed_in_constrained(true)
        .property("Length", |recv, _| Ok(count_value(recv.collection_len().unwrap_or(0))))
        .property("Count", |recv, _| Ok(count_value(recv.collection_len().unwrap_or(0))))
        .property("Rank", |recv, _| match recv.base() {
            Value::Array(a) => Ok(count_value(a.rank())),
            _ => Ok(Value::Int32(1)),
        })
        .method("GetLength", vec![INT], |recv, args| {
            let dimension = arg_i64(args, 0)?;
            match recv.base() {
                Value::Array(a) => usize::try_from(dimension)
                    .ok()
                    .and_then(|d| a.dims().get(d).copied())
                    .map(count_value)
                    .ok_or_else(|| index_out_of_range(dimension, a.type_name())),
                _ => Err(native_error("GetLength requires an array")),
            }
        })
        .build()
}

fn list_type(object: &HostTypeRef) -> HostTypeRef {
    fn with_list<R>(
        recv: &Value,
        f: impl FnOnce(&shale_value::ListValue) -> Result<R, EvalError>,
    ) -> Result<R, EvalError> {
        match recv.base() {
            Value::List(l) => f(l),
            other => Err(native_error(format!(
                "expected an ArrayList receiver, got {}",
                other.type_name()
            ))),
        }
    }

    HostTypeBuilder::new("System.Collections.ArrayList")
        .base(object.clone())
        .allowed_in_constrained(true)
        .constructor(vec![], |_, _| Ok(Value::list(Vec::new())))
        .property("Count", |recv, _| with_list(recv, |l| Ok(count_value(l.len()))))
        .method("Add", vec![ParamType::Object], |recv, args| {
            with_list(recv, |l| Ok(count_value(l.push(arg(args, 0).clone()))))
        })
        .method("Remove", vec![ParamType::Object], |recv, args| {
            with_list(recv, |l| {
                let ctx = EvalContext::new();
                for (i, item) in l.snapshot().iter().enumerate() {
                    if compare_scalar(&ctx, ComparisonOp::Eq, item, arg(args, 0), true)? {
                        l.remove_at(i);
                        break;
                    }
                }
                Ok(Value::Null)
            })
        })
        .method("RemoveAt", vec![INT], |recv, args| {
            let index = arg_i64(args, 0)?;
            with_list(recv, |l| {
                usize::try_from(index)
                    .ok()
                    .and_then(|i| l.remove_at(i))
                    .map(|_| Value::Null)
                    .ok_or_else(|| index_out_of_range(index, "System.Collections.ArrayList"))
            })
        })
        .method("Clear", vec![], |recv, _| {
            with_list(recv, |l| {
                l.clear();
                Ok(Value::Null)
            })
        })
        .method("Contains", vec![ParamType::Object], |recv, args| {
            with_list(recv, |l| {
                let ctx = EvalContext::new();
                for item in l.snapshot() {
                    if compare_scalar(&ctx, ComparisonOp::Eq, &item, arg(args, 0), true)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            })
        })
        .method("ToArray", vec![], |recv, _| with_list(recv, |l| Ok(Value::array(l.snapshot()))))
        .build()
}

fn dictionary_type(object: &HostTypeRef) -> HostTypeRef {
    fn with_dict<R>(
        recv: &Value,
        f: impl FnOnce(&shale_value::DictValue) -> Result<R, EvalError>,
    ) -> Result<R, EvalError> {
        match recv.base() {
            Value::Dictionary(d) => f(d),
            other => Err(native_error(format!(
                "expected a Hashtable receiver, got {}",
                other.type_name()
            ))),
        }
    }

    HostTypeBuilder::new("System.Collections.Hashtable")
        .base(object.clone())
        .allowed_in_constrained(true)
        .constructor(vec![], |_, _| Ok(Value::dictionary(false)))
        .property("Count", |recv, _| with_dict(recv, |d| Ok(count_value(d.len()))))
        .property("Keys", |recv, _| with_dict(recv, |d| Ok(Value::array(d.keys()))))
        .property("Values", |recv, _| with_dict(recv, |d| Ok(Value::array(d.values()))))
        .method("ContainsKey", vec![ParamType::Object], |recv, args| {
            with_dict(recv, |d| Ok(Value::Bool(d.contains_key(arg(args, 0).base()))))
        })
        .method("Add", vec![ParamType::Object, ParamType::Object], |recv, args| {
            with_dict(recv, |d| {
                let key = arg(args, 0).base().clone();
                if d.try_add(key.clone(), arg(args, 1).clone()) {
                    Ok(Value::Null)
                } else {
                    Err(duplicate_key(to_string(&key, &Culture::invariant())))
                }
            })
        })
        .method("Remove", vec![ParamType::Object], |recv, args| {
            with_dict(recv, |d| {
                d.remove(arg(args, 0).base());
                Ok(Value::Null)
            })
        })
        .build()
}

fn round_even(d: Decimal, digits: u32) -> Decimal {
    d.round_dp_with_strategy(digits, RoundingStrategy::MidpointNearestEven)
}

fn math_type(object: &HostTypeRef) -> HostTypeRef {
    let mut builder = HostTypeBuilder::new("System.Math")
        .base(object.clone())
        .allowed_in_constrained(true)
        .static_property("PI", |_, _| Ok(Value::Double(std::f64::consts::PI)))
        .static_property("E", |_, _| Ok(Value::Double(std::f64::consts::E)))
        .static_method("Abs", vec![INT], |_, args| {
            let n = arg_i64(args, 0)?;
            i32::try_from(n.abs())
                .map(Value::Int32)
                .map_err(|_| arithmetic_overflow("Abs"))
        })
        .static_method("Abs", vec![LONG], |_, args| {
            arg_i64(args, 0)?
                .checked_abs()
                .map(Value::Int64)
                .ok_or_else(|| arithmetic_overflow("Abs"))
        })
        .static_method("Abs", vec![DECIMAL], |_, args| {
            Ok(Value::Decimal(to_decimal(arg(args, 0))?.abs()))
        })
        .static_method("Abs", vec![DOUBLE], |_, args| Ok(Value::Double(arg_f64(args, 0)?.abs())))
        .static_method("Pow", vec![DOUBLE, DOUBLE], |_, args| {
            Ok(Value::Double(arg_f64(args, 0)?.powf(arg_f64(args, 1)?)))
        })
        .static_method("Sqrt", vec![DOUBLE], |_, args| Ok(Value::Double(arg_f64(args, 0)?.sqrt())))
        .static_method("Floor", vec![DOUBLE], |_, args| {
            Ok(Value::Double(arg_f64(args, 0)?.floor()))
        })
        .static_method("Floor", vec![DECIMAL], |_, args| {
            Ok(Value::Decimal(to_decimal(arg(args, 0))?.floor()))
        })
        .static_method("Ceiling", vec![DOUBLE], |_, args| {
            Ok(Value::Double(arg_f64(args, 0)?.ceil()))
        })
        .static_method("Ceiling", vec![DECIMAL], |_, args| {
            Ok(Value::Decimal(to_decimal(arg(args, 0))?.ceil()))
        })
        .static_method("Round", vec![DOUBLE], |_, args| {
            Ok(Value::Double(arg_f64(args, 0)?.round_ties_even()))
        })
        .static_method("Round", vec![DECIMAL], |_, args| {
            Ok(Value::Decimal(round_even(to_decimal(arg(args, 0))?, 0)))
        })
        .static_method("Round", vec![DECIMAL, INT], |_, args| {
            let digits = u32::try_from(arg_i64(args, 1)?)
                .ok()
                .filter(|d| *d <= 28)
                .ok_or_else(|| native_error("rounding digits must be between 0 and 28"))?;
            Ok(Value::Decimal(round_even(to_decimal(arg(args, 0))?, digits)))
        });

    for (param, scalar) in [
        (INT, ScalarType::Int32),
        (LONG, ScalarType::Int64),
        (DECIMAL, ScalarType::Decimal),
        (DOUBLE, ScalarType::Double),
    ] {
        builder = builder
            .static_method("Max", vec![param.clone(), param.clone()], move |_, args| {
                pick(args, scalar, true)
            })
            .static_method("Min", vec![param.clone(), param], move |_, args| {
                pick(args, scalar, false)
            });
    }
    builder.build()
}

/// Larger (or smaller) of two arguments already converted to `scalar`.
fn pick(args: &[Value], scalar: ScalarType, larger: bool) -> EvalResult {
    let (a, b) = (arg(args, 0), arg(args, 1));
    let ordering = Num::from_value(a)
        .zip(Num::from_value(b))
        .and_then(|(x, y)| x.compare(y))
        .ok_or_else(|| native_error(format!("{} operands are not comparable", scalar.full_name())))?;
    let a_wins = if larger { ordering.is_ge() } else { ordering.is_le() };
    Ok(if a_wins { a.clone() } else { b.clone() })
}

fn runtime_type(object: &HostTypeRef) -> HostTypeRef {
    fn described(recv: &Value) -> Result<&HostTypeRef, EvalError> {
        recv.as_type()
            .ok_or_else(|| native_error("expected a type object receiver"))
    }

    HostTypeBuilder::new("System.RuntimeType")
        .base(object.clone())
        .allowed_in_constrained(true)
        .property("Name", |recv, _| Ok(Value::string(described(recv)?.name())))
        .property("FullName", |recv, _| Ok(Value::string(described(recv)?.full_name())))
        .property("BaseType", |recv, _| {
            Ok(described(recv)?
                .base()
                .map_or(Value::Null, |base| Value::type_object(base.clone())))
        })
        .build()
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call_static(ty: &HostTypeRef, name: &str, args: &[Value]) -> EvalResult {
        let method = ty.find_method(name, true).unwrap();
        let overload = method
            .overloads
            .iter()
            .find(|o| o.params.len() == args.len())
            .unwrap();
        (overload.func)(&Value::Null, args)
    }

    #[test]
    fn test_descriptor_for_scalars_and_collections() {
        let builtins = Builtins::new();
        assert_eq!(
            builtins.descriptor_for(&Value::Int64(3)).full_name(),
            "System.Int64"
        );
        assert_eq!(
            builtins.descriptor_for(&Value::string("x")).full_name(),
            "System.String"
        );
        assert_eq!(
            builtins
                .descriptor_for(&Value::wrap(Value::list(vec![])))
                .full_name(),
            "System.Collections.ArrayList"
        );
        assert!(builtins.string.is_assignable_to(builtins.object.id()));
    }

    #[test]
    fn test_string_substring_counts_chars() {
        let builtins = Builtins::new();
        let method = builtins.string.find_method("substring", false).unwrap();
        let two = method.overloads.iter().find(|o| o.params.len() == 2).unwrap();
        let result = (two.func)(&Value::string("héllo"), &[Value::Int32(1), Value::Int32(3)]);
        assert_eq!(result.unwrap(), Value::string("éll"));
        let past_end = (two.func)(&Value::string("abc"), &[Value::Int32(2), Value::Int32(5)]);
        assert!(past_end.is_err());
    }

    #[test]
    fn test_math_round_is_bankers() {
        let builtins = Builtins::new();
        let rounded = call_static(&builtins.math, "Round", &[Value::Double(2.5)]).unwrap();
        assert_eq!(rounded, Value::Double(2.0));
        let rounded = call_static(&builtins.math, "Round", &[Value::Double(3.5)]).unwrap();
        assert_eq!(rounded, Value::Double(4.0));
    }

    #[test]
    fn test_int_parse_and_bounds() {
        let builtins = Builtins::new();
        let int = builtins.scalar(ScalarType::Int32);
        assert_eq!(
            call_static(int, "Parse", &[Value::string(" 42 ")]).unwrap(),
            Value::Int32(42)
        );
        assert!(call_static(int, "Parse", &[Value::string("4e10")]).is_err());
        let max = int.find_property("MaxValue").unwrap();
        assert_eq!(
            (max.getter.as_ref().unwrap())(&Value::Null, &[]).unwrap(),
            Value::Int32(i32::MAX)
        );
    }

    #[test]
    fn test_hashtable_add_rejects_duplicates() {
        let builtins = Builtins::new();
        let table = Value::dictionary(false);
        let add = builtins.dictionary.find_method("Add", false).unwrap();
        let add = &add.overloads[0];
        (add.func)(&table, &[Value::string("a"), Value::Int32(1)]).unwrap();
        let err = (add.func)(&table, &[Value::string("A"), Value::Int32(2)]).unwrap_err();
        assert!(matches!(err.kind, shale_value::ErrorKind::DuplicateKey { .. }));
    }
}
