//! Runtime values seen by dynamic operations.
//!
//! # Heap enforcement
//!
//! Reference payloads live in [`Heap<T>`], whose constructor is private to
//! this module. The factory methods on `Value` are the only way to build
//! them:
//!
//! ```text
//! let s = Value::string("hello");
//! let a = Value::array(vec![Value::Int32(1), Value::Int32(2)]);
//! let w = Value::wrap(a.clone());
//! ```
//!
//! # Wrapped values
//!
//! `Value::Wrapped` pairs a base value with adjunct state (see
//! [`crate::Wrapper`]). [`Value::debase`] peels exactly one layer, and the
//! factories guarantee there is never more than one.

mod collections;
mod heap;

use std::borrow::Cow;
use std::fmt;

use rust_decimal::Decimal;
use shale_ir::ScalarType;

use crate::host::{HostObject, HostTypeId, HostTypeRef};
use crate::wrapper::Wrapper;

pub use collections::{ArrayValue, DictKey, DictValue, ListValue};
pub use heap::{Heap, WeakHeap};

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Decimal(Decimal),
    Double(f64),
    Str(Heap<str>),
    Array(Heap<ArrayValue>),
    List(Heap<ListValue>),
    Dictionary(Heap<DictValue>),
    /// Instance of a registered host type.
    Object(Heap<HostObject>),
    /// A type object: target of static member access and construction.
    Type(HostTypeRef),
    Wrapped(Heap<Wrapper>),
}

/// Discriminant of a debased value, cheap enough to compare on every
/// cache hit.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeKey {
    Null,
    Scalar(ScalarType),
    Array {
        rank: u8,
        element: Option<ScalarType>,
    },
    List,
    Dictionary {
        case_sensitive: bool,
    },
    Object(HostTypeId),
    Type,
}

impl TypeKey {
    pub fn scalar(self) -> Option<ScalarType> {
        match self {
            TypeKey::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// True for the numeric scalar types (bool and char excluded).
    pub fn is_numeric(self) -> bool {
        self.scalar().is_some_and(ScalarType::is_numeric)
    }

    /// Arrays and lists unroll for broadcast.
    pub fn is_collection(self) -> bool {
        matches!(self, TypeKey::Array { .. } | TypeKey::List)
    }
}

// Factory methods (the only way to build heap values)

impl Value {
    #[inline]
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Heap::new_str(s.as_ref()))
    }

    /// Rank-1 `object[]`.
    #[inline]
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Heap::new(ArrayValue::rank1(items, None)))
    }

    /// Rank-1 array with a declared element type. Callers convert the
    /// elements first.
    #[inline]
    pub fn typed_array(items: Vec<Value>, element: ScalarType) -> Self {
        Value::Array(Heap::new(ArrayValue::rank1(items, Some(element))))
    }

    /// Row-major array of any rank; `None` when `dims` doesn't match the
    /// element count.
    pub fn array_with_dims(
        dims: &[usize],
        element: Option<ScalarType>,
        items: Vec<Value>,
    ) -> Option<Self> {
        ArrayValue::with_dims(dims, element, items).map(|a| Value::Array(Heap::new(a)))
    }

    #[inline]
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Heap::new(ListValue::new(items)))
    }

    /// Empty keyed collection.
    #[inline]
    pub fn dictionary(case_sensitive: bool) -> Self {
        Value::Dictionary(Heap::new(DictValue::new(case_sensitive)))
    }

    /// Case-insensitive dictionary from key/value pairs; later keys win.
    pub fn dictionary_from(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let dict = DictValue::new(false);
        for (k, v) in entries {
            dict.insert(k, v);
        }
        Value::Dictionary(Heap::new(dict))
    }

    #[inline]
    pub fn object(obj: HostObject) -> Self {
        Value::Object(Heap::new(obj))
    }

    /// Host instance of `ty` carrying `payload`.
    pub fn host<T: std::any::Any + Send + Sync>(ty: HostTypeRef, payload: T) -> Self {
        Value::object(HostObject::new(ty, payload))
    }

    #[inline]
    pub fn type_object(ty: HostTypeRef) -> Self {
        Value::Type(ty)
    }

    /// Wrap a value in fresh adjunct state. Already-wrapped values are
    /// returned unchanged.
    pub fn wrap(value: Value) -> Self {
        match value {
            Value::Wrapped(_) => value,
            base => Value::Wrapped(Heap::new(Wrapper::new(base, false))),
        }
    }

    /// Wrap a property bag rehydrated from another process.
    pub fn wrap_deserialized(value: Value) -> Self {
        let base = value.base().clone();
        Value::Wrapped(Heap::new(Wrapper::new(base, true)))
    }
}

// Value model

impl Value {
    /// The unwrapped value plus whether a wrapper was removed.
    #[inline]
    pub fn debase(&self) -> (&Value, bool) {
        match self {
            Value::Wrapped(w) => (w.base(), true),
            other => (other, false),
        }
    }

    /// The unwrapped value.
    #[inline]
    pub fn base(&self) -> &Value {
        self.debase().0
    }

    #[inline]
    pub fn is_wrapped(&self) -> bool {
        matches!(self, Value::Wrapped(_))
    }

    pub fn wrapper(&self) -> Option<&Wrapper> {
        match self {
            Value::Wrapped(w) => Some(w),
            _ => None,
        }
    }

    /// Null after debasing.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self.base(), Value::Null)
    }

    pub fn type_key(&self) -> TypeKey {
        match self.base() {
            Value::Null | Value::Wrapped(_) => TypeKey::Null,
            Value::Bool(_) => TypeKey::Scalar(ScalarType::Bool),
            Value::Char(_) => TypeKey::Scalar(ScalarType::Char),
            Value::Int32(_) => TypeKey::Scalar(ScalarType::Int32),
            Value::UInt32(_) => TypeKey::Scalar(ScalarType::UInt32),
            Value::Int64(_) => TypeKey::Scalar(ScalarType::Int64),
            Value::UInt64(_) => TypeKey::Scalar(ScalarType::UInt64),
            Value::Decimal(_) => TypeKey::Scalar(ScalarType::Decimal),
            Value::Double(_) => TypeKey::Scalar(ScalarType::Double),
            Value::Str(_) => TypeKey::Scalar(ScalarType::String),
            Value::Array(a) => TypeKey::Array {
                rank: u8::try_from(a.rank()).unwrap_or(u8::MAX),
                element: a.element_type(),
            },
            Value::List(_) => TypeKey::List,
            Value::Dictionary(d) => TypeKey::Dictionary {
                case_sensitive: d.is_case_sensitive(),
            },
            Value::Object(o) => TypeKey::Object(o.host_type().id()),
            Value::Type(_) => TypeKey::Type,
        }
    }

    /// Scalar type of the debased value, if it is one.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        self.type_key().scalar()
    }

    /// Weak handle to a mutable heap object (array, list, dictionary or host
    /// instance). `None` for scalars, strings, type objects and wrappers.
    pub fn object_handle(&self) -> Option<WeakHeap> {
        match self {
            Value::Array(h) => Some(h.downgrade()),
            Value::List(h) => Some(h.downgrade()),
            Value::Dictionary(h) => Some(h.downgrade()),
            Value::Object(h) => Some(h.downgrade()),
            _ => None,
        }
    }

    /// Reference identity of heap-backed values (the wrapper's identity for
    /// wrapped values, so adjunct state is per object).
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(h) => Some(h.ptr_id()),
            Value::List(h) => Some(h.ptr_id()),
            Value::Dictionary(h) => Some(h.ptr_id()),
            Value::Object(h) => Some(h.ptr_id()),
            Value::Wrapped(h) => Some(h.ptr_id()),
            Value::Type(ty) => usize::try_from(ty.id().raw()).ok(),
            _ => None,
        }
    }

    /// Full type name of the debased value, for messages and type-table
    /// lookup.
    pub fn type_name(&self) -> Cow<'static, str> {
        match self.base() {
            Value::Null | Value::Wrapped(_) => Cow::Borrowed("null"),
            Value::Array(a) => Cow::Owned(a.type_name()),
            Value::List(_) => Cow::Borrowed("System.Collections.ArrayList"),
            Value::Dictionary(_) => Cow::Borrowed("System.Collections.Hashtable"),
            Value::Object(o) => Cow::Owned(o.host_type().full_name().to_string()),
            Value::Type(_) => Cow::Borrowed("System.RuntimeType"),
            scalar => Cow::Borrowed(
                scalar
                    .scalar_type()
                    .map_or("System.Object", ScalarType::full_name),
            ),
        }
    }

    /// Every name the type table is consulted under, most specific first:
    /// adjunct type names, then the base value's type hierarchy.
    pub fn type_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Value::Wrapped(w) = self {
            names.extend(w.adjunct().type_names.iter().cloned());
            if w.is_deserialized() {
                return names;
            }
        }
        let base = self.base();
        match base {
            Value::Null | Value::Wrapped(_) => {}
            Value::Object(o) => {
                names.extend(o.host_type().type_names().into_iter().map(String::from));
            }
            Value::Array(_) => {
                names.push(base.type_name().into_owned());
                names.push("System.Array".to_string());
            }
            Value::List(_) | Value::Dictionary(_) | Value::Type(_) => {
                names.push(base.type_name().into_owned());
            }
            scalar => {
                names.push(scalar.type_name().into_owned());
                if !matches!(scalar, Value::Str(_)) {
                    names.push("System.ValueType".to_string());
                }
            }
        }
        if !matches!(base, Value::Null) && names.last().map(String::as_str) != Some("System.Object")
        {
            names.push("System.Object".to_string());
        }
        names
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.base() {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.base() {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral scalar value as `i64`, when it fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self.base() {
            Value::Int32(n) => Some(i64::from(*n)),
            Value::UInt32(n) => Some(i64::from(*n)),
            Value::Int64(n) => Some(*n),
            Value::UInt64(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_host_object(&self) -> Option<&HostObject> {
        match self.base() {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&HostTypeRef> {
        match self.base() {
            Value::Type(ty) => Some(ty),
            _ => None,
        }
    }

    /// Elements of an array or list (snapshot), without host enumerators.
    pub fn collection_items(&self) -> Option<Vec<Value>> {
        match self.base() {
            Value::Array(a) => Some(a.snapshot()),
            Value::List(l) => Some(l.snapshot()),
            _ => None,
        }
    }

    /// Element count of an array, list or dictionary.
    pub fn collection_len(&self) -> Option<usize> {
        match self.base() {
            Value::Array(a) => Some(a.len()),
            Value::List(l) => Some(l.len()),
            Value::Dictionary(d) => Some(d.len()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

/// Structural equality for tests and dictionary bookkeeping.
///
/// Scalars compare by variant and value, collections element-wise, host
/// objects and wrappers by identity. Script-level `-eq` lives in the
/// binder and applies conversions.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::UInt32(a), Value::UInt32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits() || a == b,
            (Value::Str(a), Value::Str(b)) => **a == **b,
            (Value::Array(a), Value::Array(b)) => {
                a.ptr_eq(b) || (a.dims() == b.dims() && a.snapshot() == b.snapshot())
            }
            (Value::List(a), Value::List(b)) => a.ptr_eq(b) || a.snapshot() == b.snapshot(),
            (Value::Dictionary(a), Value::Dictionary(b)) => {
                a.ptr_eq(b) || a.entries() == b.entries()
            }
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Type(a), Value::Type(b)) => a.id() == b.id(),
            (Value::Wrapped(a), Value::Wrapped(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Char(c) => write!(f, "Char({c:?})"),
            Value::Int32(n) => write!(f, "Int32({n})"),
            Value::UInt32(n) => write!(f, "UInt32({n})"),
            Value::Int64(n) => write!(f, "Int64({n})"),
            Value::UInt64(n) => write!(f, "UInt64({n})"),
            Value::Decimal(d) => write!(f, "Decimal({d})"),
            Value::Double(d) => write!(f, "Double({d:?})"),
            Value::Str(s) => write!(f, "Str({:?})", &**s),
            Value::Array(a) if a.rank() == 1 => write!(f, "Array({:?})", a.snapshot()),
            Value::Array(a) => write!(f, "Array({:?}, {:?})", a.dims(), a.snapshot()),
            Value::List(l) => write!(f, "List({:?})", l.snapshot()),
            Value::Dictionary(d) => f.debug_map().entries(d.entries()).finish(),
            Value::Object(o) => write!(f, "Object({o:?})"),
            Value::Type(ty) => write!(f, "Type({})", ty.full_name()),
            Value::Wrapped(w) => write!(f, "Wrapped({:?})", w.base()),
        }
    }
}
