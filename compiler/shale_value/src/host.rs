//! Host type reflection.
//!
//! A `HostType` describes a native type the way reflection would: its
//! properties, method overloads, constructors and indexers, each backed by a
//! [`NativeFn`]. Built-in value types (strings, numbers, arrays, keyed
//! collections) get descriptors too, so member resolution treats every value
//! the same way.
//!
//! Descriptors are immutable once built and shared as [`HostTypeRef`].
//! Each one gets a process-unique [`HostTypeId`] that guards compare instead
//! of names.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::Arc;

use shale_ir::{fold_case, ScalarType};

use crate::errors::EvalResult;
use crate::value::Value;

/// Native member implementation: `(receiver, arguments) -> result`.
///
/// The receiver is the debased target (`Value::Null` for static members).
/// Property getters receive no arguments, setters receive the new value.
pub type NativeFn = Arc<dyn Fn(&Value, &[Value]) -> EvalResult + Send + Sync>;

/// Ordering between two values of a host type (`None` = incomparable).
pub type CompareFn = Arc<dyn Fn(&Value, &Value) -> Option<Ordering> + Send + Sync>;

/// Value equality for a host type.
pub type EqualityFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Shared handle to an immutable type descriptor.
pub type HostTypeRef = Arc<HostType>;

/// Member names are case-insensitive.
pub fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || fold_case(a) == fold_case(b)
}

static NEXT_HOST_TYPE_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique identity of a host type descriptor.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct HostTypeId(u32);

impl HostTypeId {
    fn fresh() -> Self {
        HostTypeId(NEXT_HOST_TYPE_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Member accessibility relative to the enclosing class of a call site.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Visibility {
    Public,
    /// Visible from the declaring type and types deriving from it.
    Protected,
    /// Visible from the declaring type only.
    Private,
}

/// Declared parameter (or indexer element) type.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParamType {
    Scalar(ScalarType),
    /// Any value, passed unchanged.
    Object,
    /// Rank-1 untyped array; scalars are wrapped.
    Array,
    Host(HostTypeId),
}

/// A reflected property.
#[derive(Clone)]
pub struct HostProperty {
    pub name: String,
    pub getter: Option<NativeFn>,
    pub setter: Option<NativeFn>,
    /// Parameter type the setter expects.
    pub value_type: ParamType,
    pub visibility: Visibility,
    pub is_static: bool,
    /// Stack-only property type; never reachable through dynamic access.
    pub by_ref_like: bool,
    pub declaring_type: HostTypeId,
}

/// One callable signature of a method or constructor.
#[derive(Clone)]
pub struct Overload {
    pub params: Vec<ParamType>,
    /// Trailing arguments beyond `params.len() - 1` collect into an `object[]`
    /// passed as the last parameter.
    pub params_array: bool,
    pub visibility: Visibility,
    pub func: NativeFn,
    pub declaring_type: HostTypeId,
}

impl Overload {
    /// True when `argc` arguments can bind to this signature.
    pub fn accepts_arity(&self, argc: usize) -> bool {
        if self.params_array {
            argc + 1 >= self.params.len()
        } else {
            argc == self.params.len()
        }
    }
}

/// A reflected method: a name plus its overload set.
#[derive(Clone)]
pub struct HostMethod {
    pub name: String,
    pub is_static: bool,
    pub overloads: Vec<Overload>,
}

/// A reflected indexer (`this[...]`).
#[derive(Clone)]
pub struct HostIndexer {
    pub params: Vec<ParamType>,
    pub getter: Option<NativeFn>,
    pub setter: Option<NativeFn>,
    pub value_type: ParamType,
}

/// Immutable reflection descriptor.
pub struct HostType {
    id: HostTypeId,
    full_name: String,
    name: String,
    base: Option<HostTypeRef>,
    allowed_in_constrained: bool,
    properties: Vec<HostProperty>,
    methods: Vec<HostMethod>,
    constructors: Vec<Overload>,
    indexers: Vec<HostIndexer>,
    enumerator: Option<NativeFn>,
    typed_comparer: Option<CompareFn>,
    comparer: Option<CompareFn>,
    equality: Option<EqualityFn>,
    to_string: Option<NativeFn>,
}

impl HostType {
    pub fn id(&self) -> HostTypeId {
        self.id
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Short name (last segment of the full name).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&HostTypeRef> {
        self.base.as_ref()
    }

    /// Reachable when the language mode is constrained.
    pub fn allowed_in_constrained(&self) -> bool {
        self.allowed_in_constrained
    }

    /// This type followed by its base types, most derived first.
    pub fn ancestors(&self) -> impl Iterator<Item = &HostType> {
        std::iter::successors(Some(self), |t| t.base.as_deref())
    }

    /// Full names of this type and its bases, most derived first.
    pub fn type_names(&self) -> Vec<&str> {
        self.ancestors().map(HostType::full_name).collect()
    }

    /// True when `self` is `other` or derives from it.
    pub fn is_assignable_to(&self, other: HostTypeId) -> bool {
        self.ancestors().any(|t| t.id == other)
    }

    /// Case-insensitive property lookup along the base chain.
    pub fn find_property(&self, name: &str) -> Option<&HostProperty> {
        self.ancestors()
            .flat_map(|t| t.properties.iter())
            .find(|p| same_name(&p.name, name))
    }

    /// Case-insensitive method lookup; overloads from every level of the
    /// base chain are merged, most derived first.
    pub fn find_method(&self, name: &str, is_static: bool) -> Option<HostMethod> {
        let mut found: Option<HostMethod> = None;
        for method in self
            .ancestors()
            .flat_map(|t| t.methods.iter())
            .filter(|m| m.is_static == is_static && same_name(&m.name, name))
        {
            match &mut found {
                Some(acc) => acc.overloads.extend(method.overloads.iter().cloned()),
                None => found = Some(method.clone()),
            }
        }
        found
    }

    pub fn constructors(&self) -> &[Overload] {
        &self.constructors
    }

    /// Indexers declared on this type or inherited.
    pub fn indexers(&self) -> impl Iterator<Item = &HostIndexer> {
        self.ancestors().flat_map(|t| t.indexers.iter())
    }

    pub fn enumerator(&self) -> Option<&NativeFn> {
        self.ancestors().find_map(|t| t.enumerator.as_ref())
    }

    pub fn typed_comparer(&self) -> Option<&CompareFn> {
        self.typed_comparer.as_ref()
    }

    pub fn comparer(&self) -> Option<&CompareFn> {
        self.ancestors().find_map(|t| t.comparer.as_ref())
    }

    pub fn equality(&self) -> Option<&EqualityFn> {
        self.ancestors().find_map(|t| t.equality.as_ref())
    }

    pub fn to_string_fn(&self) -> Option<&NativeFn> {
        self.ancestors().find_map(|t| t.to_string.as_ref())
    }
}

impl fmt::Debug for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostType")
            .field("id", &self.id)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

/// Instance of a host type: a descriptor plus an opaque payload.
///
/// Member implementations reach their state with [`HostObject::payload`];
/// mutable state lives behind interior mutability inside the payload.
pub struct HostObject {
    ty: HostTypeRef,
    payload: Box<dyn Any + Send + Sync>,
}

impl HostObject {
    pub fn new<T: Any + Send + Sync>(ty: HostTypeRef, payload: T) -> Self {
        HostObject {
            ty,
            payload: Box::new(payload),
        }
    }

    pub fn host_type(&self) -> &HostTypeRef {
        &self.ty
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty.full_name)
    }
}

/// Builder for [`HostType`] descriptors.
///
/// ```text
/// let widget = HostTypeBuilder::new("Contoso.Widget")
///     .property("Name", |recv, _| Ok(name_of(recv)))
///     .method("Resize", vec![ParamType::Scalar(ScalarType::Int32)], resize)
///     .build();
/// ```
pub struct HostTypeBuilder {
    ty: HostType,
}

impl HostTypeBuilder {
    pub fn new(full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let name = full_name
            .rsplit('.')
            .next()
            .unwrap_or(full_name.as_str())
            .to_string();
        HostTypeBuilder {
            ty: HostType {
                id: HostTypeId::fresh(),
                full_name,
                name,
                base: None,
                allowed_in_constrained: false,
                properties: Vec::new(),
                methods: Vec::new(),
                constructors: Vec::new(),
                indexers: Vec::new(),
                enumerator: None,
                typed_comparer: None,
                comparer: None,
                equality: None,
                to_string: None,
            },
        }
    }

    /// Id the finished descriptor will carry.
    pub fn id(&self) -> HostTypeId {
        self.ty.id
    }

    #[must_use]
    pub fn base(mut self, base: HostTypeRef) -> Self {
        self.ty.base = Some(base);
        self
    }

    #[must_use]
    pub fn allowed_in_constrained(mut self, allowed: bool) -> Self {
        self.ty.allowed_in_constrained = allowed;
        self
    }

    fn push_property(
        mut self,
        name: &str,
        getter: Option<NativeFn>,
        setter: Option<NativeFn>,
        is_static: bool,
    ) -> Self {
        let declaring_type = self.ty.id;
        self.ty.properties.push(HostProperty {
            name: name.to_string(),
            getter,
            setter,
            value_type: ParamType::Object,
            visibility: Visibility::Public,
            is_static,
            by_ref_like: false,
            declaring_type,
        });
        self
    }

    /// Public read-only instance property.
    #[must_use]
    pub fn property(
        self,
        name: &str,
        getter: impl Fn(&Value, &[Value]) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        self.push_property(name, Some(Arc::new(getter)), None, false)
    }

    /// Public read-write instance property.
    #[must_use]
    pub fn property_rw(
        self,
        name: &str,
        getter: impl Fn(&Value, &[Value]) -> EvalResult + Send + Sync + 'static,
        setter: impl Fn(&Value, &[Value]) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        self.push_property(name, Some(Arc::new(getter)), Some(Arc::new(setter)), false)
    }

    /// Public instance property with a setter and no getter.
    #[must_use]
    pub fn write_only_property(
        self,
        name: &str,
        setter: impl Fn(&Value, &[Value]) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        self.push_property(name, None, Some(Arc::new(setter)), false)
    }

    /// Public read-only static property.
    #[must_use]
    pub fn static_property(
        self,
        name: &str,
        getter: impl Fn(&Value, &[Value]) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        self.push_property(name, Some(Arc::new(getter)), None, true)
    }

    /// Fully specified property; `declaring_type` is overwritten.
    #[must_use]
    pub fn member_property(mut self, mut property: HostProperty) -> Self {
        property.declaring_type = self.ty.id;
        self.ty.properties.push(property);
        self
    }

    /// Add an overload with explicit visibility and static-ness.
    #[must_use]
    pub fn overload(
        mut self,
        name: &str,
        is_static: bool,
        params: Vec<ParamType>,
        params_array: bool,
        visibility: Visibility,
        func: NativeFn,
    ) -> Self {
        let overload = Overload {
            params,
            params_array,
            visibility,
            func,
            declaring_type: self.ty.id,
        };
        if let Some(method) = self
            .ty
            .methods
            .iter_mut()
            .find(|m| m.is_static == is_static && same_name(&m.name, name))
        {
            method.overloads.push(overload);
        } else {
            self.ty.methods.push(HostMethod {
                name: name.to_string(),
                is_static,
                overloads: vec![overload],
            });
        }
        self
    }

    /// Public instance method overload.
    #[must_use]
    pub fn method(
        self,
        name: &str,
        params: Vec<ParamType>,
        func: impl Fn(&Value, &[Value]) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        self.overload(name, false, params, false, Visibility::Public, Arc::new(func))
    }

    /// Public static method overload.
    #[must_use]
    pub fn static_method(
        self,
        name: &str,
        params: Vec<ParamType>,
        func: impl Fn(&Value, &[Value]) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        self.overload(name, true, params, false, Visibility::Public, Arc::new(func))
    }

    #[must_use]
    pub fn constructor(
        mut self,
        params: Vec<ParamType>,
        func: impl Fn(&Value, &[Value]) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        let declaring_type = self.ty.id;
        self.ty.constructors.push(Overload {
            params,
            params_array: false,
            visibility: Visibility::Public,
            func: Arc::new(func),
            declaring_type,
        });
        self
    }

    #[must_use]
    pub fn indexer(
        mut self,
        params: Vec<ParamType>,
        getter: Option<NativeFn>,
        setter: Option<NativeFn>,
    ) -> Self {
        self.ty.indexers.push(HostIndexer {
            params,
            getter,
            setter,
            value_type: ParamType::Object,
        });
        self
    }

    /// Enumerator returning the elements as a `Value::Array`.
    #[must_use]
    pub fn enumerator(
        mut self,
        func: impl Fn(&Value, &[Value]) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        self.ty.enumerator = Some(Arc::new(func));
        self
    }

    /// Comparison between two instances of exactly this type.
    #[must_use]
    pub fn typed_comparer(
        mut self,
        func: impl Fn(&Value, &Value) -> Option<Ordering> + Send + Sync + 'static,
    ) -> Self {
        self.ty.typed_comparer = Some(Arc::new(func));
        self
    }

    /// Comparison against an arbitrary value.
    #[must_use]
    pub fn comparer(
        mut self,
        func: impl Fn(&Value, &Value) -> Option<Ordering> + Send + Sync + 'static,
    ) -> Self {
        self.ty.comparer = Some(Arc::new(func));
        self
    }

    #[must_use]
    pub fn equality(
        mut self,
        func: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.ty.equality = Some(Arc::new(func));
        self
    }

    #[must_use]
    pub fn to_string_fn(
        mut self,
        func: impl Fn(&Value, &[Value]) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        self.ty.to_string = Some(Arc::new(func));
        self
    }

    pub fn build(self) -> HostTypeRef {
        Arc::new(self.ty)
    }
}

#[cfg(test)]
mod tests;
