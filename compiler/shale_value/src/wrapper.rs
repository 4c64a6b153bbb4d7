//! Wrapped values: a host value plus adjunct dynamic state.
//!
//! A `Wrapper` carries members attached to one object at runtime, extra type
//! names that feed type-table lookups, and a "deserialized" marker for
//! property bags rehydrated from another process. Wrappers never nest:
//! [`crate::Value::wrap`] on a wrapped value returns it unchanged.
//!
//! The base value is immutable; the adjunct sits behind a `RwLock` so members
//! can be attached while other threads read.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashMap;
use shale_ir::{fold_case, ScalarType};

use crate::host::NativeFn;
use crate::value::Value;

/// A dynamically attached or type-table-declared member.
#[derive(Clone)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
    /// Only meaningful for type-table entries consulted by static access.
    pub is_static: bool,
}

impl Member {
    pub fn note(name: impl Into<String>, value: Value) -> Self {
        Member {
            name: name.into(),
            kind: MemberKind::NoteProperty(value),
            is_static: false,
        }
    }

    pub fn alias(name: impl Into<String>, target: impl Into<String>) -> Self {
        Member {
            name: name.into(),
            kind: MemberKind::AliasProperty {
                target: target.into(),
                conversion: None,
            },
            is_static: false,
        }
    }

    pub fn script_property(
        name: impl Into<String>,
        getter: Option<NativeFn>,
        setter: Option<NativeFn>,
    ) -> Self {
        Member {
            name: name.into(),
            kind: MemberKind::ScriptProperty { getter, setter },
            is_static: false,
        }
    }

    pub fn script_method(name: impl Into<String>, func: NativeFn) -> Self {
        Member {
            name: name.into(),
            kind: MemberKind::ScriptMethod(func),
            is_static: false,
        }
    }

    #[must_use]
    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// True for the property-like kinds (everything but script methods).
    pub fn is_property(&self) -> bool {
        !matches!(self.kind, MemberKind::ScriptMethod(_))
    }
}

/// Shape of a [`Member`].
#[derive(Clone)]
pub enum MemberKind {
    /// A stored value.
    NoteProperty(Value),
    /// Forwards to another member of the same object, optionally converting.
    AliasProperty {
        target: String,
        conversion: Option<ScalarType>,
    },
    /// Computed property; `None` getter makes it write-only.
    ScriptProperty {
        getter: Option<NativeFn>,
        setter: Option<NativeFn>,
    },
    ScriptMethod(NativeFn),
}

/// Ordered, case-insensitive member collection.
#[derive(Clone, Default)]
pub struct MemberSet {
    members: Vec<Member>,
    index: FxHashMap<String, usize>,
}

impl MemberSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Member> {
        self.index
            .get(fold_case(name).as_ref())
            .and_then(|&i| self.members.get(i))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Member> {
        match self.index.get(fold_case(name).as_ref()) {
            Some(&i) => self.members.get_mut(i),
            None => None,
        }
    }

    /// Insert or replace; returns the replaced member.
    pub fn insert(&mut self, member: Member) -> Option<Member> {
        let key = fold_case(&member.name).into_owned();
        if let Some(&i) = self.index.get(&key) {
            return self
                .members
                .get_mut(i)
                .map(|slot| std::mem::replace(slot, member));
        }
        self.index.insert(key, self.members.len());
        self.members.push(member);
        None
    }

    pub fn remove(&mut self, name: &str) -> Option<Member> {
        let i = self.index.remove(fold_case(name).as_ref())?;
        let removed = self.members.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Mutable adjunct state of a wrapper.
#[derive(Default)]
pub struct Adjunct {
    pub members: MemberSet,
    /// Extra type names, most specific first, consulted before the base
    /// value's own type names.
    pub type_names: Vec<String>,
}

/// A value plus adjunct state.
pub struct Wrapper {
    base: Value,
    deserialized: bool,
    adjunct: RwLock<Adjunct>,
}

impl Wrapper {
    pub(crate) fn new(base: Value, deserialized: bool) -> Self {
        Wrapper {
            base,
            deserialized,
            adjunct: RwLock::new(Adjunct::default()),
        }
    }

    /// The underlying host value. Never itself a wrapper.
    pub fn base(&self) -> &Value {
        &self.base
    }

    /// Property bag rehydrated from another process; only adjunct and
    /// type-table members resolve.
    pub fn is_deserialized(&self) -> bool {
        self.deserialized
    }

    pub fn adjunct(&self) -> RwLockReadGuard<'_, Adjunct> {
        self.adjunct.read()
    }

    /// Write access to the adjunct.
    ///
    /// Attaching members through this guard bypasses invalidation; the
    /// engine's `add_instance_member` is the supported path.
    pub fn adjunct_mut(&self) -> RwLockWriteGuard<'_, Adjunct> {
        self.adjunct.write()
    }

    pub fn has_custom_type_names(&self) -> bool {
        !self.adjunct.read().type_names.is_empty()
    }

    pub fn has_instance_members(&self) -> bool {
        !self.adjunct.read().members.is_empty()
    }

    /// Clone of the instance member called `name`, if attached.
    pub fn instance_member(&self, name: &str) -> Option<Member> {
        self.adjunct.read().members.get(name).cloned()
    }
}

#[cfg(test)]
mod tests;
