//! Collection payloads: arrays, lists and keyed dictionaries.
//!
//! Element storage sits behind `parking_lot::RwLock` so index-set can
//! mutate a shared collection while other call sites read it. Readers take
//! snapshots rather than holding the lock across re-dispatch.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use shale_ir::{fold_case, ScalarType};
use smallvec::SmallVec;

use super::Value;
use crate::host::HostTypeId;

/// Fixed-size array of any rank, stored row-major.
pub struct ArrayValue {
    dims: SmallVec<[usize; 2]>,
    /// `None` for `object[]`.
    element: Option<ScalarType>,
    items: RwLock<Vec<Value>>,
}

impl ArrayValue {
    pub(super) fn rank1(items: Vec<Value>, element: Option<ScalarType>) -> Self {
        ArrayValue {
            dims: smallvec::smallvec![items.len()],
            element,
            items: RwLock::new(items),
        }
    }

    /// Multi-dimensional array; `None` when the dimension lengths don't
    /// multiply out to `items.len()`.
    pub(super) fn with_dims(
        dims: &[usize],
        element: Option<ScalarType>,
        items: Vec<Value>,
    ) -> Option<Self> {
        if dims.is_empty() || dims.iter().product::<usize>() != items.len() {
            return None;
        }
        Some(ArrayValue {
            dims: SmallVec::from_slice(dims),
            element,
            items: RwLock::new(items),
        })
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn element_type(&self) -> Option<ScalarType> {
        self.element
    }

    /// Total element count across all dimensions.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }

    /// Store at a flat index; false when out of range.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.items.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> Vec<Value> {
        self.items.read().clone()
    }

    /// Row-major flat index for one coordinate per dimension.
    pub fn flat_index(&self, coords: &[usize]) -> Option<usize> {
        if coords.len() != self.dims.len() {
            return None;
        }
        let mut flat = 0usize;
        for (&coord, &len) in coords.iter().zip(self.dims.iter()) {
            if coord >= len {
                return None;
            }
            flat = flat * len + coord;
        }
        Some(flat)
    }

    /// `System.Int32[]`, `System.Object[,]`, ...
    pub fn type_name(&self) -> String {
        let element = self.element.map_or("System.Object", ScalarType::full_name);
        format!("{element}[{}]", ",".repeat(self.rank().saturating_sub(1)))
    }
}

/// Growable list (`ArrayList`).
#[derive(Default)]
pub struct ListValue {
    items: RwLock<Vec<Value>>,
}

impl ListValue {
    pub(super) fn new(items: Vec<Value>) -> Self {
        ListValue {
            items: RwLock::new(items),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }

    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.items.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Append and return the new element's index.
    pub fn push(&self, value: Value) -> usize {
        let mut items = self.items.write();
        items.push(value);
        items.len() - 1
    }

    pub fn remove_at(&self, index: usize) -> Option<Value> {
        let mut items = self.items.write();
        (index < items.len()).then(|| items.remove(index))
    }

    pub fn clear(&self) {
        self.items.write().clear();
    }

    pub fn snapshot(&self) -> Vec<Value> {
        self.items.read().clone()
    }
}

/// Hash key of a dictionary entry.
///
/// Integers of every width share one key space; strings are folded when the
/// dictionary is case-insensitive; reference types key by identity.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum DictKey {
    Null,
    Bool(bool),
    Char(char),
    Int(i64),
    UInt(u64),
    Decimal(Decimal),
    /// Bit pattern of the double.
    Double(u64),
    Str(String),
    Type(HostTypeId),
    Ref(usize),
}

impl DictKey {
    pub fn of(key: &Value, case_sensitive: bool) -> Self {
        match key.base() {
            Value::Null | Value::Wrapped(_) => DictKey::Null,
            Value::Bool(b) => DictKey::Bool(*b),
            Value::Char(c) => DictKey::Char(*c),
            Value::Int32(n) => DictKey::Int(i64::from(*n)),
            Value::UInt32(n) => DictKey::Int(i64::from(*n)),
            Value::Int64(n) => DictKey::Int(*n),
            Value::UInt64(n) => i64::try_from(*n).map_or(DictKey::UInt(*n), DictKey::Int),
            Value::Decimal(d) => DictKey::Decimal(d.normalize()),
            Value::Double(d) => DictKey::Double(d.to_bits()),
            Value::Str(s) if case_sensitive => DictKey::Str(s.to_string()),
            Value::Str(s) => DictKey::Str(fold_case(s).into_owned()),
            Value::Type(ty) => DictKey::Type(ty.id()),
            other => DictKey::Ref(other.identity().unwrap_or_default()),
        }
    }
}

#[derive(Default)]
struct DictEntries {
    entries: Vec<(Value, Value)>,
    index: FxHashMap<DictKey, usize>,
}

/// Keyed collection (`Hashtable`) preserving insertion order.
pub struct DictValue {
    case_sensitive: bool,
    inner: RwLock<DictEntries>,
}

impl DictValue {
    pub(super) fn new(case_sensitive: bool) -> Self {
        DictValue {
            case_sensitive,
            inner: RwLock::new(DictEntries::default()),
        }
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn key_of(&self, key: &Value) -> DictKey {
        DictKey::of(key, self.case_sensitive)
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        let k = self.key_of(key);
        let inner = self.inner.read();
        inner
            .index
            .get(&k)
            .and_then(|&i| inner.entries.get(i))
            .map(|(_, v)| v.clone())
    }

    /// Lookup by string key, used for member-style access (`$h.Name`).
    pub fn get_str(&self, key: &str) -> Option<Value> {
        let k = if self.case_sensitive {
            DictKey::Str(key.to_string())
        } else {
            DictKey::Str(fold_case(key).into_owned())
        };
        let inner = self.inner.read();
        inner
            .index
            .get(&k)
            .and_then(|&i| inner.entries.get(i))
            .map(|(_, v)| v.clone())
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        let k = self.key_of(key);
        self.inner.read().index.contains_key(&k)
    }

    /// Insert or overwrite; returns the previous value.
    pub fn insert(&self, key: Value, value: Value) -> Option<Value> {
        let k = self.key_of(&key);
        let mut inner = self.inner.write();
        if let Some(&i) = inner.index.get(&k) {
            return inner
                .entries
                .get_mut(i)
                .map(|slot| std::mem::replace(&mut slot.1, value));
        }
        let at = inner.entries.len();
        inner.index.insert(k, at);
        inner.entries.push((key, value));
        None
    }

    /// Insert only when absent; false when the key already exists.
    pub fn try_add(&self, key: Value, value: Value) -> bool {
        let k = self.key_of(&key);
        let mut inner = self.inner.write();
        if inner.index.contains_key(&k) {
            return false;
        }
        let at = inner.entries.len();
        inner.index.insert(k, at);
        inner.entries.push((key, value));
        true
    }

    pub fn remove(&self, key: &Value) -> Option<Value> {
        let k = self.key_of(key);
        let mut inner = self.inner.write();
        let i = inner.index.remove(&k)?;
        let (_, removed) = inner.entries.remove(i);
        for slot in inner.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn keys(&self) -> Vec<Value> {
        self.inner.read().entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.inner.read().entries.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.inner.read().entries.clone()
    }
}
