//! Invalidation bus: monotonic version counters for decision-relevant
//! global state.
//!
//! A rule that depends on a global fact (no type-table entry for `Foo`, no
//! instance member called `Bar` anywhere, the current language floor) embeds
//! the counter for that fact and the value it saw. Changing the fact bumps
//! the counter; the guard stops matching and the next call re-resolves. No
//! cache entry is walked or rewritten.
//!
//! # Ordering
//!
//! Mutators bump *before* the new state is visible to resolution (type-table
//! writers bump while holding the table's write lock). Resolution loads every
//! counter *before* reading the state it describes. A resolver racing a
//! mutator therefore either sees the new state or records a version that is
//! already stale, costing one extra miss and never a wrong answer.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use shale_ir::fold_case;

use crate::context::LanguageMode;

/// Shared monotonic counter. Cloning shares the counter.
#[derive(Clone, Default)]
pub struct VersionCounter(Arc<AtomicU64>);

impl VersionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn load(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Increment and return the new version.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn same_counter(&self, other: &VersionCounter) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for VersionCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.load())
    }
}

/// Counters created on first request and kept for the process lifetime,
/// keyed by folded name.
#[derive(Default)]
struct CounterMap {
    counters: RwLock<FxHashMap<String, VersionCounter>>,
}

impl CounterMap {
    fn get(&self, name: &str) -> VersionCounter {
        let key = fold_case(name);
        if let Some(counter) = self.counters.read().get(key.as_ref()) {
            return counter.clone();
        }
        self.counters
            .write()
            .entry(key.into_owned())
            .or_default()
            .clone()
    }

    fn len(&self) -> usize {
        self.counters.read().len()
    }
}

/// Process-wide set of version counters.
pub struct InvalidationBus {
    type_names: CounterMap,
    instance_members: CounterMap,
    host_types: VersionCounter,
    language: VersionCounter,
    language_floor: AtomicU8,
}

impl Default for InvalidationBus {
    fn default() -> Self {
        InvalidationBus {
            type_names: CounterMap::default(),
            instance_members: CounterMap::default(),
            host_types: VersionCounter::new(),
            language: VersionCounter::new(),
            language_floor: AtomicU8::new(LanguageMode::Full.as_u8()),
        }
    }
}

impl InvalidationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter for type-table state under `type_name`.
    pub fn type_counter(&self, type_name: &str) -> VersionCounter {
        self.type_names.get(type_name)
    }

    /// Counter for instance members called `member`. Zero means no object
    /// has ever had one attached.
    pub fn instance_counter(&self, member: &str) -> VersionCounter {
        self.instance_members.get(member)
    }

    /// Counter for the set of registered host types.
    pub fn host_type_counter(&self) -> VersionCounter {
        self.host_types.clone()
    }

    /// Counter for the process language floor.
    pub fn language_counter(&self) -> VersionCounter {
        self.language.clone()
    }

    pub fn bump_type(&self, type_name: &str) -> u64 {
        let version = self.type_counter(type_name).bump();
        tracing::debug!(type_name, version, "type table invalidated");
        version
    }

    pub fn bump_instance_member(&self, member: &str) -> u64 {
        let version = self.instance_counter(member).bump();
        tracing::debug!(member, version, "instance member invalidated");
        version
    }

    pub fn bump_host_types(&self) -> u64 {
        self.host_types.bump()
    }

    /// Invalidate every rule that pinned a language mode.
    pub fn bump_language(&self) -> u64 {
        let version = self.language.bump();
        tracing::debug!(version, "language rules invalidated");
        version
    }

    /// Process-wide minimum language mode.
    pub fn language_floor(&self) -> LanguageMode {
        LanguageMode::from_u8(self.language_floor.load(Ordering::Acquire))
    }

    /// The stricter of the caller's mode and the process floor.
    pub fn effective_language_mode(&self, requested: LanguageMode) -> LanguageMode {
        requested.max(self.language_floor())
    }

    /// Raise the process floor to `mode`. Never loosens. Returns true when
    /// the floor changed (and the language counter was bumped).
    pub fn tighten_language_mode(&self, mode: LanguageMode) -> bool {
        let previous = self
            .language_floor
            .fetch_max(mode.as_u8(), Ordering::AcqRel);
        if previous >= mode.as_u8() {
            return false;
        }
        let version = self.language.bump();
        tracing::debug!(%mode, version, "language mode tightened");
        true
    }

    /// Number of per-name counters allocated so far.
    pub fn tracked_names(&self) -> usize {
        self.type_names.len() + self.instance_members.len()
    }
}
