//! Specialization cache: rules, per-shape binders and the binder registry.
//!
//! # Fast path
//!
//! A binder publishes its rule list through an `ArcSwap`; checking the list
//! is a pointer load plus guard evaluation and takes no lock. Inserting a
//! rule builds a new list and swaps it in (`rcu`), so readers never observe
//! a partially updated cache.
//!
//! # Bound
//!
//! A list holds at most `cache_bound` rules. The next distinct miss replaces
//! the whole list with one general rule (`Guard::always`, `Plan::Dynamic`)
//! and the binder stays megamorphic from then on. Rules whose version
//! guards have gone stale are dropped whenever a rule is inserted.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use shale_ir::{fold_case, OperationShape, StringInterner};
use shale_value::{EvalResult, Value};
use smallvec::SmallVec;

use crate::context::EvalContext;
use crate::engine::Engine;
use crate::guard::Guard;
use crate::plan::Plan;

/// A guard and the plan it protects.
pub struct Rule {
    pub guard: Guard,
    pub plan: Plan,
}

impl Rule {
    pub fn new(guard: Guard, plan: Plan) -> Self {
        Rule { guard, plan }
    }

    /// The single rule a megamorphic binder keeps.
    pub fn general() -> Self {
        Rule::new(Guard::always(), Plan::Dynamic)
    }

    /// False for one-shot resolutions that must not enter a cache.
    pub fn is_cacheable(&self) -> bool {
        !self.guard.is_never()
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} => {:?}", self.guard, self.plan)
    }
}

/// Immutable snapshot of a binder's rules, most recent last.
#[derive(Clone, Default)]
pub struct RuleCache {
    rules: SmallVec<[Arc<Rule>; 4]>,
    megamorphic: bool,
}

impl RuleCache {
    #[inline]
    pub fn find(&self, args: &[Value], ctx: &EvalContext) -> Option<&Arc<Rule>> {
        self.rules.iter().find(|rule| rule.guard.holds(args, ctx))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_megamorphic(&self) -> bool {
        self.megamorphic
    }

    /// This cache with `rule` added.
    fn with_rule(&self, rule: &Arc<Rule>, bound: usize) -> RuleCache {
        if self.megamorphic {
            return self.clone();
        }
        let mut rules: SmallVec<[Arc<Rule>; 4]> = self
            .rules
            .iter()
            .filter(|r| !r.guard.is_stale())
            .cloned()
            .collect();
        if rules.len() >= bound {
            let mut general = SmallVec::new();
            general.push(Arc::new(Rule::general()));
            return RuleCache {
                rules: general,
                megamorphic: true,
            };
        }
        rules.push(Arc::clone(rule));
        RuleCache {
            rules,
            megamorphic: false,
        }
    }
}

/// Counters for one binder.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BinderStats {
    pub hits: u64,
    pub misses: u64,
    pub rules: usize,
    pub megamorphic: bool,
}

/// The cached rules for one operation shape.
pub struct Binder {
    shape: OperationShape,
    rules: ArcSwap<RuleCache>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Binder {
    fn new(shape: OperationShape) -> Self {
        Binder {
            shape,
            rules: ArcSwap::from_pointee(RuleCache::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn shape(&self) -> &OperationShape {
        &self.shape
    }

    /// First rule whose guard holds.
    #[inline]
    pub fn lookup(&self, args: &[Value], ctx: &EvalContext) -> Option<Arc<Rule>> {
        self.rules.load().find(args, ctx).cloned()
    }

    pub(crate) fn insert(&self, rule: &Arc<Rule>, bound: usize) {
        let previous = self.rules.rcu(|cache| cache.with_rule(rule, bound));
        if !previous.is_megamorphic() && self.rules.load().is_megamorphic() {
            tracing::debug!(
                kind = self.shape.kind.label(),
                bound,
                "binder went megamorphic"
            );
        }
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> BinderStats {
        let cache = self.rules.load();
        BinderStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            rules: cache.len(),
            megamorphic: cache.is_megamorphic(),
        }
    }

    /// Snapshot of the current rules.
    pub fn rules(&self) -> Arc<RuleCache> {
        self.rules.load_full()
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("shape", &self.shape)
            .field("stats", &self.stats())
            .finish()
    }
}

#[derive(Default)]
struct Registration {
    /// Member name (folded) to every binder whose shape names it.
    by_member: FxHashMap<String, Vec<Arc<Binder>>>,
}

/// Process-wide interning of binders by shape.
///
/// Lookups read a published snapshot of the shape map without locking.
/// Registering a new shape takes one coarse lock, copies the map and
/// republishes it; shapes are created once per call site, so the copy is
/// off the hot path.
#[derive(Default)]
pub struct BinderRegistry {
    binders: ArcSwap<FxHashMap<OperationShape, Arc<Binder>>>,
    registration: Mutex<Registration>,
}

impl BinderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The binder for `shape`, created on first request.
    pub fn get_or_create(&self, shape: &OperationShape, interner: &StringInterner) -> Arc<Binder> {
        if let Some(binder) = self.binders.load().get(shape) {
            return Arc::clone(binder);
        }
        let mut registration = self.registration.lock();
        // Another thread may have registered it while we waited.
        if let Some(binder) = self.binders.load().get(shape) {
            return Arc::clone(binder);
        }
        let binder = Arc::new(Binder::new(shape.clone()));
        let mut binders = FxHashMap::clone(&self.binders.load());
        binders.insert(shape.clone(), Arc::clone(&binder));
        self.binders.store(Arc::new(binders));
        if let Some(name) = shape.name {
            registration
                .by_member
                .entry(fold_case(interner.lookup(name)).into_owned())
                .or_default()
                .push(Arc::clone(&binder));
        }
        tracing::trace!(kind = shape.kind.label(), "binder registered");
        binder
    }

    /// Every binder whose shape names `member` (any spelling).
    pub fn binders_for_member(&self, member: &str) -> Vec<Arc<Binder>> {
        self.registration
            .lock()
            .by_member
            .get(fold_case(member).as_ref())
            .cloned()
            .unwrap_or_default()
    }

    /// Number of binders whose shape names `member`.
    pub fn count_for_member(&self, member: &str) -> usize {
        self.registration
            .lock()
            .by_member
            .get(fold_case(member).as_ref())
            .map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.binders.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One call site: a monomorphic slot in front of the shared binder.
///
/// The interpreter keeps one `CallSite` per syntactic occurrence. The slot
/// remembers the rule that last applied here, so a site that only ever sees
/// one argument shape never scans the binder's list.
pub struct CallSite {
    binder: Arc<Binder>,
    last: ArcSwapOption<Rule>,
}

impl CallSite {
    pub(crate) fn new(binder: Arc<Binder>) -> Self {
        CallSite {
            binder,
            last: ArcSwapOption::empty(),
        }
    }

    pub fn binder(&self) -> &Arc<Binder> {
        &self.binder
    }

    /// Run the operation with `args`.
    pub fn invoke(&self, engine: &Engine, ctx: &EvalContext, args: &[Value]) -> EvalResult {
        engine.check_arity(self.binder.shape(), args)?;
        {
            let last = self.last.load();
            if let Some(rule) = &*last {
                if rule.guard.holds(args, ctx) {
                    self.binder.record_hit();
                    return rule.plan.run(engine, self.binder.shape(), ctx, args);
                }
            }
        }
        let rule = engine.rule_for(&self.binder, ctx, args);
        if rule.is_cacheable() {
            self.last.store(Some(Arc::clone(&rule)));
        }
        rule.plan.run(engine, self.binder.shape(), ctx, args)
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite")
            .field("binder", &self.binder)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
