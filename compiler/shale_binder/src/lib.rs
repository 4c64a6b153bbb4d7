//! Shale binder - call-site caching and resolution of dynamic operations.
//!
//! Every dynamic operation an interpreter performs (`$a + $b`, `$o.Name`,
//! `$x[1]`, `[int]$s`, `$o.M(1)`) goes through a [`Binder`] keyed by its
//! static [`OperationShape`](shale_ir::OperationShape). On the first call
//! with a new combination of argument types the binder resolves a [`Rule`]:
//! a [`Guard`] saying when the resolution still applies and a [`Plan`] that
//! performs it. Later calls whose arguments satisfy a cached guard skip
//! resolution entirely.
//!
//! # Modules
//!
//! - `engine`: the [`Engine`] façade and dispatch
//! - `cache`: binders, rule caches, the registry and call sites
//! - `guard`, `invalidation`: rule validity and global version counters
//! - `instance`: members attached to unwrapped heap objects
//! - `ops`, `compare`, `convert`, `numeric`: operator semantics
//! - `members`, `index`: member access, invocation and indexing
//! - `builtins`: reflection descriptors for the built-in types

mod builtins;
mod cache;
mod compare;
mod config;
mod context;
mod convert;
mod engine;
mod guard;
mod index;
mod instance;
mod invalidation;
mod members;
mod numeric;
mod ops;
mod plan;

pub use builtins::Builtins;
pub use cache::{Binder, BinderRegistry, BinderStats, CallSite, Rule, RuleCache};
pub use compare::{compare_scalar, ComparePlan};
pub use config::{EngineBuilder, EngineConfig, DEFAULT_CACHE_BOUND};
pub use context::{Culture, EvalContext, LanguageMode, StrictMode};
pub use convert::{
    convert_param, convert_to_scalar, elements_of, format_double, is_truthy, parse_number,
    to_array, to_num, to_string, ConvertPlan,
};
pub use engine::{Engine, LanguageCheck};
pub use guard::{Guard, GuardAtom};
pub use index::{Access, IndexPlan};
pub use instance::InstanceMembers;
pub use invalidation::{InvalidationBus, VersionCounter};
pub use members::{MemberPlan, TypeTable};
pub use numeric::{Num, NumKind};
pub use ops::OperatorPlan;
pub use plan::{AuditEvent, Plan};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber when `RUST_LOG` is set.
///
/// Safe to call repeatedly. `RUST_LOG=shale_binder=debug` shows cache
/// misses; `RUST_LOG=shale::audit=warn` shows only language-mode audits.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
