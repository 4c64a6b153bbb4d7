//! Engine configuration and the builder that produces an [`Engine`].

use shale_ir::SharedInterner;

use crate::engine::Engine;

/// Rules a binder holds before it collapses to one general rule.
pub const DEFAULT_CACHE_BOUND: usize = 4;

/// Process-wide engine settings, fixed at construction.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Polymorphic inline cache size per binder.
    pub cache_bound: usize,
    /// Broadcast member access over collections that lack the member.
    pub member_enumeration: bool,
    /// Recorded as the `source` field of language-mode audit events
    /// (emitted under the `shale::audit` target).
    pub audit_source: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cache_bound: DEFAULT_CACHE_BOUND,
            member_enumeration: true,
            audit_source: "shale".to_string(),
        }
    }
}

/// Builder for [`Engine`] instances.
///
/// ```text
/// let engine = Engine::builder()
///     .cache_bound(8)
///     .member_enumeration(false)
///     .build();
/// ```
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    interner: Option<SharedInterner>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-binder rule bound. Zero is treated as one.
    #[must_use]
    pub fn cache_bound(mut self, bound: usize) -> Self {
        self.config.cache_bound = bound.max(1);
        self
    }

    #[must_use]
    pub fn member_enumeration(mut self, enabled: bool) -> Self {
        self.config.member_enumeration = enabled;
        self
    }

    #[must_use]
    pub fn audit_source(mut self, source: impl Into<String>) -> Self {
        self.config.audit_source = source.into();
        self
    }

    /// Share an interner with the interpreter that builds the shapes.
    #[must_use]
    pub fn interner(mut self, interner: SharedInterner) -> Self {
        self.interner = Some(interner);
        self
    }

    pub fn build(self) -> Engine {
        Engine::from_parts(self.config, self.interner.unwrap_or_default())
    }
}
