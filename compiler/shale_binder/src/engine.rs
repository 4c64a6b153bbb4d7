//! The engine façade.
//!
//! An [`Engine`] owns everything process-wide: the binder registry, the
//! invalidation bus, the type table, registered host types and the built-in
//! descriptors. Interpreters either keep a [`CallSite`] per syntactic
//! occurrence or go through the convenience entry points, which look the
//! binder up by shape on every call.
//!
//! # Dispatch
//!
//! ```text
//! call site ── last rule holds? ── run plan
//!      │ no
//!      ▼
//! binder rules ── some rule holds? ── run plan
//!      │ no
//!      ▼
//! bind (slow path) ── cacheable? insert ── run plan
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use shale_ir::{
    fold_case, BinaryOp, ComparisonOp, Name, OperationKind, OperationShape, ShapeFlags,
    SharedInterner, StringInterner, TypeConstraint, TypeName, UnaryOp,
};
use shale_stack::ensure_sufficient_stack;
use shale_value::{
    invalid_shape, security_violation, EvalError, EvalResult, HostType, HostTypeId, HostTypeRef,
    Member, Value,
};

use crate::builtins::Builtins;
use crate::cache::{Binder, BinderRegistry, CallSite, Rule};
use crate::compare;
use crate::config::{EngineBuilder, EngineConfig};
use crate::context::{EvalContext, LanguageMode};
use crate::convert;
use crate::guard::{Guard, GuardAtom};
use crate::index;
use crate::instance::InstanceMembers;
use crate::invalidation::InvalidationBus;
use crate::members::{self, TypeTable};
use crate::ops;
use crate::plan::{AuditEvent, Plan};

/// Outcome of checking a host type against the active language mode.
pub enum LanguageCheck {
    Allowed,
    /// Disallowed, but the mode only audits.
    Audit(AuditEvent),
    Denied(EvalError),
}

impl LanguageCheck {
    /// Wrap or replace `plan` according to the outcome.
    pub fn apply(self, plan: Plan) -> Plan {
        match self {
            LanguageCheck::Allowed => plan,
            LanguageCheck::Audit(event) => Plan::Audit {
                event,
                then: Box::new(plan),
            },
            LanguageCheck::Denied(err) => Plan::Raise(err),
        }
    }
}

/// Host types by folded name and by id.
#[derive(Default)]
struct HostTypes {
    by_name: FxHashMap<String, HostTypeRef>,
    by_id: FxHashMap<HostTypeId, HostTypeRef>,
}

impl HostTypes {
    fn insert(&mut self, ty: &HostTypeRef, aliases: &[&str]) {
        self.by_name
            .insert(fold_case(ty.full_name()).into_owned(), ty.clone());
        for name in std::iter::once(ty.name()).chain(aliases.iter().copied()) {
            self.by_name
                .entry(fold_case(name).into_owned())
                .or_insert_with(|| ty.clone());
        }
        self.by_id.insert(ty.id(), ty.clone());
    }
}

/// Process-wide dynamic-operation engine.
pub struct Engine {
    config: EngineConfig,
    interner: SharedInterner,
    registry: BinderRegistry,
    bus: InvalidationBus,
    type_table: TypeTable,
    instances: InstanceMembers,
    host_types: RwLock<HostTypes>,
    builtins: Builtins,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub(crate) fn from_parts(config: EngineConfig, interner: SharedInterner) -> Self {
        let builtins = Builtins::new();
        let mut host_types = HostTypes::default();
        for (ty, aliases) in builtins.all() {
            host_types.insert(&ty, &aliases);
        }
        Engine {
            config,
            interner,
            registry: BinderRegistry::new(),
            bus: InvalidationBus::new(),
            type_table: TypeTable::new(),
            instances: InstanceMembers::new(),
            host_types: RwLock::new(host_types),
            builtins,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    /// Handle to the interner shapes must be built with.
    pub fn shared_interner(&self) -> SharedInterner {
        self.interner.clone()
    }

    pub fn intern(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    pub fn bus(&self) -> &InvalidationBus {
        &self.bus
    }

    pub fn type_table(&self) -> &TypeTable {
        &self.type_table
    }

    pub fn instances(&self) -> &InstanceMembers {
        &self.instances
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    pub fn registry(&self) -> &BinderRegistry {
        &self.registry
    }

    // Host types

    /// Reflection descriptor member lookup on `value` starts from.
    pub fn descriptor_for(&self, value: &Value) -> HostTypeRef {
        self.builtins.descriptor_for(value)
    }

    /// Registered or built-in type by full name, short name or accelerator.
    pub fn lookup_type(&self, name: &str) -> Option<HostTypeRef> {
        self.host_types
            .read()
            .by_name
            .get(fold_case(name).as_ref())
            .cloned()
    }

    pub fn host_type_by_id(&self, id: HostTypeId) -> Option<HostTypeRef> {
        self.host_types.read().by_id.get(&id).cloned()
    }

    /// Type object for `name`, the target of static access and
    /// construction.
    pub fn type_object(&self, name: &str) -> Option<Value> {
        self.lookup_type(name).map(Value::type_object)
    }

    /// Make `ty` reachable by name. Conversions and visibility checks that
    /// failed to find a type re-resolve afterwards.
    pub fn register_host_type(&self, ty: HostTypeRef) {
        let mut host_types = self.host_types.write();
        self.bus.bump_host_types();
        host_types.insert(&ty, &[]);
        tracing::debug!(type_name = ty.full_name(), "host type registered");
    }

    /// Check `ty` against the caller's language mode (or the process floor,
    /// whichever is stricter).
    ///
    /// Types reachable in constrained mode need no guard. For the rest the
    /// rule pins the caller's mode and the floor's version.
    pub fn check_language(
        &self,
        guard: &mut Guard,
        ctx: &EvalContext,
        ty: &HostType,
        operation: &'static str,
        target: &str,
    ) -> LanguageCheck {
        if ty.allowed_in_constrained() {
            return LanguageCheck::Allowed;
        }
        guard.version(self.bus.language_counter());
        guard.push(GuardAtom::LanguageModeIs(ctx.language_mode));
        let mode = self.bus.effective_language_mode(ctx.language_mode);
        if !mode.checks() {
            LanguageCheck::Allowed
        } else if mode.enforces() {
            tracing::debug!(operation, target, %mode, "denied by language mode");
            LanguageCheck::Denied(security_violation(operation, target, mode.to_string()))
        } else {
            LanguageCheck::Audit(AuditEvent {
                operation,
                target: target.to_string(),
                mode,
            })
        }
    }

    // Binders and dispatch

    /// The shared binder for `shape`.
    pub fn get_binder(&self, shape: &OperationShape) -> Result<Arc<Binder>, EvalError> {
        shape.validate()?;
        Ok(self.registry.get_or_create(shape, &self.interner))
    }

    /// A call site for `shape` with its own monomorphic slot.
    pub fn call_site(&self, shape: &OperationShape) -> Result<CallSite, EvalError> {
        self.get_binder(shape).map(CallSite::new)
    }

    /// The rule that applies to `args`, resolving and caching on a miss.
    pub fn resolve(
        &self,
        shape: &OperationShape,
        ctx: &EvalContext,
        args: &[Value],
    ) -> Result<Arc<Rule>, EvalError> {
        let binder = self.get_binder(shape)?;
        self.check_arity(shape, args)?;
        Ok(self.rule_for(&binder, ctx, args))
    }

    /// Resolve and run in one step.
    pub fn resolve_or_invoke(
        &self,
        ctx: &EvalContext,
        shape: &OperationShape,
        args: &[Value],
    ) -> EvalResult {
        self.dispatch(shape, ctx, args)
    }

    pub(crate) fn check_arity(&self, shape: &OperationShape, args: &[Value]) -> Result<(), EvalError> {
        if args.len() == usize::from(shape.arity) {
            Ok(())
        } else {
            Err(invalid_shape(format!(
                "{} expects {} arguments, got {}",
                shape.kind.label(),
                shape.arity,
                args.len()
            )))
        }
    }

    pub(crate) fn rule_for(&self, binder: &Binder, ctx: &EvalContext, args: &[Value]) -> Arc<Rule> {
        if let Some(rule) = binder.lookup(args, ctx) {
            binder.record_hit();
            return rule;
        }
        binder.record_miss();
        let rule = Arc::new(self.bind(binder.shape(), ctx, args));
        tracing::debug!(kind = binder.shape().kind.label(), rule = ?rule, "cache miss");
        if rule.is_cacheable() {
            binder.insert(&rule, self.config.cache_bound);
        }
        rule
    }

    pub(crate) fn dispatch(
        &self,
        shape: &OperationShape,
        ctx: &EvalContext,
        args: &[Value],
    ) -> EvalResult {
        let rule = self.resolve(shape, ctx, args)?;
        ensure_sufficient_stack(|| rule.plan.run(self, shape, ctx, args))
    }

    /// Slow path: derive a rule from the observed arguments and the current
    /// global state.
    #[tracing::instrument(level = "trace", skip_all, fields(kind = shape.kind.label()))]
    pub(crate) fn bind(&self, shape: &OperationShape, ctx: &EvalContext, args: &[Value]) -> Rule {
        match shape.kind {
            OperationKind::Binary(op) => ops::bind_binary(self, ctx, op, args),
            OperationKind::Unary(op) => ops::bind_unary(self, ctx, op, args),
            OperationKind::Compare(op) => compare::bind(shape, op, args),
            OperationKind::Convert(target) => convert::bind(self, shape, ctx, target, args),
            OperationKind::GetMember
            | OperationKind::SetMember
            | OperationKind::InvokeMember
            | OperationKind::Construct => members::bind(self, shape, ctx, args),
            OperationKind::GetIndex | OperationKind::SetIndex => {
                index::bind(self, shape, ctx, args)
            }
        }
    }

    // Convenience entry points

    pub fn binary(&self, ctx: &EvalContext, op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
        self.dispatch(
            &OperationShape::binary(op),
            ctx,
            &[left.clone(), right.clone()],
        )
    }

    pub fn unary(&self, ctx: &EvalContext, op: UnaryOp, operand: &Value) -> EvalResult {
        self.dispatch(&OperationShape::unary(op), ctx, std::slice::from_ref(operand))
    }

    /// Case-insensitive comparison.
    pub fn compare(
        &self,
        ctx: &EvalContext,
        op: ComparisonOp,
        left: &Value,
        right: &Value,
    ) -> EvalResult {
        self.compare_with(ctx, op, ShapeFlags::empty(), left, right)
    }

    /// Comparison with explicit flags (`CASE_SENSITIVE`, `SCALAR_ONLY`).
    pub fn compare_with(
        &self,
        ctx: &EvalContext,
        op: ComparisonOp,
        flags: ShapeFlags,
        left: &Value,
        right: &Value,
    ) -> EvalResult {
        let shape = OperationShape::compare(op).with_flags(flags);
        self.dispatch(&shape, ctx, &[left.clone(), right.clone()])
    }

    pub fn convert(&self, ctx: &EvalContext, target: TypeConstraint, value: &Value) -> EvalResult {
        self.dispatch(&OperationShape::convert(target), ctx, std::slice::from_ref(value))
    }

    /// Convert to a type named as the script wrote it (`[int]`, `[Contoso.Widget]`).
    pub fn convert_to_named(&self, ctx: &EvalContext, type_name: &str, value: &Value) -> EvalResult {
        let target = TypeConstraint::Named(TypeName::new(&self.interner, type_name));
        self.convert(ctx, target, value)
    }

    pub fn get_member(&self, ctx: &EvalContext, target: &Value, name: &str) -> EvalResult {
        let shape = OperationShape::get_member(self.intern(name));
        self.dispatch(&shape, ctx, std::slice::from_ref(target))
    }

    pub fn set_member(
        &self,
        ctx: &EvalContext,
        target: &Value,
        name: &str,
        value: Value,
    ) -> EvalResult {
        let shape = OperationShape::set_member(self.intern(name));
        self.dispatch(&shape, ctx, &[target.clone(), value])
    }

    pub fn invoke_member(
        &self,
        ctx: &EvalContext,
        target: &Value,
        name: &str,
        args: &[Value],
    ) -> EvalResult {
        let shape = OperationShape::invoke_member(self.intern(name), argc(args)?);
        self.dispatch(&shape, ctx, &with_target(target, args))
    }

    /// `[Type]::Name`.
    pub fn get_static(&self, ctx: &EvalContext, ty: &Value, name: &str) -> EvalResult {
        let shape = OperationShape::get_member(self.intern(name)).with_flags(ShapeFlags::STATIC);
        self.dispatch(&shape, ctx, std::slice::from_ref(ty))
    }

    /// `[Type]::Name(args)`.
    pub fn invoke_static(
        &self,
        ctx: &EvalContext,
        ty: &Value,
        name: &str,
        args: &[Value],
    ) -> EvalResult {
        let shape = OperationShape::invoke_member(self.intern(name), argc(args)?)
            .with_flags(ShapeFlags::STATIC);
        self.dispatch(&shape, ctx, &with_target(ty, args))
    }

    /// `[Type]::new(args)`.
    pub fn construct(&self, ctx: &EvalContext, ty: &Value, args: &[Value]) -> EvalResult {
        let shape = OperationShape::construct(argc(args)?);
        self.dispatch(&shape, ctx, &with_target(ty, args))
    }

    pub fn get_index(&self, ctx: &EvalContext, target: &Value, indices: &[Value]) -> EvalResult {
        let shape = OperationShape::get_index(argc(indices)?);
        self.dispatch(&shape, ctx, &with_target(target, indices))
    }

    pub fn set_index(
        &self,
        ctx: &EvalContext,
        target: &Value,
        indices: &[Value],
        value: Value,
    ) -> EvalResult {
        let shape = OperationShape::set_index(argc(indices)?);
        let mut args = with_target(target, indices);
        args.push(value);
        self.dispatch(&shape, ctx, &args)
    }

    // Global state

    /// Declare `member` on `type_name` in the type table.
    pub fn add_type_member(&self, type_name: &str, member: Member) -> Option<Member> {
        self.type_table.add_member(&self.bus, type_name, member)
    }

    pub fn remove_type_member(&self, type_name: &str, name: &str) -> Option<Member> {
        self.type_table.remove_member(&self.bus, type_name, name)
    }

    /// Attach `member` to this exact object and return the value that
    /// carries it.
    ///
    /// Arrays, lists, dictionaries and host instances hold the member
    /// themselves and come back unchanged, as do wrapped values. Scalars and
    /// strings have no identity of their own: they are wrapped and the
    /// wrapper holds the member.
    pub fn add_instance_member(&self, target: &Value, member: Member) -> Value {
        if let Some(wrapper) = target.wrapper() {
            let mut adjunct = wrapper.adjunct_mut();
            self.on_instance_member_added(&member.name);
            adjunct.members.insert(member);
            return target.clone();
        }
        if InstanceMembers::can_hold(target) {
            self.on_instance_member_added(&member.name);
            self.instances.attach(target, member);
            return target.clone();
        }
        let wrapped = Value::wrap(target.clone());
        if let Some(wrapper) = wrapped.wrapper() {
            let mut adjunct = wrapper.adjunct_mut();
            self.on_instance_member_added(&member.name);
            adjunct.members.insert(member);
        }
        wrapped
    }

    /// Give `target` an extra type name consulted before its own.
    pub fn with_type_name(&self, target: &Value, type_name: &str) -> Value {
        let wrapped = Value::wrap(target.clone());
        if let Some(wrapper) = wrapped.wrapper() {
            wrapper.adjunct_mut().type_names.insert(0, type_name.to_string());
        }
        wrapped
    }

    /// Type-table data for `type_name` changed outside [`TypeTable`].
    pub fn on_type_table_changed(&self, type_name: &str) {
        self.bus.bump_type(type_name);
    }

    /// Some object gained (or changed) an instance member called `name`.
    pub fn on_instance_member_added(&self, name: &str) {
        self.bus.bump_instance_member(name);
        let affected = self.registry.count_for_member(name);
        tracing::debug!(member = name, affected, "instance member attached");
    }

    /// Language-mode policy changed outside [`Engine::tighten_language_mode`].
    pub fn on_language_mode_tightened(&self) {
        self.bus.bump_language();
    }

    /// Raise the process-wide language floor. Never loosens.
    pub fn tighten_language_mode(&self, mode: LanguageMode) -> bool {
        self.bus.tighten_language_mode(mode)
    }
}

fn argc(args: &[Value]) -> Result<u16, EvalError> {
    u16::try_from(args.len())
        .map_err(|_| invalid_shape(format!("{} arguments exceed the supported maximum", args.len())))
}

fn with_target(target: &Value, args: &[Value]) -> Vec<Value> {
    let mut all = Vec::with_capacity(args.len() + 1);
    all.push(target.clone());
    all.extend_from_slice(args);
    all
}
