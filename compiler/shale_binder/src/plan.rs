//! Plans: the computation a rule runs once its guard holds.
//!
//! `Plan` is a tagged union with one variant family per engine. A plan reads
//! culture and strict mode from the context at run time; anything else it
//! depends on was pinned by the rule's guard. Plans that cannot precompute
//! their full answer (a string operand whose numeric kind is only known after
//! parsing) re-dispatch through the engine.

use std::fmt;

use shale_ir::OperationShape;
use shale_value::{EvalError, EvalResult, Value};

use crate::compare::ComparePlan;
use crate::context::{EvalContext, LanguageMode};
use crate::convert::ConvertPlan;
use crate::engine::Engine;
use crate::index::IndexPlan;
use crate::members::{self, MemberPlan};
use crate::ops::OperatorPlan;

/// A language-mode violation allowed through in audit mode.
#[derive(Clone, Debug)]
pub struct AuditEvent {
    pub operation: &'static str,
    pub target: String,
    pub mode: LanguageMode,
}

pub enum Plan {
    Operator(OperatorPlan),
    Compare(ComparePlan),
    Convert(ConvertPlan),
    Member(MemberPlan),
    Index(IndexPlan),
    /// Check the target's instance members for `name` first, then run
    /// `then`. Used once any object has carried a member by that name.
    InstanceProbe { name: String, then: Box<Plan> },
    /// Log the event under the audit target on every execution, then run.
    Audit { event: AuditEvent, then: Box<Plan> },
    /// Resolve from scratch on every call. Only the megamorphic rule
    /// carries this plan.
    Dynamic,
    Raise(EvalError),
}

impl Plan {
    /// Execute against `args`.
    pub fn run(
        &self,
        engine: &Engine,
        shape: &OperationShape,
        ctx: &EvalContext,
        args: &[Value],
    ) -> EvalResult {
        match self {
            Plan::Operator(plan) => plan.run(engine, shape, ctx, args),
            Plan::Compare(plan) => plan.run(engine, shape, ctx, args),
            Plan::Convert(plan) => plan.run(engine, ctx, args),
            Plan::Member(plan) => plan.run(engine, shape, ctx, args),
            Plan::Index(plan) => plan.run(engine, ctx, args),
            Plan::InstanceProbe { name, then } => {
                match members::probe_instance(engine, shape, ctx, args, name)? {
                    Some(value) => Ok(value),
                    None => then.run(engine, shape, ctx, args),
                }
            }
            Plan::Audit { event, then } => {
                tracing::warn!(
                    target: "shale::audit",
                    source = %engine.config().audit_source,
                    operation = event.operation,
                    target_member = %event.target,
                    mode = %event.mode,
                    "language mode violation allowed by audit mode"
                );
                then.run(engine, shape, ctx, args)
            }
            Plan::Dynamic => engine.bind(shape, ctx, args).plan.run(engine, shape, ctx, args),
            Plan::Raise(err) => Err(err.clone()),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Plan::Dynamic)
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::Operator(plan) => write!(f, "{plan:?}"),
            Plan::Compare(plan) => write!(f, "{plan:?}"),
            Plan::Convert(plan) => write!(f, "{plan:?}"),
            Plan::Member(plan) => write!(f, "{plan:?}"),
            Plan::Index(plan) => write!(f, "{plan:?}"),
            Plan::InstanceProbe { name, then } => write!(f, "InstanceProbe({name}) -> {then:?}"),
            Plan::Audit { event, then } => {
                write!(f, "Audit({} {}) -> {then:?}", event.operation, event.target)
            }
            Plan::Dynamic => write!(f, "Dynamic"),
            Plan::Raise(err) => write!(f, "Raise({:?})", err.kind),
        }
    }
}
