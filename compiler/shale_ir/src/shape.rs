//! Operation shapes: the static description of one dynamic operation.
//!
//! The interpreter builds one `OperationShape` per call site when it compiles
//! a script block. Shapes are interned by the binder registry, so two call
//! sites with equal shapes share one binder and its rule cache.
//!
//! # Equality
//!
//! Derived `Hash`/`Eq` compare every field. Member names are interned with
//! their exact spelling (a `$h.Foo` site and a `$h.foo` site get different
//! binders because the target may be a case-sensitive keyed collection).
//! Type names go through [`TypeName`], which compares folded spellings.

use bitflags::bitflags;
use smallvec::SmallVec;
use std::fmt;

use crate::{BinaryOp, ComparisonOp, Name, TypeConstraint, TypeName, UnaryOp};

bitflags! {
    /// Static modifiers of an operation.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct ShapeFlags: u8 {
        /// `-ceq`, `-clt`, ... and case-sensitive keyed lookups.
        const CASE_SENSITIVE = 1 << 0;
        /// `[Type]::Member` access: skips instance members and dictionary keys.
        const STATIC = 1 << 1;
        /// Comparison is pinned to scalar mode and never broadcasts.
        const SCALAR_ONLY = 1 << 2;
        /// Member lookup never enumerates a collection target.
        const NON_ENUMERATING = 1 << 3;
    }
}

/// What the operation does.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum OperationKind {
    Binary(BinaryOp),
    Unary(UnaryOp),
    Compare(ComparisonOp),
    Convert(TypeConstraint),
    GetMember,
    SetMember,
    InvokeMember,
    Construct,
    GetIndex,
    SetIndex,
}

impl OperationKind {
    /// True for the kinds that carry a member name.
    pub const fn needs_name(self) -> bool {
        matches!(self, Self::GetMember | Self::SetMember | Self::InvokeMember)
    }

    /// Minimum and maximum argument count, target included.
    const fn arity_bounds(self) -> (u16, u16) {
        match self {
            Self::Binary(_) | Self::Compare(_) | Self::SetMember => (2, 2),
            Self::Unary(_) | Self::Convert(_) | Self::GetMember => (1, 1),
            Self::InvokeMember | Self::Construct => (1, u16::MAX),
            Self::GetIndex => (2, u16::MAX),
            Self::SetIndex => (3, u16::MAX),
        }
    }

    /// Short label used in logs.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Binary(op) => op.as_symbol(),
            Self::Unary(op) => op.as_symbol(),
            Self::Compare(op) => op.as_symbol(),
            Self::Convert(_) => "convert",
            Self::GetMember => "get-member",
            Self::SetMember => "set-member",
            Self::InvokeMember => "invoke-member",
            Self::Construct => "new",
            Self::GetIndex => "get-index",
            Self::SetIndex => "set-index",
        }
    }
}

/// Explicit casts written at an invocation site, used to pick an overload.
///
/// `args[i]` constrains argument `i` (target excluded); `None` leaves that
/// argument to ordinary overload ranking.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct InvocationConstraints {
    pub args: SmallVec<[Option<TypeConstraint>; 4]>,
}

impl InvocationConstraints {
    pub fn new(args: impl IntoIterator<Item = Option<TypeConstraint>>) -> Self {
        InvocationConstraints {
            args: args.into_iter().collect(),
        }
    }

    /// Constraint for argument `i`, if any.
    pub fn arg(&self, i: usize) -> Option<TypeConstraint> {
        self.args.get(i).copied().flatten()
    }
}

/// Reason a shape cannot be satisfied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShapeError {
    MissingName { kind: &'static str },
    UnexpectedName { kind: &'static str },
    Arity { kind: &'static str, arity: u16 },
    StaticOnNonMember { kind: &'static str },
    TooManyConstraints { constraints: usize, arguments: usize },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingName { kind } => write!(f, "{kind} requires a member name"),
            Self::UnexpectedName { kind } => write!(f, "{kind} does not take a member name"),
            Self::Arity { kind, arity } => {
                write!(f, "{kind} cannot take {arity} arguments")
            }
            Self::StaticOnNonMember { kind } => {
                write!(f, "{kind} cannot be static")
            }
            Self::TooManyConstraints {
                constraints,
                arguments,
            } => write!(
                f,
                "{constraints} argument constraints given for {arguments} arguments"
            ),
        }
    }
}

impl std::error::Error for ShapeError {}

/// Immutable key describing one static operation.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct OperationShape {
    pub kind: OperationKind,
    /// Number of runtime arguments, target included.
    pub arity: u16,
    pub flags: ShapeFlags,
    pub name: Option<Name>,
    /// Enclosing class, for protected/private member access.
    pub class_scope: Option<TypeName>,
    pub constraints: Option<InvocationConstraints>,
}

impl OperationShape {
    fn new(kind: OperationKind, arity: u16) -> Self {
        OperationShape {
            kind,
            arity,
            flags: ShapeFlags::empty(),
            name: None,
            class_scope: None,
            constraints: None,
        }
    }

    pub fn binary(op: BinaryOp) -> Self {
        Self::new(OperationKind::Binary(op), 2)
    }

    pub fn unary(op: UnaryOp) -> Self {
        Self::new(OperationKind::Unary(op), 1)
    }

    pub fn compare(op: ComparisonOp) -> Self {
        Self::new(OperationKind::Compare(op), 2)
    }

    pub fn convert(target: TypeConstraint) -> Self {
        Self::new(OperationKind::Convert(target), 1)
    }

    pub fn get_member(name: Name) -> Self {
        Self::new(OperationKind::GetMember, 1).with_name(name)
    }

    pub fn set_member(name: Name) -> Self {
        Self::new(OperationKind::SetMember, 2).with_name(name)
    }

    /// `target.name(arg0, ..., argN-1)` with `argc` arguments.
    pub fn invoke_member(name: Name, argc: u16) -> Self {
        Self::new(OperationKind::InvokeMember, argc.saturating_add(1)).with_name(name)
    }

    /// `[Type]::new(arg0, ...)` with `argc` arguments.
    pub fn construct(argc: u16) -> Self {
        Self::new(OperationKind::Construct, argc.saturating_add(1))
    }

    /// `target[i0, ..., iN-1]` with `indices` index expressions.
    pub fn get_index(indices: u16) -> Self {
        Self::new(OperationKind::GetIndex, indices.saturating_add(1))
    }

    /// `target[i0, ...] = value` with `indices` index expressions.
    pub fn set_index(indices: u16) -> Self {
        Self::new(OperationKind::SetIndex, indices.saturating_add(2))
    }

    #[must_use]
    pub fn with_name(mut self, name: Name) -> Self {
        self.name = Some(name);
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: ShapeFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub fn with_class_scope(mut self, scope: TypeName) -> Self {
        self.class_scope = Some(scope);
        self
    }

    #[must_use]
    pub fn with_constraints(mut self, constraints: InvocationConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(ShapeFlags::STATIC)
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.flags.contains(ShapeFlags::CASE_SENSITIVE)
    }

    /// Reject shapes no argument list could satisfy.
    pub fn validate(&self) -> Result<(), ShapeError> {
        let kind = self.kind.label();
        match (self.kind.needs_name(), self.name.is_some()) {
            (true, false) => return Err(ShapeError::MissingName { kind }),
            (false, true) => return Err(ShapeError::UnexpectedName { kind }),
            _ => {}
        }
        let (min, max) = self.kind.arity_bounds();
        if self.arity < min || self.arity > max {
            return Err(ShapeError::Arity {
                kind,
                arity: self.arity,
            });
        }
        if self.is_static()
            && !matches!(
                self.kind,
                OperationKind::GetMember | OperationKind::SetMember | OperationKind::InvokeMember
            )
        {
            return Err(ShapeError::StaticOnNonMember { kind });
        }
        if let Some(constraints) = &self.constraints {
            let arguments = usize::from(self.arity).saturating_sub(1);
            if constraints.args.len() > arguments {
                return Err(ShapeError::TooManyConstraints {
                    constraints: constraints.args.len(),
                    arguments,
                });
            }
        }
        Ok(())
    }
}
