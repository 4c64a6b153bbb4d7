//! Shale IR - names, operators and operation shapes.
//!
//! This crate holds the static half of every dynamic operation: what the
//! interpreter knows about a call site before any value reaches it. The
//! binder registry in `shale_binder` interns one binder per distinct
//! [`OperationShape`].
//!
//! # Contents
//!
//! - [`Name`] / [`StringInterner`]: compact interned identifiers
//! - [`BinaryOp`], [`UnaryOp`], [`ComparisonOp`]: operator kinds
//! - [`ScalarType`], [`TypeName`], [`TypeConstraint`]: type references
//! - [`OperationShape`], [`OperationKind`], [`ShapeFlags`]: the binder key

mod interner;
mod name;
mod ops;
mod shape;
mod types;

pub use interner::{fold_case, InternError, SharedInterner, StringInterner, StringLookup};
pub use name::Name;
pub use ops::{BinaryOp, ComparisonOp, UnaryOp};
pub use shape::{InvocationConstraints, OperationKind, OperationShape, ShapeError, ShapeFlags};
pub use types::{ScalarType, TypeConstraint, TypeName};
