//! Error types raised by dynamic operations.
//!
//! # Structured Error Categories
//!
//! `ErrorKind` carries the typed category; factory functions
//! (`no_conversion(..)`, `member_not_found(..)`, ...) are the public
//! constructors and populate both `kind` and `message`.
//!
//! Degrade policies (equality answering `false` on a failed conversion, a
//! slice element becoming null) match on the kind and catch only the
//! category they degrade. Everything else reaches the interpreter unchanged.

use crate::value::Value;
use std::fmt;

/// Result of a dynamic operation.
pub type EvalResult = Result<Value, EvalError>;

/// Typed error category.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// No viable conversion between the observed and the required type.
    #[error("cannot convert value \"{value}\" of type \"{from}\" to type \"{to}\"")]
    NoConversion {
        value: String,
        from: String,
        to: String,
    },

    /// No resolvable member, method, indexer or overload.
    #[error("the property or method '{member}' cannot be found on type '{type_name}'")]
    MemberNotFound { member: String, type_name: String },

    /// An alias chain refers back to itself.
    #[error("alias member '{member}' forms a cycle: {chain}")]
    CycleDetected { member: String, chain: String },

    /// The member or type is not reachable under the active language mode.
    #[error("{operation} '{target}' is not allowed in {mode} mode")]
    SecurityModeViolation {
        operation: String,
        target: String,
        mode: String,
    },

    /// The caller supplied an operation shape no argument list can satisfy.
    #[error("invalid operation shape: {reason}")]
    InvalidShape { reason: String },

    #[error("attempted to divide by zero")]
    DivideByZero,

    #[error("arithmetic overflow in {operation}")]
    ArithmeticOverflow { operation: String },

    #[error("index {index} is outside the bounds of '{type_name}'")]
    IndexOutOfRange { index: String, type_name: String },

    #[error("cannot {operation} a null value")]
    NullTarget { operation: String },

    #[error("cannot compare \"{left}\" to \"{right}\"")]
    NotComparable { left: String, right: String },

    #[error("multiple ambiguous overloads found for '{method}' and {argc} arguments")]
    AmbiguousOverload { method: String, argc: usize },

    #[error("'{member}' is a read-only property")]
    ReadOnlyMember { member: String },

    #[error("'{member}' is a write-only property")]
    WriteOnlyMember { member: String },

    #[error("'{member}' has by-ref-like type '{type_name}' and cannot be used dynamically")]
    ByRefLikeMember { member: String, type_name: String },

    #[error("operator '{op}' is not defined for types '{left}' and '{right}'")]
    OperatorNotDefined {
        op: String,
        left: String,
        right: String,
    },

    #[error("item has already been added; key in dictionary: '{key}'")]
    DuplicateKey { key: String },

    /// Raised by a host member implementation.
    #[error("{message}")]
    Native { message: String },
}

/// Evaluation error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalError {
    /// Structured error category.
    pub kind: ErrorKind,
    /// Human-readable error message; equals `kind.to_string()` for
    /// factory-created errors.
    pub message: String,
    /// Additional context, innermost first.
    pub notes: Vec<String>,
}

impl EvalError {
    /// Create an error from a structured kind.
    pub fn from_kind(kind: ErrorKind) -> Self {
        let message = kind.to_string();
        EvalError {
            kind,
            message,
            notes: Vec::new(),
        }
    }

    /// Attach a context note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// True for the category equality and slicing are allowed to swallow.
    pub fn is_conversion(&self) -> bool {
        matches!(self.kind, ErrorKind::NoConversion { .. })
    }

    pub fn is_member_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::MemberNotFound { .. })
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

impl From<shale_ir::ShapeError> for EvalError {
    fn from(err: shale_ir::ShapeError) -> Self {
        invalid_shape(err.to_string())
    }
}

// Factory functions

#[cold]
pub fn no_conversion(
    value: impl Into<String>,
    from: impl Into<String>,
    to: impl Into<String>,
) -> EvalError {
    EvalError::from_kind(ErrorKind::NoConversion {
        value: value.into(),
        from: from.into(),
        to: to.into(),
    })
}

#[cold]
pub fn member_not_found(member: impl Into<String>, type_name: impl Into<String>) -> EvalError {
    EvalError::from_kind(ErrorKind::MemberNotFound {
        member: member.into(),
        type_name: type_name.into(),
    })
}

#[cold]
pub fn cycle_detected(member: impl Into<String>, chain: &[String]) -> EvalError {
    EvalError::from_kind(ErrorKind::CycleDetected {
        member: member.into(),
        chain: chain.join(" -> "),
    })
}

#[cold]
pub fn security_violation(
    operation: impl Into<String>,
    target: impl Into<String>,
    mode: impl Into<String>,
) -> EvalError {
    EvalError::from_kind(ErrorKind::SecurityModeViolation {
        operation: operation.into(),
        target: target.into(),
        mode: mode.into(),
    })
}

#[cold]
pub fn invalid_shape(reason: impl Into<String>) -> EvalError {
    EvalError::from_kind(ErrorKind::InvalidShape {
        reason: reason.into(),
    })
}

#[cold]
pub fn divide_by_zero() -> EvalError {
    EvalError::from_kind(ErrorKind::DivideByZero)
}

#[cold]
pub fn arithmetic_overflow(operation: impl Into<String>) -> EvalError {
    EvalError::from_kind(ErrorKind::ArithmeticOverflow {
        operation: operation.into(),
    })
}

#[cold]
pub fn index_out_of_range(index: impl fmt::Display, type_name: impl Into<String>) -> EvalError {
    EvalError::from_kind(ErrorKind::IndexOutOfRange {
        index: index.to_string(),
        type_name: type_name.into(),
    })
}

#[cold]
pub fn null_target(operation: impl Into<String>) -> EvalError {
    EvalError::from_kind(ErrorKind::NullTarget {
        operation: operation.into(),
    })
}

#[cold]
pub fn not_comparable(left: impl Into<String>, right: impl Into<String>) -> EvalError {
    EvalError::from_kind(ErrorKind::NotComparable {
        left: left.into(),
        right: right.into(),
    })
}

#[cold]
pub fn ambiguous_overload(method: impl Into<String>, argc: usize) -> EvalError {
    EvalError::from_kind(ErrorKind::AmbiguousOverload {
        method: method.into(),
        argc,
    })
}

#[cold]
pub fn read_only_member(member: impl Into<String>) -> EvalError {
    EvalError::from_kind(ErrorKind::ReadOnlyMember {
        member: member.into(),
    })
}

#[cold]
pub fn write_only_member(member: impl Into<String>) -> EvalError {
    EvalError::from_kind(ErrorKind::WriteOnlyMember {
        member: member.into(),
    })
}

#[cold]
pub fn by_ref_like_member(member: impl Into<String>, type_name: impl Into<String>) -> EvalError {
    EvalError::from_kind(ErrorKind::ByRefLikeMember {
        member: member.into(),
        type_name: type_name.into(),
    })
}

#[cold]
pub fn operator_not_defined(
    op: impl Into<String>,
    left: impl Into<String>,
    right: impl Into<String>,
) -> EvalError {
    EvalError::from_kind(ErrorKind::OperatorNotDefined {
        op: op.into(),
        left: left.into(),
        right: right.into(),
    })
}

#[cold]
pub fn duplicate_key(key: impl Into<String>) -> EvalError {
    EvalError::from_kind(ErrorKind::DuplicateKey { key: key.into() })
}

#[cold]
pub fn native_error(message: impl Into<String>) -> EvalError {
    EvalError::from_kind(ErrorKind::Native {
        message: message.into(),
    })
}

#[cfg(test)]
mod tests;
