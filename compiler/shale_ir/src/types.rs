//! Type references that may appear inside an operation shape.

use crate::{Name, StringInterner};
use std::hash::{Hash, Hasher};

/// Built-in scalar types the engine converts between.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ScalarType {
    Bool,
    Char,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Decimal,
    Double,
    String,
}

impl ScalarType {
    /// Fully qualified type name.
    pub const fn full_name(self) -> &'static str {
        match self {
            Self::Bool => "System.Boolean",
            Self::Char => "System.Char",
            Self::Int32 => "System.Int32",
            Self::UInt32 => "System.UInt32",
            Self::Int64 => "System.Int64",
            Self::UInt64 => "System.UInt64",
            Self::Decimal => "System.Decimal",
            Self::Double => "System.Double",
            Self::String => "System.String",
        }
    }

    /// Script-level accelerator spelling (`[int]`, `[long]`, ...).
    pub const fn accelerator(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Int32 => "int",
            Self::UInt32 => "uint32",
            Self::Int64 => "long",
            Self::UInt64 => "uint64",
            Self::Decimal => "decimal",
            Self::Double => "double",
            Self::String => "string",
        }
    }

    /// Resolve an accelerator or full name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        const ALL: [ScalarType; 9] = [
            ScalarType::Bool,
            ScalarType::Char,
            ScalarType::Int32,
            ScalarType::UInt32,
            ScalarType::Int64,
            ScalarType::UInt64,
            ScalarType::Decimal,
            ScalarType::Double,
            ScalarType::String,
        ];
        ALL.into_iter().find(|t| {
            t.full_name().eq_ignore_ascii_case(name) || t.accelerator().eq_ignore_ascii_case(name)
        })
    }

    /// True for the six numeric kinds of the promotion lattice.
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Int32 | Self::UInt32 | Self::Int64 | Self::UInt64 | Self::Decimal | Self::Double
        )
    }
}

/// A type name as the script wrote it, compared case-insensitively.
///
/// `spelling` keeps the original text for diagnostics; `key` is the folded
/// spelling and is the only field that participates in equality and hashing.
#[derive(Copy, Clone, Debug)]
pub struct TypeName {
    pub spelling: Name,
    pub key: Name,
}

impl TypeName {
    /// Intern a type name.
    pub fn new(interner: &StringInterner, name: &str) -> Self {
        TypeName {
            spelling: interner.intern(name),
            key: interner.intern_folded(name),
        }
    }
}

impl PartialEq for TypeName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TypeName {}

impl Hash for TypeName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// Target of a conversion or an explicit cast on an invocation argument.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeConstraint {
    /// A built-in scalar (`[int]`, `[string]`, ...).
    Scalar(ScalarType),
    /// `[object]`: any value, unchanged.
    Object,
    /// `[object[]]`: a rank-1 untyped array.
    Array,
    /// A host type looked up by name at resolution time.
    Named(TypeName),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_from_name() {
        assert_eq!(ScalarType::from_name("INT"), Some(ScalarType::Int32));
        assert_eq!(ScalarType::from_name("System.Double"), Some(ScalarType::Double));
        assert_eq!(ScalarType::from_name("widget"), None);
    }

    #[test]
    fn test_type_name_case_insensitive() {
        let interner = StringInterner::new();
        let a = TypeName::new(&interner, "System.Int32");
        let b = TypeName::new(&interner, "system.int32");
        assert_eq!(a, b);
        assert_ne!(a.spelling, b.spelling);
    }
}
