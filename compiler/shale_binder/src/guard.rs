//! Guard algebra: cheap predicates deciding whether a cached plan applies.
//!
//! A [`Guard`] is a flat conjunction of [`GuardAtom`]s. Checking one runs on
//! every cache hit, so atoms only read what is already on hand (a type
//! discriminant, a pointer, an atomic) and never allocate or recurse.

use std::fmt;

use shale_value::{TypeKey, Value};
use smallvec::SmallVec;

use crate::context::{EvalContext, LanguageMode};
use crate::invalidation::VersionCounter;

/// One primitive predicate over a call's arguments and context.
#[derive(Clone)]
pub enum GuardAtom {
    /// Argument `arg` debases to `key`; `wrapped` pins wrapper-ness.
    TypeIs {
        arg: u16,
        key: TypeKey,
        wrapped: bool,
    },
    /// Argument `arg` is this exact object (see [`Value::identity`]).
    Identity { arg: u16, id: usize },
    /// A global fact is unchanged since resolution.
    Version { counter: VersionCounter, seen: u64 },
    /// Sign of a numeric argument observed at resolution.
    Sign { arg: u16, negative: bool },
    /// Argument `arg` is an array with exactly `len` elements.
    ArrayLength { arg: u16, len: usize },
    /// Adjunct state of argument `arg` (both false when unwrapped).
    AdjunctIs {
        arg: u16,
        custom_type_names: bool,
        deserialized: bool,
    },
    LanguageModeIs(LanguageMode),
    Always,
    /// Marks a resolution that must not be cached.
    Never,
}

impl GuardAtom {
    #[inline]
    fn holds(&self, args: &[Value], ctx: &EvalContext) -> bool {
        match self {
            GuardAtom::TypeIs { arg, key, wrapped } => arg_at(args, *arg)
                .is_some_and(|v| v.is_wrapped() == *wrapped && v.type_key() == *key),
            GuardAtom::Identity { arg, id } => {
                arg_at(args, *arg).is_some_and(|v| v.base().identity() == Some(*id))
            }
            GuardAtom::Version { counter, seen } => counter.load() == *seen,
            GuardAtom::Sign { arg, negative } => {
                arg_at(args, *arg).is_some_and(|v| is_negative(v) == *negative)
            }
            GuardAtom::ArrayLength { arg, len } => {
                arg_at(args, *arg).is_some_and(|v| match v.base() {
                    Value::Array(a) => a.len() == *len,
                    _ => false,
                })
            }
            GuardAtom::AdjunctIs {
                arg,
                custom_type_names,
                deserialized,
            } => arg_at(args, *arg).is_some_and(|v| match v.wrapper() {
                Some(w) => {
                    w.has_custom_type_names() == *custom_type_names
                        && w.is_deserialized() == *deserialized
                }
                None => !*custom_type_names && !*deserialized,
            }),
            GuardAtom::LanguageModeIs(mode) => ctx.language_mode == *mode,
            GuardAtom::Always => true,
            GuardAtom::Never => false,
        }
    }
}

#[inline]
fn arg_at(args: &[Value], arg: u16) -> Option<&Value> {
    args.get(usize::from(arg))
}

/// True for numeric values below zero.
pub fn is_negative(value: &Value) -> bool {
    match value.base() {
        Value::Int32(n) => *n < 0,
        Value::Int64(n) => *n < 0,
        Value::Decimal(d) => d.is_sign_negative() && !d.is_zero(),
        Value::Double(d) => *d < 0.0,
        _ => false,
    }
}

/// Conjunction of atoms.
#[derive(Clone, Default)]
pub struct Guard {
    atoms: SmallVec<[GuardAtom; 4]>,
}

impl Guard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches every input.
    pub fn always() -> Self {
        let mut guard = Guard::new();
        guard.push(GuardAtom::Always);
        guard
    }

    /// Matches nothing; the resolution is used once and not cached.
    pub fn never() -> Self {
        let mut guard = Guard::new();
        guard.push(GuardAtom::Never);
        guard
    }

    pub fn push(&mut self, atom: GuardAtom) {
        self.atoms.push(atom);
    }

    /// Pin argument `arg` to its current type and wrapper-ness.
    pub fn type_of(&mut self, arg: usize, value: &Value) {
        self.push(GuardAtom::TypeIs {
            arg: index(arg),
            key: value.type_key(),
            wrapped: value.is_wrapped(),
        });
    }

    /// Pin every argument's type.
    pub fn types_of(&mut self, args: &[Value]) {
        for (i, value) in args.iter().enumerate() {
            self.type_of(i, value);
        }
    }

    pub fn sign_of(&mut self, arg: usize, value: &Value) {
        self.push(GuardAtom::Sign {
            arg: index(arg),
            negative: is_negative(value),
        });
    }

    /// Record a global fact at its current version and return that
    /// version. Callers read the state the counter describes afterwards.
    pub fn version(&mut self, counter: VersionCounter) -> u64 {
        let seen = counter.load();
        self.push(GuardAtom::Version { counter, seen });
        seen
    }

    pub fn identity(&mut self, arg: usize, id: usize) {
        self.push(GuardAtom::Identity {
            arg: index(arg),
            id,
        });
    }

    /// Pin the adjunct state of argument `arg`.
    pub fn adjunct_of(&mut self, arg: usize, value: &Value) {
        let (custom_type_names, deserialized) = value
            .wrapper()
            .map_or((false, false), |w| (w.has_custom_type_names(), w.is_deserialized()));
        self.push(GuardAtom::AdjunctIs {
            arg: index(arg),
            custom_type_names,
            deserialized,
        });
    }

    /// Give up caching for this resolution.
    pub fn forbid_caching(&mut self) {
        self.push(GuardAtom::Never);
    }

    #[inline]
    pub fn holds(&self, args: &[Value], ctx: &EvalContext) -> bool {
        self.atoms.iter().all(|atom| atom.holds(args, ctx))
    }

    pub fn is_never(&self) -> bool {
        self.atoms.iter().any(|a| matches!(a, GuardAtom::Never))
    }

    /// True once any embedded version has moved on; the guard can never
    /// hold again.
    pub fn is_stale(&self) -> bool {
        self.atoms.iter().any(|a| match a {
            GuardAtom::Version { counter, seen } => counter.load() != *seen,
            _ => false,
        })
    }

    pub fn atoms(&self) -> &[GuardAtom] {
        &self.atoms
    }
}

fn index(arg: usize) -> u16 {
    u16::try_from(arg).unwrap_or(u16::MAX)
}

impl fmt::Debug for GuardAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardAtom::TypeIs { arg, key, wrapped } => {
                write!(f, "type(#{arg}) == {key:?}")?;
                if *wrapped {
                    write!(f, " wrapped")?;
                }
                Ok(())
            }
            GuardAtom::Identity { arg, id } => write!(f, "#{arg} is @{id:x}"),
            GuardAtom::Version { counter, seen } => write!(f, "{counter:?} == v{seen}"),
            GuardAtom::Sign { arg, negative } => {
                write!(f, "#{arg} {}", if *negative { "< 0" } else { ">= 0" })
            }
            GuardAtom::ArrayLength { arg, len } => write!(f, "len(#{arg}) == {len}"),
            GuardAtom::AdjunctIs {
                arg,
                custom_type_names,
                deserialized,
            } => write!(
                f,
                "adjunct(#{arg}) names={custom_type_names} deserialized={deserialized}"
            ),
            GuardAtom::LanguageModeIs(mode) => write!(f, "mode == {mode}"),
            GuardAtom::Always => write!(f, "true"),
            GuardAtom::Never => write!(f, "false"),
        }
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.atoms.iter()).finish()
    }
}

#[cfg(test)]
mod tests;
