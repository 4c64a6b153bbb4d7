//! Per-evaluation settings every dynamic operation reads.
//!
//! An `EvalContext` is supplied by the interpreter on each call. Plans read
//! the culture and strict mode at run time; the language mode is part of
//! a rule's guard because it decides which native members resolve at all.

use std::fmt;

/// Formatting conventions for culture-sensitive conversions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Culture {
    pub name: String,
    pub decimal_separator: char,
    /// Joins collection elements when a collection converts to a string.
    pub list_separator: String,
}

impl Culture {
    pub fn invariant() -> Self {
        Culture {
            name: String::new(),
            decimal_separator: '.',
            list_separator: " ".to_string(),
        }
    }

    #[must_use]
    pub fn with_decimal_separator(mut self, sep: char) -> Self {
        self.decimal_separator = sep;
        self
    }

    #[must_use]
    pub fn with_list_separator(mut self, sep: impl Into<String>) -> Self {
        self.list_separator = sep.into();
        self
    }
}

impl Default for Culture {
    fn default() -> Self {
        Culture::invariant()
    }
}

/// Strictness level, 0 through 3.
///
/// - `>= 2`: reading a missing property raises
/// - `>= 3`: out-of-range indexing raises, and slice elements stop
///   degrading to null
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct StrictMode(u8);

impl StrictMode {
    pub const OFF: StrictMode = StrictMode(0);
    pub const LATEST: StrictMode = StrictMode(3);

    /// Clamped to the supported range.
    pub fn new(level: u8) -> Self {
        StrictMode(level.min(3))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn missing_property_raises(self) -> bool {
        self.0 >= 2
    }

    pub fn out_of_range_raises(self) -> bool {
        self.0 >= 3
    }
}

/// Security setting restricting reachable native members, least
/// restrictive first.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LanguageMode {
    #[default]
    Full,
    /// Constrained rules are checked, violations are logged and allowed.
    ConstrainedAudit,
    Constrained,
    NoLanguage,
}

impl LanguageMode {
    /// True when a disallowed member must be refused outright.
    pub fn enforces(self) -> bool {
        matches!(self, LanguageMode::Constrained | LanguageMode::NoLanguage)
    }

    /// True when disallowed members are checked at all.
    pub fn checks(self) -> bool {
        self != LanguageMode::Full
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LanguageMode::Full,
            1 => LanguageMode::ConstrainedAudit,
            2 => LanguageMode::Constrained,
            _ => LanguageMode::NoLanguage,
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            LanguageMode::Full => 0,
            LanguageMode::ConstrainedAudit => 1,
            LanguageMode::Constrained => 2,
            LanguageMode::NoLanguage => 3,
        }
    }
}

impl fmt::Display for LanguageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LanguageMode::Full => "FullLanguage",
            LanguageMode::ConstrainedAudit => "ConstrainedLanguage (audit)",
            LanguageMode::Constrained => "ConstrainedLanguage",
            LanguageMode::NoLanguage => "NoLanguage",
        })
    }
}

/// Execution context for one dynamic operation.
#[derive(Clone, Debug, Default)]
pub struct EvalContext {
    pub culture: Culture,
    pub strict_mode: StrictMode,
    pub language_mode: LanguageMode,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_culture(mut self, culture: Culture) -> Self {
        self.culture = culture;
        self
    }

    #[must_use]
    pub fn with_strict_mode(mut self, level: u8) -> Self {
        self.strict_mode = StrictMode::new(level);
        self
    }

    #[must_use]
    pub fn with_language_mode(mut self, mode: LanguageMode) -> Self {
        self.language_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_mode_clamps() {
        assert_eq!(StrictMode::new(9), StrictMode::LATEST);
        assert!(!StrictMode::new(1).missing_property_raises());
        assert!(StrictMode::new(2).missing_property_raises());
        assert!(!StrictMode::new(2).out_of_range_raises());
        assert!(StrictMode::new(3).out_of_range_raises());
    }

    #[test]
    fn test_language_mode_order() {
        assert!(LanguageMode::Full < LanguageMode::ConstrainedAudit);
        assert!(LanguageMode::Constrained < LanguageMode::NoLanguage);
        assert!(!LanguageMode::ConstrainedAudit.enforces());
        assert!(LanguageMode::ConstrainedAudit.checks());
        for mode in [
            LanguageMode::Full,
            LanguageMode::ConstrainedAudit,
            LanguageMode::Constrained,
            LanguageMode::NoLanguage,
        ] {
            assert_eq!(LanguageMode::from_u8(mode.as_u8()), mode);
        }
    }
}
