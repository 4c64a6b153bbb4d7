//! Operator enums carried by operation shapes.

/// Binary arithmetic, bitwise and shift operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    /// Returns the source-level spelling for this operator.
    ///
    /// Used in error messages to show the exact operator that failed.
    pub const fn as_symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::BitAnd => "-band",
            Self::BitOr => "-bor",
            Self::BitXor => "-bxor",
            Self::Shl => "-shl",
            Self::Shr => "-shr",
        }
    }

    /// True for `-band`, `-bor`, `-bxor`.
    pub const fn is_bitwise(self) -> bool {
        matches!(self, Self::BitAnd | Self::BitOr | Self::BitXor)
    }

    /// True for `-shl`, `-shr`.
    pub const fn is_shift(self) -> bool {
        matches!(self, Self::Shl | Self::Shr)
    }

    /// True for `+ - * / %`.
    pub const fn is_arithmetic(self) -> bool {
        !self.is_bitwise() && !self.is_shift()
    }
}

/// Unary operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

impl UnaryOp {
    pub const fn as_symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Plus => "+",
            Self::Not => "-not",
            Self::BitNot => "-bnot",
        }
    }
}

/// Comparison and containment operators.
///
/// Case sensitivity is not part of the operator; it is a flag on the shape
/// (`-ceq` and `-eq` share `Eq` and differ in `ShapeFlags::CASE_SENSITIVE`).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    NotContains,
    In,
    NotIn,
}

impl ComparisonOp {
    pub const fn as_symbol(self) -> &'static str {
        match self {
            Self::Eq => "-eq",
            Self::Ne => "-ne",
            Self::Lt => "-lt",
            Self::Le => "-le",
            Self::Gt => "-gt",
            Self::Ge => "-ge",
            Self::Contains => "-contains",
            Self::NotContains => "-notcontains",
            Self::In => "-in",
            Self::NotIn => "-notin",
        }
    }

    /// Equality and inequality swallow conversion failures.
    pub const fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }

    /// Ordering relations (`-lt`, `-le`, `-gt`, `-ge`).
    pub const fn is_ordering(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }

    /// Containment operators never broadcast; they consume the collection.
    pub const fn is_containment(self) -> bool {
        matches!(
            self,
            Self::Contains | Self::NotContains | Self::In | Self::NotIn
        )
    }
}
