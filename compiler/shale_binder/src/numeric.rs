//! Numeric promotion lattice and arithmetic.
//!
//! Operands are promoted to the widest kind of the pair under the total
//! order `Int32 < UInt32 < Int64 < UInt64 < Decimal < Double`; `Bool` and
//! `Char` enter as `Int32`. A negative signed operand meeting a wider
//! unsigned kind moves to the next signed kind that holds it (`UInt32` to
//! `Int64`, `UInt64` to `Decimal`), which is why numeric rules guard on sign.
//!
//! Overflow policy:
//! - integer add/sub/mul overflow is recomputed in double
//! - a non-exact integer division yields a double
//! - decimal add/sub overflow raises; mul/div/rem retry in double
//! - integer and decimal division by zero raise; double follows IEEE

use std::cmp::Ordering;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use shale_ir::{BinaryOp, ScalarType, UnaryOp};
use shale_value::{arithmetic_overflow, divide_by_zero, EvalError, Value};

/// A numeric operation type.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum NumKind {
    Int32,
    UInt32,
    Int64,
    UInt64,
    Decimal,
    Double,
}

impl NumKind {
    /// Operation kind a scalar enters arithmetic as. Strings have none.
    pub fn of(scalar: ScalarType) -> Option<NumKind> {
        match scalar {
            ScalarType::Bool | ScalarType::Char | ScalarType::Int32 => Some(NumKind::Int32),
            ScalarType::UInt32 => Some(NumKind::UInt32),
            ScalarType::Int64 => Some(NumKind::Int64),
            ScalarType::UInt64 => Some(NumKind::UInt64),
            ScalarType::Decimal => Some(NumKind::Decimal),
            ScalarType::Double => Some(NumKind::Double),
            ScalarType::String => None,
        }
    }

    pub fn scalar(self) -> ScalarType {
        match self {
            NumKind::Int32 => ScalarType::Int32,
            NumKind::UInt32 => ScalarType::UInt32,
            NumKind::Int64 => ScalarType::Int64,
            NumKind::UInt64 => ScalarType::UInt64,
            NumKind::Decimal => ScalarType::Decimal,
            NumKind::Double => ScalarType::Double,
        }
    }

    pub fn is_signed_integer(self) -> bool {
        matches!(self, NumKind::Int32 | NumKind::Int64)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, NumKind::UInt32 | NumKind::UInt64)
    }

    pub fn is_integer(self) -> bool {
        self <= NumKind::UInt64
    }

    /// Kind used by bitwise operators: fractional kinds act as `Int64`.
    pub fn for_bitwise(self) -> NumKind {
        if self.is_integer() {
            self
        } else {
            NumKind::Int64
        }
    }

    fn shift_mask(self) -> u32 {
        match self {
            NumKind::Int32 | NumKind::UInt32 => 0x1f,
            _ => 0x3f,
        }
    }
}

/// Operation kind for a pair of operands.
///
/// `negative` flags report the observed sign of each operand; only
/// signed operands meeting a wider unsigned kind look at them (see
/// [`sign_matters`]).
pub fn promote(left: NumKind, left_negative: bool, right: NumKind, right_negative: bool) -> NumKind {
    let widest = left.max(right);
    let negative_signed = |kind: NumKind, negative: bool| kind.is_signed_integer() && negative;
    let any_negative = negative_signed(left, left_negative) || negative_signed(right, right_negative);
    match widest {
        NumKind::UInt32 if any_negative => NumKind::Int64,
        NumKind::UInt64 if any_negative => NumKind::Decimal,
        other => other,
    }
}

/// Bitwise promotion: the sign rule never leaves the integer lattice.
pub fn promote_bitwise(
    left: NumKind,
    left_negative: bool,
    right: NumKind,
    right_negative: bool,
) -> NumKind {
    match promote(
        left.for_bitwise(),
        left_negative,
        right.for_bitwise(),
        right_negative,
    ) {
        NumKind::Decimal | NumKind::Double => NumKind::Int64,
        kind => kind,
    }
}

/// True when operand `kind` can change the promoted kind through its sign.
pub fn sign_matters(kind: NumKind, other: NumKind) -> bool {
    kind.is_signed_integer() && other.is_unsigned() && other >= kind
}

/// A numeric value tagged with its kind.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Num {
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    Dec(Decimal),
    F64(f64),
}

impl Num {
    /// Numeric view of a debased scalar; bool and char count as `Int32`.
    pub fn from_value(value: &Value) -> Option<Num> {
        match value.base() {
            Value::Bool(b) => Some(Num::I32(i32::from(*b))),
            Value::Char(c) => i32::try_from(u32::from(*c)).ok().map(Num::I32),
            Value::Int32(n) => Some(Num::I32(*n)),
            Value::UInt32(n) => Some(Num::U32(*n)),
            Value::Int64(n) => Some(Num::I64(*n)),
            Value::UInt64(n) => Some(Num::U64(*n)),
            Value::Decimal(d) => Some(Num::Dec(*d)),
            Value::Double(d) => Some(Num::F64(*d)),
            _ => None,
        }
    }

    pub fn kind(self) -> NumKind {
        match self {
            Num::I32(_) => NumKind::Int32,
            Num::U32(_) => NumKind::UInt32,
            Num::I64(_) => NumKind::Int64,
            Num::U64(_) => NumKind::UInt64,
            Num::Dec(_) => NumKind::Decimal,
            Num::F64(_) => NumKind::Double,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Num::I32(n) => Value::Int32(n),
            Num::U32(n) => Value::UInt32(n),
            Num::I64(n) => Value::Int64(n),
            Num::U64(n) => Value::UInt64(n),
            Num::Dec(d) => Value::Decimal(d),
            Num::F64(d) => Value::Double(d),
        }
    }

    pub fn is_negative(self) -> bool {
        match self {
            Num::I32(n) => n < 0,
            Num::I64(n) => n < 0,
            Num::Dec(d) => d.is_sign_negative() && !d.is_zero(),
            Num::F64(d) => d < 0.0,
            Num::U32(_) | Num::U64(_) => false,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Num::I32(n) => n == 0,
            Num::U32(n) => n == 0,
            Num::I64(n) => n == 0,
            Num::U64(n) => n == 0,
            Num::Dec(d) => d.is_zero(),
            Num::F64(d) => d == 0.0,
        }
    }

    fn as_i128(self) -> Option<i128> {
        match self {
            Num::I32(n) => Some(i128::from(n)),
            Num::U32(n) => Some(i128::from(n)),
            Num::I64(n) => Some(i128::from(n)),
            Num::U64(n) => Some(i128::from(n)),
            Num::Dec(_) | Num::F64(_) => None,
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        reason = "promotion to double is lossy by definition"
    )]
    pub fn to_f64(self) -> f64 {
        match self {
            Num::I32(n) => f64::from(n),
            Num::U32(n) => f64::from(n),
            Num::I64(n) => n as f64,
            Num::U64(n) => n as f64,
            Num::Dec(d) => d.to_f64().unwrap_or(f64::NAN),
            Num::F64(d) => d,
        }
    }

    /// Integral value after banker's rounding; `None` for NaN, infinities
    /// and values beyond `i128`.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "float-to-int `as` saturates and the result is range checked"
    )]
    fn rounded_i128(self) -> Option<i128> {
        match self {
            Num::Dec(d) => d
                .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
                .to_i128(),
            Num::F64(d) if d.is_finite() => {
                let r = d.round_ties_even();
                (r.abs() < 1.0e38).then_some(r as i128)
            }
            Num::F64(_) => None,
            other => other.as_i128(),
        }
    }

    /// Convert to `kind`, rounding fractions to even. `None` when the value
    /// does not fit.
    pub fn convert_to(self, kind: NumKind) -> Option<Num> {
        if self.kind() == kind {
            return Some(self);
        }
        match kind {
            NumKind::Int32 => self.rounded_i128().and_then(|n| i32::try_from(n).ok()).map(Num::I32),
            NumKind::UInt32 => self.rounded_i128().and_then(|n| u32::try_from(n).ok()).map(Num::U32),
            NumKind::Int64 => self.rounded_i128().and_then(|n| i64::try_from(n).ok()).map(Num::I64),
            NumKind::UInt64 => self.rounded_i128().and_then(|n| u64::try_from(n).ok()).map(Num::U64),
            NumKind::Decimal => match self {
                Num::F64(d) => Decimal::from_f64(d).map(Num::Dec),
                Num::Dec(d) => Some(Num::Dec(d)),
                other => other.as_i128().and_then(Decimal::from_i128).map(Num::Dec),
            },
            NumKind::Double => Some(Num::F64(self.to_f64())),
        }
    }

    /// Exact numeric ordering across kinds.
    pub fn compare(self, other: Num) -> Option<Ordering> {
        match (self, other) {
            (Num::F64(_), _) | (_, Num::F64(_)) => self.to_f64().partial_cmp(&other.to_f64()),
            (Num::Dec(_), _) | (_, Num::Dec(_)) => {
                match (
                    self.convert_to(NumKind::Decimal)?,
                    other.convert_to(NumKind::Decimal)?,
                ) {
                    (Num::Dec(l), Num::Dec(r)) => Some(l.cmp(&r)),
                    _ => None,
                }
            }
            _ => Some(self.as_i128()?.cmp(&other.as_i128()?)),
        }
    }
}

/// Apply an arithmetic operator to two values already promoted to the same
/// kind.
pub fn arith(op: BinaryOp, left: Num, right: Num) -> Result<Num, EvalError> {
    macro_rules! int_arith {
        ($a:expr, $b:expr, $wrap:path) => {{
            let (a, b) = ($a, $b);
            let fallback = || Num::F64(double_arith(op, left.to_f64(), right.to_f64()));
            match op {
                BinaryOp::Add => Ok(a.checked_add(b).map_or_else(fallback, $wrap)),
                BinaryOp::Sub => Ok(a.checked_sub(b).map_or_else(fallback, $wrap)),
                BinaryOp::Mul => Ok(a.checked_mul(b).map_or_else(fallback, $wrap)),
                BinaryOp::Div if b == 0 => Err(divide_by_zero()),
                BinaryOp::Div => Ok(match (a.checked_rem(b), a.checked_div(b)) {
                    (Some(0), Some(q)) => $wrap(q),
                    _ => fallback(),
                }),
                BinaryOp::Rem if b == 0 => Err(divide_by_zero()),
                BinaryOp::Rem => Ok($wrap(a.checked_rem(b).unwrap_or(0))),
                _ => Err(arithmetic_overflow(op.as_symbol())),
            }
        }};
    }

    match (left, right) {
        (Num::I32(a), Num::I32(b)) => int_arith!(a, b, Num::I32),
        (Num::U32(a), Num::U32(b)) => int_arith!(a, b, Num::U32),
        (Num::I64(a), Num::I64(b)) => int_arith!(a, b, Num::I64),
        (Num::U64(a), Num::U64(b)) => int_arith!(a, b, Num::U64),
        (Num::Dec(a), Num::Dec(b)) => decimal_arith(op, a, b),
        (Num::F64(a), Num::F64(b)) => Ok(Num::F64(double_arith(op, a, b))),
        (l, r) => {
            let kind = l.kind().max(r.kind());
            match (l.convert_to(kind), r.convert_to(kind)) {
                (Some(l), Some(r)) if l.kind() == r.kind() => arith(op, l, r),
                _ => Ok(Num::F64(double_arith(op, l.to_f64(), r.to_f64()))),
            }
        }
    }
}

fn decimal_arith(op: BinaryOp, a: Decimal, b: Decimal) -> Result<Num, EvalError> {
    let in_double = || {
        Num::F64(double_arith(
            op,
            a.to_f64().unwrap_or(f64::NAN),
            b.to_f64().unwrap_or(f64::NAN),
        ))
    };
    match op {
        BinaryOp::Add => a
            .checked_add(b)
            .map(Num::Dec)
            .ok_or_else(|| arithmetic_overflow("decimal addition")),
        BinaryOp::Sub => a
            .checked_sub(b)
            .map(Num::Dec)
            .ok_or_else(|| arithmetic_overflow("decimal subtraction")),
        BinaryOp::Mul => Ok(a.checked_mul(b).map_or_else(in_double, Num::Dec)),
        BinaryOp::Div | BinaryOp::Rem if b.is_zero() => Err(divide_by_zero()),
        BinaryOp::Div => Ok(a.checked_div(b).map_or_else(in_double, Num::Dec)),
        BinaryOp::Rem => Ok(a.checked_rem(b).map_or_else(in_double, Num::Dec)),
        _ => Err(arithmetic_overflow(op.as_symbol())),
    }
}

fn double_arith(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => f64::NAN,
    }
}

/// Apply a bitwise or shift operator in integer kind `kind`.
///
/// Both operands are converted first; a fractional operand that does not
/// round into `kind` yields `None`. Shifts use only the left kind and mask
/// the count to the operand width.
pub fn bitwise(op: BinaryOp, left: Num, right: Num, kind: NumKind) -> Option<Num> {
    let l = left.convert_to(kind)?;
    if op.is_shift() {
        let count = right.convert_to(NumKind::Int64)?;
        let Num::I64(count) = count else { return None };
        let count = u32::try_from(count & i64::from(kind.shift_mask())).ok()?;
        return Some(match (op, l) {
            (BinaryOp::Shl, Num::I32(a)) => Num::I32(a.wrapping_shl(count)),
            (BinaryOp::Shl, Num::U32(a)) => Num::U32(a.wrapping_shl(count)),
            (BinaryOp::Shl, Num::I64(a)) => Num::I64(a.wrapping_shl(count)),
            (BinaryOp::Shl, Num::U64(a)) => Num::U64(a.wrapping_shl(count)),
            (_, Num::I32(a)) => Num::I32(a >> count),
            (_, Num::U32(a)) => Num::U32(a >> count),
            (_, Num::I64(a)) => Num::I64(a >> count),
            (_, Num::U64(a)) => Num::U64(a >> count),
            _ => return None,
        });
    }
    let r = right.convert_to(kind)?;
    macro_rules! bits {
        ($a:expr, $b:expr, $wrap:path) => {
            match op {
                BinaryOp::BitAnd => Some($wrap($a & $b)),
                BinaryOp::BitOr => Some($wrap($a | $b)),
                BinaryOp::BitXor => Some($wrap($a ^ $b)),
                _ => None,
            }
        };
    }
    match (l, r) {
        (Num::I32(a), Num::I32(b)) => bits!(a, b, Num::I32),
        (Num::U32(a), Num::U32(b)) => bits!(a, b, Num::U32),
        (Num::I64(a), Num::I64(b)) => bits!(a, b, Num::I64),
        (Num::U64(a), Num::U64(b)) => bits!(a, b, Num::U64),
        _ => None,
    }
}

/// `-x`, `+x` and `-bnot x` on a numeric operand. `None` for `-not`
/// (a truthiness operator) and for `-bnot` on a fractional value that
/// doesn't round into `Int64`.
pub fn unary(op: UnaryOp, value: Num) -> Option<Num> {
    match op {
        UnaryOp::Neg => Some(match value {
            Num::I32(n) => n.checked_neg().map_or(Num::I64(-i64::from(n)), Num::I32),
            Num::U32(n) => Num::I64(-i64::from(n)),
            Num::I64(n) => n.checked_neg().map_or(Num::F64(-value.to_f64()), Num::I64),
            Num::U64(n) => Num::Dec(-Decimal::from(n)),
            Num::Dec(d) => Num::Dec(-d),
            Num::F64(d) => Num::F64(-d),
        }),
        UnaryOp::Plus => Some(value),
        UnaryOp::BitNot => match value.convert_to(value.kind().for_bitwise())? {
            Num::I32(n) => Some(Num::I32(!n)),
            Num::U32(n) => Some(Num::U32(!n)),
            Num::I64(n) => Some(Num::I64(!n)),
            Num::U64(n) => Some(Num::U64(!n)),
            _ => None,
        },
        UnaryOp::Not => None,
    }
}
