//! String-to-number parsing.
//!
//! Accepts the numeric literal forms a script can write: optional sign,
//! `0x` hex, decimal digits with fraction and exponent, a type suffix
//! (`l` long, `u` unsigned, `d` decimal) and a binary multiplier suffix
//! (`kb`, `mb`, `gb`, `tb`, `pb`). Surrounding whitespace is ignored and an
//! empty string is zero.

use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::numeric::{Num, NumKind};

#[derive(Copy, Clone, PartialEq, Eq)]
enum Suffix {
    None,
    Long,
    Unsigned,
    Decimal,
}

enum Parsed {
    Int(i128),
    Dec(Decimal),
    Double(f64),
}

/// Parse `text` as a number.
///
/// `hint` is the kind of the other operand: a fractional literal parses as
/// decimal when the other side is decimal, so no precision is lost on the
/// way to a decimal operation.
pub fn parse_number(text: &str, hint: Option<NumKind>) -> Option<Num> {
    let s = text.trim();
    if s.is_empty() {
        return Some(Num::I32(0));
    }
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (s, multiplier) = split_multiplier(s);
    let (body, suffix, hex) = split_suffix(s);
    if body.is_empty() {
        return None;
    }

    let parsed = if hex {
        Parsed::Int(i128::from(u64::from_str_radix(body, 16).ok()?))
    } else {
        parse_decimal_body(body, suffix, hint)?
    };
    let parsed = apply_sign(parsed, negative)?;
    let parsed = apply_multiplier(parsed, multiplier)?;
    finish(parsed, suffix)
}

fn split_multiplier(s: &str) -> (&str, u32) {
    const UNITS: [(&str, u32); 5] = [("kb", 1), ("mb", 2), ("gb", 3), ("tb", 4), ("pb", 5)];
    if s.len() > 2 && s.is_char_boundary(s.len() - 2) {
        let (head, tail) = s.split_at(s.len() - 2);
        for (unit, power) in UNITS {
            if tail.eq_ignore_ascii_case(unit) {
                return (head, power);
            }
        }
    }
    (s, 0)
}

fn split_suffix(s: &str) -> (&str, Suffix, bool) {
    let hex = s.len() > 2 && (s.starts_with("0x") || s.starts_with("0X"));
    let digits = if hex { &s[2..] } else { s };
    let lower = digits.to_ascii_lowercase();
    let (len, suffix) = if lower.ends_with("ul") || lower.ends_with("lu") {
        (digits.len() - 2, Suffix::Unsigned)
    } else if lower.ends_with('l') {
        (digits.len() - 1, Suffix::Long)
    } else if lower.ends_with('u') {
        (digits.len() - 1, Suffix::Unsigned)
    } else if lower.ends_with('d') && !hex {
        (digits.len() - 1, Suffix::Decimal)
    } else {
        (digits.len(), Suffix::None)
    };
    (&digits[..len], suffix, hex)
}

fn parse_decimal_body(body: &str, suffix: Suffix, hint: Option<NumKind>) -> Option<Parsed> {
    let first = body.as_bytes().first()?;
    if !(first.is_ascii_digit() || *first == b'.') {
        return None;
    }
    let mut seen_dot = false;
    let mut seen_exp = false;
    let mut prev = 0u8;
    for &b in body.as_bytes() {
        match b {
            b'0'..=b'9' => {}
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if !seen_exp => seen_exp = true,
            b'+' | b'-' if matches!(prev, b'e' | b'E') => {}
            _ => return None,
        }
        prev = b;
    }

    if !seen_dot && !seen_exp {
        return match body.parse::<i128>() {
            Ok(n) => Some(Parsed::Int(n)),
            Err(_) => body.parse::<f64>().ok().map(Parsed::Double),
        };
    }
    if suffix == Suffix::Decimal || hint == Some(NumKind::Decimal) {
        let dec = if seen_exp {
            Decimal::from_scientific(body).ok()
        } else {
            Decimal::from_str(body).ok()
        };
        if let Some(d) = dec {
            return Some(Parsed::Dec(d));
        }
    }
    body.parse::<f64>().ok().map(Parsed::Double)
}

fn apply_sign(parsed: Parsed, negative: bool) -> Option<Parsed> {
    if !negative {
        return Some(parsed);
    }
    Some(match parsed {
        Parsed::Int(n) => Parsed::Int(n.checked_neg()?),
        Parsed::Dec(d) => Parsed::Dec(-d),
        Parsed::Double(d) => Parsed::Double(-d),
    })
}

fn apply_multiplier(parsed: Parsed, power: u32) -> Option<Parsed> {
    if power == 0 {
        return Some(parsed);
    }
    let factor = 1024_i128.pow(power);
    Some(match parsed {
        Parsed::Int(n) => Parsed::Int(n.checked_mul(factor)?),
        Parsed::Dec(d) => Parsed::Dec(d.checked_mul(Decimal::from_i128(factor)?)?),
        Parsed::Double(d) => Parsed::Double(d * 1024_f64.powi(i32::try_from(power).ok()?)),
    })
}

fn finish(parsed: Parsed, suffix: Suffix) -> Option<Num> {
    match (parsed, suffix) {
        (Parsed::Int(n), Suffix::None) => Some(smallest_int(n)),
        (Parsed::Int(n), Suffix::Long) => i64::try_from(n).ok().map(Num::I64),
        (Parsed::Int(n), Suffix::Unsigned) => u32::try_from(n)
            .ok()
            .map(Num::U32)
            .or_else(|| u64::try_from(n).ok().map(Num::U64)),
        (Parsed::Int(n), Suffix::Decimal) => Decimal::from_i128(n).map(Num::Dec),
        (Parsed::Dec(d), Suffix::None | Suffix::Decimal) => Some(Num::Dec(d)),
        (Parsed::Double(d), Suffix::None) => Some(Num::F64(d)),
        (Parsed::Double(d), Suffix::Decimal) => Decimal::from_f64(d).map(Num::Dec),
        (Parsed::Dec(d), Suffix::Long) => d.to_i64().map(Num::I64),
        (Parsed::Double(d), suffix) => Num::F64(d).convert_to(match suffix {
            Suffix::Long => NumKind::Int64,
            _ => NumKind::UInt64,
        }),
        (Parsed::Dec(d), Suffix::Unsigned) => Num::Dec(d).convert_to(NumKind::UInt64),
    }
}

/// `Int32`, then `Int64`, then `Decimal`, then `Double`.
#[expect(clippy::cast_precision_loss, reason = "beyond decimal range a double is the only fit")]
fn smallest_int(n: i128) -> Num {
    if let Ok(v) = i32::try_from(n) {
        Num::I32(v)
    } else if let Ok(v) = i64::try_from(n) {
        Num::I64(v)
    } else if let Some(d) = Decimal::from_i128(n) {
        Num::Dec(d)
    } else {
        Num::F64(n as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_integers_pick_smallest_kind() {
        assert_eq!(parse_number("3", None), Some(Num::I32(3)));
        assert_eq!(parse_number(" -42 ", None), Some(Num::I32(-42)));
        assert_eq!(parse_number("3000000000", None), Some(Num::I64(3_000_000_000)));
        assert_eq!(parse_number("", None), Some(Num::I32(0)));
    }

    #[test]
    fn test_fractions_and_exponents() {
        assert_eq!(parse_number("1.5", None), Some(Num::F64(1.5)));
        assert_eq!(parse_number("1e3", None), Some(Num::F64(1000.0)));
        assert_eq!(parse_number(".25", None), Some(Num::F64(0.25)));
        assert_eq!(
            parse_number("1.5", Some(NumKind::Decimal)),
            Some(Num::Dec(Decimal::new(15, 1)))
        );
    }

    #[test]
    fn test_hex_and_suffixes() {
        assert_eq!(parse_number("0x1F", None), Some(Num::I32(31)));
        assert_eq!(parse_number("0xFFd", None), Some(Num::I32(0xFFD)));
        assert_eq!(parse_number("7l", None), Some(Num::I64(7)));
        assert_eq!(parse_number("7u", None), Some(Num::U32(7)));
        assert_eq!(parse_number("7d", None), Some(Num::Dec(Decimal::from(7))));
        assert_eq!(parse_number("2kb", None), Some(Num::I32(2048)));
        assert_eq!(parse_number("1.5KB", None), Some(Num::F64(1536.0)));
        assert_eq!(parse_number("1gb", None), Some(Num::I32(1 << 30)));
    }

    #[test]
    fn test_rejects_non_numbers() {
        assert_eq!(parse_number("abc", None), None);
        assert_eq!(parse_number("1.2.3", None), None);
        assert_eq!(parse_number("inf", None), None);
        assert_eq!(parse_number("-", None), None);
        assert_eq!(parse_number("12abc", None), None);
    }

    #[test]
    fn test_multibyte_tail_is_not_a_multiplier() {
        assert_eq!(parse_number("1€", None), None);
        assert_eq!(parse_number("a€", None), None);
        assert_eq!(parse_number("12ü", None), None);
        assert_eq!(parse_number("€kb", None), None);
    }

    #[test]
    fn test_integers_beyond_decimal_range_keep_magnitude() {
        let big = "100000000000000000000000000000000";
        assert_eq!(parse_number(big, None), Some(Num::F64(1e32)));
        let bigger = "170000000000000000000000000000000000000";
        assert_eq!(parse_number(bigger, None), Some(Num::F64(1.7e38)));
        assert_eq!(parse_number("-100000000000000000000000000000000", None), Some(Num::F64(-1e32)));
    }
}
