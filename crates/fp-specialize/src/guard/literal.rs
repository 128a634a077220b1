//! Integer literal parsing for guard expressions.
//!
//! Decimal, hexadecimal (`0x`), binary (`0b`) and octal (`0o` or a leading
//! `0`) notations denote the same value: `20`, `0x14`, `024` and `0b10100`
//! all parse to `Value::Int(20)`.

use crate::value::Value;

/// Parse an integer literal into an `int` value, or a `long` when it does not
/// fit in 32 bits or carries an `L` suffix.
pub fn parse_int_literal(text: &str) -> Result<Value, String> {
    let trimmed = text.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (body, long_suffix) = match unsigned.strip_suffix(|c: char| c == 'l' || c == 'L') {
        Some(body) => (body, true),
        None => (unsigned, false),
    };
    if body.starts_with('_') || body.ends_with('_') {
        return Err(format!("malformed integer literal `{}`", text));
    }
    let cleaned: String = body.chars().filter(|c| *c != '_').collect();
    let lowered = cleaned.to_ascii_lowercase();

    let (radix, digits) = if let Some(rest) = lowered.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lowered.strip_prefix("0b") {
        (2, rest)
    } else if let Some(rest) = lowered.strip_prefix("0o") {
        (8, rest)
    } else if lowered.len() > 1 && lowered.starts_with('0') {
        (8, &lowered[1..])
    } else {
        (10, lowered.as_str())
    };

    if digits.is_empty() {
        return Err(format!("malformed integer literal `{}`", text));
    }

    let magnitude = u64::from_str_radix(digits, radix)
        .map_err(|err| format!("malformed integer literal `{}`: {}", text, err))?;

    let value = if negative {
        if magnitude > i64::MAX as u64 + 1 {
            return Err(format!("integer literal `{}` is out of range", text));
        }
        (magnitude as i64).wrapping_neg()
    } else {
        i64::try_from(magnitude)
            .map_err(|_| format!("integer literal `{}` is out of range", text))?
    };

    match i32::try_from(value) {
        Ok(v) if !long_suffix => Ok(Value::Int(v)),
        _ => Ok(Value::Long(value)),
    }
}
