//! Invariant numeric parsing and numeric coercion helpers

use objmap_ir::Value;

/// Validate invariant number text and drop its grouping separators
///
/// Accepts surrounding whitespace, a leading sign, `,` thousands separators
/// in the integral part, and a single `.` decimal point.
fn normalize(text: &str) -> Option<String> {
    let text = text.trim();
    let (sign, body) = match text.as_bytes().first()? {
        b'-' => ("-", &text[1..]),
        b'+' => ("", &text[1..]),
        _ => ("", text),
    };

    let (integral, fraction) = match body.split_once('.') {
        Some((integral, fraction)) => (integral, Some(fraction)),
        None => (body, None),
    };

    if integral.starts_with(',') || integral.ends_with(',') {
        return None;
    }
    if !integral.chars().all(|c| c.is_ascii_digit() || c == ',') {
        return None;
    }
    let digits: String = integral.chars().filter(char::is_ascii_digit).collect();

    let mut normalized = String::from(sign);
    match fraction {
        Some(fraction) => {
            if !fraction.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            if digits.is_empty() && fraction.is_empty() {
                return None;
            }
            normalized.push_str(if digits.is_empty() { "0" } else { &digits });
            if !fraction.is_empty() {
                normalized.push('.');
                normalized.push_str(fraction);
            }
        }
        None => {
            if digits.is_empty() {
                return None;
            }
            normalized.push_str(&digits);
        }
    }
    Some(normalized)
}

/// Parse invariant text as a floating-point number
#[must_use]
pub fn parse_f64(text: &str) -> Option<f64> {
    normalize(text)?.parse::<f64>().ok()
}

/// Parse invariant text as an integer; a fractional part must be all zeros
#[must_use]
pub fn parse_i64(text: &str) -> Option<i64> {
    let normalized = normalize(text)?;
    let integral = match normalized.split_once('.') {
        Some((integral, fraction)) if fraction.chars().all(|c| c == '0') => integral,
        Some(_) => return None,
        None => normalized.as_str(),
    };
    integral.parse::<i64>().ok()
}

/// Round half to even into the `i64` range
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn f64_to_i64(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round_ties_even();
    // 2^63 is exactly representable; anything at or above it overflows
    if rounded < -9_223_372_036_854_775_808.0 || rounded >= 9_223_372_036_854_775_808.0 {
        return None;
    }
    Some(rounded as i64)
}

/// Numeric view of a value, for numeric-to-numeric coercion
#[allow(clippy::cast_precision_loss)]
pub(crate) fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int32(i) => Some(f64::from(*i)),
        Value::Int64(i) => Some(*i as f64),
        Value::Float(f) | Value::Decimal(f) => Some(*f),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Enum(e) => Some(e.value() as f64),
        _ => None,
    }
}

/// Integral view of a value, rounding floats half to even
pub(crate) fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Int32(i) => Some(i64::from(*i)),
        Value::Int64(i) => Some(*i),
        Value::Float(f) | Value::Decimal(f) => f64_to_i64(*f),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Enum(e) => Some(e.value()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_thousands_and_decimal_point() {
        assert_eq!(parse_f64("1,234.56"), Some(1234.56));
        assert_eq!(parse_f64("  -12.5 "), Some(-12.5));
        assert_eq!(parse_f64("+.5"), Some(0.5));
        assert_eq!(parse_f64("7."), Some(7.0));
    }

    #[test]
    fn test_parse_rejects_malformed_text() {
        assert_eq!(parse_f64("abc"), None);
        assert_eq!(parse_f64(""), None);
        assert_eq!(parse_f64(",123"), None);
        assert_eq!(parse_f64("1.2.3"), None);
        assert_eq!(parse_f64("1.2,3"), None);
        assert_eq!(parse_f64("."), None);
        assert_eq!(parse_f64("1e5"), None);
    }

    #[test]
    fn test_parse_integers() {
        assert_eq!(parse_i64("1,234"), Some(1234));
        assert_eq!(parse_i64("-42"), Some(-42));
        assert_eq!(parse_i64("12.00"), Some(12));
        assert_eq!(parse_i64("12.5"), None);
        assert_eq!(parse_i64("99999999999999999999"), None);
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(f64_to_i64(2.5), Some(2));
        assert_eq!(f64_to_i64(3.5), Some(4));
        assert_eq!(f64_to_i64(-1.5), Some(-2));
        assert_eq!(f64_to_i64(f64::NAN), None);
        assert_eq!(f64_to_i64(1e19), None);
    }
}
