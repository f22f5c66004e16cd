use serde_json::Value;

// Anything smaller than this is treated as a zero denominator.
const EPSILON: f64 = 0.000001;

/// Parse an upstream cell as an integer, the way `parseInt(String(v), 10)` reads it:
/// leading whitespace, optional sign, then as many decimal digits as there are.
pub fn safe_parse_int(value: Option<&Value>, fallback: i64) -> i64 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => f.trunc() as i64,
                    _ => fallback,
                }
            }
        }
        Some(Value::String(s)) => parse_int_prefix(s).unwrap_or(fallback),
        _ => fallback,
    }
}

/// Parse an upstream cell as a float, reading the longest numeric prefix of its text.
/// Non-finite results collapse to `fallback`.
pub fn safe_parse_float(value: Option<&Value>, fallback: f64) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_float_prefix(s),
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() => f,
        _ => fallback,
    }
}

pub fn safe_divide(numerator: f64, denominator: f64, fallback: f64) -> f64 {
    if numerator.is_nan() || denominator.is_nan() {
        return fallback;
    }
    if denominator.abs() < EPSILON {
        return fallback;
    }

    let result = numerator / denominator;
    if result.is_finite() {
        result
    } else {
        fallback
    }
}

pub fn safe_average(values: &[f64], fallback: f64) -> f64 {
    if values.is_empty() {
        return fallback;
    }

    let sum: f64 = values
        .iter()
        .map(|v| if v.is_finite() { *v } else { 0.0 })
        .sum();
    safe_divide(sum, values.len() as f64, fallback)
}

/// Sum of counts that clamps at the i64 range instead of overflowing.
pub fn saturating_sum<I>(values: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    values.into_iter().fold(0, i64::saturating_add)
}

/// Fixed-point text with halves rounded away from zero (`1.25` -> `"1.3"`),
/// unlike `{:.N}` which rounds halves to even.
pub fn to_fixed(value: f64, decimals: usize) -> String {
    let factor = 10f64.powi(decimals as i32);
    let scaled = (value * factor).round();
    let rounded = if scaled.is_finite() { scaled / factor } else { value };
    // `+ 0.0` turns a rounded negative zero into "0".
    format!("{:.*}", decimals, rounded + 0.0)
}

/// JS truthiness of a cell: present and not null, false, 0 or "".
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Text of a cell for identity-like columns (addresses, token types, hours).
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    // Saturate instead of overflowing on absurdly long digit runs.
    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }

    // Exponent only counts when at least one digit follows it.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'-' || bytes[exp_end] == b'+') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_int_reads_leading_digits() {
        assert_eq!(safe_parse_int(Some(&json!("42")), 0), 42);
        assert_eq!(safe_parse_int(Some(&json!("  -17abc")), 0), -17);
        assert_eq!(safe_parse_int(Some(&json!("12.9")), 0), 12);
        assert_eq!(safe_parse_int(Some(&json!(12.9)), 0), 12);
        assert_eq!(safe_parse_int(Some(&json!(1234567)), 0), 1234567);
    }

    #[test]
    fn parse_int_falls_back_on_garbage() {
        assert_eq!(safe_parse_int(None, 7), 7);
        assert_eq!(safe_parse_int(Some(&Value::Null), 7), 7);
        assert_eq!(safe_parse_int(Some(&json!("abc")), 7), 7);
        assert_eq!(safe_parse_int(Some(&json!("")), 7), 7);
        assert_eq!(safe_parse_int(Some(&json!(true)), 7), 7);
        assert_eq!(safe_parse_int(Some(&json!({"a": 1})), 7), 7);
    }

    #[test]
    fn parse_float_reads_numeric_prefix() {
        assert_eq!(safe_parse_float(Some(&json!("3.25")), 0.0), 3.25);
        assert_eq!(safe_parse_float(Some(&json!("1.5e3 APT")), 0.0), 1500.0);
        assert_eq!(safe_parse_float(Some(&json!(".5")), 0.0), 0.5);
        assert_eq!(safe_parse_float(Some(&json!("7e")), 0.0), 7.0);
        assert_eq!(safe_parse_float(Some(&json!(0.0004)), 0.0), 0.0004);
    }

    #[test]
    fn parse_float_falls_back_on_garbage() {
        assert_eq!(safe_parse_float(None, 1.5), 1.5);
        assert_eq!(safe_parse_float(Some(&Value::Null), 1.5), 1.5);
        assert_eq!(safe_parse_float(Some(&json!("NaN")), 1.5), 1.5);
        assert_eq!(safe_parse_float(Some(&json!("Infinity")), 1.5), 1.5);
        assert_eq!(safe_parse_float(Some(&json!("-")), 1.5), 1.5);
        assert_eq!(safe_parse_float(Some(&json!("1e999")), 1.5), 1.5);
    }

    #[test]
    fn divide_guards_near_zero_denominators() {
        assert_eq!(safe_divide(10.0, 0.0, -1.0), -1.0);
        assert_eq!(safe_divide(10.0, 1e-9, -1.0), -1.0);
        assert_eq!(safe_divide(-3.0, -1e-7, 2.0), 2.0);
        assert_eq!(safe_divide(f64::NAN, 2.0, 2.0), 2.0);
        assert_eq!(safe_divide(f64::MAX, 1e-5, 4.0), 4.0);
        assert_eq!(safe_divide(10.0, 4.0, 0.0), 2.5);
    }

    #[test]
    fn average_handles_empty_and_non_finite() {
        assert_eq!(safe_average(&[], 9.0), 9.0);
        assert_eq!(safe_average(&[2.0, 4.0], 0.0), 3.0);
        assert_eq!(safe_average(&[f64::INFINITY, 4.0], 0.0), 2.0);
        assert_eq!(safe_average(&[f64::NAN, f64::NAN], 0.0), 0.0);
    }

    #[test]
    fn counts_sum_without_overflow() {
        assert_eq!(saturating_sum([1, 2, 3]), 6);
        assert_eq!(saturating_sum(Vec::<i64>::new()), 0);
        assert_eq!(saturating_sum([i64::MAX, i64::MAX]), i64::MAX);
        assert_eq!(saturating_sum([i64::MIN, -1]), i64::MIN);
    }

    #[test]
    fn fixed_point_rounds_halves_away_from_zero() {
        assert_eq!(to_fixed(1.25, 1), "1.3");
        assert_eq!(to_fixed(2.25, 1), "2.3");
        assert_eq!(to_fixed(-2.25, 1), "-2.3");
        assert_eq!(to_fixed(0.5, 0), "1");
        assert_eq!(to_fixed(-0.04, 1), "0.0");
        assert_eq!(to_fixed(4.0, 2), "4.00");
    }

    #[test]
    fn truthiness_matches_js() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(is_truthy(Some(&json!("0"))));
        assert!(is_truthy(Some(&json!(0.5))));
    }
}
