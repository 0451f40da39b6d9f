use serde_json::{Map, Value};
use vendo_common::Money;

/// Providers are inconsistent about key casing, so lookups take the preferred key plus
/// fallbacks and coerce scalars to text.
pub fn pick_string(data: &Map<String, Value>, keys: &[&str]) -> String {
    for key in keys {
        match data.get(*key) {
            Some(Value::String(s)) => return s.clone(),
            Some(Value::Number(n)) => return n.to_string(),
            Some(Value::Bool(b)) => return b.to_string(),
            Some(Value::Null) | None => continue,
            Some(other) => return other.to_string(),
        }
    }
    String::new()
}

pub fn pick_i64(data: &Map<String, Value>, keys: &[&str]) -> i64 {
    for key in keys {
        match data.get(*key) {
            Some(Value::Number(n)) => {
                if let Some(v) = n.as_i64() {
                    return v;
                }
                #[allow(clippy::cast_possible_truncation)]
                if let Some(v) = n.as_f64() {
                    return v as i64;
                }
            },
            Some(Value::String(s)) => {
                if let Ok(v) = s.trim().parse::<i64>() {
                    return v;
                }
            },
            _ => continue,
        }
    }
    0
}

/// Normalizes a wire amount ("15", "15.0001") to cents, rounding to two decimals the way the
/// providers themselves quote amounts. Unparseable input is `None`.
pub fn parse_wire_amount(raw: &str) -> Option<Money> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value = trimmed.parse::<f64>().ok()?;
    if !value.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    Some(Money::from_cents((value * 100.0).round() as i64))
}
