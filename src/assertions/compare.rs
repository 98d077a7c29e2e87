use std::cmp::Ordering;

use serde_json::Value;

use crate::value::scalar_text;

/// String form used by equality checks. `None` (absent) stays absent so it
/// never equals anything.
pub(super) fn normalized(value: Option<&Value>) -> Option<String> {
    value.map(scalar_text)
}

/// Objects, arrays and null become their JSON text; other scalars are kept.
pub(super) fn stringify_compound(value: &Value) -> Value {
    match value {
        Value::Null | Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        scalar => scalar.clone(),
    }
}

/// Loose ordering: two strings compare as text, anything else is coerced to
/// numbers. Pairs that cannot be ordered give `None`.
pub(super) fn loose_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Some(a.cmp(b));
    }
    to_number(left)?.partial_cmp(&to_number(right)?)
}

fn to_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Null => 0.0,
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        Value::Number(n) => n.as_f64()?,
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().ok()?
            }
        }
        Value::Array(_) | Value::Object(_) => return None,
    };
    (!number.is_nan()).then_some(number)
}

/// Run-time category name reported by `$type`.
pub(super) fn type_name(value: Option<&Value>) -> &'static str {
    match value {
        None => "undefined",
        Some(Value::Null) => "null",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
        Some(Value::String(_)) => "string",
        Some(Value::Number(_)) => "number",
        Some(Value::Bool(_)) => "boolean",
    }
}

/// Key count, character count or element count; `None` for anything else.
pub(super) fn value_len(value: Option<&Value>) -> Option<usize> {
    match value? {
        Value::Object(map) => Some(map.len()),
        Value::Array(items) => Some(items.len()),
        Value::String(text) => Some(text.chars().count()),
        _ => None,
    }
}

pub(super) fn display(value: Option<&Value>) -> String {
    value.map(scalar_text).unwrap_or_else(|| "undefined".to_string())
}
