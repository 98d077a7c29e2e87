use serde_json::{Map, Value};
use thiserror::Error;

use super::VariableStore;

/// How many levels of variables-inside-variables are followed before giving up.
pub const MAX_DEPTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstituteError {
    #[error("undefined variable: {0}")]
    Unresolved(String),
    #[error("variable {0} nests more than {max} levels deep", max = MAX_DEPTH)]
    DepthExceeded(String),
    #[error("invalid variable name: {0}")]
    InvalidName(String),
}

impl SubstituteError {
    pub fn variable(&self) -> &str {
        match self {
            Self::Unresolved(name) | Self::DepthExceeded(name) | Self::InvalidName(name) => name,
        }
    }
}

/// Replaces every `{{name}}` in `input` with its value from `vars`.
///
/// `\{{` produces a literal `{{`, and `\\{{` a backslash followed by the
/// expanded marker. Other backslashes are kept as written. A single `{` is
/// never treated as a marker, so JSON text and regex quantifiers pass through
/// untouched.
pub fn expand_placeholders(input: &str, vars: &VariableStore) -> Result<String, SubstituteError> {
    expand_at_depth(input, vars, 0)
}

fn expand_at_depth(
    input: &str,
    vars: &VariableStore,
    depth: usize,
) -> Result<String, SubstituteError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find(['\\', '{']) {
        output.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix('\\') {
            if let Some(escaped) = after.strip_prefix("{{") {
                output.push_str("{{");
                rest = escaped;
            } else if after.starts_with("\\{{") {
                output.push('\\');
                rest = &after[1..];
            } else {
                output.push('\\');
                rest = after;
            }
            continue;
        }

        let Some(inner) = tail.strip_prefix("{{") else {
            output.push('{');
            rest = &tail[1..];
            continue;
        };
        let Some(end) = inner.find("}}") else {
            output.push_str(tail);
            rest = "";
            break;
        };

        let key = inner[..end].trim();
        if !key.chars().next().is_some_and(is_start_char) {
            output.push_str("{{");
            rest = inner;
            continue;
        }
        if !is_valid_key(key) {
            return Err(SubstituteError::InvalidName(key.to_string()));
        }

        let value = vars
            .get(key)
            .ok_or_else(|| SubstituteError::Unresolved(key.to_string()))?;
        if value.contains("{{") {
            if depth >= MAX_DEPTH {
                return Err(SubstituteError::DepthExceeded(key.to_string()));
            }
            output.push_str(&expand_at_depth(value, vars, depth + 1)?);
        } else {
            output.push_str(value);
        }
        rest = &inner[end + 2..];
    }

    output.push_str(rest);
    Ok(output)
}

/// Substitutes inside every string leaf of `value`, keeping its shape.
pub fn substitute_value(value: &Value, vars: &VariableStore) -> Result<Value, SubstituteError> {
    match value {
        Value::String(text) => expand_placeholders(text, vars).map(Value::String),
        Value::Array(items) => items
            .iter()
            .map(|item| substitute_value(item, vars))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key.clone(), substitute_value(item, vars)?);
            }
            Ok(Value::Object(out))
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(value.clone()),
    }
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if is_start_char(c) => {}
        _ => return false,
    }

    chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'))
}

fn is_start_char(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}
