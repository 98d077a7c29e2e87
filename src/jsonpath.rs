use serde_json::Value;
use serde_json_path::JsonPath;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsonPathError {
    #[error("Error while evaluating JSONPath {path}: {message}")]
    Invalid { path: String, message: String },
    #[error("Error while evaluating JSONPath {path}: response body is not JSON")]
    NotJson { path: String },
}

/// First node matched by `path`, or `None` when nothing matches.
pub fn query_first(root: Option<&Value>, path: &str) -> Result<Option<Value>, JsonPathError> {
    let root = root.ok_or_else(|| JsonPathError::NotJson {
        path: path.to_string(),
    })?;
    let compiled = JsonPath::parse(path).map_err(|err| JsonPathError::Invalid {
        path: path.to_string(),
        message: err.to_string(),
    })?;

    Ok(compiled.query(root).first().cloned())
}
