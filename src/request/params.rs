use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded::byte_serialize;

use crate::bundle::RawParams;
use crate::value::scalar_text;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub value: Option<Value>,
}

impl Param {
    pub fn new(name: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Common params whose names the request does not use, then the request's
/// params in written order.
pub fn merge_params(common: Option<&RawParams>, request: Option<&RawParams>) -> Vec<Param> {
    let request_entries = request.map(|p| p.entries()).unwrap_or_default();
    let overridden: HashSet<&str> = request_entries
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();

    let mut merged: Vec<Param> = common
        .map(|p| p.entries())
        .unwrap_or_default()
        .into_iter()
        .filter(|(name, _)| !overridden.contains(name.as_str()))
        .map(|(name, value)| Param::new(name, value))
        .collect();

    merged.extend(
        request_entries
            .iter()
            .map(|(name, value)| Param::new(name.clone(), value.clone())),
    );
    merged
}

/// Serializes params into a query string without the leading `?`.
///
/// In raw mode list values repeat the key and nothing is percent-encoded;
/// otherwise list values are comma-joined and every part is encoded.
pub fn query_string(params: &[Param], raw: bool) -> String {
    let mut pairs = Vec::new();

    for param in params {
        let Some(value) = &param.value else {
            continue;
        };

        match value {
            Value::Array(items) => {
                let values: Vec<String> = items
                    .iter()
                    .filter(|item| !item.is_null())
                    .map(scalar_text)
                    .collect();
                if values.is_empty() {
                    continue;
                }
                if raw {
                    pairs.extend(values.iter().map(|v| format!("{}={}", param.name, v)));
                } else {
                    let joined = values
                        .iter()
                        .map(|v| encode(v))
                        .collect::<Vec<_>>()
                        .join(",");
                    pairs.push(format!("{}={}", encode(&param.name), joined));
                }
            }
            Value::Null => {}
            scalar => {
                let text = scalar_text(scalar);
                if raw {
                    pairs.push(format!("{}={}", param.name, text));
                } else {
                    pairs.push(format!("{}={}", encode(&param.name), encode(&text)));
                }
            }
        }
    }

    pairs.join("&")
}

/// Joins base URL, path and query. URLs that carry their own scheme ignore
/// the base URL.
pub fn build_url(base_url: Option<&str>, url: &str, query: &str) -> String {
    let mut full = if url.contains("://") {
        url.to_string()
    } else {
        format!("{}{}", base_url.unwrap_or_default(), url)
    };

    if !query.is_empty() {
        full.push(if full.contains('?') { '&' } else { '?' });
        full.push_str(query);
    }
    full
}

fn encode(text: &str) -> String {
    byte_serialize(text.as_bytes()).collect()
}
