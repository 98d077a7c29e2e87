use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::client::{HttpResponse, TransportError};

/// Placeholder carried instead of a response when the call never produced one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseError {
    pub name: String,
    pub message: String,
}

/// The uniform shape every execution ends in, whether the call succeeded,
/// returned an error status, or failed outright.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    #[serde(rename = "executionTime")]
    pub execution_time_ms: f64,
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    pub body: String,
    pub headers: IndexMap<String, String>,
    pub json: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl ResponseData {
    pub fn from_http(response: HttpResponse) -> Self {
        let headers = normalize_headers(response.headers);
        let json = parse_json_body(headers.get("content-type").map(String::as_str), &response.body);

        Self {
            execution_time_ms: 0.0,
            status: Some(response.status),
            status_text: response.status_text,
            body: response.body,
            headers,
            json,
            error: None,
        }
    }

    pub fn failed(error: TransportError) -> Self {
        Self {
            error: Some(ResponseError {
                name: error.name,
                message: error.message,
            }),
            ..Self::default()
        }
    }

    /// Stamps the time taken from sending until the response was normalized.
    pub fn timed(mut self, elapsed: Duration) -> Self {
        self.execution_time_ms = elapsed.as_secs_f64() * 1000.0;
        self
    }

    /// A response that only carries a JSON document, used to run nested tests
    /// against a value taken from a real response.
    pub fn synthetic(json: Option<Value>) -> Self {
        Self {
            json,
            ..Self::default()
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Outcome of handing one request to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Completed(ResponseData),
    Cancelled,
}

fn normalize_headers(headers: Vec<(String, String)>) -> IndexMap<String, String> {
    let mut normalized: IndexMap<String, String> = IndexMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = name.to_ascii_lowercase();
        match normalized.get_mut(&name) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => {
                normalized.insert(name, value);
            }
        }
    }
    normalized
}

fn parse_json_body(content_type: Option<&str>, body: &str) -> Option<Value> {
    let looks_json = match content_type {
        Some(kind) => kind.to_ascii_lowercase().contains("json"),
        None => true,
    };
    if !looks_json || body.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(error = %err, "response body is not valid JSON");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn http(headers: &[(&str, &str)], body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            status_text: Some("OK".to_string()),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_string(),
        }
    }

    #[test]
    fn from_http_parses_json_bodies() {
        let response = ResponseData::from_http(
            http(&[("Content-Type", "application/json; charset=utf-8")], r#"{"id":3}"#),
        )
        .timed(Duration::from_millis(12));
        assert_eq!(response.json, Some(json!({"id": 3})));
        assert_eq!(response.execution_time_ms, 12.0);
        assert_eq!(response.header("content-type"), Some("application/json; charset=utf-8"));
    }

    #[test]
    fn from_http_skips_non_json_content() {
        let response = ResponseData::from_http(
            http(&[("content-type", "text/plain")], r#"{"id":3}"#),
        );
        assert_eq!(response.json, None);
        assert_eq!(response.body, r#"{"id":3}"#);
    }

    #[test]
    fn from_http_sniffs_json_without_content_type() {
        let response = ResponseData::from_http(http(&[], "[1,2]"));
        assert_eq!(response.json, Some(json!([1, 2])));

        let plain = ResponseData::from_http(http(&[], "hello"));
        assert_eq!(plain.json, None);
    }

    #[test]
    fn repeated_headers_are_joined() {
        let response = ResponseData::from_http(
            http(&[("Set-Cookie", "a=1"), ("set-cookie", "b=2")], ""),
        );
        assert_eq!(response.header("SET-COOKIE"), Some("a=1, b=2"));
        assert_eq!(response.headers.len(), 1);
    }

    #[test]
    fn failed_responses_carry_the_error_only() {
        let response =
            ResponseData::failed(TransportError::new("ConnectionError", "refused"));
        assert!(response.is_error());
        assert_eq!(response.status, None);
        assert_eq!(response.body, "");
        assert_eq!(
            response.error,
            Some(ResponseError {
                name: "ConnectionError".to_string(),
                message: "refused".to_string(),
            })
        );
    }
}
