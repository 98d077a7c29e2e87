use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::assertions::Tests;
use crate::capture::SetVar;
use crate::error::{MergeError, RequestError};
use crate::value::scalar_text;
use crate::vars::{expand_placeholders, substitute_value, VariableStore};

use super::params::{build_url, query_string, Param};

/// Per-request switches. Everything defaults to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    pub follow: bool,
    #[serde(rename = "verifySSL")]
    pub verify_ssl: bool,
    #[serde(rename = "keepRawJSON")]
    pub keep_raw_json: bool,
    pub show_headers: bool,
    pub raw_params: bool,
    pub stop_on_failure: bool,
}

impl Options {
    /// Applies `common` then `request`, one flag at a time.
    pub fn merged(
        common: Option<&Map<String, Value>>,
        request: Option<&Map<String, Value>>,
    ) -> Result<Self, MergeError> {
        let mut options = Self::default();
        for layer in [common, request].into_iter().flatten() {
            for (name, value) in layer {
                options.apply(name, value)?;
            }
        }
        Ok(options)
    }

    fn apply(&mut self, name: &str, value: &Value) -> Result<(), MergeError> {
        let slot = match name {
            "follow" => &mut self.follow,
            "verifySSL" => &mut self.verify_ssl,
            "keepRawJSON" => &mut self.keep_raw_json,
            "showHeaders" => &mut self.show_headers,
            "rawParams" => &mut self.raw_params,
            "stopOnFailure" => &mut self.stop_on_failure,
            other => {
                warn!(option = other, "ignoring unknown option");
                return Ok(());
            }
        };
        *slot = value.as_bool().ok_or_else(|| MergeError::OptionType {
            name: name.to_string(),
            value: value.to_string(),
        })?;
        Ok(())
    }
}

/// The HTTP half of a merged request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSpec {
    pub base_url: Option<String>,
    pub url: String,
    pub method: String,
    pub params: Vec<Param>,
    pub headers: IndexMap<String, String>,
    pub body: Option<Value>,
}

impl HttpSpec {
    pub fn full_url(&self, raw_params: bool) -> String {
        build_url(
            self.base_url.as_deref(),
            &self.url,
            &query_string(&self.params, raw_params),
        )
    }

    /// Body as sent on the wire: strings verbatim, anything else as JSON.
    pub fn body_text(&self) -> Option<String> {
        self.body.as_ref().map(scalar_text)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A request with `common` folded in. After [`RequestSpec::resolve`] it holds
/// no variable references in its HTTP fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSpec {
    pub name: String,
    pub http: HttpSpec,
    pub options: Options,
    pub tests: Tests,
    pub setvars: Vec<SetVar>,
}

impl RequestSpec {
    /// Substitutes variables in url, base URL, headers, params and body.
    pub fn resolve(&self, vars: &VariableStore) -> Result<RequestSpec, RequestError> {
        let fail = |err| RequestError::substitution(&self.name, err);
        let expand = |text: &str| expand_placeholders(text, vars).map_err(fail);

        let http = &self.http;
        let mut headers = IndexMap::with_capacity(http.headers.len());
        for (name, value) in &http.headers {
            headers.insert(name.clone(), expand(value)?);
        }

        let mut params = Vec::with_capacity(http.params.len());
        for param in &http.params {
            let value = match &param.value {
                Some(value) => Some(substitute_value(value, vars).map_err(fail)?),
                None => None,
            };
            params.push(Param::new(param.name.clone(), value));
        }

        let body = match &http.body {
            Some(body) => Some(substitute_value(body, vars).map_err(fail)?),
            None => None,
        };

        Ok(RequestSpec {
            name: self.name.clone(),
            http: HttpSpec {
                base_url: http.base_url.as_deref().map(expand).transpose()?,
                url: expand(&http.url)?,
                method: http.method.clone(),
                params,
                headers,
                body,
            },
            options: self.options,
            tests: self.tests.clone(),
            setvars: self.setvars.clone(),
        })
    }

    pub fn full_url(&self) -> String {
        self.http.full_url(self.options.raw_params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options_map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn options_merge_flag_by_flag() {
        let common = options_map(json!({"follow": true, "verifySSL": true}));
        let request = options_map(json!({"verifySSL": false, "stopOnFailure": true}));

        let options = Options::merged(Some(&common), Some(&request)).unwrap();
        assert_eq!(
            options,
            Options {
                follow: true,
                verify_ssl: false,
                stop_on_failure: true,
                ..Options::default()
            }
        );
    }

    #[test]
    fn options_reject_non_boolean_values() {
        let request = options_map(json!({"follow": "yes"}));
        let err = Options::merged(None, Some(&request)).unwrap_err();
        assert_eq!(
            err,
            MergeError::OptionType {
                name: "follow".to_string(),
                value: "\"yes\"".to_string(),
            }
        );
    }

    #[test]
    fn options_ignore_unknown_keys() {
        let request = options_map(json!({"retries": 3, "rawParams": true}));
        let options = Options::merged(None, Some(&request)).unwrap();
        assert!(options.raw_params);
    }

    fn sample_spec() -> RequestSpec {
        let mut headers = IndexMap::new();
        headers.insert("authorization".to_string(), "Bearer {{token}}".to_string());
        RequestSpec {
            name: "get-user".to_string(),
            http: HttpSpec {
                base_url: Some("https://{{host}}".to_string()),
                url: "/users/{{id}}".to_string(),
                method: "GET".to_string(),
                params: vec![Param::new("fields", Some(json!(["{{field}}", "email"])))],
                headers,
                body: Some(json!({"id": "{{id}}", "active": true})),
            },
            options: Options::default(),
            tests: Tests::default(),
            setvars: Vec::new(),
        }
    }

    #[test]
    fn resolve_substitutes_every_http_field() {
        let vars: VariableStore = [
            ("host", "api.test"),
            ("id", "7"),
            ("token", "abc"),
            ("field", "name"),
        ]
        .into_iter()
        .collect();

        let resolved = sample_spec().resolve(&vars).unwrap();
        assert_eq!(resolved.full_url(), "https://api.test/users/7?fields=name,email");
        assert_eq!(resolved.http.header("Authorization"), Some("Bearer abc"));
        assert_eq!(
            resolved.http.body_text().as_deref(),
            Some(r#"{"id":"7","active":true}"#)
        );
    }

    #[test]
    fn resolve_reports_the_missing_variable() {
        let vars: VariableStore = [("host", "api.test"), ("id", "7")].into_iter().collect();
        let err = sample_spec().resolve(&vars).unwrap_err();
        assert_eq!(
            err,
            RequestError::UnresolvedVariable {
                request: "get-user".to_string(),
                name: "token".to_string(),
            }
        );
    }
}
