use indexmap::IndexMap;
use reqwest::Method;

use crate::assertions::Tests;
use crate::bundle::{RawHeaders, RawRequest};
use crate::capture::merge_setvars;
use crate::error::MergeError;
use crate::value::scalar_text;

use super::model::{HttpSpec, Options, RequestSpec};
use super::params::merge_params;

/// Folds `common` into one request definition.
pub fn merge_request(
    name: &str,
    common: &RawRequest,
    request: &RawRequest,
) -> Result<RequestSpec, MergeError> {
    if let Some(bad) = common.malformed.iter().chain(&request.malformed).next() {
        return Err(MergeError::Malformed {
            field: bad.field.clone(),
            reason: bad.reason.clone(),
        });
    }

    let url = request
        .url
        .clone()
        .ok_or(MergeError::MissingField("url"))?;
    let method = request
        .method
        .as_deref()
        .or(common.method.as_deref())
        .ok_or(MergeError::MissingField("method"))
        .and_then(normalize_method)?;

    let body = request.body.clone().or_else(|| common.body.clone());
    let mut headers = merge_headers(common.headers.as_ref(), request.headers.as_ref());
    if let Some(body) = &body {
        let has_content_type = headers
            .keys()
            .any(|key| key.eq_ignore_ascii_case("content-type"));
        if !body.is_string() && !has_content_type {
            headers.insert("content-type".to_string(), "application/json".to_string());
        }
    }

    let tests = Tests::merged(
        common.tests.as_ref().map(Tests::from_raw).unwrap_or_default(),
        request.tests.as_ref().map(Tests::from_raw).unwrap_or_default(),
    );

    Ok(RequestSpec {
        name: name.to_string(),
        http: HttpSpec {
            base_url: request.base_url.clone().or_else(|| common.base_url.clone()),
            url,
            method,
            params: merge_params(common.params.as_ref(), request.params.as_ref()),
            headers,
            body,
        },
        options: Options::merged(common.options.as_ref(), request.options.as_ref())?,
        tests,
        setvars: merge_setvars(
            common.setvars.as_ref(),
            common.capture.as_ref(),
            request.setvars.as_ref(),
            request.capture.as_ref(),
        )?,
    })
}

fn normalize_method(method: &str) -> Result<String, MergeError> {
    let upper = method.trim().to_ascii_uppercase();
    Method::from_bytes(upper.as_bytes())
        .map(|m| m.as_str().to_string())
        .map_err(|_| MergeError::Method(method.to_string()))
}

/// Request headers replace common ones regardless of case; a null request
/// value removes the header altogether.
fn merge_headers(
    common: Option<&RawHeaders>,
    request: Option<&RawHeaders>,
) -> IndexMap<String, String> {
    let mut merged: IndexMap<String, String> = IndexMap::new();

    for headers in [common, request].into_iter().flatten() {
        for (name, value) in headers.entries() {
            if let Some(existing) = merged
                .keys()
                .find(|key| key.eq_ignore_ascii_case(&name))
                .cloned()
            {
                merged.shift_remove(&existing);
            }
            if let Some(value) = value {
                merged.insert(name, scalar_text(&value));
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureKind, SetVar};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn raw(value: Value) -> RawRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn request_values_win_over_common() {
        let common = raw(json!({
            "baseUrl": "https://api.test",
            "method": "get",
            "headers": {"Accept": "text/plain", "x-team": "core"},
            "params": {"page": 1, "lang": "en"},
            "options": {"follow": true},
            "tests": {"status": 200, "$.ok": true}
        }));
        let request = raw(json!({
            "url": "/users",
            "headers": [{"name": "accept", "value": "application/json"}],
            "params": {"page": 2},
            "options": {"showHeaders": true},
            "tests": {"$.count": {"$gt": 0}}
        }));

        let spec = merge_request("list-users", &common, &request).unwrap();
        assert_eq!(spec.http.method, "GET");
        assert_eq!(spec.full_url(), "https://api.test/users?lang=en&page=2");
        assert_eq!(
            spec.http.headers.iter().collect::<Vec<_>>(),
            vec![
                (&"x-team".to_string(), &"core".to_string()),
                (&"accept".to_string(), &"application/json".to_string()),
            ]
        );
        assert!(spec.options.follow && spec.options.show_headers);
        assert_eq!(spec.tests.status, Some(json!(200)));
        assert_eq!(
            spec.tests.json.keys().collect::<Vec<_>>(),
            vec!["$.ok", "$.count"]
        );
    }

    #[test]
    fn null_request_header_removes_common_one() {
        let common = raw(json!({"headers": {"Authorization": "Bearer x"}}));
        let request = raw(json!({"url": "/", "method": "GET", "headers": {"authorization": null}}));

        let spec = merge_request("anon", &common, &request).unwrap();
        assert!(spec.http.headers.is_empty());
    }

    #[test]
    fn json_bodies_get_a_content_type() {
        let common = RawRequest::default();

        let object = raw(json!({"url": "/", "method": "POST", "body": {"a": 1}}));
        let spec = merge_request("create", &common, &object).unwrap();
        assert_eq!(spec.http.header("Content-Type"), Some("application/json"));

        let text = raw(json!({"url": "/", "method": "POST", "body": "a=1"}));
        let spec = merge_request("form", &common, &text).unwrap();
        assert_eq!(spec.http.header("content-type"), None);

        let typed = raw(json!({
            "url": "/", "method": "POST", "body": [1],
            "headers": {"Content-Type": "application/vnd.api+json"}
        }));
        let spec = merge_request("typed", &common, &typed).unwrap();
        assert_eq!(spec.http.headers.len(), 1);
    }

    #[test]
    fn missing_url_or_method_is_an_error() {
        let common = RawRequest::default();
        assert_eq!(
            merge_request("a", &common, &raw(json!({"method": "GET"}))).unwrap_err(),
            MergeError::MissingField("url")
        );
        assert_eq!(
            merge_request("b", &common, &raw(json!({"url": "/"}))).unwrap_err(),
            MergeError::MissingField("method")
        );
        assert_eq!(
            merge_request("c", &common, &raw(json!({"url": "/", "method": "GE T"}))).unwrap_err(),
            MergeError::Method("GE T".to_string())
        );
    }

    #[test]
    fn setvars_come_from_both_levels() {
        let common = raw(json!({"setvars": {"lastStatus": "status"}}));
        let request = raw(json!({
            "url": "/login",
            "method": "POST",
            "setvars": {"token": "$.token"},
            "capture": {"headers": {"x-session": "session"}}
        }));

        let spec = merge_request("login", &common, &request).unwrap();
        assert_eq!(
            spec.setvars,
            vec![
                SetVar::new("lastStatus", CaptureKind::Status, "status"),
                SetVar::new("session", CaptureKind::Header, "x-session"),
                SetVar::new("token", CaptureKind::Json, "$.token"),
            ]
        );
    }

    #[test]
    fn malformed_fields_fail_the_merge() {
        let request = raw(json!({"url": "/", "method": "GET", "options": true}));
        let err = merge_request("bad", &RawRequest::default(), &request).unwrap_err();
        assert!(matches!(err, MergeError::Malformed { ref field, .. } if field == "options"));

        let common = raw(json!({"headers": 7}));
        let fine = raw(json!({"url": "/", "method": "GET"}));
        assert!(matches!(
            merge_request("fine", &common, &fine),
            Err(MergeError::Malformed { ref field, .. }) if field == "headers"
        ));
    }

    #[test]
    fn bad_options_fail_the_merge() {
        let request = raw(json!({"url": "/", "method": "GET", "options": {"follow": 1}}));
        assert!(matches!(
            merge_request("x", &RawRequest::default(), &request),
            Err(MergeError::OptionType { .. })
        ));
    }
}
