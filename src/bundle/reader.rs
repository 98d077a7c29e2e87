use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Number, Value};
use serde_yaml::Value as YamlValue;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use super::model::Bundle;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("bundle is not valid YAML or JSON: {0}")]
    Syntax(#[from] serde_yaml::Error),
    #[error("unsupported mapping key {0}, keys must be scalars")]
    Key(String),
    #[error("number {0} cannot be represented in JSON")]
    Number(String),
    #[error("bundle has an unexpected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

pub async fn load_bundle(path: &Path) -> Result<Bundle> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading bundle {}", path.display()))?;

    let bundle =
        parse_bundle(&raw).with_context(|| format!("parsing bundle {}", path.display()))?;
    debug!(
        path = %path.display(),
        requests = bundle.requests.len(),
        "loaded bundle"
    );
    Ok(bundle)
}

pub fn parse_bundle(contents: &str) -> Result<Bundle, BundleError> {
    let document: YamlValue = serde_yaml::from_str(contents)?;
    let value = yaml_to_json(document)?;
    let value = if value.is_null() {
        Value::Object(Map::new())
    } else {
        value
    };
    Ok(serde_json::from_value(value)?)
}

/// Converts a YAML document into JSON, keeping mapping order and turning
/// scalar keys (`200:`, `true:`) into their text form.
fn yaml_to_json(value: YamlValue) -> Result<Value, BundleError> {
    Ok(match value {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(flag) => Value::Bool(flag),
        YamlValue::Number(number) => {
            if let Some(int) = number.as_i64() {
                Value::from(int)
            } else if let Some(uint) = number.as_u64() {
                Value::from(uint)
            } else {
                let float = number.as_f64().unwrap_or(f64::NAN);
                Value::Number(
                    Number::from_f64(float).ok_or_else(|| BundleError::Number(number.to_string()))?,
                )
            }
        }
        YamlValue::String(text) => Value::String(text),
        YamlValue::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        YamlValue::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, item) in mapping {
                map.insert(key_text(key)?, yaml_to_json(item)?);
            }
            Value::Object(map)
        }
        YamlValue::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn key_text(key: YamlValue) -> Result<String, BundleError> {
    match key {
        YamlValue::String(text) => Ok(text),
        YamlValue::Number(number) => Ok(number.to_string()),
        YamlValue::Bool(flag) => Ok(flag.to_string()),
        YamlValue::Null => Ok("null".to_string()),
        other => Err(BundleError::Key(format!("{other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
common:
  baseUrl: https://{{host}}
  headers:
    accept: application/json
  options:
    follow: true
  tests:
    status: 200

requests:
  create-user:
    method: POST
    url: /users
    body:
      name: ada
    setvars:
      userId: $.id
  get-user:
    method: GET
    url: /users/{{userId}}
    tests:
      $.name: ada
      $.tags:
        $size: 2

varsets:
  local:
    host: localhost:8080
"#;

    #[test]
    fn parse_bundle_keeps_request_order() -> Result<()> {
        let bundle = parse_bundle(SAMPLE)?;

        let names: Vec<_> = bundle.request_names().collect();
        assert_eq!(names, vec!["create-user", "get-user"]);
        assert_eq!(bundle.common.base_url.as_deref(), Some("https://{{host}}"));
        assert_eq!(
            bundle.request("create-user").unwrap().body,
            Some(json!({"name": "ada"}))
        );

        let tests = bundle.request("get-user").unwrap().tests.clone().unwrap();
        let keys: Vec<_> = tests.keys().cloned().collect();
        assert_eq!(keys, vec!["$.name", "$.tags"]);
        Ok(())
    }

    #[test]
    fn parse_bundle_accepts_json() -> Result<()> {
        let bundle = parse_bundle(r#"{"requests": {"ping": {"url": "/ping", "method": "GET"}}}"#)?;
        assert_eq!(bundle.requests.len(), 1);
        Ok(())
    }

    #[test]
    fn parse_bundle_stringifies_scalar_keys() -> Result<()> {
        let bundle = parse_bundle("requests:\n  404:\n    url: /missing\n    method: GET\n")?;
        assert!(bundle.request("404").is_some());
        Ok(())
    }

    #[test]
    fn parse_bundle_treats_empty_document_as_empty_bundle() -> Result<()> {
        let bundle = parse_bundle("")?;
        assert!(bundle.requests.is_empty());
        Ok(())
    }

    #[test]
    fn parse_bundle_reports_syntax_errors() {
        let err = parse_bundle("requests: [unclosed").unwrap_err();
        assert!(matches!(err, BundleError::Syntax(_)));
    }

    #[test]
    fn parse_bundle_reports_shape_errors() {
        let err = parse_bundle("requests: 12").unwrap_err();
        assert!(matches!(err, BundleError::Shape(_)));
    }

    #[test]
    fn parse_bundle_keeps_requests_with_malformed_fields() -> Result<()> {
        let bundle = parse_bundle(
            r#"
requests:
  bad:
    url: /a
    options: true
  good:
    url: /b
    method: GET
"#,
        )?;

        let bad = bundle.request("bad").unwrap();
        assert_eq!(bad.url.as_deref(), Some("/a"));
        assert_eq!(bad.malformed[0].field, "options");
        assert!(bundle.request("good").unwrap().malformed.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn load_bundle_adds_file_context() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("broken.yaml");
        tokio::fs::write(&path, "requests: 12").await?;

        let err = load_bundle(&path).await.unwrap_err();
        assert!(err.to_string().contains("parsing bundle"));
        Ok(())
    }
}
