use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::value::scalar_text;
use crate::vars::VarMap;

/// A bundle file: shared defaults, requests in declaration order, and
/// reusable variable sets.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Bundle {
    pub common: RawRequest,
    pub requests: IndexMap<String, RawRequest>,
    pub varsets: IndexMap<String, IndexMap<String, Value>>,
}

impl Bundle {
    pub fn request(&self, name: &str) -> Option<&RawRequest> {
        self.requests.get(name)
    }

    pub fn request_names(&self) -> impl Iterator<Item = &str> {
        self.requests.keys().map(String::as_str)
    }

    /// Values of a varset as strings, or `None` if the bundle has no such set.
    pub fn varset(&self, name: &str) -> Option<VarMap> {
        self.varsets.get(name).map(|vars| {
            vars.iter()
                .map(|(key, value)| (key.clone(), scalar_text(value)))
                .collect()
        })
    }
}

/// One request (or the `common` block) exactly as written in the bundle.
///
/// A field of the wrong shape does not fail the whole bundle. It is left out
/// and recorded in `malformed`, and merging this request reports it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRequest {
    pub url: Option<String>,
    pub method: Option<String>,
    pub base_url: Option<String>,
    pub headers: Option<RawHeaders>,
    pub params: Option<RawParams>,
    pub body: Option<Value>,
    pub options: Option<Map<String, Value>>,
    pub tests: Option<Map<String, Value>>,
    pub setvars: Option<IndexMap<String, String>>,
    pub capture: Option<RawCaptures>,
    pub malformed: Vec<MalformedField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedField {
    pub field: String,
    pub reason: String,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RequestFields {
    url: Option<String>,
    method: Option<String>,
    base_url: Option<String>,
    headers: Option<RawHeaders>,
    params: Option<RawParams>,
    body: Option<Value>,
    options: Option<Map<String, Value>>,
    tests: Option<Map<String, Value>>,
    setvars: Option<IndexMap<String, String>>,
    capture: Option<RawCaptures>,
}

impl RawRequest {
    pub fn from_value(value: Value) -> Self {
        let fields = match value {
            Value::Null => return Self::default(),
            Value::Object(fields) => fields,
            other => {
                return Self {
                    malformed: vec![MalformedField {
                        field: "request".to_string(),
                        reason: format!("expected a mapping, got {other}"),
                    }],
                    ..Self::default()
                }
            }
        };

        let mut malformed = Vec::new();
        let mut accepted = Map::with_capacity(fields.len());
        for (field, value) in fields {
            let mut single = Map::new();
            single.insert(field.clone(), value);
            let single = Value::Object(single);
            match RequestFields::deserialize(&single) {
                Ok(_) => {
                    if let Value::Object(entry) = single {
                        accepted.extend(entry);
                    }
                }
                Err(err) => malformed.push(MalformedField {
                    field,
                    reason: err.to_string(),
                }),
            }
        }

        let fields = RequestFields::deserialize(&Value::Object(accepted)).unwrap_or_default();
        Self {
            url: fields.url,
            method: fields.method,
            base_url: fields.base_url,
            headers: fields.headers,
            params: fields.params,
            body: fields.body,
            options: fields.options,
            tests: fields.tests,
            setvars: fields.setvars,
            capture: fields.capture,
            malformed,
        }
    }
}

impl<'de> Deserialize<'de> for RawRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NameValue {
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Headers or params, written either as a mapping or as a list of
/// `{name, value}` pairs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NamedValues {
    List(Vec<NameValue>),
    Map(IndexMap<String, Value>),
}

pub type RawHeaders = NamedValues;
pub type RawParams = NamedValues;

impl NamedValues {
    /// Entries in written order; a missing or null value is `None`.
    pub fn entries(&self) -> Vec<(String, Option<Value>)> {
        match self {
            Self::List(items) => items
                .iter()
                .map(|item| (item.name.clone(), item.value.clone().filter(|v| !v.is_null())))
                .collect(),
            Self::Map(map) => map
                .iter()
                .map(|(name, value)| (name.clone(), Some(value.clone()).filter(|v| !v.is_null())))
                .collect(),
        }
    }
}

/// Older capture syntax, kept alongside `setvars`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawCaptures {
    pub json: IndexMap<String, String>,
    pub headers: IndexMap<String, String>,
    pub status: Option<String>,
    pub body: Option<String>,
}
