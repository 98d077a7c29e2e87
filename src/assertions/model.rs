use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::vars::{substitute_value, SubstituteError, VariableStore};

/// Expectations for one response, grouped by the facet they look at.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tests {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub headers: IndexMap<String, Value>,
    pub json: IndexMap<String, Value>,
}

impl Tests {
    /// Reads a raw `tests` mapping, moving prefixed keys into their category.
    ///
    /// `$.…`, `$[…]` and `$` go to `json`; `$h.<name>` goes to `headers` as
    /// `<name>`. Applying it to its own output changes nothing.
    pub fn from_raw(raw: &Map<String, Value>) -> Self {
        let mut tests = Self::default();

        for (key, value) in raw {
            match key.as_str() {
                "status" => tests.status = Some(value.clone()),
                "body" => tests.body = Some(value.clone()),
                "json" | "headers" => {
                    let Some(entries) = value.as_object() else {
                        warn!(category = %key, "test category must be a mapping, ignoring it");
                        continue;
                    };
                    let target = if key == "json" {
                        &mut tests.json
                    } else {
                        &mut tests.headers
                    };
                    for (spec, expected) in entries {
                        add_leaf(target, spec, expected, false);
                    }
                }
                header if header.starts_with("$h.") => {
                    add_leaf(&mut tests.headers, &header["$h.".len()..], value, true);
                }
                path if is_json_path_key(path) => {
                    add_leaf(&mut tests.json, path, value, true);
                }
                other => warn!(key = other, "ignoring unrecognised test key"),
            }
        }

        tests
    }

    /// Request-level tests win key by key; common-only keys stay.
    pub fn merged(common: Tests, request: Tests) -> Self {
        let mut headers = common.headers;
        headers.extend(request.headers);
        let mut json = common.json;
        json.extend(request.json);

        Self {
            status: request.status.or(common.status),
            body: request.body.or(common.body),
            headers,
            json,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.body.is_none() && self.headers.is_empty() && self.json.is_empty()
    }

    /// Substitutes variables inside expected values. Keys are left alone.
    pub fn substituted(&self, vars: &VariableStore) -> Result<Self, SubstituteError> {
        let substitute_map = |map: &IndexMap<String, Value>| {
            map.iter()
                .map(|(k, v)| substitute_value(v, vars).map(|v| (k.clone(), v)))
                .collect::<Result<IndexMap<_, _>, _>>()
        };

        Ok(Self {
            status: self
                .status
                .as_ref()
                .map(|v| substitute_value(v, vars))
                .transpose()?,
            body: self
                .body
                .as_ref()
                .map(|v| substitute_value(v, vars))
                .transpose()?,
            headers: substitute_map(&self.headers)?,
            json: substitute_map(&self.json)?,
        })
    }
}

/// Adds one expectation, combining it with one already written for the same
/// spec. Operator objects are merged operator by operator; on a clash, or when
/// either side is a plain value, the prefixed form written at the top level
/// (`prefixed`) wins.
fn add_leaf(
    target: &mut IndexMap<String, Value>,
    spec: &str,
    value: &Value,
    prefixed: bool,
) {
    let Some(existing) = target.get_mut(spec) else {
        target.insert(spec.to_string(), value.clone());
        return;
    };

    match (existing, value) {
        (Value::Object(current), Value::Object(incoming)) => {
            for (op, expected) in incoming {
                if prefixed || !current.contains_key(op) {
                    current.insert(op.clone(), expected.clone());
                }
            }
        }
        (existing, _) => {
            warn!(spec, "test written twice, keeping the prefixed form");
            if prefixed {
                *existing = value.clone();
            }
        }
    }
}

fn is_json_path_key(key: &str) -> bool {
    key == "$" || key.starts_with("$.") || key.starts_with("$[")
}

/// One operator (or literal comparison) evaluated at a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub pass: bool,
    pub op: String,
    pub expected: Value,
    pub received: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A node of the result tree. `results` hold what was checked at this node;
/// nested specs always show up as `sub_results`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecResult {
    pub spec: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    pub results: Vec<TestResult>,
    pub sub_results: Vec<SpecResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestCounts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SpecResult {
    pub fn new(spec: Option<String>) -> Self {
        Self {
            spec,
            ..Self::default()
        }
    }

    /// Any failing result in the tree, skipped or not.
    pub fn has_failure(&self) -> bool {
        self.results.iter().any(|r| !r.pass) || self.sub_results.iter().any(Self::has_failure)
    }

    /// Failures outside skipped nodes.
    pub fn has_blocking_failure(&self) -> bool {
        if self.skipped {
            return false;
        }
        self.results.iter().any(|r| !r.pass)
            || self.sub_results.iter().any(Self::has_blocking_failure)
    }

    pub fn counts(&self) -> TestCounts {
        let mut counts = TestCounts::default();
        self.tally(false, &mut counts);
        counts
    }

    fn tally(&self, inherited_skip: bool, counts: &mut TestCounts) {
        let skipped = inherited_skip || self.skipped;
        for result in &self.results {
            if skipped {
                counts.skipped += 1;
            } else if result.pass {
                counts.passed += 1;
            } else {
                counts.failed += 1;
            }
        }
        for sub in &self.sub_results {
            sub.tally(skipped, counts);
        }
    }
}
