use std::cmp::Ordering;

use regex::RegexBuilder;
use serde_json::{Map, Value};

use crate::executor::ResponseData;
use crate::jsonpath::query_first;
use crate::value::{is_truthy, scalar_text};

use super::compare::{display, loose_cmp, normalized, stringify_compound, type_name, value_len};
use super::model::{SpecResult, TestResult, Tests};

pub const OPERATORS: [&str; 16] = [
    "$eq", "$ne", "$lt", "$gt", "$lte", "$gte", "$size", "$exists", "$type", "$regex", "$sw",
    "$ew", "$co", "$tests", "$skip", "$options",
];

/// Evaluates `tests` against `response`.
///
/// Categories run in the order status, headers, json, body. With
/// `stop_on_failure`, a failure in the status stage ends evaluation there;
/// later stages are not guarded.
pub fn run_all_tests(
    tests: &Tests,
    response: &ResponseData,
    stop_on_failure: bool,
    root_spec: Option<&str>,
    skip: bool,
) -> SpecResult {
    let mut res = SpecResult::new(root_spec.map(str::to_string));

    if let Some(expected) = tests.status.as_ref().filter(|v| is_truthy(v)) {
        let received = response.status.map(Value::from);
        res.sub_results
            .push(run_test("status", expected, received.as_ref(), skip));
    }
    if stop_on_failure && res.has_failure() {
        return res;
    }

    for (spec, expected) in &tests.headers {
        let received = response.header(spec).map(|v| Value::String(v.to_string()));
        res.sub_results
            .push(run_test(spec, expected, received.as_ref(), skip));
    }

    for (spec, expected) in &tests.json {
        match query_first(response.json.as_ref(), spec) {
            Ok(received) => res
                .sub_results
                .push(run_test(spec, expected, received.as_ref(), skip)),
            Err(err) => res.sub_results.push(SpecResult {
                spec: Some(spec.clone()),
                skipped: skip || skip_requested(expected),
                results: vec![TestResult {
                    pass: false,
                    op: spec.clone(),
                    expected: expected.clone(),
                    received: Some(Value::String(String::new())),
                    message: Some(err.to_string()),
                }],
                sub_results: Vec::new(),
            }),
        }
    }

    if let Some(expected) = tests.body.as_ref().filter(|v| is_truthy(v)) {
        let received = Value::String(response.body.clone());
        res.sub_results
            .push(run_test("body", expected, Some(&received), skip));
    }

    res
}

fn skip_requested(expected: &Value) -> bool {
    expected
        .as_object()
        .and_then(|ops| ops.get("$skip"))
        .is_some_and(is_truthy)
}

fn run_test(spec: &str, expected: &Value, received: Option<&Value>, skip: bool) -> SpecResult {
    if let Value::Object(ops) = expected {
        return run_object_tests(ops, received, spec, skip);
    }

    let pass = normalized(received) == normalized(Some(expected));
    SpecResult {
        spec: Some(spec.to_string()),
        skipped: skip,
        results: vec![TestResult {
            pass,
            op: ":".to_string(),
            expected: expected.clone(),
            received: received.cloned(),
            message: None,
        }],
        sub_results: Vec::new(),
    }
}

enum OpOutcome {
    Checked(TestResult),
    /// Nested evaluation whose results belong to the current node.
    Spliced(SpecResult),
    Ignored,
}

fn run_object_tests(
    ops: &Map<String, Value>,
    received: Option<&Value>,
    spec: &str,
    skip: bool,
) -> SpecResult {
    let mut node = SpecResult::new(Some(spec.to_string()));
    node.skipped = skip || ops.get("$skip").is_some_and(is_truthy);

    for (op, expected) in ops {
        match run_operator(op, expected, received, ops, spec, node.skipped) {
            OpOutcome::Checked(result) => node.results.push(result),
            OpOutcome::Spliced(nested) => {
                node.results.extend(nested.results);
                node.sub_results.extend(nested.sub_results);
            }
            OpOutcome::Ignored => {}
        }
    }

    node
}

fn run_operator(
    op: &str,
    expected: &Value,
    received: Option<&Value>,
    ops: &Map<String, Value>,
    spec: &str,
    skipped: bool,
) -> OpOutcome {
    let checked = |pass: bool| {
        OpOutcome::Checked(TestResult {
            pass,
            op: op.to_string(),
            expected: expected.clone(),
            received: received.cloned(),
            message: None,
        })
    };
    let failed = |message: String| {
        OpOutcome::Checked(TestResult {
            pass: false,
            op: op.to_string(),
            expected: expected.clone(),
            received: received.cloned(),
            message: Some(message),
        })
    };
    let received_text = match received {
        Some(Value::String(text)) => Some(text.as_str()),
        _ => None,
    };

    match op {
        "$eq" => checked(normalized(received) == normalized(Some(expected))),
        "$ne" => checked(normalized(received) != normalized(Some(expected))),
        // $lt stringifies compound received values, the other three compare
        // them raw, so only $lt can order an object against a string.
        "$lt" => checked(
            received
                .and_then(|r| loose_cmp(&stringify_compound(r), &stringify_compound(expected)))
                == Some(Ordering::Less),
        ),
        "$gt" => checked(
            received.and_then(|r| loose_cmp(r, &stringify_compound(expected)))
                == Some(Ordering::Greater),
        ),
        "$lte" => checked(matches!(
            received.and_then(|r| loose_cmp(r, &stringify_compound(expected))),
            Some(Ordering::Less | Ordering::Equal)
        )),
        "$gte" => checked(matches!(
            received.and_then(|r| loose_cmp(r, &stringify_compound(expected))),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        "$size" => size_test(expected, received, spec, skipped, checked, failed),
        "$exists" => match expected.as_bool() {
            Some(should_exist) => checked(received.is_some() == should_exist),
            None => failed("$exists expects true or false".to_string()),
        },
        "$type" => {
            let kind = type_name(received);
            OpOutcome::Checked(TestResult {
                pass: expected.as_str() == Some(kind),
                op: op.to_string(),
                expected: expected.clone(),
                received: Some(Value::String(format!("{} (type {kind})", display(received)))),
                message: None,
            })
        }
        "$regex" => {
            let flags = ops.get("$options").map(scalar_text).unwrap_or_default();
            match build_regex(&scalar_text(expected), &flags) {
                Ok(regex) => checked(received_text.is_some_and(|text| regex.is_match(text))),
                Err(message) => failed(message),
            }
        }
        "$sw" => {
            let needle = scalar_text(expected);
            checked(received_text.is_some_and(|text| text.starts_with(&needle)))
        }
        "$ew" => {
            let needle = scalar_text(expected);
            checked(received_text.is_some_and(|text| text.ends_with(&needle)))
        }
        "$co" => {
            let needle = scalar_text(expected);
            checked(received_text.is_some_and(|text| text.contains(&needle)))
        }
        "$tests" => match expected {
            Value::Object(raw) => {
                let nested = Tests::from_raw(raw);
                let synthetic = ResponseData::synthetic(received.cloned());
                OpOutcome::Spliced(run_all_tests(&nested, &synthetic, false, Some(spec), skipped))
            }
            _ => failed("recursive tests must be dicts".to_string()),
        },
        "$skip" | "$options" => OpOutcome::Ignored,
        unknown => OpOutcome::Checked(TestResult {
            pass: false,
            op: unknown.to_string(),
            expected: Value::String(format!("one of {}", OPERATORS.join(", "))),
            received: Some(Value::String(unknown.to_string())),
            message: Some("unknown operator, to compare objects use $eq".to_string()),
        }),
    }
}

fn size_test(
    expected: &Value,
    received: Option<&Value>,
    spec: &str,
    skipped: bool,
    checked: impl Fn(bool) -> OpOutcome,
    failed: impl Fn(String) -> OpOutcome,
) -> OpOutcome {
    let length = value_len(received);
    let nested = |ops: &Map<String, Value>| {
        let length = length.map(Value::from);
        OpOutcome::Spliced(run_object_tests(ops, length.as_ref(), spec, skipped))
    };
    let equals = |n: &serde_json::Number| checked(length.map(|l| l as f64) == n.as_f64());

    match expected {
        Value::Number(n) => equals(n),
        Value::Object(ops) => nested(ops),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(ops)) => nested(&ops),
            Ok(Value::Number(n)) => equals(&n),
            _ => failed("$size val is not num or valid JSON".to_string()),
        },
        _ => failed("$size val is not num or valid JSON".to_string()),
    }
}

/// Compiles `pattern` with JavaScript-style flags (`i`, `m`, `s`; `x` is
/// also accepted, `g`, `u`, `y` and `d` have no effect on a single match).
///
/// Patterns use the `regex` crate syntax, which has no lookaround or
/// backreferences; such patterns fail as invalid.
fn build_regex(pattern: &str, flags: &str) -> Result<regex::Regex, String> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'x' => {
                builder.ignore_whitespace(true);
            }
            'g' | 'u' | 'y' | 'd' => {}
            other => return Err(format!("invalid regular expression flag '{other}'")),
        }
    }
    builder
        .build()
        .map_err(|err| format!("invalid regular expression: {err}"))
}
