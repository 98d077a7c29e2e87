use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::bundle::RawCaptures;
use crate::error::MergeError;
use crate::executor::ResponseData;
use crate::jsonpath::{query_first, JsonPathError};
use crate::value::scalar_text;
use crate::vars::VariableStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    Json,
    Header,
    Status,
    Body,
}

/// Where one variable is taken from after a response arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVar {
    pub var_name: String,
    #[serde(rename = "type")]
    pub kind: CaptureKind,
    pub spec: String,
}

impl SetVar {
    pub fn new(var_name: impl Into<String>, kind: CaptureKind, spec: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
            kind,
            spec: spec.into(),
        }
    }

    /// Parses one `setvars` entry: `$.path`, `$[..]`, `$h.Header`, `status`
    /// or `body`.
    pub fn parse(var_name: &str, spec: &str) -> Result<Self, MergeError> {
        let setvar = if let Some(header) = spec.strip_prefix("$h.") {
            Self::new(var_name, CaptureKind::Header, header)
        } else if spec == "$" || spec.starts_with("$.") || spec.starts_with("$[") {
            Self::new(var_name, CaptureKind::Json, spec)
        } else if spec == "status" {
            Self::new(var_name, CaptureKind::Status, spec)
        } else if spec == "body" {
            Self::new(var_name, CaptureKind::Body, spec)
        } else {
            return Err(MergeError::SetVar {
                var: var_name.to_string(),
                spec: spec.to_string(),
            });
        };
        Ok(setvar)
    }
}

/// Combines both capture syntaxes from `common` and the request into one
/// list. Later entries replace earlier ones for the same variable, keeping
/// the position of the first.
pub fn merge_setvars(
    common_setvars: Option<&IndexMap<String, String>>,
    common_capture: Option<&RawCaptures>,
    setvars: Option<&IndexMap<String, String>>,
    capture: Option<&RawCaptures>,
) -> Result<Vec<SetVar>, MergeError> {
    let mut merged: IndexMap<String, SetVar> = IndexMap::new();

    for (setvars, capture) in [(common_setvars, common_capture), (setvars, capture)] {
        if let Some(capture) = capture {
            for setvar in legacy_setvars(capture) {
                merged.insert(setvar.var_name.clone(), setvar);
            }
        }
        for (var, spec) in setvars.into_iter().flatten() {
            merged.insert(var.clone(), SetVar::parse(var, spec)?);
        }
    }

    Ok(merged.into_values().collect())
}

fn legacy_setvars(capture: &RawCaptures) -> Vec<SetVar> {
    let mut setvars = Vec::new();
    for (path, var) in &capture.json {
        setvars.push(SetVar::new(var, CaptureKind::Json, path));
    }
    for (header, var) in &capture.headers {
        setvars.push(SetVar::new(var, CaptureKind::Header, header));
    }
    if let Some(var) = &capture.status {
        setvars.push(SetVar::new(var, CaptureKind::Status, "status"));
    }
    if let Some(var) = &capture.body {
        setvars.push(SetVar::new(var, CaptureKind::Body, "body"));
    }
    setvars
}

/// A capture that could not be made. The variable keeps whatever value it
/// had before.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("could not set {var_name}: {reason}")]
#[serde(rename_all = "camelCase")]
pub struct CaptureWarning {
    pub var_name: String,
    pub reason: String,
}

/// Writes every capturable value from `response` into `store`.
pub fn capture_variables(
    setvars: &[SetVar],
    response: &ResponseData,
    store: &mut VariableStore,
) -> Vec<CaptureWarning> {
    let mut warnings = Vec::new();

    for setvar in setvars {
        match extract(setvar, response) {
            Ok(value) => {
                debug!(var = %setvar.var_name, "captured variable");
                store.set(setvar.var_name.clone(), value);
            }
            Err(reason) => {
                warn!(var = %setvar.var_name, %reason, "capture failed");
                warnings.push(CaptureWarning {
                    var_name: setvar.var_name.clone(),
                    reason,
                });
            }
        }
    }

    warnings
}

fn extract(setvar: &SetVar, response: &ResponseData) -> Result<String, String> {
    match setvar.kind {
        CaptureKind::Json => match query_first(response.json.as_ref(), &setvar.spec) {
            Ok(Some(value)) => Ok(scalar_text(&value)),
            Ok(None) => Err(format!("nothing matches {}", setvar.spec)),
            Err(JsonPathError::NotJson { .. }) => Err("response has no JSON body".to_string()),
            Err(err) => Err(err.to_string()),
        },
        CaptureKind::Header => response
            .header(&setvar.spec)
            .map(str::to_string)
            .ok_or_else(|| format!("no header {}", setvar.spec)),
        CaptureKind::Status => response
            .status
            .map(|status| status.to_string())
            .ok_or_else(|| "response has no status".to_string()),
        CaptureKind::Body => match &response.error {
            Some(error) => Err(format!("request failed: {}", error.message)),
            None => Ok(response.body.clone()),
        },
    }
}
