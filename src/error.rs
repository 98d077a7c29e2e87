use thiserror::Error;

use crate::vars::{SubstituteError, MAX_DEPTH};

/// Problems in how a request (or `common`) is written in the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("missing `{0}`")]
    MissingField(&'static str),
    #[error("`{field}` is malformed: {reason}")]
    Malformed { field: String, reason: String },
    #[error("invalid HTTP method `{0}`")]
    Method(String),
    #[error("option `{name}` must be a boolean, got {value}")]
    OptionType { name: String, value: String },
    #[error("cannot capture `{var}` from `{spec}`, expected $.<path>, $h.<header>, status or body")]
    SetVar { var: String, spec: String },
}

/// Everything that stops a single request from running. None of these abort
/// a bundle run by themselves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request {request}: {source}")]
    Merge {
        request: String,
        #[source]
        source: MergeError,
    },
    #[error("request {request}: undefined variable {name}")]
    UnresolvedVariable { request: String, name: String },
    #[error("request {request}: variable {name} nests more than {max} levels deep", max = MAX_DEPTH)]
    VariableDepthExceeded { request: String, name: String },
    #[error("request {request}: invalid variable name {name}")]
    InvalidVariable { request: String, name: String },
}

impl RequestError {
    pub fn merge(request: &str, source: MergeError) -> Self {
        Self::Merge {
            request: request.to_string(),
            source,
        }
    }

    pub fn substitution(request: &str, err: SubstituteError) -> Self {
        let request = request.to_string();
        match err {
            SubstituteError::Unresolved(name) => Self::UnresolvedVariable { request, name },
            SubstituteError::DepthExceeded(name) => Self::VariableDepthExceeded { request, name },
            SubstituteError::InvalidName(name) => Self::InvalidVariable { request, name },
        }
    }

    pub fn request(&self) -> &str {
        match self {
            Self::Merge { request, .. }
            | Self::UnresolvedVariable { request, .. }
            | Self::VariableDepthExceeded { request, .. }
            | Self::InvalidVariable { request, .. } => request,
        }
    }
}
