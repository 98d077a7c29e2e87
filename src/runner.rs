use anyhow::{bail, Result};
use serde::{Serialize, Serializer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::assertions::{run_all_tests, SpecResult, TestCounts};
use crate::bundle::{Bundle, RawRequest};
use crate::capture::{capture_variables, CaptureWarning};
use crate::error::RequestError;
use crate::executor::{execute, ExecutionOutcome, HttpClient, ResponseData};
use crate::request::{merge_request, Options, RequestSpec};
use crate::vars::VariableStore;

/// What happened to one request of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RequestOutcome {
    Completed {
        response: ResponseData,
        results: SpecResult,
        warnings: Vec<CaptureWarning>,
    },
    Failed {
        #[serde(serialize_with = "as_display")]
        error: RequestError,
    },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestReport {
    pub name: String,
    /// The resolved request, when it got that far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestSpec>,
    #[serde(flatten)]
    pub outcome: RequestOutcome,
}

impl RequestReport {
    pub fn options(&self) -> Options {
        self.request
            .as_ref()
            .map(|spec| spec.options)
            .unwrap_or_default()
    }

    /// True for request errors and for assertion failures outside skipped
    /// nodes.
    pub fn is_failure(&self) -> bool {
        match &self.outcome {
            RequestOutcome::Completed { results, .. } => results.has_blocking_failure(),
            RequestOutcome::Failed { .. } => true,
            RequestOutcome::Cancelled => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleReport {
    /// Requests that ran to the end or failed, in run order.
    pub requests: Vec<RequestReport>,
    pub cancelled: Vec<String>,
    pub not_run: Vec<String>,
}

impl BundleReport {
    pub fn counts(&self) -> TestCounts {
        self.requests
            .iter()
            .filter_map(|report| match &report.outcome {
                RequestOutcome::Completed { results, .. } => Some(results.counts()),
                _ => None,
            })
            .fold(TestCounts::default(), |acc, c| TestCounts {
                passed: acc.passed + c.passed,
                failed: acc.failed + c.failed,
                skipped: acc.skipped + c.skipped,
            })
    }

    pub fn errored(&self) -> usize {
        self.requests
            .iter()
            .filter(|r| matches!(r.outcome, RequestOutcome::Failed { .. }))
            .count()
    }

    pub fn is_success(&self) -> bool {
        !self.requests.iter().any(RequestReport::is_failure)
    }
}

/// Hooks for hosts that show progress or want to cancel single requests.
pub trait RunObserver {
    /// Called before a request is merged. Cancelling `cancel` aborts only
    /// this request.
    fn request_started(&mut self, _name: &str, _cancel: &CancellationToken) {}

    fn request_finished(&mut self, _report: &RequestReport) {}
}

#[derive(Debug, Default)]
pub struct SilentObserver;

impl RunObserver for SilentObserver {}

/// Merge, substitute, execute, capture and assert one request.
pub async fn run_request(
    name: &str,
    common: &RawRequest,
    raw: &RawRequest,
    store: &mut VariableStore,
    client: &dyn HttpClient,
    cancel: &CancellationToken,
) -> RequestReport {
    // A request cancelled before it was sent counts as cancelled even when
    // merging or substitution also failed.
    let failed = |request: Option<RequestSpec>, error: RequestError| RequestReport {
        name: name.to_string(),
        request,
        outcome: if cancel.is_cancelled() {
            RequestOutcome::Cancelled
        } else {
            RequestOutcome::Failed { error }
        },
    };

    let merged = match merge_request(name, common, raw) {
        Ok(spec) => spec,
        Err(err) => return failed(None, RequestError::merge(name, err)),
    };
    let resolved = match merged.resolve(store) {
        Ok(spec) => spec,
        Err(err) => return failed(None, err),
    };

    let response = match execute(client, &resolved, cancel).await {
        ExecutionOutcome::Completed(response) => response,
        ExecutionOutcome::Cancelled => {
            return RequestReport {
                name: name.to_string(),
                request: Some(resolved),
                outcome: RequestOutcome::Cancelled,
            }
        }
    };

    let warnings = capture_variables(&resolved.setvars, &response, store);

    let tests = match resolved.tests.substituted(store) {
        Ok(tests) => tests,
        Err(err) => return failed(Some(resolved), RequestError::substitution(name, err)),
    };
    let results = run_all_tests(
        &tests,
        &response,
        resolved.options.stop_on_failure,
        None,
        false,
    );

    RequestReport {
        name: name.to_string(),
        request: Some(resolved),
        outcome: RequestOutcome::Completed {
            response,
            results,
            warnings,
        },
    }
}

/// Runs `selection` (every request when empty) in bundle order, threading
/// captured variables through `store`.
///
/// Cancelling `cancel` ends the whole run; the observer gets a child token
/// per request for cancelling just that one.
pub async fn run_bundle(
    bundle: &Bundle,
    selection: &[String],
    store: &mut VariableStore,
    client: &dyn HttpClient,
    cancel: &CancellationToken,
    observer: &mut dyn RunObserver,
) -> Result<BundleReport> {
    for name in selection {
        if bundle.request(name).is_none() {
            bail!("no request named `{name}` in bundle");
        }
    }

    let mut report = BundleReport::default();
    let mut stopped = false;

    for (name, raw) in &bundle.requests {
        if !selection.is_empty() && !selection.contains(name) {
            continue;
        }
        if stopped || cancel.is_cancelled() {
            report.not_run.push(name.clone());
            continue;
        }

        let request_cancel = cancel.child_token();
        observer.request_started(name, &request_cancel);
        let request_report =
            run_request(name, &bundle.common, raw, store, client, &request_cancel).await;
        observer.request_finished(&request_report);

        if let RequestOutcome::Cancelled = request_report.outcome {
            report.cancelled.push(name.clone());
            continue;
        }

        if request_report.is_failure() && stops_on_failure(&bundle.common, raw, &request_report) {
            info!(request = %name, "stopping run after failure");
            stopped = true;
        }
        report.requests.push(request_report);
    }

    debug!(
        ran = report.requests.len(),
        cancelled = report.cancelled.len(),
        not_run = report.not_run.len(),
        "bundle run complete"
    );
    Ok(report)
}

fn stops_on_failure(common: &RawRequest, raw: &RawRequest, report: &RequestReport) -> bool {
    if let Some(spec) = &report.request {
        return spec.options.stop_on_failure;
    }
    Options::merged(common.options.as_ref(), raw.options.as_ref())
        .or_else(|_| Options::merged(common.options.as_ref(), None))
        .map(|options| options.stop_on_failure)
        .unwrap_or(false)
}

fn as_display<S: Serializer>(error: &RequestError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}
