use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::request::RequestSpec;

use super::client::{HttpClient, HttpRequest};
use super::models::{ExecutionOutcome, ResponseData};

/// Sends one resolved request, racing it against `cancel`.
///
/// Any status code is a completed execution. Transport failures complete
/// too, with the error placeholder instead of a response.
pub async fn execute(
    client: &dyn HttpClient,
    spec: &RequestSpec,
    cancel: &CancellationToken,
) -> ExecutionOutcome {
    let request = build_http_request(spec);
    debug!(request = %spec.name, method = %request.method, url = %request.url, "sending request");

    let start = Instant::now();
    let sent = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!(request = %spec.name, "request cancelled");
            return ExecutionOutcome::Cancelled;
        }
        sent = client.send(request) => sent,
    };

    let response = match sent {
        Ok(response) => ResponseData::from_http(response),
        Err(err) => {
            warn!(request = %spec.name, error = %err, "request failed");
            ResponseData::failed(err)
        }
    }
    .timed(start.elapsed());

    info!(
        request = %spec.name,
        status = ?response.status,
        elapsed_ms = response.execution_time_ms,
        "request finished"
    );
    ExecutionOutcome::Completed(response)
}

pub fn build_http_request(spec: &RequestSpec) -> HttpRequest {
    HttpRequest {
        method: spec.http.method.clone(),
        url: spec.full_url(),
        headers: spec
            .http
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        body: spec.http.body_text(),
        follow_redirects: spec.options.follow,
        verify_tls: spec.options.verify_ssl,
    }
}
