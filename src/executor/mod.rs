mod client;
mod models;
#[cfg(feature = "cli")]
mod printer;
mod runner;

pub use client::{HttpClient, HttpRequest, HttpResponse, ReqwestClient, TransportError};
pub use models::{ExecutionOutcome, ResponseData, ResponseError};
#[cfg(feature = "cli")]
pub use printer::{print_bundle_report, print_request_report, PrintOptions};
pub use runner::{build_http_request, execute};
