pub mod assertions;
pub mod bundle;
pub mod capture;
pub mod config;
pub mod error;
pub mod executor;
pub mod jsonpath;
pub mod request;
pub mod runner;
pub mod value;
pub mod vars;

pub use assertions::{run_all_tests, SpecResult, TestResult, Tests};
pub use bundle::{load_bundle, parse_bundle, Bundle};
pub use capture::{capture_variables, SetVar};
pub use error::{MergeError, RequestError};
pub use executor::{execute, ExecutionOutcome, HttpClient, ReqwestClient, ResponseData};
pub use request::{merge_request, RequestSpec};
pub use runner::{run_bundle, run_request, BundleReport, RequestOutcome, RunObserver};
pub use vars::{expand_placeholders, substitute_value, VariableStore};
