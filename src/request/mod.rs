mod merge;
mod model;
mod params;

pub use merge::merge_request;
pub use model::{HttpSpec, Options, RequestSpec};
pub use params::{build_url, merge_params, query_string, Param};
