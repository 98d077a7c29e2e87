mod model;
mod reader;

pub use model::{
    Bundle, MalformedField, NameValue, NamedValues, RawCaptures, RawHeaders, RawParams,
    RawRequest,
};
pub use reader::{load_bundle, parse_bundle, BundleError};
