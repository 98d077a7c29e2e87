use indexmap::IndexMap;

pub type VarMap = IndexMap<String, String>;

mod loader;
mod store;
mod substitute;

pub use loader::read_dotenv;
pub use store::VariableStore;
pub use substitute::{expand_placeholders, substitute_value, SubstituteError, MAX_DEPTH};
