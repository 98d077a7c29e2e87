mod compare;
mod engine;
mod model;

pub use engine::{run_all_tests, OPERATORS};
pub use model::{SpecResult, TestCounts, TestResult, Tests};
