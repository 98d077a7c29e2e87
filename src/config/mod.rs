mod environment;
mod loader;

pub use environment::{available_environments, EnvironmentBuilder, EnvironmentContext};
pub use loader::{load_config, ApiBundleConfig, EnvironmentConfig, LoadedConfig};
