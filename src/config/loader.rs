use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::value::scalar_text;
use crate::vars::VarMap;

const CONFIG_FILE_NAMES: [&str; 3] = ["apibundle.json", "apibundle.yaml", "apibundle.yml"];

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Bundle varsets applied in order, later ones winning.
    pub varsets: Vec<String>,
    pub variables: IndexMap<String, Value>,
    pub env: Option<String>,
    #[serde(flatten)]
    pub extras: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ApiBundleConfig {
    pub variables: IndexMap<String, Value>,
    #[serde(rename = "defaultEnvironment")]
    pub default_environment: Option<String>,
    pub environments: IndexMap<String, EnvironmentConfig>,
    #[serde(flatten)]
    pub extras: IndexMap<String, Value>,
}

impl ApiBundleConfig {
    pub fn variables(&self) -> VarMap {
        string_values(&self.variables)
    }
}

impl EnvironmentConfig {
    pub fn variables(&self) -> VarMap {
        string_values(&self.variables)
    }
}

fn string_values(values: &IndexMap<String, Value>) -> VarMap {
    values
        .iter()
        .map(|(name, value)| (name.clone(), scalar_text(value)))
        .collect()
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ApiBundleConfig,
    pub path: PathBuf,
    pub dir: PathBuf,
}

/// Loads the config from a file, or from the first known config file name
/// inside a directory. A missing file is not an error.
pub fn load_config(target: &Path) -> Result<Option<LoadedConfig>> {
    let resolved = if target.is_absolute() {
        target.to_path_buf()
    } else {
        std::env::current_dir()?.join(target)
    };

    let (file_path, dir) = if resolved.is_dir() {
        let found = CONFIG_FILE_NAMES
            .iter()
            .map(|name| resolved.join(name))
            .find(|candidate| candidate.is_file());
        match found {
            Some(path) => (path, resolved),
            None => return Ok(None),
        }
    } else {
        let dir = resolved
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| anyhow!("config path {} has no parent", resolved.display()))?;
        (resolved, dir)
    };

    if !file_path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&file_path)
        .with_context(|| format!("reading config {}", file_path.display()))?;

    let config: ApiBundleConfig = if is_yaml(&file_path) {
        serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing config {}", file_path.display()))?
    } else {
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing config {}", file_path.display()))?
    };

    for key in config.extras.keys() {
        warn!(key = %key, config = %file_path.display(), "ignoring unknown config key");
    }
    for (name, environment) in &config.environments {
        for key in environment.extras.keys() {
            warn!(environment = %name, key = %key, "ignoring unknown environment key");
        }
    }
    debug!(config = %file_path.display(), environments = config.environments.len(), "loaded config");

    Ok(Some(LoadedConfig {
        config,
        path: file_path,
        dir,
    }))
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}
