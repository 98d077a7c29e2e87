use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::info;

use crate::bundle::Bundle;
use crate::vars::{read_dotenv, VarMap, VariableStore};

use super::loader::{EnvironmentConfig, LoadedConfig};

fn resolve_relative(base: &Path, value: &str) -> PathBuf {
    let candidate = Path::new(value);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

/// The variables a run starts from, and where they came from.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentContext {
    pub environment: Option<String>,
    pub initial_vars: VarMap,
    pub env_files: Vec<PathBuf>,
}

impl EnvironmentContext {
    /// A fresh store seeded with the initial variables. Switching environment
    /// means building a new context, never patching an old store.
    pub fn store(&self) -> VariableStore {
        VariableStore::from(self.initial_vars.clone())
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentBuilder {
    config: Option<LoadedConfig>,
    requested_environment: Option<String>,
    explicit_env: Option<PathBuf>,
}

impl EnvironmentBuilder {
    pub fn new(
        config: Option<LoadedConfig>,
        requested_environment: Option<String>,
        explicit_env: Option<PathBuf>,
    ) -> Self {
        Self {
            config,
            requested_environment,
            explicit_env,
        }
    }

    /// Layers, lowest precedence first: global config variables, the
    /// environment's varsets, its inline variables, its dotenv file, then the
    /// explicit env file.
    pub async fn build(&self, bundle: &Bundle) -> Result<EnvironmentContext> {
        let mut initial_vars = VarMap::new();
        let mut env_files = Vec::new();
        let mut environment = None;

        if let Some(cfg) = &self.config {
            initial_vars.extend(cfg.config.variables());

            let name = self
                .requested_environment
                .as_deref()
                .or(cfg.config.default_environment.as_deref());

            if let Some(name) = name {
                match cfg.config.environments.get(name) {
                    Some(env_config) => env_files.extend(
                        apply_environment(env_config, bundle, &cfg.dir, &mut initial_vars)
                            .await?,
                    ),
                    None => initial_vars.extend(bundle_varset(bundle, name)?),
                }
                environment = Some(name.to_string());
            }
        } else if let Some(name) = &self.requested_environment {
            initial_vars.extend(bundle_varset(bundle, name)?);
            environment = Some(name.clone());
        }

        if let Some(explicit) = &self.explicit_env {
            initial_vars.extend(read_dotenv(explicit).await?);
            env_files.push(explicit.clone());
        }

        info!(
            environment = environment.as_deref().unwrap_or("<none>"),
            variables = initial_vars.len(),
            "environment ready"
        );

        Ok(EnvironmentContext {
            environment,
            initial_vars,
            env_files,
        })
    }
}

async fn apply_environment(
    env_config: &EnvironmentConfig,
    bundle: &Bundle,
    config_dir: &Path,
    vars: &mut VarMap,
) -> Result<Option<PathBuf>> {
    for varset in &env_config.varsets {
        match bundle.varset(varset) {
            Some(values) => vars.extend(values),
            None => bail!("Unknown varset: {}", varset),
        }
    }
    vars.extend(env_config.variables());

    match &env_config.env {
        Some(env) => {
            let path = resolve_relative(config_dir, env);
            vars.extend(read_dotenv(&path).await?);
            Ok(Some(path))
        }
        None => Ok(None),
    }
}

fn bundle_varset(bundle: &Bundle, name: &str) -> Result<VarMap> {
    match bundle.varset(name) {
        Some(values) => Ok(values),
        None => bail!("Unknown environment: {}", name),
    }
}

/// Environment names a run can pick: configured ones first, then bundle
/// varsets not already listed.
pub fn available_environments(config: Option<&LoadedConfig>, bundle: &Bundle) -> Vec<String> {
    let mut names: Vec<String> = config
        .map(|cfg| cfg.config.environments.keys().cloned().collect())
        .unwrap_or_default();
    for varset in bundle.varsets.keys() {
        if !names.contains(varset) {
            names.push(varset.clone());
        }
    }
    names
}
