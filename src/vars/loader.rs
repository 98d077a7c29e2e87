use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::debug;

use crate::vars::VarMap;

/// Reads a dotenv file into a variable layer. A key written twice keeps its
/// last value.
pub async fn read_dotenv(path: &Path) -> Result<VarMap> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading dotenv file {}", path.display()))?;

    let layer = dotenvy::from_read_iter(content.as_bytes())
        .map(|entry| entry.with_context(|| format!("parsing dotenv file {}", path.display())))
        .collect::<Result<VarMap>>()?;

    debug!(file = %path.display(), variables = layer.len(), "read dotenv file");
    Ok(layer)
}
