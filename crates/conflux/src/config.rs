//! Configuration loading

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use conflux_common::Config;

/// Load configuration from file, falling back to defaults when it does not exist.
pub async fn load(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load(path)
            .await
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    } else {
        debug!("No configuration at {}, using defaults", path.display());
        Ok(Config::default())
    }
}
