pub mod config;
pub mod info;
pub mod preprocess;
pub mod recon;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Load a TOML config file.
pub(crate) fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("Invalid config {}", path.display()))
}
