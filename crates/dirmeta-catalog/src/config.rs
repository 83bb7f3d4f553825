//! Catalog configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for a `MetadataCatalog` instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// `EnvFilter` directive used when no `RUST_LOG` is set.
    pub log_filter: String,
    /// Emit JSON formatted log lines.
    pub json_logs: bool,
    /// Maximum nesting of metadata-set references during expansion.
    pub max_set_depth: usize,
    /// Migrate matching parameters into a field's table when it is created.
    pub promote_parameters: bool,
    /// Reject text values longer than a VARCHAR(n) bound.
    pub strict_text_length: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            log_filter: String::from("info"),
            json_logs: false,
            max_set_depth: 16,
            promote_parameters: true,
            strict_text_length: true,
        }
    }
}

impl CatalogConfig {
    /// Loads a configuration from a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let config: CatalogConfig = match ext.to_lowercase().as_str() {
            "toml" => toml::from_str(&contents)?,
            "json" => serde_json::from_str(&contents)?,
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_set_depth == 0 {
            anyhow::bail!("max_set_depth must be at least 1");
        }
        Ok(())
    }
}
