//! Configuration types for Quarry.
//!
//! A single YAML file (`quarry.yaml` by default) holds the upstream
//! connection, the table/column policy extensions, per-table catalog
//! overrides and the output tokens. Every section has defaults, so an empty
//! file is a valid configuration.

pub mod upstream;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use upstream::{PoolConfig, UpstreamConfig};

use crate::catalog::DEFAULT_MAX_RESULTS;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete Quarry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuarryConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub format: FormatConfig,
}

impl QuarryConfig {
    /// Load and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        // serde_yaml rejects an empty document for a struct; treat it as defaults.
        let config: QuarryConfig = if raw.trim().is_empty() {
            QuarryConfig::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.pool.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "upstream.pool.max_connections must be at least 1".to_string(),
            ));
        }
        if self.catalog.default_max_results == 0 {
            return Err(ConfigError::Invalid(
                "catalog.default_max_results must be at least 1".to_string(),
            ));
        }
        for (table, o) in &self.catalog.tables {
            if o.max_results == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "catalog.tables.{}.max_results must be at least 1",
                    table
                )));
            }
            // An empty display name is a substring of every question.
            if o.display_name.as_deref().is_some_and(|d| d.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "catalog.tables.{}.display_name must not be empty",
                    table
                )));
            }
        }
        Ok(())
    }
}

/// Extensions to the built-in table and column policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// When non-empty, only these tables may enter the catalog.
    #[serde(default)]
    pub allowed_tables: Vec<String>,

    /// Added to the built-in deny-list.
    #[serde(default)]
    pub denied_tables: Vec<String>,

    /// Added to the built-in sensitive column name fragments.
    #[serde(default)]
    pub sensitive_column_fragments: Vec<String>,
}

/// Catalog construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_max_results")]
    pub default_max_results: u32,

    /// Per-table overrides keyed by table name.
    #[serde(default)]
    pub tables: BTreeMap<String, TableOverride>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_max_results: default_max_results(),
            tables: BTreeMap::new(),
        }
    }
}

/// Optional overrides applied to a discovered table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchable: Option<bool>,
}

/// Tokens used by the result formatter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    #[serde(default = "default_mask_token")]
    pub mask_token: String,

    #[serde(default = "default_null_token")]
    pub null_token: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            mask_token: default_mask_token(),
            null_token: default_null_token(),
        }
    }
}

fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

fn default_mask_token() -> String {
    "******".to_string()
}

fn default_null_token() -> String {
    "N/A".to_string()
}
