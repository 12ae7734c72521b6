//! CLI command implementations.

pub mod ask;
pub mod catalog;
pub mod plan;

use anyhow::{Context, Result};
use quarry_adapter_pg::{PgExecutor, PgSchemaSource};
use quarry_core::{Catalog, QuarryConfig};
use quarry_policy::SecurityPolicy;
use quarry_runtime::{Orchestrator, ResultFormatter, build_catalog};
use std::path::Path;
use std::sync::Arc;

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "quarry.yaml";

/// Load the explicit config, else `./quarry.yaml` if present, else defaults.
pub fn load_config(path: Option<&Path>) -> Result<QuarryConfig> {
    let path = match path {
        Some(p) => p,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Path::new(DEFAULT_CONFIG_FILE),
        None => {
            tracing::debug!("no config file, using defaults");
            return Ok(QuarryConfig::default());
        }
    };
    let config = QuarryConfig::load(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Everything built once at startup.
pub struct Startup {
    pub source: PgSchemaSource,
    pub policy: Arc<SecurityPolicy>,
    pub catalog: Arc<Catalog>,
}

impl Startup {
    /// Connect and build the catalog. Fails when the schema cannot be read.
    pub async fn connect(config: &QuarryConfig) -> Result<Self> {
        let pool = quarry_adapter_pg::connect(&config.upstream)
            .await
            .context("failed to connect to the database")?;
        let source = PgSchemaSource::new(pool, config.upstream.schema.clone());
        let policy = Arc::new(SecurityPolicy::from_config(&config.policy));
        let catalog = build_catalog(&source, &policy, &config.catalog).await?;
        Ok(Self {
            source,
            policy,
            catalog: Arc::new(catalog),
        })
    }

    pub fn orchestrator(&self, config: &QuarryConfig) -> Orchestrator<PgExecutor> {
        Orchestrator::new(
            self.catalog.clone(),
            self.policy.clone(),
            PgExecutor::new(self.source.pool().clone()),
        )
        .with_formatter(ResultFormatter::from_config(&config.format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn explicit_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        fs::write(
            &path,
            "catalog:\n  default_max_results: 25\nformat:\n  null_token: \"-\"\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.catalog.default_max_results, 25);
        assert_eq!(config.format.null_token, "-");
        assert_eq!(config.format.mask_token, "******");
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.yaml"))).unwrap_err();
        assert!(err.to_string().contains("absent.yaml"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quarry.yaml");
        fs::write(&path, "upstream:\n  pool:\n    max_connections: 0\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("max_connections"));
    }
}
