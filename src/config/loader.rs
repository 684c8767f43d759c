use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;
use tracing::debug;

use super::{parse_completion_timeout, ConfigError, DaemonConfig};
use crate::checkpoint::ConflictPolicy;

/// Prefix of the environment variables overriding file settings
pub const ENV_PREFIX: &str = "POD_CHECKPOINT_";

/// Load the configuration from `path` (defaults when `None`), apply
/// environment overrides, and validate the result.
pub async fn load_config(path: Option<&Path>) -> Result<DaemonConfig> {
    let mut config = match path {
        Some(path) => load_config_file(path).await?,
        None => DaemonConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())
        .context("Invalid environment override")?;
    config.validate()?;

    Ok(config)
}

/// Read and parse a TOML configuration file
pub async fn load_config_file(path: &Path) -> Result<DaemonConfig, ConfigError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Loaded configuration from {}", path.display());

    Ok(config)
}

/// Apply `POD_CHECKPOINT_*` overrides, reading variables through `lookup`
pub fn apply_env_overrides<F>(config: &mut DaemonConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

    if let Some(addr) = var("LISTEN_ADDR") {
        config.server.listen_addr = addr;
    }

    if let Some(root) = var("ROOT_DIR") {
        config.checkpoint.root_dir = root.into();
    }

    if let Some(timeout) = var("COMPLETION_TIMEOUT") {
        config.checkpoint.completion_timeout = parse_completion_timeout(&timeout).map_err(|e| {
            ConfigError::invalid(format!("{ENV_PREFIX}COMPLETION_TIMEOUT"), e.to_string())
        })?;
    }

    if let Some(policy) = var("CONFLICT_POLICY") {
        config.checkpoint.conflict_policy = match policy.trim() {
            "reject" => ConflictPolicy::Reject,
            "preempt" => ConflictPolicy::Preempt,
            other => {
                return Err(ConfigError::invalid(
                    format!("{ENV_PREFIX}CONFLICT_POLICY"),
                    format!("expected reject or preempt, got {other:?}"),
                ))
            }
        };
    }

    Ok(())
}
