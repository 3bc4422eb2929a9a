//! Hierarchical configuration loading (SPEC_FULL.md §8.3).
//!
//! Precedence (lowest to highest): programmatic defaults, an optional
//! `aegis.yaml`, then `AEGIS_`-prefixed environment variables (`__` nesting,
//! e.g. `AEGIS_SWARM__MAX_WORKERS=32`).

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::domain::models::config::Config;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads from `./aegis.yaml` (if present) and the environment.
    ///
    /// # Errors
    /// Returns an error if extraction fails or the merged config doesn't
    /// pass [`Config::validate`].
    pub fn load() -> Result<Config> {
        Self::load_from_file("aegis.yaml")
    }

    /// Loads from a specific YAML file path (used by tests and `--config`).
    ///
    /// # Errors
    /// Returns an error if extraction fails or the merged config doesn't
    /// pass [`Config::validate`].
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("AEGIS_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        config.validate().context("configuration validation failed")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_from_file_falls_back_to_defaults_when_file_absent() {
        let config = ConfigLoader::load_from_file("/nonexistent/aegis.yaml").unwrap();
        assert_eq!(config.swarm.max_workers, 16);
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "swarm:\n  maxWorkers: 4").unwrap();
        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.swarm.max_workers, 4);
        assert_eq!(config.swarm.task_timeout_ms, Config::default().swarm.task_timeout_ms);
    }

    #[test]
    fn env_var_overrides_yaml_and_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "swarm:\n  maxWorkers: 4").unwrap();

        temp_env::with_var("AEGIS_SWARM__MAXWORKERS", Some("8"), || {
            let config = ConfigLoader::load_from_file(file.path()).unwrap();
            assert_eq!(config.swarm.max_workers, 8);
        });
    }

    #[test]
    fn invalid_merged_config_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "swarm:\n  maxWorkers: 0").unwrap();
        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }
}
