//! Runtime configuration (spec.md §6 / SPEC_FULL.md §8.3).
//!
//! Loaded by [`crate::infrastructure::config::loader::ConfigLoader`] via a
//! figment merge of defaults, an optional YAML file, and `AEGIS_`-prefixed
//! environment variables.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmConfig {
    pub max_workers: usize,
    pub task_timeout_ms: u64,
    pub health_check_interval_ms: u64,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_workers: 16,
            task_timeout_ms: 10 * 60 * 1000,
            health_check_interval_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    pub root_path: String,
    pub temp_path: String,
    pub ttl_ms: i64,
    pub sweep_interval_ms: u64,
    pub max_file_bytes: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root_path: "./data/workspaces".into(),
            temp_path: "./data/tmp".into(),
            ttl_ms: 24 * 60 * 60 * 1000,
            sweep_interval_ms: 60 * 60 * 1000,
            max_file_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerConfig {
    pub enabled: bool,
    pub image: String,
    pub socket_path: String,
    pub network: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            image: "aegis/worker:latest".into(),
            socket_path: "/var/run/docker.sock".into(),
            network: "none".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    pub level: String,
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    pub bind_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { bind_addr: "127.0.0.1:8080".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub swarm: SwarmConfig,
    pub workspace: WorkspaceConfig,
    pub container: ContainerConfig,
    pub log: LogConfig,
    pub http: HttpConfig,
}

/// Errors surfaced by [`Config::validate`], mirroring the teacher's
/// `ConfigError` shape (one variant per rejected field).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("swarm.maxWorkers must be > 0")]
    InvalidMaxWorkers,
    #[error("swarm.taskTimeoutMs must be > 0")]
    InvalidTaskTimeout,
    #[error("swarm.healthCheckIntervalMs must be > 0")]
    InvalidHealthCheckInterval,
    #[error("workspace.rootPath must not be empty")]
    EmptyRootPath,
    #[error("workspace.ttlMs must be > 0")]
    InvalidTtl,
    #[error("workspace.maxFileBytes must be > 0")]
    InvalidMaxFileBytes,
    #[error("invalid log.level: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.swarm.max_workers == 0 {
            return Err(ConfigError::InvalidMaxWorkers);
        }
        if self.swarm.task_timeout_ms == 0 {
            return Err(ConfigError::InvalidTaskTimeout);
        }
        if self.swarm.health_check_interval_ms == 0 {
            return Err(ConfigError::InvalidHealthCheckInterval);
        }
        if self.workspace.root_path.trim().is_empty() {
            return Err(ConfigError::EmptyRootPath);
        }
        if self.workspace.ttl_ms <= 0 {
            return Err(ConfigError::InvalidTtl);
        }
        if self.workspace.max_file_bytes == 0 {
            return Err(ConfigError::InvalidMaxFileBytes);
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.log.level.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_max_workers_is_rejected() {
        let mut c = Config::default();
        c.swarm.max_workers = 0;
        assert!(matches!(c.validate(), Err(ConfigError::InvalidMaxWorkers)));
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut c = Config::default();
        c.log.level = "verbose".into();
        assert!(matches!(c.validate(), Err(ConfigError::InvalidLogLevel(_))));
    }
}
