//! Cluster inventory file
//!
//! Describes the nodes of a cluster, how to reach them and the Hadoop
//! tunables to apply. YAML and TOML are both accepted; the format follows
//! the file extension.

use super::HadoopSettings;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read inventory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid inventory: {0}")]
    Invalid(String),

    #[error("Could not determine the default inventory location")]
    NoDefaultLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    pub cluster_name: String,

    /// User whose HDFS home directory is created after startup
    #[serde(default = "default_owner_user")]
    pub owner_user: String,

    /// Upper bound on concurrently running node jobs
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    #[serde(default)]
    pub ssh: SshSettings,

    /// Ordered node list; the first entry is the master
    pub nodes: Vec<NodeEntry>,

    #[serde(default)]
    pub hadoop: HadoopSettings,

    #[serde(default)]
    pub firewall: FirewallSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub alias: String,
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshSettings {
    #[serde(default = "default_ssh_user")]
    pub user: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default)]
    pub identity_file: Option<PathBuf>,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Per-command deadline; unlimited when absent
    #[serde(default, with = "humantime_serde")]
    pub command_timeout: Option<Duration>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: default_ssh_user(),
            port: default_ssh_port(),
            identity_file: None,
            connect_timeout: default_connect_timeout(),
            command_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallSettings {
    #[serde(default = "default_firewall_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub region: Option<String>,

    /// Security group name; defaults to `@sc-<cluster_name>`
    #[serde(default)]
    pub security_group: Option<String>,
}

impl Default for FirewallSettings {
    fn default() -> Self {
        Self {
            enabled: default_firewall_enabled(),
            region: None,
            security_group: None,
        }
    }
}

impl Inventory {
    /// Load an inventory, choosing the parser from the file extension
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let inventory = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content)?,
            _ => Self::from_yaml_str(&content)?,
        };
        tracing::debug!(
            "Loaded inventory '{}' with {} node(s) from {}",
            inventory.cluster_name,
            inventory.nodes.len(),
            path.display()
        );
        Ok(inventory)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let inventory: Self = serde_yaml::from_str(content)?;
        inventory.validate()?;
        Ok(inventory)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let inventory: Self = toml::from_str(content)?;
        inventory.validate()?;
        Ok(inventory)
    }

    /// `<config dir>/hadoop-bootstrap/cluster.yml` for the current user
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("org", "hadoop-bootstrap", "hadoop-bootstrap")
            .map(|dirs| dirs.config_dir().join("cluster.yml"))
            .ok_or(ConfigError::NoDefaultLocation)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one node (the master) is required".to_string(),
            ));
        }

        let mut aliases = HashSet::new();
        for node in &self.nodes {
            if node.alias.trim().is_empty() || node.host.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "node alias and host must not be empty".to_string(),
                ));
            }
            if !aliases.insert(node.alias.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate node alias '{}'",
                    node.alias
                )));
            }
        }

        if self.max_parallel == 0 {
            return Err(ConfigError::Invalid(
                "max_parallel must be at least 1".to_string(),
            ));
        }

        let factor = self.hadoop.reduce_tasks_factor;
        if !factor.is_finite() || factor < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "reduce_tasks_factor must be a non-negative number, got {factor}"
            )));
        }

        if self.hadoop.dfs_replication == Some(0) {
            return Err(ConfigError::Invalid(
                "dfs_replication must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn security_group(&self) -> String {
        self.firewall
            .security_group
            .clone()
            .unwrap_or_else(|| format!("@sc-{}", self.cluster_name))
    }
}

fn default_owner_user() -> String {
    "sgeadmin".to_string()
}

fn default_max_parallel() -> usize {
    20
}

fn default_ssh_user() -> String {
    "root".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_firewall_enabled() -> bool {
    true
}
