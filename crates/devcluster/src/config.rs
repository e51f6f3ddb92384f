//! Configuration management for devcluster.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use devcluster_common::PortScheme;
use devcluster_common::constants::{
    DEFAULT_NODE_COUNT, JOIN_REQUEST_TIMEOUT_SECS, LIVENESS_INTERVAL_MS,
    READINESS_ATTEMPT_SPACING_MS, READINESS_MAX_ATTEMPTS, READINESS_PROBE_INTERVAL_MS,
};

/// Supervisor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DevClusterConfig {
    /// Number of nodes to launch
    #[serde(default = "default_node_count")]
    pub node_count: usize,

    /// Working directory for node configs, data, and logs
    #[serde(default = "default_dev_dir")]
    pub dev_dir: PathBuf,

    /// Node executable
    #[serde(default = "default_node_binary")]
    pub node_binary: PathBuf,

    /// Extra arguments passed to every node
    #[serde(default)]
    pub node_args: Vec<String>,

    /// Shared ini read by every node before its own `local.ini`
    #[serde(default)]
    pub base_config: Option<PathBuf>,

    /// Code/library search path handed to nodes (defaults to `<dev_dir>/lib`)
    #[serde(default)]
    pub lib_path: Option<PathBuf>,

    /// Append to node logs instead of truncating them
    #[serde(default)]
    pub append_logs: bool,

    /// Skip the cluster-join step
    #[serde(default)]
    pub no_join: bool,

    /// Port assignment
    #[serde(default)]
    pub ports: PortScheme,

    /// Readiness polling
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// Liveness check interval in milliseconds
    #[serde(default = "default_liveness_interval")]
    pub liveness_interval_ms: u64,

    /// Join request timeout in seconds
    #[serde(default = "default_join_timeout")]
    pub join_timeout_secs: u64,
}

/// Readiness polling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessConfig {
    /// Delay between probes of one node
    #[serde(default = "default_probe_interval")]
    pub probe_interval_ms: u64,

    /// Outer ceiling: number of attempts
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Outer ceiling: spacing between attempts
    #[serde(default = "default_attempt_spacing")]
    pub attempt_spacing_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: default_probe_interval(),
            max_attempts: default_max_attempts(),
            attempt_spacing_ms: default_attempt_spacing(),
        }
    }
}

impl ReadinessConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn attempt_spacing(&self) -> Duration {
        Duration::from_millis(self.attempt_spacing_ms)
    }
}

// Default value functions
fn default_node_count() -> usize { DEFAULT_NODE_COUNT }
fn default_dev_dir() -> PathBuf { PathBuf::from("dev") }
fn default_node_binary() -> PathBuf { PathBuf::from("bin/couchdb") }
fn default_liveness_interval() -> u64 { LIVENESS_INTERVAL_MS }
fn default_join_timeout() -> u64 { JOIN_REQUEST_TIMEOUT_SECS }
fn default_probe_interval() -> u64 { READINESS_PROBE_INTERVAL_MS }
fn default_max_attempts() -> u32 { READINESS_MAX_ATTEMPTS }
fn default_attempt_spacing() -> u64 { READINESS_ATTEMPT_SPACING_MS }

impl DevClusterConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &Path, args: &super::Args) -> Result<Self> {
        let mut config = if config_path.exists() {
            let settings = config::Config::builder()
                .add_source(config::File::from(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            tracing::debug!(path = %config_path.display(), "Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(nodes) = args.nodes {
            config.node_count = nodes;
        }
        if let Some(ref dev_dir) = args.dev_dir {
            config.dev_dir = dev_dir.clone();
        }
        if let Some(ref node_bin) = args.node_bin {
            config.node_binary = node_bin.clone();
        }
        if args.no_join {
            config.no_join = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings no session can run with
    pub fn validate(&self) -> Result<()> {
        if self.node_count == 0 {
            anyhow::bail!("node count must be at least 1");
        }
        if self.readiness.max_attempts == 0 {
            anyhow::bail!("readiness.max_attempts must be at least 1");
        }
        if self.liveness_interval_ms == 0 {
            anyhow::bail!("liveness_interval_ms must be positive");
        }
        self.ports.validate(self.node_count)?;
        Ok(())
    }

    /// Library search path handed to every node
    pub fn lib_path(&self) -> PathBuf {
        self.lib_path
            .clone()
            .unwrap_or_else(|| self.dev_dir.join("lib"))
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }
}

impl Default for DevClusterConfig {
    fn default() -> Self {
        Self {
            node_count: default_node_count(),
            dev_dir: default_dev_dir(),
            node_binary: default_node_binary(),
            node_args: Vec::new(),
            base_config: None,
            lib_path: None,
            append_logs: false,
            no_join: false,
            ports: PortScheme::default(),
            readiness: ReadinessConfig::default(),
            liveness_interval_ms: default_liveness_interval(),
            join_timeout_secs: default_join_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_match_reference_timings() {
        let config = DevClusterConfig::default();
        assert_eq!(config.node_count, 3);
        assert_eq!(config.readiness.probe_interval(), Duration::from_millis(250));
        assert_eq!(config.readiness.max_attempts, 30);
        assert_eq!(config.readiness.attempt_spacing(), Duration::from_secs(1));
        assert_eq!(config.liveness_interval(), Duration::from_secs(2));
        assert_eq!(config.lib_path(), PathBuf::from("dev/lib"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_values_then_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devcluster.toml");
        std::fs::write(
            &path,
            r#"
node_count = 2
node_binary = "/opt/couchdb/bin/couchdb"
append_logs = true
liveness_interval_ms = 500

[ports]
cluster_base = 6984
node_base = 6986
stride = 1000

[readiness]
max_attempts = 5
"#,
        )
        .unwrap();

        let args = crate::Args::parse_from(["devcluster", "-n", "4", "--no-join"]);
        let config = DevClusterConfig::load(&path, &args).unwrap();
        assert_eq!(config.node_count, 4);
        assert!(config.no_join);
        assert!(config.append_logs);
        assert_eq!(config.node_binary, PathBuf::from("/opt/couchdb/bin/couchdb"));
        assert_eq!(config.ports.cluster_port(2), 8984);
        assert_eq!(config.readiness.max_attempts, 5);
        assert_eq!(config.readiness.probe_interval_ms, 250);
        assert_eq!(config.liveness_interval(), Duration::from_millis(500));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let args = crate::Args::parse_from(["devcluster"]);
        let config = DevClusterConfig::load(Path::new("/nonexistent/devcluster.toml"), &args).unwrap();
        assert_eq!(config.node_count, 3);
        assert!(!config.no_join);
    }

    #[test]
    fn zero_nodes_rejected() {
        let args = crate::Args::parse_from(["devcluster", "-n", "0"]);
        assert!(DevClusterConfig::load(Path::new("/nonexistent"), &args).is_err());
    }

    #[test]
    fn colliding_port_stride_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devcluster.toml");
        std::fs::write(
            &path,
            r#"
[ports]
cluster_base = 5984
node_base = 5986
stride = 2
"#,
        )
        .unwrap();

        let args = crate::Args::parse_from(["devcluster"]);
        let err = DevClusterConfig::load(&path, &args).unwrap_err();
        assert!(format!("{err:#}").contains("assigned twice"), "{err:#}");

        let single = crate::Args::parse_from(["devcluster", "-n", "1"]);
        assert!(DevClusterConfig::load(&path, &single).is_ok());
    }
}
