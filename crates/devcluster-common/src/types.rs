//! Core types shared across devcluster components.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::constants::{
    CLUSTER_PORT_BASE, NODE_HOST, NODE_NAME_PREFIX, NODE_PORT_BASE, PORT_STRIDE,
};
use crate::error::DevClusterError;

/// Deterministic port assignment.
///
/// Node `k` (1-based) listens on `cluster_base + stride * k` for clustered
/// traffic and `node_base + stride * k` for node-local administration, so
/// repeated sessions reuse the same ports and no two nodes collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortScheme {
    pub cluster_base: u16,
    pub node_base: u16,
    pub stride: u16,
}

impl PortScheme {
    pub fn cluster_port(&self, index: usize) -> u16 {
        self.cluster_base + self.stride * index as u16
    }

    pub fn node_port(&self, index: usize) -> u16 {
        self.node_base + self.stride * index as u16
    }

    /// Check that `count` nodes fit into the 16-bit port space and that no
    /// two derived ports coincide
    pub fn validate(&self, count: usize) -> Result<(), DevClusterError> {
        if self.stride == 0 && count > 1 {
            return Err(DevClusterError::Config(
                "port stride must be non-zero for more than one node".to_string(),
            ));
        }
        let highest = self.cluster_base.max(self.node_base) as u64
            + self.stride as u64 * count as u64;
        if highest > u16::MAX as u64 {
            return Err(DevClusterError::Config(format!(
                "{count} nodes with stride {} overflow the port range",
                self.stride
            )));
        }

        let mut seen = HashSet::with_capacity(count * 2);
        for index in 1..=count {
            for port in [self.cluster_port(index), self.node_port(index)] {
                if !seen.insert(port) {
                    return Err(DevClusterError::Config(format!(
                        "port {port} is assigned twice (bases {}/{}, stride {})",
                        self.cluster_base, self.node_base, self.stride
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for PortScheme {
    fn default() -> Self {
        Self {
            cluster_base: CLUSTER_PORT_BASE,
            node_base: NODE_PORT_BASE,
            stride: PORT_STRIDE,
        }
    }
}

/// Everything needed to launch and address one node. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    /// 1-based position in the cluster
    pub index: usize,
    /// Short name, e.g. `node1`
    pub name: String,
    /// Cluster-facing HTTP port
    pub cluster_port: u16,
    /// Node-local administrative (inter-node) port
    pub node_port: u16,
    /// Node's `local.ini`
    pub config_path: PathBuf,
    /// Node's database directory
    pub data_dir: PathBuf,
    /// File receiving the node's stdout and stderr
    pub log_path: PathBuf,
}

impl NodeDescriptor {
    /// Lay out node `index` under `dev_dir`:
    /// `lib/<name>/etc/local.ini`, `lib/<name>/data`, `logs/<name>.log`.
    pub fn new(index: usize, ports: &PortScheme, dev_dir: &Path) -> Self {
        let name = format!("{NODE_NAME_PREFIX}{index}");
        let node_dir = dev_dir.join("lib").join(&name);
        Self {
            index,
            cluster_port: ports.cluster_port(index),
            node_port: ports.node_port(index),
            config_path: node_dir.join("etc").join("local.ini"),
            data_dir: node_dir.join("data"),
            log_path: dev_dir.join("logs").join(format!("{name}.log")),
            name,
        }
    }

    /// Descriptors for `node1..nodeN`
    pub fn for_cluster(count: usize, ports: &PortScheme, dev_dir: &Path) -> Vec<Self> {
        (1..=count)
            .map(|index| Self::new(index, ports, dev_dir))
            .collect()
    }

    /// Name the node is registered under in the cluster, e.g. `node1@127.0.0.1`
    pub fn identity(&self) -> String {
        format!("{}@{}", self.name, NODE_HOST)
    }

    /// Base URL of the cluster-facing endpoint
    pub fn cluster_url(&self) -> String {
        format!("http://{}:{}", NODE_HOST, self.cluster_port)
    }

    /// Directory holding the node's config files
    pub fn etc_dir(&self) -> &Path {
        self.config_path.parent().unwrap_or(Path::new("."))
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Administrator credential as given on the command line (`user:pass`).
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredential {
    pub username: String,
    pub password: String,
}

impl AdminCredential {
    /// Parse `user:pass`, splitting at the first `:`
    pub fn parse(value: &str) -> Result<Self, DevClusterError> {
        let (username, password) = value.split_once(':').ok_or_else(|| {
            DevClusterError::InvalidCredential("expected user:pass".to_string())
        })?;
        if username.is_empty() {
            return Err(DevClusterError::InvalidCredential(
                "username is empty".to_string(),
            ));
        }
        if password.is_empty() {
            return Err(DevClusterError::InvalidCredential(
                "password is empty".to_string(),
            ));
        }
        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

// Keep the password out of logs.
impl fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredential")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl std::str::FromStr for AdminCredential {
    type Err = DevClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
