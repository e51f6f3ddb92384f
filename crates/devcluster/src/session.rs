//! Per-run session state.

use anyhow::{Context, Result};

use devcluster_common::credential;
use devcluster_common::{AdminCredential, NodeDescriptor};

use crate::config::DevClusterConfig;

/// Administrator account written into every node's config
#[derive(Clone)]
pub struct AdminAccount {
    pub username: String,
    /// Plaintext, kept only to authenticate join requests
    password: String,
    /// Derived once; identical for every node
    pub hashed: String,
}

impl std::fmt::Debug for AdminAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAccount")
            .field("username", &self.username)
            .field("hashed", &self.hashed)
            .finish_non_exhaustive()
    }
}

impl AdminAccount {
    pub fn basic_auth(&self) -> (&str, &str) {
        (&self.username, &self.password)
    }
}

/// Top-level state of one devcluster run.
///
/// The secret and hashed credential are fixed at construction and only read
/// afterwards.
#[derive(Debug, Clone)]
pub struct ClusterSession {
    nodes: Vec<NodeDescriptor>,
    secret: String,
    admin: Option<AdminAccount>,
}

impl ClusterSession {
    /// Build a session for `config`, generating a fresh secret and salt
    pub fn new(config: &DevClusterConfig, admin: Option<AdminCredential>) -> Result<Self> {
        let nodes = NodeDescriptor::for_cluster(config.node_count, &config.ports, &config.dev_dir);
        Self::with_secret(nodes, credential::generate_secret(), &credential::generate_salt(), admin)
    }

    /// Build a session from explicit parts
    pub fn with_secret(
        nodes: Vec<NodeDescriptor>,
        secret: String,
        salt: &str,
        admin: Option<AdminCredential>,
    ) -> Result<Self> {
        let admin = admin
            .map(|cred| -> Result<AdminAccount> {
                let hashed = credential::derive_default(&cred.password, salt)
                    .context("Failed to derive administrator credential")?;
                Ok(AdminAccount {
                    username: cred.username,
                    password: cred.password,
                    hashed,
                })
            })
            .transpose()?;

        tracing::debug!(
            nodes = nodes.len(),
            admin = admin.as_ref().map(|a| a.username.as_str()),
            "Session prepared"
        );

        Ok(Self { nodes, secret, admin })
    }

    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn admin(&self) -> Option<&AdminAccount> {
        self.admin.as_ref()
    }

    /// Node whose administrative port receives membership requests
    pub fn coordinator(&self) -> Option<&NodeDescriptor> {
        self.nodes.first()
    }
}
