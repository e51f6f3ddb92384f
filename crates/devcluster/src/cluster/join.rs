//! Cluster join protocol.
//!
//! Every node is registered with the coordinator through
//! `PUT /_nodes/<identity>` (empty body), one request at a time in node
//! order. 200/201/202 mean applied or accepted, 409 means already a member.
//! Anything else aborts the session; already-joined nodes are not rolled back.

use anyhow::{Context, Result};
use std::time::Duration;

use devcluster_common::constants::JOIN_ACCEPTED_STATUSES;
use devcluster_common::{DevClusterError, NodeDescriptor};

use crate::reporter::Reporter;

/// True for coordinator answers that mean the node is (or already was) a member
pub fn is_accepted(status: u16) -> bool {
    JOIN_ACCEPTED_STATUSES.contains(&status)
}

/// Client for the coordinator's membership endpoint
#[derive(Debug, Clone)]
pub struct ClusterJoiner {
    client: reqwest::Client,
    base_url: String,
    auth: Option<(String, String)>,
}

impl ClusterJoiner {
    pub fn new(coordinator_host: &str, coordinator_port: u16, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build cluster join HTTP client")?;

        Ok(Self {
            client,
            base_url: format!("http://{coordinator_host}:{coordinator_port}"),
            auth: None,
        })
    }

    /// Authenticate join requests as the session administrator
    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.auth = Some((username.to_string(), password.to_string()));
        self
    }

    pub fn membership_url(&self, node: &NodeDescriptor) -> String {
        format!("{}/_nodes/{}", self.base_url, node.identity())
    }

    /// Register one node. Returns the accepted status code.
    pub async fn join(&self, node: &NodeDescriptor) -> Result<u16, DevClusterError> {
        let identity = node.identity();
        let mut request = self
            .client
            .put(self.membership_url(node))
            .body("");
        if let Some((ref user, ref pass)) = self.auth {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request
            .send()
            .await
            .map_err(|e| DevClusterError::JoinUnreachable {
                node: identity.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if is_accepted(status) {
            tracing::info!(node = %identity, status, "Node joined");
            return Ok(status);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!(node = %identity, status, body = %body, "Join rejected");
        Err(DevClusterError::JoinRejected {
            node: identity,
            status,
            reason: error_reason(&body),
        })
    }

    /// Register every node, sequentially and in order; stop at the first
    /// rejection.
    pub async fn join_all(
        &self,
        nodes: &[NodeDescriptor],
        reporter: &Reporter,
    ) -> Result<(), DevClusterError> {
        for node in nodes {
            reporter
                .step(format!("Adding {} to the cluster", node.identity()), self.join(node))
                .await?;
        }
        Ok(())
    }
}

/// Pull `reason` (or `error`) out of a JSON error body
fn error_reason(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("reason")
        .or_else(|| value.get("error"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}
