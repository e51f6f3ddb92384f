//! Readiness polling.
//!
//! A node is "up" once its cluster port answers an HTTP GET with any
//! response. Each node is probed every `probe_interval`; the whole check is
//! bounded by `max_attempts` windows of `attempt_spacing`. Running out of
//! attempts is not an error: the report lists the stragglers and the join
//! step surfaces any real failure.

use anyhow::{Context, Result};
use futures::future::join_all;
use std::time::Duration;

use devcluster_common::NodeDescriptor;

use crate::config::ReadinessConfig;

/// Outcome of waiting for a set of nodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadinessReport {
    /// Nodes that answered, in node order
    pub ready: Vec<String>,
    /// Nodes still unreachable when the ceiling ran out
    pub pending: Vec<String>,
    /// Outer attempts used
    pub attempts: u32,
}

impl ReadinessReport {
    pub fn all_ready(&self) -> bool {
        self.pending.is_empty()
    }
}

/// HTTP readiness prober
#[derive(Debug, Clone)]
pub struct ReadinessPoller {
    client: reqwest::Client,
    probe_interval: Duration,
    max_attempts: u32,
    attempt_spacing: Duration,
}

impl ReadinessPoller {
    pub fn new(config: &ReadinessConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(1))
            .timeout(Duration::from_secs(2))
            .build()
            .context("Failed to build readiness HTTP client")?;

        Ok(Self {
            client,
            probe_interval: config.probe_interval(),
            max_attempts: config.max_attempts,
            attempt_spacing: config.attempt_spacing(),
        })
    }

    /// One GET against the node's base endpoint
    pub async fn probe(&self, node: &NodeDescriptor) -> bool {
        match self.client.get(node.cluster_url()).send().await {
            Ok(response) => {
                tracing::trace!(node = %node.name, status = %response.status(), "Node answered");
                true
            }
            Err(e) => {
                tracing::trace!(node = %node.name, error = %e, "Node not reachable yet");
                false
            }
        }
    }

    /// Block until `node` answers, probing every `probe_interval`
    pub async fn wait_until_ready(&self, node: &NodeDescriptor) {
        while !self.probe(node).await {
            tokio::time::sleep(self.probe_interval).await;
        }
        tracing::debug!(node = %node.name, "Node is up");
    }

    /// Wait for every node, bounded by the outer attempt ceiling.
    ///
    /// Pending nodes are polled concurrently; each attempt gives them one
    /// `attempt_spacing` window.
    pub async fn wait_all(&self, nodes: &[NodeDescriptor]) -> ReadinessReport {
        let mut pending: Vec<&NodeDescriptor> = nodes.iter().collect();
        let mut report = ReadinessReport::default();

        while !pending.is_empty() && report.attempts < self.max_attempts {
            report.attempts += 1;

            let outcomes = join_all(pending.iter().map(|node| async move {
                let up = tokio::time::timeout(self.attempt_spacing, self.wait_until_ready(node))
                    .await
                    .is_ok();
                (*node, up)
            }))
            .await;

            pending = outcomes
                .into_iter()
                .filter_map(|(node, up)| (!up).then_some(node))
                .collect();

            if !pending.is_empty() {
                tracing::debug!(
                    attempt = report.attempts,
                    max_attempts = self.max_attempts,
                    pending = ?pending.iter().map(|n| n.name.as_str()).collect::<Vec<_>>(),
                    "Nodes not ready yet"
                );
            }
        }

        report.pending = pending.iter().map(|n| n.name.clone()).collect();
        report.ready = nodes
            .iter()
            .filter(|n| !report.pending.contains(&n.name))
            .map(|n| n.name.clone())
            .collect();

        if !report.all_ready() {
            tracing::warn!(
                pending = ?report.pending,
                attempts = report.attempts,
                "Readiness ceiling reached, continuing anyway"
            );
        }
        report
    }
}
