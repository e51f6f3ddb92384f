//! Common error types for devcluster components.

use thiserror::Error;

/// Common errors across devcluster components
#[derive(Debug, Error)]
pub enum DevClusterError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or empty administrator credential
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Node executable could not be started
    #[error("Failed to launch {node}: {reason}")]
    Launch { node: String, reason: String },

    /// Coordinator rejected a membership request
    #[error("Failed to join {node}: coordinator answered {status}{}", reason_suffix(.reason))]
    JoinRejected {
        node: String,
        status: u16,
        reason: Option<String>,
    },

    /// Membership request never got an answer
    #[error("Failed to join {node}: {reason}")]
    JoinUnreachable { node: String, reason: String },

    /// A supervised node exited while the cluster was running
    #[error("Node(s) exited unexpectedly: {}", .0.join(", "))]
    NodeDied(Vec<String>),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(" ({r})"))
        .unwrap_or_default()
}

impl DevClusterError {
    /// Node this error is about, if any
    pub fn node(&self) -> Option<&str> {
        match self {
            Self::Launch { node, .. }
            | Self::JoinRejected { node, .. }
            | Self::JoinUnreachable { node, .. } => Some(node),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_rejection_names_node_and_status() {
        let err = DevClusterError::JoinRejected {
            node: "node2@127.0.0.1".to_string(),
            status: 500,
            reason: Some("internal_server_error".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("node2@127.0.0.1"));
        assert!(msg.contains("500"));
        assert!(msg.contains("internal_server_error"));
        assert_eq!(err.node(), Some("node2@127.0.0.1"));
    }

    #[test]
    fn node_died_lists_every_node() {
        let err = DevClusterError::NodeDied(vec!["node1".into(), "node3".into()]);
        assert_eq!(err.to_string(), "Node(s) exited unexpectedly: node1, node3");
        assert_eq!(err.node(), None);
    }
}
