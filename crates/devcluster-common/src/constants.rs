//! Shared constants for devcluster components.

/// Default number of nodes in a development cluster
pub const DEFAULT_NODE_COUNT: usize = 3;

/// Host every node binds to
pub const NODE_HOST: &str = "127.0.0.1";

/// Prefix for node names (`node1`, `node2`, ...)
pub const NODE_NAME_PREFIX: &str = "node";

/// Base of the cluster-facing (clustered HTTP) port
pub const CLUSTER_PORT_BASE: u16 = 5984;

/// Base of the node-local administrative port
pub const NODE_PORT_BASE: u16 = 5986;

/// Distance between consecutive nodes' ports
pub const PORT_STRIDE: u16 = 10_000;

/// PBKDF2 iteration count for administrator credentials
pub const PBKDF2_ITERATIONS: u32 = 10;

/// PBKDF2 derived key length in bytes
pub const PBKDF2_KEY_LENGTH: usize = 20;

/// Algorithm tag prefixed to hashed credentials
pub const PBKDF2_TAG: &str = "-pbkdf2-";

/// Delay between readiness probes of a single node (milliseconds)
pub const READINESS_PROBE_INTERVAL_MS: u64 = 250;

/// Outer readiness ceiling: number of attempts
pub const READINESS_MAX_ATTEMPTS: u32 = 30;

/// Outer readiness ceiling: spacing between attempts (milliseconds)
pub const READINESS_ATTEMPT_SPACING_MS: u64 = 1_000;

/// Liveness check interval (milliseconds)
pub const LIVENESS_INTERVAL_MS: u64 = 2_000;

/// Per-request timeout for cluster-join calls (seconds)
pub const JOIN_REQUEST_TIMEOUT_SECS: u64 = 30;

/// How long kill-all waits for a signalled node to be reaped (seconds)
pub const KILL_REAP_TIMEOUT_SECS: u64 = 5;

/// Coordinator responses that count as a successful join:
/// applied, created, accepted, already a member.
pub const JOIN_ACCEPTED_STATUSES: [u16; 4] = [200, 201, 202, 409];

/// Environment variables handed to every node process
pub mod node_env {
    /// Space-separated list of ini files the node reads
    pub const CONFIG_FILES: &str = "COUCHDB_INI_FILES";

    /// Writable code/library search path
    pub const LIB_PATH: &str = "ERL_LIBS";

    /// Runtime flags carrying the distinguishing node name
    pub const NODE_FLAGS: &str = "ERL_FLAGS";
}

/// Environment variable exposed to an ad-hoc command
pub const CLUSTER_URL_ENV: &str = "DEVCLUSTER_URL";
