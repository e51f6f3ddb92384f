//! Cluster formation and monitoring.
//!
//! Implements:
//! - Readiness polling (per-node HTTP probe with a bounded outer ceiling)
//! - Cluster join (sequential membership requests to the coordinator)
//! - Liveness loop (periodic process checks until shutdown or node death)

mod join;
mod liveness;
mod readiness;

pub use join::ClusterJoiner;
pub use liveness::LivenessLoop;
pub use readiness::ReadinessPoller;
