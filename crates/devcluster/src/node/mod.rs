//! Node process management.
//!
//! - `launcher` - Starting one node with its config, environment, and log file
//! - `supervisor` - Owning all node handles: kill-all, liveness, restart

mod launcher;
mod supervisor;

pub use launcher::Launcher;
pub use supervisor::NodeSupervisor;
