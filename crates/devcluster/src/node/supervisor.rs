//! Node supervisor: the authoritative set of running node processes.

use std::process::ExitStatus;
use std::time::Duration;

use tokio::sync::Mutex;

use devcluster_common::constants::KILL_REAP_TIMEOUT_SECS;
use devcluster_common::{DevClusterError, NodeDescriptor};

use super::launcher::{Launcher, NodeProcess};
use crate::reporter::Reporter;

/// Owns every launched node for the session.
///
/// `kill_all` is idempotent. Dropping the supervisor signals any node still
/// running, so unwinding out of `main` cannot orphan children.
pub struct NodeSupervisor {
    launcher: Launcher,
    nodes: Vec<NodeDescriptor>,
    processes: Mutex<Vec<NodeProcess>>,
    reap_timeout: Duration,
}

impl NodeSupervisor {
    pub fn new(launcher: Launcher, nodes: Vec<NodeDescriptor>) -> Self {
        Self {
            launcher,
            nodes,
            processes: Mutex::new(Vec::new()),
            reap_timeout: Duration::from_secs(KILL_REAP_TIMEOUT_SECS),
        }
    }

    #[cfg(test)]
    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    /// Number of supervised handles
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.processes.lock().await.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.processes.lock().await.is_empty()
    }

    /// Launch one node and take ownership of its handle
    async fn launch(&self, node: &NodeDescriptor) -> Result<(), DevClusterError> {
        let process = self.launcher.launch(node)?;
        self.processes.lock().await.push(process);
        Ok(())
    }

    /// Launch every node in order, announcing each through `reporter`.
    ///
    /// Stops at the first failure; nodes launched before it stay supervised
    /// so the caller's cleanup still kills them.
    pub async fn launch_all(&self, reporter: &Reporter) -> Result<(), DevClusterError> {
        for node in &self.nodes {
            reporter
                .step(format!("Launching {node}"), self.launch(node))
                .await?;
        }
        Ok(())
    }

    /// Force-terminate every node still running.
    ///
    /// Safe to call any number of times; returns how many nodes were killed
    /// by this call.
    pub async fn kill_all(&self) -> usize {
        let mut processes = self.processes.lock().await;
        let mut killed = 0;
        for process in processes.iter_mut() {
            if process.kill(self.reap_timeout).await {
                tracing::info!(node = %process.name(), "Node killed");
                killed += 1;
            }
        }
        killed
    }

    /// True when every supervised node is still running
    pub async fn all_alive(&self) -> bool {
        let mut processes = self.processes.lock().await;
        !processes.is_empty() && processes.iter_mut().all(|p| p.is_running())
    }

    /// Nodes that have exited, with their status
    pub async fn exited(&self) -> Vec<(String, ExitStatus)> {
        let mut processes = self.processes.lock().await;
        processes
            .iter_mut()
            .filter_map(|p| p.exit_status().map(|s| (p.name().to_string(), s)))
            .collect()
    }

    /// Kill everything, then relaunch every node from its descriptor.
    /// Logs from before the restart are kept.
    pub async fn restart_all(&self) -> Result<(), DevClusterError> {
        let killed = self.kill_all().await;
        let mut processes = self.processes.lock().await;
        processes.clear();
        tracing::info!(killed, "Relaunching all nodes");
        for node in &self.nodes {
            processes.push(self.launcher.relaunch(node)?);
        }
        Ok(())
    }

    #[cfg(test)]
    pub async fn pids(&self) -> Vec<u32> {
        self.processes
            .lock()
            .await
            .iter()
            .filter_map(|p| p.pid())
            .collect()
    }
}

impl Drop for NodeSupervisor {
    fn drop(&mut self) {
        // Last-resort path (panic/unwind); normal exits call kill_all first.
        for process in self.processes.get_mut().iter_mut() {
            if process.is_running() {
                tracing::warn!(node = %process.name(), "Killing node on supervisor drop");
                process.start_kill();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devcluster_common::PortScheme;
    use tokio_test::assert_ok;

    fn supervisor(dir: &std::path::Path, program: &str, args: &[&str], count: usize) -> NodeSupervisor {
        let launcher = Launcher::new(program, args.iter().map(|a| a.to_string()).collect(), dir);
        let nodes = NodeDescriptor::for_cluster(count, &PortScheme::default(), dir);
        NodeSupervisor::new(launcher, nodes)
    }

    #[tokio::test]
    async fn launches_one_handle_per_node() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(dir.path(), "sleep", &["30"], 3);

        assert!(!sup.all_alive().await);
        assert_ok!(sup.launch_all(&Reporter::quiet()).await);
        assert_eq!(sup.len().await, 3);
        assert!(sup.all_alive().await);
        assert!(sup.exited().await.is_empty());

        assert_eq!(sup.kill_all().await, 3);
    }

    #[tokio::test]
    async fn kill_all_twice_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(dir.path(), "sleep", &["30"], 3);
        sup.launch_all(&Reporter::quiet()).await.unwrap();

        assert_eq!(sup.kill_all().await, 3);
        assert_eq!(sup.kill_all().await, 0);
        assert!(!sup.all_alive().await);
        assert_eq!(sup.exited().await.len(), 3);
    }

    #[tokio::test]
    async fn detects_exited_node() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(dir.path(), "sleep", &["30"], 2);
        sup.launch_all(&Reporter::quiet()).await.unwrap();
        // A third node that exits right away.
        let quitter = Launcher::new("sh", vec!["-c".into(), "exit 3".into()], dir.path());
        let extra = NodeDescriptor::new(3, &PortScheme::default(), dir.path());
        sup.processes.lock().await.push(quitter.launch(&extra).unwrap());

        let mut exited = Vec::new();
        for _ in 0..100 {
            exited = sup.exited().await;
            if !exited.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(exited.len(), 1);
        assert_eq!(exited[0].0, "node3");
        assert_eq!(exited[0].1.code(), Some(3));
        assert!(!sup.all_alive().await);

        assert_eq!(sup.kill_all().await, 2);
    }

    #[tokio::test]
    async fn restart_relaunches_every_node() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(dir.path(), "sleep", &["30"], 3);
        sup.launch_all(&Reporter::quiet()).await.unwrap();
        let before = sup.pids().await;

        assert_ok!(sup.restart_all().await);
        let after = sup.pids().await;
        assert_eq!(sup.len().await, 3);
        assert!(sup.all_alive().await);
        assert!(before.iter().all(|pid| !after.contains(pid)));

        // The log from before the restart survives it.
        let log = std::fs::read_to_string(&sup.nodes()[0].log_path).unwrap();
        assert_eq!(log.matches("==> devcluster: starting node1@127.0.0.1").count(), 2);

        sup.kill_all().await;
    }

    #[tokio::test]
    async fn failed_launch_keeps_earlier_nodes_supervised() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(dir.path(), "sleep", &["30"], 3);
        // node2's log path is a directory, so opening it fails.
        std::fs::create_dir_all(&sup.nodes()[1].log_path).unwrap();

        let err = sup.launch_all(&Reporter::quiet()).await.unwrap_err();
        assert_eq!(err.node(), Some("node2"));
        assert_eq!(sup.len().await, 1);
        assert_eq!(sup.kill_all().await, 1);
    }
}
