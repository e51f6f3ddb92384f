//! Node process launcher.
//!
//! Each node runs the configured executable with:
//! - `COUCHDB_INI_FILES` pointing at its config files
//! - `ERL_LIBS` pointing at a writable code path
//! - `ERL_FLAGS` carrying `-name nodeK@127.0.0.1`
//!
//! stdout and stderr both go to the node's log file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};

use devcluster_common::constants::node_env;
use devcluster_common::{DevClusterError, NodeDescriptor};

use crate::config::DevClusterConfig;

/// How nodes are started
#[derive(Debug, Clone)]
pub struct Launcher {
    program: PathBuf,
    args: Vec<String>,
    base_config: Option<PathBuf>,
    lib_path: PathBuf,
    append_logs: bool,
}

impl Launcher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, lib_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            base_config: None,
            lib_path: lib_path.into(),
            append_logs: false,
        }
    }

    pub fn from_config(config: &DevClusterConfig) -> Self {
        let mut launcher = Self::new(
            config.node_binary.clone(),
            config.node_args.clone(),
            config.lib_path(),
        )
        .append_logs(config.append_logs);
        launcher.base_config = config.base_config.clone();
        launcher
    }

    pub fn append_logs(mut self, append: bool) -> Self {
        self.append_logs = append;
        self
    }

    /// Environment handed to `node`
    pub fn environment(&self, node: &NodeDescriptor) -> Vec<(&'static str, String)> {
        let mut ini_files: Vec<String> = Vec::new();
        if let Some(ref base) = self.base_config {
            ini_files.push(base.display().to_string());
        }
        ini_files.push(node.config_path.display().to_string());

        vec![
            (node_env::CONFIG_FILES, ini_files.join(" ")),
            (node_env::LIB_PATH, self.lib_path.display().to_string()),
            (node_env::NODE_FLAGS, format!("-name {}", node.identity())),
        ]
    }

    /// Start `node`, with output redirected to its log file.
    ///
    /// Any failure here is a build or setup problem and is never retried.
    pub fn launch(&self, node: &NodeDescriptor) -> Result<NodeProcess, DevClusterError> {
        self.spawn(node, self.append_logs)
    }

    /// Start `node` again after a kill, keeping what its log already holds
    pub fn relaunch(&self, node: &NodeDescriptor) -> Result<NodeProcess, DevClusterError> {
        self.spawn(node, true)
    }

    fn spawn(&self, node: &NodeDescriptor, append: bool) -> Result<NodeProcess, DevClusterError> {
        let launch_error = |reason: String| DevClusterError::Launch {
            node: node.name.clone(),
            reason,
        };

        let log = self
            .open_log(node, append)
            .map_err(|e| launch_error(format!("log file {}: {e}", node.log_path.display())))?;
        let stderr = log
            .try_clone()
            .map_err(|e| launch_error(format!("log file {}: {e}", node.log_path.display())))?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.environment(node))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);

        // Own process group, so kill-all reaches anything the node forks.
        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .spawn()
            .map_err(|e| launch_error(format!("{}: {e}", self.program.display())))?;

        tracing::info!(
            node = %node.name,
            pid = child.id(),
            cluster_port = node.cluster_port,
            node_port = node.node_port,
            log = %node.log_path.display(),
            "Node launched"
        );

        Ok(NodeProcess {
            name: node.name.clone(),
            child,
            status: None,
        })
    }

    fn open_log(&self, node: &NodeDescriptor, append: bool) -> std::io::Result<File> {
        if let Some(dir) = node.log_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let mut file = options.open(&node.log_path)?;
        writeln!(
            file,
            "==> devcluster: starting {} at {}",
            node.identity(),
            chrono::Local::now().to_rfc3339()
        )?;
        Ok(file)
    }
}

/// A launched node process and its exit status, once known
#[derive(Debug)]
pub struct NodeProcess {
    name: String,
    child: Child,
    status: Option<ExitStatus>,
}

impl NodeProcess {
    pub fn name(&self) -> &str {
        &self.name
    }

    #[cfg(test)]
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Exit status if the process has terminated, without blocking
    pub fn exit_status(&mut self) -> Option<ExitStatus> {
        if self.status.is_none() {
            match self.child.try_wait() {
                Ok(status) => self.status = status,
                Err(e) => tracing::warn!(node = %self.name, error = %e, "Failed to poll node"),
            }
        }
        self.status
    }

    pub fn is_running(&mut self) -> bool {
        self.exit_status().is_none()
    }

    /// Force-terminate the process (and its group) and reap it.
    ///
    /// Returns false if it had already exited.
    pub async fn kill(&mut self, reap_timeout: Duration) -> bool {
        if !self.is_running() {
            return false;
        }

        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                tracing::debug!(node = %self.name, error = %e, "killpg failed");
            }
        }
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(node = %self.name, error = %e, "start_kill failed");
        }

        match tokio::time::timeout(reap_timeout, self.child.wait()).await {
            Ok(Ok(status)) => self.status = Some(status),
            Ok(Err(e)) => tracing::warn!(node = %self.name, error = %e, "Failed to reap node"),
            Err(_) => tracing::warn!(node = %self.name, "Node did not exit after SIGKILL"),
        }
        true
    }

    /// Signal without waiting; usable from synchronous contexts such as `Drop`
    pub fn start_kill(&mut self) {
        if self.status.is_some() {
            return;
        }
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            let _ = nix::sys::signal::killpg(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGKILL,
            );
        }
        let _ = self.child.start_kill();
    }
}
