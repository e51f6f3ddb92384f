//! Ad-hoc command execution against a formed cluster.
//!
//! The command runs under `sh -c` with the operator's stdin/stdout/stderr, so
//! its output is streamed as-is and never interpreted. `DEVCLUSTER_URL`
//! points at node 1's cluster endpoint.

use anyhow::{Context, Result};
use std::process::Stdio;

use devcluster_common::constants::CLUSTER_URL_ENV;

/// A shell command to run once the cluster is up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdHocCommand {
    line: String,
}

impl AdHocCommand {
    /// Join trailing CLI words into one shell line; `None` when empty
    pub fn from_words(words: &[String]) -> Option<Self> {
        let line = words.join(" ");
        (!line.trim().is_empty()).then_some(Self { line })
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    /// Run to completion and return its exit code.
    ///
    /// A command killed by a signal reports `128 + signal`, like a shell.
    pub async fn run(&self, cluster_url: &str) -> Result<i32> {
        tracing::info!(command = %self.line, url = %cluster_url, "Running command against cluster");

        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.line)
            .env(CLUSTER_URL_ENV, cluster_url)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("Failed to run `{}`", self.line))?;

        Ok(exit_code(status))
    }
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
