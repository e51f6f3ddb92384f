//! Session orchestration.
//!
//! ```text
//! prepare configs → launch all → readiness (bounded) → join (ordered)
//!     → ad-hoc command | liveness loop
//!     → kill_all (every path)
//! ```

use anyhow::{Context, Result};
use std::process::ExitCode;
use tokio::sync::broadcast;

use devcluster_common::constants::NODE_HOST;

use crate::cluster::{ClusterJoiner, LivenessLoop, ReadinessPoller};
use crate::command::AdHocCommand;
use crate::config::DevClusterConfig;
use crate::control::Control;
use crate::layout;
use crate::node::NodeSupervisor;
use crate::reporter::Reporter;
use crate::session::ClusterSession;

/// How a session ended without an error
#[derive(Debug)]
pub enum SessionOutcome {
    /// Operator stopped the session
    Interrupted,
    /// Ad-hoc command finished with this code
    CommandFinished(i32),
}

impl SessionOutcome {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Interrupted => ExitCode::SUCCESS,
            Self::CommandFinished(code) => ExitCode::from((*code & 0xff) as u8),
        }
    }
}

/// Drives one session over a prepared `ClusterSession`
pub struct Orchestrator<'a> {
    config: &'a DevClusterConfig,
    session: &'a ClusterSession,
    supervisor: &'a NodeSupervisor,
    reporter: &'a Reporter,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a DevClusterConfig,
        session: &'a ClusterSession,
        supervisor: &'a NodeSupervisor,
        reporter: &'a Reporter,
    ) -> Self {
        Self {
            config,
            session,
            supervisor,
            reporter,
        }
    }

    /// Run the session to completion. Every node is killed before this
    /// returns, whatever the outcome.
    pub async fn run(
        &self,
        command: Option<AdHocCommand>,
        control: &mut broadcast::Receiver<Control>,
    ) -> Result<SessionOutcome> {
        let outcome = self.drive(command, control).await;
        let killed = self.supervisor.kill_all().await;
        if killed > 0 {
            self.reporter.say(format_args!("Stopped {killed} node(s)"));
        }
        outcome
    }

    async fn drive(
        &self,
        command: Option<AdHocCommand>,
        control: &mut broadcast::Receiver<Control>,
    ) -> Result<SessionOutcome> {
        tokio::select! {
            result = self.start_cluster() => result?,
            _ = shutdown_requested(control) => return Ok(SessionOutcome::Interrupted),
        }

        let Some(command) = command else {
            let liveness = LivenessLoop::new(
                self.supervisor,
                self.reporter,
                self.config.liveness_interval(),
            );
            liveness.run(control).await.into_result()?;
            return Ok(SessionOutcome::Interrupted);
        };

        let url = self.cluster_url();
        self.reporter.say(format_args!("Running `{}`", command.line()));
        tokio::select! {
            code = command.run(&url) => Ok(SessionOutcome::CommandFinished(code?)),
            _ = shutdown_requested(control) => Ok(SessionOutcome::Interrupted),
        }
    }

    /// Prepare configs, launch, wait for readiness, and join
    pub async fn start_cluster(&self) -> Result<()> {
        self.reporter
            .step("Preparing node configs", async { layout::prepare(self.session) })
            .await?;

        self.supervisor.launch_all(self.reporter).await?;

        let poller = ReadinessPoller::new(&self.config.readiness)?;
        let report = poller.wait_all(self.session.nodes()).await;
        for node in &report.ready {
            self.reporter.say(format_args!("{node} is up"));
        }
        for node in &report.pending {
            self.reporter.say(format_args!(
                "{node} did not come up after {} attempts, continuing",
                report.attempts
            ));
        }

        if self.config.no_join {
            self.reporter.say("Skipping cluster join");
        } else {
            self.joiner()?
                .join_all(self.session.nodes(), self.reporter)
                .await?;
        }

        self.reporter.say(format_args!(
            "Cluster of {} node(s) is up at {}",
            self.session.nodes().len(),
            self.cluster_url()
        ));
        Ok(())
    }

    fn joiner(&self) -> Result<ClusterJoiner> {
        let coordinator = self
            .session
            .coordinator()
            .context("Session has no nodes")?;
        let joiner =
            ClusterJoiner::new(NODE_HOST, coordinator.node_port, self.config.join_timeout())?;
        Ok(match self.session.admin() {
            Some(admin) => {
                let (user, pass) = admin.basic_auth();
                joiner.with_basic_auth(user, pass)
            }
            None => joiner,
        })
    }

    fn cluster_url(&self) -> String {
        self.session
            .coordinator()
            .map(|n| n.cluster_url())
            .unwrap_or_default()
    }
}

/// Resolves once the operator asks to stop (or the control channel closes).
/// Reboot requests are ignored until the cluster is formed.
async fn shutdown_requested(control: &mut broadcast::Receiver<Control>) {
    loop {
        match control.recv().await {
            Ok(Control::Shutdown) | Err(broadcast::error::RecvError::Closed) => return,
            Ok(Control::Reboot) => tracing::warn!("Reboot ignored while the cluster is starting"),
            Err(broadcast::error::RecvError::Lagged(_)) => {}
        }
    }
}
