//! Liveness loop.
//!
//! ```text
//!            tick: all alive          Reboot: restart_all ok
//!           ┌──────────────┐         ┌──────────────┐
//!           ▼              │         ▼              │
//!        RUNNING ──────────┴─────────┴──────────────┘
//!           │ node exited / reboot failed   → TERMINATING (exit 1)
//!           │ Shutdown / channel closed     → TERMINATING (exit 0)
//!           ▼
//!      TERMINATING: kill_all, return
//! ```

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use devcluster_common::DevClusterError;

use crate::control::Control;
use crate::node::NodeSupervisor;
use crate::reporter::Reporter;

/// Why the loop ended
#[derive(Debug)]
pub enum LivenessExit {
    /// Operator asked to stop
    Interrupted,
    /// One or more nodes exited on their own
    NodesDied(Vec<String>),
    /// An operator-requested reboot could not relaunch the nodes
    RebootFailed(DevClusterError),
}

impl LivenessExit {
    /// `Ok` for an operator stop, the matching error otherwise
    pub fn into_result(self) -> Result<(), DevClusterError> {
        match self {
            Self::Interrupted => Ok(()),
            Self::NodesDied(nodes) => Err(DevClusterError::NodeDied(nodes)),
            Self::RebootFailed(e) => Err(e),
        }
    }
}

enum State {
    Running,
    Terminating(LivenessExit),
}

/// Periodic all-alive check over the supervised nodes
pub struct LivenessLoop<'a> {
    supervisor: &'a NodeSupervisor,
    reporter: &'a Reporter,
    interval: Duration,
}

impl<'a> LivenessLoop<'a> {
    pub fn new(supervisor: &'a NodeSupervisor, reporter: &'a Reporter, interval: Duration) -> Self {
        Self {
            supervisor,
            reporter,
            interval,
        }
    }

    /// Run until shutdown is requested or a node dies. Every node has been
    /// killed by the time this returns.
    pub async fn run(&self, control: &mut broadcast::Receiver<Control>) -> LivenessExit {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval = ?self.interval, "👀 Liveness loop started");

        let mut state = State::Running;
        let exit = loop {
            state = match state {
                State::Running => self.step(&mut ticker, control).await,
                State::Terminating(exit) => break exit,
            };
        };

        let killed = self.supervisor.kill_all().await;
        tracing::info!(killed, outcome = ?exit, "Liveness loop finished");
        exit
    }

    async fn step(
        &self,
        ticker: &mut tokio::time::Interval,
        control: &mut broadcast::Receiver<Control>,
    ) -> State {
        tokio::select! {
            _ = ticker.tick() => {
                if self.supervisor.all_alive().await {
                    return State::Running;
                }
                let exited = self.supervisor.exited().await;
                if exited.is_empty() {
                    return State::Running;
                }
                for (node, status) in &exited {
                    tracing::error!(node = %node, status = %status, "Node exited unexpectedly");
                    self.reporter.say(format_args!("{node} exited ({status}), shutting down"));
                }
                State::Terminating(LivenessExit::NodesDied(
                    exited.into_iter().map(|(node, _)| node).collect(),
                ))
            }
            message = control.recv() => match message {
                Ok(Control::Shutdown) | Err(broadcast::error::RecvError::Closed) => {
                    State::Terminating(LivenessExit::Interrupted)
                }
                Ok(Control::Reboot) => {
                    match self.reporter.step("Rebooting all nodes", self.supervisor.restart_all()).await {
                        Ok(()) => State::Running,
                        Err(e) => State::Terminating(LivenessExit::RebootFailed(e)),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Control messages dropped");
                    State::Running
                }
            },
        }
    }
}
