//! Operator control events.
//!
//! OS signals are translated into `Control` messages on a broadcast
//! channel: SIGINT/SIGTERM/SIGHUP request shutdown, SIGUSR1 requests a
//! reboot of all nodes.
//!
//! Handlers are registered by `ControlSignals::install`, which must run
//! before the first node is launched. A signal arriving between install and
//! the listener's first poll is buffered by the stream, not lost.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Operator request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Stop everything, exit 0
    Shutdown,
    /// Kill and relaunch every node, keep running
    Reboot,
}

pub fn channel() -> (broadcast::Sender<Control>, broadcast::Receiver<Control>) {
    broadcast::channel(8)
}

/// Registered signal streams, waiting to be handed to the listener
#[cfg(unix)]
pub struct ControlSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
    reboot: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ControlSignals {
    /// Replace the default signal actions now, from inside the runtime
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
            reboot: signal(SignalKind::user_defined1())?,
        })
    }

    async fn next(&mut self) -> Option<Control> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => {
                tracing::info!("🛑 Interrupt received");
                Some(Control::Shutdown)
            }
            Some(()) = self.terminate.recv() => {
                tracing::info!("🛑 SIGTERM received");
                Some(Control::Shutdown)
            }
            Some(()) = self.hangup.recv() => {
                tracing::info!("🛑 SIGHUP received");
                Some(Control::Shutdown)
            }
            Some(()) = self.reboot.recv() => {
                tracing::info!("🔄 SIGUSR1 received, rebooting nodes");
                Some(Control::Reboot)
            }
            else => None,
        }
    }
}

#[cfg(not(unix))]
pub struct ControlSignals {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(not(unix))]
impl ControlSignals {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    async fn next(&mut self) -> Option<Control> {
        self.ctrl_c.recv().await?;
        tracing::info!("🛑 Interrupt received");
        Some(Control::Shutdown)
    }
}

/// Forward installed signals to `tx` until the process exits
pub fn spawn_signal_listener(
    mut signals: ControlSignals,
    tx: broadcast::Sender<Control>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(control) = signals.next().await {
            // No receivers means the orchestrator is already on its way out.
            let _ = tx.send(control);
        }
        tracing::warn!("Signal streams closed");
    })
}
