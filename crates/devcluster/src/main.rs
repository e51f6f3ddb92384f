//! # devcluster - local multi-node development cluster
//!
//! Bootstraps N database nodes on one host, forms them into a cluster, and
//! supervises them until interrupted.
//!
//! ## Session
//! ```text
//! configs → launch N → readiness → join via node1 → command | liveness
//!                                                          ↓
//!                                                      kill all
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cluster;
mod command;
mod config;
mod control;
mod layout;
mod node;
mod orchestrator;
mod reporter;
mod session;
#[cfg(test)]
mod test_support;

use devcluster_common::AdminCredential;

use command::AdHocCommand;
use config::DevClusterConfig;
use control::ControlSignals;
use node::{Launcher, NodeSupervisor};
use orchestrator::Orchestrator;
use reporter::Reporter;
use session::ClusterSession;

/// devcluster - launch and supervise a local multi-node cluster
#[derive(Parser, Debug)]
#[command(name = "devcluster")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "devcluster.toml")]
    config: PathBuf,

    /// Administrator credential as user:pass
    #[arg(short, long, value_name = "USER:PASS")]
    admin: Option<String>,

    /// Number of nodes (overrides config)
    #[arg(short, long)]
    nodes: Option<usize>,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// Launch nodes without forming a cluster
    #[arg(long)]
    no_join: bool,

    /// Node executable (overrides config)
    #[arg(long)]
    node_bin: Option<PathBuf>,

    /// Dev directory for configs, data, and logs (overrides config)
    #[arg(long)]
    dev_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,

    /// Command to run once the cluster is up, instead of supervising
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level, args.json_logs) {
        eprintln!("devcluster: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Session failed");
            eprintln!("devcluster: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    info!("🔥 Starting devcluster v{}", env!("CARGO_PKG_VERSION"));

    let config = DevClusterConfig::load(&args.config, &args)?;
    info!(
        nodes = config.node_count,
        dev_dir = %config.dev_dir.display(),
        "📋 Configuration loaded"
    );

    let admin = args
        .admin
        .as_deref()
        .map(AdminCredential::parse)
        .transpose()
        .context("Invalid --admin value")?;
    let command = AdHocCommand::from_words(&args.command);

    // Handlers go in before any node exists, so an early Ctrl-C still
    // reaches kill-all.
    let signals = ControlSignals::install().context("Failed to install signal handlers")?;
    let (control_tx, mut control_rx) = control::channel();
    let listener = control::spawn_signal_listener(signals, control_tx);

    let session = ClusterSession::new(&config, admin)?;
    let supervisor = NodeSupervisor::new(Launcher::from_config(&config), session.nodes().to_vec());
    let reporter = Reporter::new(!args.quiet);

    let outcome = Orchestrator::new(&config, &session, &supervisor, &reporter)
        .run(command, &mut control_rx)
        .await;
    listener.abort();

    let outcome = outcome?;
    info!(outcome = ?outcome, "👋 devcluster finished");
    Ok(outcome.exit_code())
}

/// Initialize structured logging with tracing, on stderr so progress output
/// on stdout stays readable
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level: {level}"))?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_words_become_the_command() {
        let args = Args::parse_from([
            "devcluster",
            "-a",
            "candeira:candeira",
            "-n",
            "2",
            "curl",
            "-s",
            "$DEVCLUSTER_URL/_membership",
        ]);
        assert_eq!(args.admin.as_deref(), Some("candeira:candeira"));
        assert_eq!(args.nodes, Some(2));
        assert_eq!(args.command, ["curl", "-s", "$DEVCLUSTER_URL/_membership"]);
    }

    #[test]
    fn no_trailing_words_means_supervise() {
        let args = Args::parse_from(["devcluster", "-q"]);
        assert!(args.quiet);
        assert!(AdHocCommand::from_words(&args.command).is_none());
    }
}
