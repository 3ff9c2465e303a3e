//! Command line interface for the probing simulator.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// sctp-ap - active probing and failover for multi-homed associations
#[derive(Parser, Debug)]
#[command(
    name = "sctp-ap",
    author,
    version,
    about = "Simulate active probing and failover on a multi-homed association",
    long_about = r#"
Drives an association with several destination paths on a virtual clock.
Suspect paths receive a burst of probe heartbeats; paths that never answer
are failed over once their give-up timer expires.

QUICK START:
  Two paths, the primary dead:   sctp-ap simulate --paths 2 --unresponsive 0
  Total loss of connectivity:    sctp-ap simulate --paths 2 --unresponsive 0,1
  Example configuration:         sctp-ap config
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a probing scenario on a virtual clock
    Simulate(SimulateArgs),

    /// Show example configuration
    Config(ConfigArgs),
}

/// Simulation arguments
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of destination paths
    #[arg(short, long, default_value = "2")]
    pub paths: u16,

    /// Paths that never acknowledge (comma separated indices)
    #[arg(short, long, value_delimiter = ',')]
    pub unresponsive: Vec<u16>,

    /// Paths put under suspicion at t=0 (default: every path)
    #[arg(short, long, value_delimiter = ',')]
    pub suspect: Vec<u16>,

    /// Probability that a responsive path loses a heartbeat acknowledgment
    #[arg(long, default_value = "0.0")]
    pub ack_loss: f64,

    /// Data chunks in flight at t=0, spread round-robin over the paths
    #[arg(long, default_value = "6")]
    pub chunks: u32,

    /// Bytes per data chunk
    #[arg(long, default_value = "512")]
    pub chunk_size: u32,

    /// Virtual time to run for
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub until: Duration,

    /// Clock resolution of the simulation loop
    #[arg(long, default_value = "100ms", value_parser = humantime::parse_duration)]
    pub tick: Duration,

    /// Override the probing period
    #[arg(long, value_parser = humantime::parse_duration)]
    pub period: Option<Duration>,

    /// Override the give-up timeout
    #[arg(long, value_parser = humantime::parse_duration)]
    pub give_up: Option<Duration>,

    /// Override the burst limit
    #[arg(long)]
    pub burst: Option<u32>,

    /// RNG seed for acknowledgment loss
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
