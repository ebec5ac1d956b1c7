//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Flightgraph - multi-rate dataflow graph for flight control
#[derive(Parser, Debug)]
#[command(
    name = "flightgraph",
    author,
    version,
    about = "Multi-rate flight control dataflow graph",
    long_about = "Loads a node graph from configuration, wires it by `node/output` paths and \n\
                  ticks it at the configured control rate. Source nodes can be fed by \n\
                  simulated drivers for bench runs without hardware."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FLIGHTGRAPH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FLIGHTGRAPH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the graph and tick it
    Run(RunArgs),

    /// Validate a graph file without running it
    Validate(ValidateArgs),

    /// Display node, input and output information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to graph file (TOML or JSON)
    #[arg(short, long, default_value = "graph.toml", env = "FLIGHTGRAPH_CONFIG")]
    pub config: PathBuf,

    /// Feed every source node from a mock driver at its declared rate
    #[arg(long, env = "FLIGHTGRAPH_SIMULATE")]
    pub simulate: bool,

    /// Seed for the mock drivers
    #[arg(long, default_value = "7", env = "FLIGHTGRAPH_SEED")]
    pub seed: u64,

    /// Override the tick rate from configuration (Hz)
    #[arg(long, env = "FLIGHTGRAPH_TICK_RATE")]
    pub tick_rate: Option<u32>,

    /// Maximum number of ticks to run (0 = unlimited)
    #[arg(long, default_value = "0", env = "FLIGHTGRAPH_MAX_TICKS")]
    pub max_ticks: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "FLIGHTGRAPH_TIMEOUT")]
    pub timeout: u64,

    /// Build and wire the graph, then exit without ticking
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "FLIGHTGRAPH_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to graph file to validate
    #[arg(short, long, default_value = "graph.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to graph file
    #[arg(short, long, default_value = "graph.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Only show this node
    #[arg(long)]
    pub node: Option<String>,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
