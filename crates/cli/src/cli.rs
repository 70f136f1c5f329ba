//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::{FanoutBlueprint, FanoutStrategy};
use std::path::PathBuf;

/// Fanout - load harness for the fan-out dispatcher
#[derive(Parser, Debug)]
#[command(
    name = "fanout",
    author,
    version,
    about = "Fan-out dispatcher load harness",
    long_about = "Drives a fan-out dispatcher with concurrent producers and consumers.\n\n\
                  Builds a dispatcher from configuration, registers consumers, writes a \n\
                  synthetic workload and reports how items were distributed."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FANOUT_VERBOSE")]
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
        env = "FANOUT_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a workload through a dispatcher
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the resolved configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "FANOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Delivery strategy (all, single, lru)
    #[arg(short, long, env = "FANOUT_STRATEGY")]
    pub strategy: Option<FanoutStrategy>,

    /// Dispatcher name used in logs and metrics
    #[arg(long, env = "FANOUT_NAME")]
    pub name: Option<String>,

    /// Input queue capacity
    #[arg(long, env = "FANOUT_INPUT_CAPACITY")]
    pub input_capacity: Option<usize>,

    /// Output queue capacity per consumer
    #[arg(long, env = "FANOUT_CONSUMER_CAPACITY")]
    pub consumer_capacity: Option<usize>,

    /// Number of concurrent producers
    #[arg(short, long, env = "FANOUT_PRODUCERS")]
    pub producers: Option<usize>,

    /// Number of consumers
    #[arg(short = 'n', long, env = "FANOUT_CONSUMERS")]
    pub consumers: Option<usize>,

    /// Items written by each producer
    #[arg(short, long, env = "FANOUT_ITEMS")]
    pub items: Option<u64>,

    /// Consumer deadline in milliseconds (0 = until the run ends)
    #[arg(long, env = "FANOUT_CONSUMER_LIFETIME_MS")]
    pub consumer_lifetime_ms: Option<u64>,

    /// Run timeout in milliseconds
    #[arg(long, env = "FANOUT_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "FANOUT_METRICS_PORT")]
    pub metrics_port: u16,
}

impl RunArgs {
    /// Overlay command-line values on a loaded blueprint
    pub fn apply_overrides(&self, blueprint: &mut FanoutBlueprint) {
        let dispatcher = &mut blueprint.dispatcher;
        if let Some(strategy) = self.strategy {
            dispatcher.strategy = strategy;
        }
        if let Some(ref name) = self.name {
            dispatcher.name = Some(name.clone());
        }
        if let Some(capacity) = self.input_capacity {
            dispatcher.input_capacity = capacity;
        }
        if let Some(capacity) = self.consumer_capacity {
            dispatcher.consumer_capacity = capacity;
        }

        let workload = &mut blueprint.workload;
        if let Some(producers) = self.producers {
            workload.producers = producers;
        }
        if let Some(consumers) = self.consumers {
            workload.consumers = consumers;
        }
        if let Some(items) = self.items {
            workload.items_per_producer = items;
        }
        if let Some(lifetime) = self.consumer_lifetime_ms {
            workload.consumer_lifetime_ms = lifetime;
        }
        if let Some(timeout) = self.timeout_ms {
            workload.timeout_ms = timeout;
        }
    }
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "fanout.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in defaults when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON instead of TOML
    #[arg(long)]
    pub json: bool,
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
