use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use switchyard_core::ProviderType;

/// Switchyard LLM provider router
#[derive(Debug, Parser)]
#[command(name = "switchyard", about = "Provider selection and failover for LLM gateways")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "switchyard.toml", env = "SWITCHYARD_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate the configuration and print the effective failover policy
    Check,

    /// Print the provider order selection would use
    Plan(PlanArgs),

    /// Route requests through simulated providers to exercise failover
    Simulate(SimulateArgs),
}

/// Selection overrides layered on top of the configured `[selection]`
#[derive(Debug, clap::Args)]
pub struct PlanArgs {
    /// Preferred provider (repeatable, most preferred first)
    #[arg(long = "prefer", value_name = "PROVIDER")]
    pub prefer: Vec<ProviderType>,

    /// Provider to exclude (repeatable)
    #[arg(long = "exclude", value_name = "PROVIDER")]
    pub exclude: Vec<ProviderType>,
}

#[derive(Debug, clap::Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub selection: PlanArgs,

    /// Number of requests to route
    #[arg(short = 'n', long, default_value_t = 10)]
    pub requests: usize,

    /// Provider that fails every call (repeatable)
    #[arg(long = "fail", value_name = "PROVIDER")]
    pub fail: Vec<ProviderType>,

    /// Simulated latency of every provider call
    #[arg(long, default_value = "20ms", value_parser = parse_duration)]
    pub latency: Duration,

    /// Model requested by every simulated request
    #[arg(long, default_value = "gpt-4o")]
    pub model: String,
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    duration_str::parse(raw).map_err(|e| e.to_string())
}
