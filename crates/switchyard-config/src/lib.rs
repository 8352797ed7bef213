#![allow(clippy::must_use_candidate)]

mod duration;
mod env;
pub mod failover;
mod loader;
pub mod selection;
pub mod telemetry;

use serde::Deserialize;

pub use env::{ExpandError, expand_env};
pub use failover::FailoverConfig;
pub use selection::SelectionConfig;
pub use telemetry::{LogFormat, TelemetryConfig};

/// Top-level Switchyard configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Failover and blacklist policy
    #[serde(default)]
    pub failover: FailoverConfig,
    /// Default provider selection preferences
    #[serde(default)]
    pub selection: SelectionConfig,
}
