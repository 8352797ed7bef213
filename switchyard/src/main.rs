#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod simulate;

use args::{Args, Command, PlanArgs};
use clap::Parser;
use switchyard_config::Config;
use switchyard_routing::{FailoverOptions, ProviderSelector, SelectionCriteria};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize telemetry
    switchyard_telemetry::init(&config.telemetry)?;

    tracing::debug!(config_path = %args.config.display(), "configuration loaded");

    match args.command {
        Command::Check => {
            check(&config);
            Ok(())
        }
        Command::Plan(plan_args) => {
            let criteria = criteria(&config, &plan_args);
            for provider in ProviderSelector::new().select(Some(&criteria)) {
                println!("{provider}");
            }
            Ok(())
        }
        Command::Simulate(simulate_args) => {
            let criteria = criteria(&config, &simulate_args.selection);

            // Set up graceful shutdown
            let shutdown = CancellationToken::new();
            let shutdown_clone = shutdown.clone();

            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown_clone.cancel();
            });

            simulate::run(&config, criteria, &simulate_args, shutdown).await
        }
    }
}

fn check(config: &Config) {
    let options = FailoverOptions::from(&config.failover);

    tracing::info!(
        failures_before_blacklist = options.failures_before_blacklist,
        blacklist_duration = ?options.blacklist_duration,
        provider_timeout = ?options.provider_timeout,
        request_timeout = ?options.request_timeout,
        max_providers_to_try = ?options.max_providers_to_try,
        preferred = ?config.selection.preferred,
        excluded = ?config.selection.excluded,
        "configuration is valid"
    );
}

/// Configured selection criteria with command-line overrides applied
fn criteria(config: &Config, overrides: &PlanArgs) -> SelectionCriteria {
    let mut criteria = SelectionCriteria::from(&config.selection);

    if !overrides.prefer.is_empty() {
        criteria.preferred_providers.clone_from(&overrides.prefer);
    }
    criteria.excluded_providers.extend(overrides.exclude.iter().copied());

    criteria
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
