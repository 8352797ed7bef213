//! In-process provider simulation for exercising selection and failover

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use switchyard_config::Config;
use switchyard_core::{
    Provider, ProviderCapabilities, ProviderError, ProviderHandle, ProviderRequest, ProviderResponse, ProviderType,
    TokenUsage,
};
use switchyard_routing::{
    ExecutionContext, FailoverManager, FailoverOptions, MetricsTracker, Orchestrator, ProviderMetricsService,
    ProviderSelector, SelectionCriteria,
};
use tokio_util::sync::CancellationToken;

use crate::args::SimulateArgs;

/// Provider that answers after a fixed delay, or always fails
struct SimulatedProvider {
    kind: ProviderType,
    failing: bool,
    latency: Duration,
    calls: AtomicU64,
}

impl ProviderHandle for SimulatedProvider {
    fn provider_type(&self) -> ProviderType {
        self.kind
    }
}

#[async_trait]
impl Provider for SimulatedProvider {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: true,
            tool_calling: true,
            ..ProviderCapabilities::default()
        }
    }

    async fn invoke(
        &self,
        request: &ProviderRequest,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;

        tokio::select! {
            () = cancel.cancelled() => return Err(ProviderError::Cancelled),
            () = tokio::time::sleep(self.latency) => {}
        }

        if self.failing {
            return Err(ProviderError::Upstream {
                status: 503,
                message: "simulated outage".to_owned(),
            });
        }

        Ok(ProviderResponse {
            model: request.model.clone(),
            body: json!({ "provider": self.kind, "call": call }),
            usage: Some(TokenUsage {
                input_tokens: 12,
                output_tokens: 34,
            }),
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.failing {
            return Err(ProviderError::Transport("simulated outage".to_owned()));
        }
        Ok(())
    }
}

/// Route `args.requests` requests through one simulated provider per selectable type
pub async fn run(config: &Config, criteria: SelectionCriteria, args: &SimulateArgs, shutdown: CancellationToken) -> anyhow::Result<()> {
    let selector = ProviderSelector::new();
    let providers: Vec<Arc<dyn Provider>> = selector
        .select(Some(&criteria))
        .into_iter()
        .map(|kind| {
            Arc::new(SimulatedProvider {
                kind,
                failing: args.fail.contains(&kind),
                latency: args.latency,
                calls: AtomicU64::new(0),
            }) as Arc<dyn Provider>
        })
        .collect();

    anyhow::ensure!(!providers.is_empty(), "selection excludes every provider");

    let metrics = Arc::new(MetricsTracker::new());
    let orchestrator = Orchestrator::new(
        providers,
        ProviderSelector::with_metrics(metrics.clone()),
        Arc::new(FailoverManager::new(FailoverOptions::from(&config.failover))),
        Some(metrics.clone() as Arc<dyn ProviderMetricsService>),
    )
    .with_default_criteria(criteria);

    let request = ProviderRequest::chat(&args.model, json!({ "messages": [{ "role": "user", "content": "ping" }] }));

    for index in 1..=args.requests {
        let context = ExecutionContext {
            correlation_id: Some(format!("sim-{index}")),
            ..ExecutionContext::default()
        };

        match orchestrator.execute(&request, &context, &shutdown).await {
            Ok(completion) => println!(
                "request {index}: served by {} after {} attempt(s) in {:?}",
                completion.provider_name, completion.metrics.providers_attempted, completion.metrics.total_duration
            ),
            Err(e) if shutdown.is_cancelled() => {
                tracing::warn!(error = %e, "simulation interrupted");
                break;
            }
            Err(e) => println!("request {index}: {} ({e})", e.code()),
        }
    }

    println!();
    for status in orchestrator.providers_health().await {
        let calls = status.metrics.as_ref().map_or(0, |m| m.total_calls);
        let state = if status.is_healthy { "healthy" } else { "unhealthy" };
        match status.last_error {
            Some(reason) => println!("{:<14} {state:<10} calls={calls:<4} {reason}", status.name),
            None => println!("{:<14} {state:<10} calls={calls:<4}", status.name),
        }
    }

    Ok(())
}
