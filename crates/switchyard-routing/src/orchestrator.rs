//! Request orchestration: selection, failover and bookkeeping for one call

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use switchyard_core::{Operation, Provider, ProviderError, ProviderRequest, ProviderResponse, ProviderType};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::criteria::SelectionCriteria;
use crate::error::OrchestratorError;
use crate::failover::{FailoverAttempt, FailoverManager};
use crate::health::BlacklistEntry;
use crate::metrics::{ProviderMetrics, ProviderMetricsService};
use crate::selector::ProviderSelector;

/// Per-request overrides
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Selection criteria; the orchestrator default applies when unset
    pub criteria: Option<SelectionCriteria>,
    /// Route only to providers of this type, bypassing selection
    pub force_provider: Option<ProviderType>,
    /// Try a single provider only
    pub disable_failover: bool,
    /// Deadline for the whole request
    pub timeout: Option<Duration>,
    /// Longest failover chain for this request
    pub max_providers_to_try: Option<usize>,
    /// Caller-supplied id for log correlation
    pub correlation_id: Option<String>,
}

/// Accounting for one orchestrated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetrics {
    /// Time from start of orchestration to completion
    pub total_duration: Duration,
    /// Providers invoked, including the successful one
    pub providers_attempted: usize,
    /// Prompt tokens reported by the provider
    pub input_tokens: Option<u32>,
    /// Completion tokens reported by the provider
    pub output_tokens: Option<u32>,
}

/// Successful orchestration
#[derive(Debug, Clone)]
pub struct Completion {
    /// Provider response
    pub response: ProviderResponse,
    /// Type of the provider that served the request
    pub provider: ProviderType,
    /// Name of the provider that served the request
    pub provider_name: String,
    /// Id attached to every log line of the request
    pub correlation_id: String,
    /// Every provider try, in order
    pub attempts: Vec<FailoverAttempt>,
    /// Request accounting
    pub metrics: ExecutionMetrics,
}

/// Health report for one registered provider
#[derive(Debug, Clone)]
pub struct ProviderHealthStatus {
    /// Provider name
    pub name: String,
    /// Provider type
    pub provider: ProviderType,
    /// Health check passed and the provider is not blacklisted
    pub is_healthy: bool,
    /// Active blacklist entry, if any
    pub blacklist: Option<BlacklistEntry>,
    /// Health check error, or the blacklist reason
    pub last_error: Option<String>,
    /// Live metrics for the provider type
    pub metrics: Option<ProviderMetrics>,
}

/// Routes canonical requests across registered providers
pub struct Orchestrator {
    providers: Vec<Arc<dyn Provider>>,
    selector: ProviderSelector,
    failover: Arc<FailoverManager>,
    metrics: Option<Arc<dyn ProviderMetricsService>>,
    default_criteria: SelectionCriteria,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.providers.iter().map(|p| p.name().to_owned()).collect::<Vec<_>>())
            .field("selector", &self.selector)
            .field("failover", &self.failover)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator over `providers`
    ///
    /// The failover manager is shared so blacklist state survives across
    /// orchestrators built from the same configuration.
    pub fn new(
        providers: Vec<Arc<dyn Provider>>,
        selector: ProviderSelector,
        failover: Arc<FailoverManager>,
        metrics: Option<Arc<dyn ProviderMetricsService>>,
    ) -> Self {
        Self {
            providers,
            selector,
            failover,
            metrics,
            default_criteria: SelectionCriteria::default(),
        }
    }

    /// Criteria used when a request carries none
    #[must_use]
    pub fn with_default_criteria(mut self, criteria: SelectionCriteria) -> Self {
        self.default_criteria = criteria;
        self
    }

    /// Registered providers
    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    /// Shared failover manager
    pub fn failover(&self) -> &Arc<FailoverManager> {
        &self.failover
    }

    /// Execute `request` against the best available providers
    ///
    /// # Errors
    ///
    /// Returns an error when the request is malformed, no provider can
    /// serve it, every provider fails, the request deadline elapses, or
    /// `cancel` fires
    pub async fn execute(
        &self,
        request: &ProviderRequest,
        context: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<Completion, OrchestratorError> {
        let correlation_id = context
            .correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        let span = tracing::info_span!(
            "orchestrate",
            correlation_id = %correlation_id,
            model = %request.model,
            operation = %request.operation,
        );

        self.execute_inner(request, context, cancel, correlation_id)
            .instrument(span)
            .await
    }

    async fn execute_inner(
        &self,
        request: &ProviderRequest,
        context: &ExecutionContext,
        cancel: &CancellationToken,
        correlation_id: String,
    ) -> Result<Completion, OrchestratorError> {
        let started = Instant::now();

        if request.model.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest("model must not be empty".to_owned()));
        }

        let mut candidates = self.candidates(request, context);

        // Limits count healthy providers; the blacklisted head is only kept as the forced fallback
        if candidates.iter().any(|p| !self.failover.is_blacklisted(p.provider_type())) {
            candidates.retain(|p| !self.failover.is_blacklisted(p.provider_type()));
        }

        if context.disable_failover {
            candidates.truncate(1);
        }
        if let Some(max) = context.max_providers_to_try.or(self.failover.options().max_providers_to_try) {
            candidates.truncate(max.max(1));
        }

        if candidates.is_empty() {
            tracing::warn!("no provider available");
            return Err(OrchestratorError::NoProviderAvailable {
                model: request.model.clone(),
            });
        }

        tracing::debug!(
            candidates = ?candidates.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "failover chain built"
        );

        let provider_timeout = self.failover.options().provider_timeout;
        let metrics = self.metrics.as_ref();

        let operation = |provider: Arc<dyn Provider>, token: CancellationToken| async move {
            let invoked = Instant::now();
            let result = tokio::time::timeout(provider_timeout, provider.invoke(request, &token))
                .await
                .unwrap_or(Err(ProviderError::Timeout(provider_timeout)));

            // Abandoned work says nothing about the provider
            if let Some(metrics) = metrics.filter(|_| !token.is_cancelled()) {
                metrics.record(provider.provider_type(), invoked.elapsed(), result.is_ok());
            }

            result.map(|response| (provider, response))
        };

        let run = self.failover.execute_with_failover(&candidates, cancel, operation);

        let result = match context.timeout.or(self.failover.options().request_timeout) {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                tracing::warn!(timeout_ms = limit.as_millis(), "request deadline elapsed");
                OrchestratorError::GlobalTimeout(limit)
            })?,
            None => run.await,
        }?;

        let providers_attempted = result.attempts.len();

        let Some((provider, response)) = result.value else {
            let summary = result.failure_summary();
            tracing::error!(attempts = providers_attempted, summary = %summary, "request failed on every provider");
            return Err(OrchestratorError::AllProvidersFailed {
                summary,
                attempts: providers_attempted,
            });
        };

        let metrics = ExecutionMetrics {
            total_duration: started.elapsed(),
            providers_attempted,
            input_tokens: response.usage.map(|u| u.input_tokens),
            output_tokens: response.usage.map(|u| u.output_tokens),
        };

        tracing::info!(
            provider = provider.name(),
            attempts = providers_attempted,
            duration_ms = metrics.total_duration.as_millis(),
            "request completed"
        );

        Ok(Completion {
            provider: provider.provider_type(),
            provider_name: provider.name().to_owned(),
            response,
            correlation_id,
            attempts: result.attempts,
            metrics,
        })
    }

    /// Ordered failover chain before truncation
    fn candidates(&self, request: &ProviderRequest, context: &ExecutionContext) -> Vec<Arc<dyn Provider>> {
        if let Some(forced) = context.force_provider {
            return self
                .providers
                .iter()
                .filter(|p| p.provider_type() == forced)
                .cloned()
                .collect();
        }

        let criteria = context.criteria.as_ref().unwrap_or(&self.default_criteria);

        let compatible: Vec<Arc<dyn Provider>> = self
            .providers
            .iter()
            .filter(|&p| is_compatible(&**p, request, criteria))
            .cloned()
            .collect();

        self.selector
            .select_providers_ordered(request, &compatible, Some(criteria))
    }

    /// Run every provider's health check and merge it with blacklist and metrics state
    pub async fn providers_health(&self) -> Vec<ProviderHealthStatus> {
        let limit = self.failover.options().provider_timeout;

        let checks = self.providers.iter().map(|provider| async move {
            tokio::time::timeout(limit, provider.health_check())
                .await
                .unwrap_or(Err(ProviderError::Timeout(limit)))
        });
        let results = join_all(checks).await;

        self.providers
            .iter()
            .zip(results)
            .map(|(provider, check)| {
                let provider_type = provider.provider_type();
                let blacklist = self.failover.blacklist_entry(provider_type);
                let last_error = match (&check, &blacklist) {
                    (Err(e), _) => Some(e.to_string()),
                    (Ok(()), Some(entry)) => Some(entry.reason.clone()),
                    (Ok(()), None) => None,
                };

                ProviderHealthStatus {
                    name: provider.name().to_owned(),
                    provider: provider_type,
                    is_healthy: check.is_ok() && blacklist.is_none(),
                    blacklist,
                    last_error,
                    metrics: self.metrics.as_ref().and_then(|m| m.metrics(provider_type)),
                }
            })
            .collect()
    }
}

/// Caller-side pre-filter for the constraints scoring does not look at
fn is_compatible(provider: &dyn Provider, request: &ProviderRequest, criteria: &SelectionCriteria) -> bool {
    let model = criteria.required_model.as_deref().unwrap_or(&request.model);
    if !provider.supports_model(model) {
        return false;
    }

    let capabilities = provider.capabilities();

    if request.operation == Operation::Embedding && !capabilities.embeddings {
        return false;
    }

    if criteria
        .required_capabilities
        .as_ref()
        .is_some_and(|required| !capabilities.satisfies(required))
    {
        return false;
    }

    // Unknown context window is not grounds for rejection
    criteria
        .min_context_length
        .is_none_or(|min| capabilities.context_window.is_none_or(|window| window >= min))
}
