//! Orchestrator wiring for tests

use std::sync::Arc;
use std::time::Duration;

use switchyard_core::{Provider, ProviderRequest};
use switchyard_routing::{
    FailoverManager, FailoverOptions, MetricsTracker, Orchestrator, ProviderMetricsService, ProviderSelector,
    SelectionCriteria,
};

/// Orchestrator plus handles on its shared state
pub struct TestRouter {
    pub orchestrator: Arc<Orchestrator>,
    pub failover: Arc<FailoverManager>,
    pub metrics: Arc<MetricsTracker>,
}

/// Builder for a [`TestRouter`]
pub struct RouterBuilder {
    providers: Vec<Arc<dyn Provider>>,
    options: FailoverOptions,
    criteria: SelectionCriteria,
    rank_by_metrics: bool,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            options: FailoverOptions::default(),
            criteria: SelectionCriteria::default(),
            rank_by_metrics: false,
        }
    }

    /// Let recorded metrics influence ranking (off by default to keep orders fixed)
    pub fn rank_by_metrics(mut self) -> Self {
        self.rank_by_metrics = true;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn failures_before_blacklist(mut self, n: u32) -> Self {
        self.options.failures_before_blacklist = n;
        self
    }

    pub fn blacklist_duration(mut self, duration: Duration) -> Self {
        self.options.blacklist_duration = duration;
        self
    }

    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.options.provider_timeout = timeout;
        self
    }

    pub fn max_providers_to_try(mut self, n: usize) -> Self {
        self.options.max_providers_to_try = Some(n);
        self
    }

    pub fn options(mut self, options: FailoverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn criteria(mut self, criteria: SelectionCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn build(self) -> TestRouter {
        let metrics = Arc::new(MetricsTracker::new());
        let failover = Arc::new(FailoverManager::new(self.options));
        let selector = if self.rank_by_metrics {
            ProviderSelector::with_metrics(metrics.clone())
        } else {
            ProviderSelector::new()
        };
        let orchestrator = Orchestrator::new(
            self.providers,
            selector,
            Arc::clone(&failover),
            Some(metrics.clone() as Arc<dyn ProviderMetricsService>),
        )
        .with_default_criteria(self.criteria);

        TestRouter {
            orchestrator: Arc::new(orchestrator),
            failover,
            metrics,
        }
    }
}

/// Chat request for a model every mock serves by default
pub fn chat_request() -> ProviderRequest {
    ProviderRequest::chat(
        "mock-model-1",
        serde_json::json!({ "messages": [{ "role": "user", "content": "Hello" }] }),
    )
}
