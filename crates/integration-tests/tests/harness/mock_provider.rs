//! Scriptable in-process provider
//!
//! Fails a configurable number of calls, optionally sleeps before answering,
//! and counts how often it was invoked.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use switchyard_core::{
    Provider, ProviderCapabilities, ProviderError, ProviderHandle, ProviderRequest, ProviderResponse, ProviderType,
    TokenUsage,
};
use tokio_util::sync::CancellationToken;

/// Fail every call until told otherwise
pub const ALWAYS: u32 = u32::MAX;

/// Provider double with predictable behaviour
pub struct MockProvider {
    name: String,
    kind: ProviderType,
    capabilities: ProviderCapabilities,
    models: Option<Vec<String>>,
    delay: Duration,
    /// Calls left to fail (`ALWAYS` never counts down)
    fail_remaining: AtomicU32,
    healthy: AtomicBool,
    invocations: AtomicU32,
    completions: AtomicU32,
}

impl MockProvider {
    /// Healthy provider that answers immediately
    pub fn new(name: &str, kind: ProviderType) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            capabilities: ProviderCapabilities {
                streaming: true,
                tool_calling: true,
                ..ProviderCapabilities::default()
            },
            models: None,
            delay: Duration::ZERO,
            fail_remaining: AtomicU32::new(0),
            healthy: AtomicBool::new(true),
            invocations: AtomicU32::new(0),
            completions: AtomicU32::new(0),
        }
    }

    /// Fail the first `n` calls with an upstream 500
    pub fn failing(self, n: u32) -> Self {
        self.fail_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Sleep for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Advertise `capabilities` instead of the defaults
    pub fn with_capabilities(mut self, capabilities: ProviderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Serve only the listed models
    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.models = Some(models.iter().map(|m| (*m).to_owned()).collect());
        self
    }

    /// Report a failing health check
    pub fn unhealthy(self) -> Self {
        self.healthy.store(false, Ordering::SeqCst);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Stop failing from the next call on
    pub fn recover(&self) {
        self.fail_remaining.store(0, Ordering::SeqCst);
    }

    /// Calls that reached the provider
    pub fn invocation_count(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Calls that ran to completion, successfully or not
    pub fn completion_count(&self) -> u32 {
        self.completions.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        self.fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                ALWAYS => Some(ALWAYS),
                n => Some(n - 1),
            })
            .is_ok()
    }
}

impl ProviderHandle for MockProvider {
    fn provider_type(&self) -> ProviderType {
        self.kind
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities.clone()
    }

    fn supports_model(&self, model: &str) -> bool {
        self.models
            .as_ref()
            .is_none_or(|models| models.iter().any(|m| m == model))
    }

    async fn invoke(
        &self,
        request: &ProviderRequest,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        let call = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.delay.is_zero() {
            tokio::select! {
                () = cancel.cancelled() => return Err(ProviderError::Cancelled),
                () = tokio::time::sleep(self.delay) => {}
            }
        }

        self.completions.fetch_add(1, Ordering::SeqCst);

        if self.should_fail() {
            return Err(ProviderError::Upstream {
                status: 500,
                message: format!("{} failure on call {call}", self.name),
            });
        }

        Ok(ProviderResponse {
            model: request.model.clone(),
            body: serde_json::json!({ "provider": self.name, "call": call }),
            usage: Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 20,
            }),
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProviderError::Transport(format!("{} is unreachable", self.name)))
        }
    }
}
