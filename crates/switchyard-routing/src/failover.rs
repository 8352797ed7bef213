//! Blacklist-aware sequential failover
//!
//! Providers are tried one at a time in the order given. Failures are counted
//! per provider type across requests; a provider that keeps failing is
//! blacklisted for a while and skipped by later calls.

use std::collections::HashMap;
use std::fmt::Display;
use std::time::{Duration, Instant};

use jiff::Timestamp;
use switchyard_config::FailoverConfig;
use switchyard_core::{ProviderHandle, ProviderType};
use tokio_util::sync::CancellationToken;

use crate::error::RoutingError;
use crate::health::{BlacklistEntry, ProviderHealthTable};

/// Failover behaviour, fixed for the life of a manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverOptions {
    /// Consecutive failures before a provider is blacklisted
    pub failures_before_blacklist: u32,
    /// How long a blacklisted provider is skipped
    pub blacklist_duration: Duration,
    /// Time allowed for one provider invocation
    ///
    /// Not enforced by [`FailoverManager`]; the operation (or the
    /// orchestrator wrapping it) applies it.
    pub provider_timeout: Duration,
    /// Deadline for a whole orchestrated request
    pub request_timeout: Option<Duration>,
    /// Longest failover chain for one request
    pub max_providers_to_try: Option<usize>,
}

impl Default for FailoverOptions {
    fn default() -> Self {
        Self::from(&FailoverConfig::default())
    }
}

impl From<&FailoverConfig> for FailoverOptions {
    fn from(config: &FailoverConfig) -> Self {
        Self {
            failures_before_blacklist: config.failures_before_blacklist.max(1),
            blacklist_duration: config.blacklist_duration,
            provider_timeout: config.provider_timeout,
            request_timeout: config.request_timeout,
            max_providers_to_try: config.max_providers_to_try,
        }
    }
}

/// One provider try within a failover call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverAttempt {
    /// Provider that was invoked
    pub provider: ProviderType,
    /// Whether the invocation succeeded
    pub success: bool,
    /// Rendered error of a failed invocation
    pub error: Option<String>,
    /// Wall-clock time spent in the invocation
    pub duration: Duration,
    /// When the invocation started
    pub timestamp: Timestamp,
}

/// Overall outcome of a failover call
#[derive(Debug, Clone)]
pub struct FailoverResult<T> {
    /// Whether some provider succeeded
    pub success: bool,
    /// Value produced by the successful provider
    pub value: Option<T>,
    /// Provider type that produced `value`
    pub successful_provider: Option<ProviderType>,
    /// Every attempt, in the order made
    ///
    /// Empty only when no providers were given. On success the last
    /// attempt is the successful one.
    pub attempts: Vec<FailoverAttempt>,
    /// Time since the call began
    pub total_duration: Duration,
}

impl<T> FailoverResult<T> {
    fn failed(attempts: Vec<FailoverAttempt>, total_duration: Duration) -> Self {
        Self {
            success: false,
            value: None,
            successful_provider: None,
            attempts,
            total_duration,
        }
    }

    /// `"<provider>: <error>"` for every failed attempt, joined with `"; "`
    pub fn failure_summary(&self) -> String {
        self.attempts
            .iter()
            .filter(|attempt| !attempt.success)
            .map(|attempt| format!("{}: {}", attempt.provider, attempt.error.as_deref().unwrap_or("unknown error")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Runs operations against ordered providers and owns their blacklist
#[derive(Debug, Default)]
pub struct FailoverManager {
    options: FailoverOptions,
    health: ProviderHealthTable,
}

impl FailoverManager {
    /// Create a manager with isolated health state
    pub fn new(options: FailoverOptions) -> Self {
        Self {
            options,
            health: ProviderHealthTable::new(),
        }
    }

    /// Options this manager was built with
    pub const fn options(&self) -> &FailoverOptions {
        &self.options
    }

    /// Run `operation` against each eligible handle until one succeeds
    ///
    /// Blacklisted handles are skipped; if every handle is blacklisted, the
    /// first one is attempted anyway. Provider failures never produce an
    /// `Err`: they are recorded in the returned [`FailoverResult`]. The only
    /// error is cancellation through `cancel`, which leaves health state for
    /// the in-flight provider untouched.
    pub async fn execute_with_failover<H, T, E, F, Fut>(
        &self,
        handles: &[H],
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<FailoverResult<T>, RoutingError>
    where
        H: ProviderHandle + Clone,
        F: FnMut(H, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let started = Instant::now();

        if handles.is_empty() {
            tracing::warn!("failover called with no providers");
            return Ok(FailoverResult::failed(Vec::new(), started.elapsed()));
        }

        let mut eligible: Vec<&H> = handles
            .iter()
            .filter(|h| !self.health.is_blacklisted(h.provider_type()))
            .collect();

        if eligible.is_empty() {
            tracing::warn!(
                candidates = handles.len(),
                provider = %handles[0].provider_type(),
                "all providers blacklisted, forcing attempt on first"
            );
            eligible = handles.iter().take(1).collect();
        }

        let mut attempts = Vec::with_capacity(eligible.len());

        for (index, handle) in eligible.into_iter().enumerate() {
            let provider = handle.provider_type();
            let timestamp = Timestamp::now();
            let attempt_started = Instant::now();

            tracing::debug!(%provider, attempt = index + 1, "attempting provider");

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = operation(handle.clone(), cancel.clone()) => Some(result),
            };
            let duration = attempt_started.elapsed();

            // An error observed after the caller cancelled is the cancellation, not a provider fault
            let Some(result) = outcome.filter(|r| r.is_ok() || !cancel.is_cancelled()) else {
                tracing::warn!(%provider, attempt = index + 1, "failover cancelled");
                return Err(RoutingError::Cancelled { provider });
            };

            match result {
                Ok(value) => {
                    self.health.record_success(provider);
                    attempts.push(FailoverAttempt {
                        provider,
                        success: true,
                        error: None,
                        duration,
                        timestamp,
                    });

                    tracing::info!(
                        %provider,
                        attempts = attempts.len(),
                        duration_ms = duration.as_millis(),
                        "provider succeeded"
                    );

                    return Ok(FailoverResult {
                        success: true,
                        value: Some(value),
                        successful_provider: Some(provider),
                        attempts,
                        total_duration: started.elapsed(),
                    });
                }
                Err(e) => {
                    let error = e.to_string();
                    tracing::warn!(%provider, attempt = index + 1, error = %error, "provider attempt failed");

                    let outcome = self.health.record_failure(
                        provider,
                        self.options.failures_before_blacklist,
                        self.options.blacklist_duration,
                        &error,
                    );
                    if outcome.blacklisted {
                        tracing::warn!(
                            %provider,
                            failures = outcome.failure_count,
                            duration_secs = self.options.blacklist_duration.as_secs(),
                            "provider blacklisted"
                        );
                    }

                    attempts.push(FailoverAttempt {
                        provider,
                        success: false,
                        error: Some(error),
                        duration,
                        timestamp,
                    });
                }
            }
        }

        tracing::error!(attempts = attempts.len(), "all providers failed");
        Ok(FailoverResult::failed(attempts, started.elapsed()))
    }

    /// Whether `provider` is currently blacklisted (expired entries are cleared)
    pub fn is_blacklisted(&self, provider: ProviderType) -> bool {
        self.health.is_blacklisted(provider)
    }

    /// Blacklist `provider` for `duration`, replacing any existing entry
    pub fn blacklist_provider(&self, provider: ProviderType, duration: Duration, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(%provider, duration_secs = duration.as_secs(), reason = %reason, "provider blacklisted manually");
        self.health.blacklist(provider, duration, reason);
    }

    /// Clear the blacklist entry and failure counter for `provider`
    pub fn unblacklist_provider(&self, provider: ProviderType) {
        if self.health.unblacklist(provider) {
            tracing::info!(%provider, "provider removed from blacklist");
        }
    }

    /// Active blacklist entries, after sweeping expired ones
    pub fn blacklisted_providers(&self) -> HashMap<ProviderType, BlacklistEntry> {
        self.health.blacklisted()
    }

    /// Active blacklist entry for `provider`
    pub fn blacklist_entry(&self, provider: ProviderType) -> Option<BlacklistEntry> {
        self.health.entry(provider)
    }

    /// Consecutive failures currently counted for `provider`
    pub fn failure_count(&self, provider: ProviderType) -> u32 {
        self.health.failure_count(provider)
    }
}
