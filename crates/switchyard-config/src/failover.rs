use std::time::Duration;

use serde::Deserialize;

/// Failover and blacklist policy
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailoverConfig {
    /// Consecutive failures after which a provider is blacklisted
    #[serde(default = "default_failures_before_blacklist")]
    pub failures_before_blacklist: u32,
    /// How long a blacklisted provider is skipped
    #[serde(default = "default_blacklist_duration", with = "crate::duration")]
    pub blacklist_duration: Duration,
    /// Deadline for a single provider invocation
    #[serde(default = "default_provider_timeout", with = "crate::duration")]
    pub provider_timeout: Duration,
    /// Deadline for a whole orchestrated request, across every attempt
    #[serde(default, deserialize_with = "crate::duration::deserialize_option")]
    pub request_timeout: Option<Duration>,
    /// Upper bound on providers tried for one request
    #[serde(default)]
    pub max_providers_to_try: Option<usize>,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            failures_before_blacklist: default_failures_before_blacklist(),
            blacklist_duration: default_blacklist_duration(),
            provider_timeout: default_provider_timeout(),
            request_timeout: None,
            max_providers_to_try: None,
        }
    }
}

const fn default_failures_before_blacklist() -> u32 {
    3
}

const fn default_blacklist_duration() -> Duration {
    Duration::from_secs(5 * 60)
}

const fn default_provider_timeout() -> Duration {
    Duration::from_secs(30)
}
