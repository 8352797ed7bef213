//! Per-request selection preferences

use std::collections::HashSet;

use switchyard_config::SelectionConfig;
use switchyard_core::{ProviderCapabilities, ProviderType};

/// Preferences and constraints used to rank or filter providers for one request
///
/// `required_capabilities`, `required_model` and `min_context_length` are not
/// part of the scoring math; they are applied as a pre-filter by the caller
/// (see [`crate::Orchestrator`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionCriteria {
    /// Preferred provider types, most preferred first
    pub preferred_providers: Vec<ProviderType>,
    /// Provider types never to use
    pub excluded_providers: HashSet<ProviderType>,
    /// Capabilities the serving provider must offer
    pub required_capabilities: Option<ProviderCapabilities>,
    /// Specific model the serving provider must offer
    pub required_model: Option<String>,
    /// Minimum context window, in tokens
    pub min_context_length: Option<u32>,
    /// Hint that cheaper providers are preferred
    pub prefer_cheapest: bool,
    /// Penalize providers with high observed latency
    pub prefer_fastest: bool,
}

impl SelectionCriteria {
    /// Criteria that prefer the given providers, in order
    pub fn preferring(providers: impl IntoIterator<Item = ProviderType>) -> Self {
        Self {
            preferred_providers: providers.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Add provider types to the exclusion set
    #[must_use]
    pub fn excluding(mut self, providers: impl IntoIterator<Item = ProviderType>) -> Self {
        self.excluded_providers.extend(providers);
        self
    }

    /// Enable the latency penalty
    #[must_use]
    pub fn fastest(mut self) -> Self {
        self.prefer_fastest = true;
        self
    }

    /// Zero-based position of `provider` in the preference list
    pub fn preference_rank(&self, provider: ProviderType) -> Option<usize> {
        self.preferred_providers.iter().position(|p| *p == provider)
    }

    /// Whether `provider` is listed as preferred
    pub fn is_preferred(&self, provider: ProviderType) -> bool {
        self.preferred_providers.contains(&provider)
    }

    /// Whether `provider` must never be used
    pub fn is_excluded(&self, provider: ProviderType) -> bool {
        self.excluded_providers.contains(&provider)
    }
}

impl From<&SelectionConfig> for SelectionCriteria {
    fn from(config: &SelectionConfig) -> Self {
        Self {
            preferred_providers: config.preferred.clone(),
            excluded_providers: config.excluded.iter().copied().collect(),
            prefer_cheapest: config.prefer_cheapest,
            prefer_fastest: config.prefer_fastest,
            ..Self::default()
        }
    }
}
