//! Score-based provider ranking
//!
//! The selector is stateless: every ranking is a pure function of the
//! candidate handles, the request criteria and whatever the optional
//! metrics service reports at call time.

use std::collections::HashSet;
use std::sync::Arc;

use switchyard_core::{ProviderHandle, ProviderRequest, ProviderType};

use crate::criteria::SelectionCriteria;
use crate::metrics::ProviderMetricsService;

/// Score every candidate starts from
const BASE_SCORE: f64 = 100.0;

/// Bonus per position in the preference list, counted from the end
const PREFERENCE_STEP: f64 = 10.0;

/// Weight applied to the observed success rate
const SUCCESS_RATE_WEIGHT: f64 = 20.0;

/// Upper bound on the latency penalty
const MAX_LATENCY_PENALTY: f64 = 30.0;

/// Static bonus reflecting how dependable a provider family is in general
pub const fn reliability_bonus(provider: ProviderType) -> f64 {
    match provider {
        ProviderType::OpenAi | ProviderType::Anthropic => 15.0,
        ProviderType::AzureOpenAi | ProviderType::Bedrock => 12.0,
        ProviderType::Gemini => 10.0,
        ProviderType::Mistral | ProviderType::Cohere => 8.0,
        ProviderType::HuggingFace => 5.0,
        ProviderType::Ollama | ProviderType::Vllm => 3.0,
        ProviderType::Custom => 0.0,
    }
}

/// Ranks providers for a request
#[derive(Clone, Default)]
pub struct ProviderSelector {
    metrics: Option<Arc<dyn ProviderMetricsService>>,
}

impl std::fmt::Debug for ProviderSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSelector")
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl ProviderSelector {
    /// Selector that ranks on static data and preferences only
    pub fn new() -> Self {
        Self::default()
    }

    /// Selector that also consults live metrics
    pub fn with_metrics(metrics: Arc<dyn ProviderMetricsService>) -> Self {
        Self { metrics: Some(metrics) }
    }

    /// Order the full universe of known provider types
    ///
    /// Exclusions are removed. Preferred types are moved to the front in the
    /// order given, everything else follows in default reliability order.
    /// Preference only reorders here; [`Self::select_providers_ordered`]
    /// restricts to preferred providers instead.
    pub fn select(&self, criteria: Option<&SelectionCriteria>) -> Vec<ProviderType> {
        let Some(criteria) = criteria else {
            return ProviderType::DEFAULT_ORDER.to_vec();
        };

        let universe: Vec<ProviderType> = ProviderType::DEFAULT_ORDER
            .into_iter()
            .filter(|p| !criteria.is_excluded(*p))
            .collect();

        let mut seen = HashSet::with_capacity(universe.len());
        let mut ordered = Vec::with_capacity(universe.len());

        for preferred in &criteria.preferred_providers {
            if universe.contains(preferred) && seen.insert(*preferred) {
                ordered.push(*preferred);
            }
        }
        ordered.extend(universe.into_iter().filter(|p| !seen.contains(p)));

        ordered
    }

    /// Highest-ranked handle, or `None` when there are no candidates
    pub fn select_best_provider<H>(
        &self,
        request: &ProviderRequest,
        available: &[H],
        criteria: Option<&SelectionCriteria>,
    ) -> Option<H>
    where
        H: ProviderHandle + Clone,
    {
        self.select_providers_ordered(request, available, criteria)
            .into_iter()
            .next()
    }

    /// Rank `available` from best to worst
    ///
    /// Excluded types are dropped. When any candidate is preferred, only
    /// preferred candidates are kept. Equal scores keep their input order.
    pub fn select_providers_ordered<H>(
        &self,
        request: &ProviderRequest,
        available: &[H],
        criteria: Option<&SelectionCriteria>,
    ) -> Vec<H>
    where
        H: ProviderHandle + Clone,
    {
        let mut candidates: Vec<&H> = available
            .iter()
            .filter(|h| criteria.is_none_or(|c| !c.is_excluded(h.provider_type())))
            .collect();

        if let Some(criteria) = criteria.filter(|c| !c.preferred_providers.is_empty()) {
            let preferred: Vec<&H> = candidates
                .iter()
                .copied()
                .filter(|h| criteria.is_preferred(h.provider_type()))
                .collect();
            if !preferred.is_empty() {
                candidates = preferred;
            }
        }

        let mut scored: Vec<(f64, &H)> = candidates
            .into_iter()
            .map(|h| (self.score(h.provider_type(), criteria), h))
            .collect();

        // `sort_by` is stable, so ties keep their input order
        scored.sort_by(|(a, _), (b, _)| b.total_cmp(a));

        tracing::debug!(
            model = %request.model,
            candidates = scored.len(),
            top = ?scored.first().map(|(score, h)| (h.provider_type(), *score)),
            "providers ranked"
        );

        scored.into_iter().map(|(_, h)| h.clone()).collect()
    }

    /// Total score of one provider type under `criteria`
    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self, provider: ProviderType, criteria: Option<&SelectionCriteria>) -> f64 {
        let mut score = BASE_SCORE;

        if let Some((rank, criteria)) = criteria.and_then(|c| c.preference_rank(provider).map(|rank| (rank, c))) {
            score += (criteria.preferred_providers.len() - rank) as f64 * PREFERENCE_STEP;
        }

        if let Some(metrics) = self.metrics.as_ref().and_then(|m| m.metrics(provider)) {
            score += metrics.success_rate * SUCCESS_RATE_WEIGHT;

            let prefer_fastest = criteria.is_some_and(|c| c.prefer_fastest);
            if prefer_fastest && metrics.average_latency_ms > 0.0 {
                score -= (metrics.average_latency_ms / 100.0).min(MAX_LATENCY_PENALTY);
            }
        }

        score + reliability_bonus(provider)
    }
}
