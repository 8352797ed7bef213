use serde::Deserialize;
use switchyard_core::ProviderType;

/// Default provider selection preferences
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectionConfig {
    /// Preferred provider types, most preferred first
    #[serde(default)]
    pub preferred: Vec<ProviderType>,
    /// Provider types never routed to
    #[serde(default)]
    pub excluded: Vec<ProviderType>,
    /// Penalize providers with high observed latency
    #[serde(default)]
    pub prefer_fastest: bool,
    /// Hint that cheaper providers are preferred
    #[serde(default)]
    pub prefer_cheapest: bool,
}
