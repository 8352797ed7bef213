//! Provider identity and the invocation surface routing depends on

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::types::{ProviderRequest, ProviderResponse};

/// Backend family a provider client speaks to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    serde_with::DeserializeFromStr,
    serde_with::SerializeDisplay,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProviderType {
    #[strum(serialize = "openai")]
    OpenAi,
    Anthropic,
    #[strum(serialize = "azure_openai")]
    AzureOpenAi,
    Bedrock,
    Gemini,
    Mistral,
    Cohere,
    HuggingFace,
    Ollama,
    Vllm,
    /// Self-hosted or otherwise unclassified backend
    Custom,
}

impl ProviderType {
    /// Every known provider type, most reliable first
    ///
    /// `Custom` is deliberately absent: it has no place in the default universe.
    pub const DEFAULT_ORDER: [Self; 10] = [
        Self::OpenAi,
        Self::Anthropic,
        Self::AzureOpenAi,
        Self::Bedrock,
        Self::Gemini,
        Self::Mistral,
        Self::Cohere,
        Self::HuggingFace,
        Self::Ollama,
        Self::Vllm,
    ];

    /// Canonical lowercase name, as used in configuration
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Anything that can be routed to: only its provider type matters for ranking and health
pub trait ProviderHandle {
    /// Backend family of this handle
    fn provider_type(&self) -> ProviderType;
}

impl<T: ProviderHandle + ?Sized> ProviderHandle for &T {
    fn provider_type(&self) -> ProviderType {
        (**self).provider_type()
    }
}

impl<T: ProviderHandle + ?Sized> ProviderHandle for Arc<T> {
    fn provider_type(&self) -> ProviderType {
        (**self).provider_type()
    }
}

/// Capabilities advertised by a provider client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Supports streaming responses
    pub streaming: bool,
    /// Supports tool/function calling
    pub tool_calling: bool,
    /// Accepts image inputs
    pub vision: bool,
    /// Serves embedding requests
    pub embeddings: bool,
    /// Largest context window across the provider's models, in tokens
    pub context_window: Option<u32>,
}

impl ProviderCapabilities {
    /// Whether every capability set in `required` is also set here
    pub fn satisfies(&self, required: &Self) -> bool {
        (!required.streaming || self.streaming)
            && (!required.tool_calling || self.tool_calling)
            && (!required.vision || self.vision)
            && (!required.embeddings || self.embeddings)
    }
}

/// Client for a single backend, implemented per provider outside the routing core
#[async_trait]
pub trait Provider: ProviderHandle + Send + Sync {
    /// Human-readable name (usually the configured provider key)
    fn name(&self) -> &str;

    /// Advertised capabilities
    fn capabilities(&self) -> ProviderCapabilities;

    /// Whether this provider can serve `model`
    fn supports_model(&self, _model: &str) -> bool {
        true
    }

    /// Execute one canonical request against the backend
    ///
    /// Implementations should stop work promptly once `cancel` fires.
    async fn invoke(
        &self,
        request: &ProviderRequest,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Lightweight liveness probe
    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
