//! Canonical request/response envelopes passed through the router
//!
//! The body is produced by the API translation layer and is opaque here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of work a request asks a provider to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    /// Chat completion
    Chat,
    /// Embedding vectors
    Embedding,
}

/// Request in the gateway's canonical format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Kind of work requested
    pub operation: Operation,
    /// Model identifier requested by the client
    pub model: String,
    /// Canonical request body
    pub body: Value,
}

impl ProviderRequest {
    /// Build a chat completion request
    pub fn chat(model: impl Into<String>, body: Value) -> Self {
        Self {
            operation: Operation::Chat,
            model: model.into(),
            body,
        }
    }

    /// Build an embedding request
    pub fn embedding(model: impl Into<String>, body: Value) -> Self {
        Self {
            operation: Operation::Embedding,
            model: model.into(),
            body,
        }
    }
}

/// Response in the gateway's canonical format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Model that actually served the request
    pub model: String,
    /// Canonical response body
    pub body: Value,
    /// Token accounting, when the provider reports it
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// Token accounting for one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens consumed
    pub input_tokens: u32,
    /// Completion tokens generated
    pub output_tokens: u32,
}
