//! Shared domain types for Switchyard
//!
//! Provider identity, the provider client trait, canonical request/response
//! envelopes, and the error types that cross crate boundaries.

#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod provider;
pub mod types;

pub use error::{HttpError, ProviderError};
pub use provider::{Provider, ProviderCapabilities, ProviderHandle, ProviderType};
pub use types::{Operation, ProviderRequest, ProviderResponse, TokenUsage};
