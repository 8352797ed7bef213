//! Shared fixtures for routing integration tests

#![allow(dead_code)]

pub mod mock_provider;
pub mod router;
