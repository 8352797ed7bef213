//! Provider routing and failover for Switchyard
//!
//! - **Selection**: rank candidate providers by static reliability, caller
//!   preference and live metrics ([`ProviderSelector`])
//! - **Failover**: try providers in order, skipping blacklisted ones, and
//!   blacklist providers that keep failing ([`FailoverManager`])
//! - **Orchestration**: pre-filter, select, fail over and account for a
//!   single request ([`Orchestrator`])

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod criteria;
pub mod error;
pub mod failover;
pub mod health;
pub mod metrics;
pub mod orchestrator;
pub mod selector;

pub use criteria::SelectionCriteria;
pub use error::{OrchestratorError, OrchestratorErrorCode, RoutingError};
pub use failover::{FailoverAttempt, FailoverManager, FailoverOptions, FailoverResult};
pub use health::{BlacklistEntry, ProviderHealthTable};
pub use metrics::{MetricsTracker, ProviderMetrics, ProviderMetricsService};
pub use orchestrator::{Completion, ExecutionContext, ExecutionMetrics, Orchestrator, ProviderHealthStatus};
pub use selector::{ProviderSelector, reliability_bonus};
