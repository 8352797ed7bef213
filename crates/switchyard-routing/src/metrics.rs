//! Live provider performance metrics
//!
//! The selector only reads metrics through [`ProviderMetricsService`]; any
//! collector can be plugged in. [`MetricsTracker`] is the in-memory one:
//! a sliding window of recent outcomes per provider type.

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use jiff::Timestamp;
use switchyard_core::ProviderType;

/// Maximum outcomes to retain per provider in the sliding window
const MAX_SAMPLES: usize = 1000;

/// Observed performance of one provider type
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderMetrics {
    /// Fraction of successful calls in the window, in `[0, 1]`
    pub success_rate: f64,
    /// Mean latency of successful calls in the window, in milliseconds
    pub average_latency_ms: f64,
    /// Calls recorded since the tracker started
    pub total_calls: u64,
    /// When the last call was recorded
    pub last_updated: Timestamp,
}

/// Source of live metrics consulted during scoring
pub trait ProviderMetricsService: Send + Sync {
    /// Current metrics for `provider`, if any have been observed
    fn metrics(&self, provider: ProviderType) -> Option<ProviderMetrics>;

    /// Record the outcome of one provider call
    fn record(&self, provider: ProviderType, latency: Duration, success: bool);
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    latency_ms: f64,
    success: bool,
}

#[derive(Debug)]
struct ProviderSamples {
    window: VecDeque<Sample>,
    total_calls: u64,
    last_updated: Timestamp,
}

impl ProviderSamples {
    fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(MAX_SAMPLES),
            total_calls: 0,
            last_updated: Timestamp::now(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn snapshot(&self) -> ProviderMetrics {
        let (successes, latency_sum) = self
            .window
            .iter()
            .filter(|s| s.success)
            .fold((0usize, 0.0), |(n, sum), s| (n + 1, sum + s.latency_ms));

        let success_rate = if self.window.is_empty() {
            0.0
        } else {
            successes as f64 / self.window.len() as f64
        };

        let average_latency_ms = if successes == 0 {
            0.0
        } else {
            latency_sum / successes as f64
        };

        ProviderMetrics {
            success_rate,
            average_latency_ms,
            total_calls: self.total_calls,
            last_updated: self.last_updated,
        }
    }
}

/// In-memory metrics collector keyed by provider type
#[derive(Debug, Default)]
pub struct MetricsTracker {
    providers: DashMap<ProviderType, ProviderSamples>,
}

impl MetricsTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outcomes currently held in the window for `provider`
    pub fn sample_count(&self, provider: ProviderType) -> usize {
        self.providers.get(&provider).map_or(0, |entry| entry.window.len())
    }
}

impl ProviderMetricsService for MetricsTracker {
    fn metrics(&self, provider: ProviderType) -> Option<ProviderMetrics> {
        self.providers.get(&provider).map(|entry| entry.snapshot())
    }

    fn record(&self, provider: ProviderType, latency: Duration, success: bool) {
        let mut entry = self.providers.entry(provider).or_insert_with(ProviderSamples::new);

        // Sliding window: drop oldest when full
        if entry.window.len() >= MAX_SAMPLES {
            entry.window.pop_front();
        }
        entry.window.push_back(Sample {
            latency_ms: latency.as_secs_f64() * 1000.0,
            success,
        });
        entry.total_calls += 1;
        entry.last_updated = Timestamp::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_has_no_metrics() {
        let tracker = MetricsTracker::new();
        assert!(tracker.metrics(ProviderType::OpenAi).is_none());
    }

    #[test]
    fn success_rate_and_latency() {
        let tracker = MetricsTracker::new();
        tracker.record(ProviderType::OpenAi, Duration::from_millis(100), true);
        tracker.record(ProviderType::OpenAi, Duration::from_millis(300), true);
        tracker.record(ProviderType::OpenAi, Duration::from_millis(5000), false);
        tracker.record(ProviderType::OpenAi, Duration::from_millis(200), true);

        let metrics = tracker.metrics(ProviderType::OpenAi).unwrap();
        assert!((metrics.success_rate - 0.75).abs() < f64::EPSILON);
        // Failed calls do not skew latency
        assert!((metrics.average_latency_ms - 200.0).abs() < 1e-9);
        assert_eq!(metrics.total_calls, 4);
    }

    #[test]
    fn only_failures_reports_zero_latency() {
        let tracker = MetricsTracker::new();
        tracker.record(ProviderType::Mistral, Duration::from_secs(2), false);

        let metrics = tracker.metrics(ProviderType::Mistral).unwrap();
        assert!(metrics.success_rate.abs() < f64::EPSILON);
        assert!(metrics.average_latency_ms.abs() < f64::EPSILON);
    }

    #[test]
    fn window_is_bounded_but_total_is_lifetime() {
        let tracker = MetricsTracker::new();
        for _ in 0..MAX_SAMPLES {
            tracker.record(ProviderType::Gemini, Duration::from_millis(10), false);
        }
        for _ in 0..MAX_SAMPLES {
            tracker.record(ProviderType::Gemini, Duration::from_millis(10), true);
        }

        assert_eq!(tracker.sample_count(ProviderType::Gemini), MAX_SAMPLES);
        let metrics = tracker.metrics(ProviderType::Gemini).unwrap();
        assert_eq!(metrics.total_calls, 2 * MAX_SAMPLES as u64);
        // Old failures have been pushed out of the window
        assert!((metrics.success_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn providers_are_tracked_independently() {
        let tracker = MetricsTracker::new();
        tracker.record(ProviderType::OpenAi, Duration::from_millis(50), true);

        assert!(tracker.metrics(ProviderType::Anthropic).is_none());
        assert_eq!(tracker.sample_count(ProviderType::OpenAi), 1);
    }
}
