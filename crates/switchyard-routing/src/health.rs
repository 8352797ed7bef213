//! Per-provider failure counters and blacklist
//!
//! A single map from provider type to its state. Every mutation goes through
//! the map's entry API, so the shard lock is held only for that one key and
//! traffic to unrelated providers never waits on it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use jiff::{SignedDuration, Timestamp};
use switchyard_core::ProviderType;

/// Longest time a single entry may exclude a provider
const MAX_BLACKLIST_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Why and until when a provider is excluded from failover
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistEntry {
    /// When the entry was installed
    pub blacklisted_at: Timestamp,
    /// When the entry stops applying
    pub expires_at: Timestamp,
    /// Human-readable cause
    pub reason: String,
    /// Consecutive failures recorded when the entry was installed
    pub failure_count: u32,
    deadline: Instant,
}

impl BlacklistEntry {
    fn new(duration: Duration, reason: String, failure_count: u32) -> Self {
        let duration = duration.min(MAX_BLACKLIST_DURATION);
        let blacklisted_at = Timestamp::now();
        let expires_at = SignedDuration::try_from(duration)
            .ok()
            .and_then(|d| blacklisted_at.checked_add(d).ok())
            .unwrap_or(Timestamp::MAX);

        Self {
            blacklisted_at,
            expires_at,
            reason,
            failure_count,
            deadline: Instant::now() + duration,
        }
    }

    /// Whether the entry has lapsed
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Time left before the entry lapses
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

#[derive(Debug, Default)]
struct ProviderState {
    failure_count: u32,
    blacklist: Option<BlacklistEntry>,
}

impl ProviderState {
    fn active_blacklist(&self) -> Option<&BlacklistEntry> {
        self.blacklist.as_ref().filter(|entry| !entry.is_expired())
    }

    fn has_expired_blacklist(&self) -> bool {
        self.blacklist.as_ref().is_some_and(BlacklistEntry::is_expired)
    }
}

/// Outcome of recording a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureOutcome {
    /// Consecutive failures after this one
    pub failure_count: u32,
    /// Whether this failure installed a blacklist entry
    pub blacklisted: bool,
}

/// Shared failure/blacklist bookkeeping for every provider type
#[derive(Debug, Default)]
pub struct ProviderHealthTable {
    providers: DashMap<ProviderType, ProviderState>,
}

impl ProviderHealthTable {
    /// Create an empty table; every provider starts healthy
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `provider` is currently blacklisted
    ///
    /// An expired entry is removed together with its failure counter.
    /// Concurrent callers may race on that removal; all of them see `false`.
    pub fn is_blacklisted(&self, provider: ProviderType) -> bool {
        let expired = match self.providers.get(&provider) {
            None => return false,
            Some(state) if state.active_blacklist().is_some() => return true,
            Some(state) => state.has_expired_blacklist(),
        };

        if expired {
            // Re-checked under the write lock: another caller may have refreshed it
            self.providers.remove_if(&provider, |_, state| state.has_expired_blacklist());
        }
        false
    }

    /// Record a failed attempt and blacklist once `threshold` is reached
    ///
    /// The increment, the threshold check and the blacklist install happen
    /// under one entry lock so concurrent failures are never under-counted.
    pub fn record_failure(&self, provider: ProviderType, threshold: u32, duration: Duration, error: &str) -> FailureOutcome {
        let mut state = self.providers.entry(provider).or_default();

        // A lapsed entry no longer counts; start a fresh streak
        if state.has_expired_blacklist() {
            *state = ProviderState::default();
        }

        state.failure_count = state.failure_count.saturating_add(1);
        let failure_count = state.failure_count;

        let blacklisted = failure_count >= threshold;
        if blacklisted {
            let reason = format!("consecutive failures: {failure_count}, last error: {error}");
            state.blacklist = Some(BlacklistEntry::new(duration, reason, failure_count));
        }

        FailureOutcome {
            failure_count,
            blacklisted,
        }
    }

    /// Reset the consecutive failure counter after a success
    ///
    /// An active blacklist entry is left in place; it lapses on its own or
    /// through [`Self::unblacklist`].
    pub fn record_success(&self, provider: ProviderType) {
        if let Entry::Occupied(mut entry) = self.providers.entry(provider) {
            if entry.get().blacklist.is_none() {
                entry.remove();
            } else {
                entry.get_mut().failure_count = 0;
            }
        }
    }

    /// Install or replace the blacklist entry for `provider`
    pub fn blacklist(&self, provider: ProviderType, duration: Duration, reason: impl Into<String>) {
        let mut state = self.providers.entry(provider).or_default();
        let failure_count = state.failure_count;
        state.blacklist = Some(BlacklistEntry::new(duration, reason.into(), failure_count));
    }

    /// Drop the blacklist entry and failure counter for `provider`
    ///
    /// Returns whether an active entry was removed.
    pub fn unblacklist(&self, provider: ProviderType) -> bool {
        self.providers
            .remove(&provider)
            .is_some_and(|(_, state)| state.active_blacklist().is_some())
    }

    /// Snapshot of every active blacklist entry, after sweeping expired ones
    pub fn blacklisted(&self) -> HashMap<ProviderType, BlacklistEntry> {
        self.providers.retain(|_, state| !state.has_expired_blacklist());

        self.providers
            .iter()
            .filter_map(|state| {
                state
                    .active_blacklist()
                    .map(|entry| (*state.key(), entry.clone()))
            })
            .collect()
    }

    /// Active blacklist entry for one provider
    pub fn entry(&self, provider: ProviderType) -> Option<BlacklistEntry> {
        self.providers
            .get(&provider)
            .and_then(|state| state.active_blacklist().cloned())
    }

    /// Current consecutive failure count for `provider`
    pub fn failure_count(&self, provider: ProviderType) -> u32 {
        self.providers.get(&provider).map_or(0, |state| state.failure_count)
    }

    #[cfg(test)]
    fn expire_now(&self, provider: ProviderType) {
        if let Some(entry) = self.providers.get_mut(&provider).as_deref_mut().and_then(|s| s.blacklist.as_mut()) {
            entry.deadline = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const FIVE_MINUTES: Duration = Duration::from_secs(300);

    #[test]
    fn healthy_by_default() {
        let table = ProviderHealthTable::new();
        assert!(!table.is_blacklisted(ProviderType::OpenAi));
        assert_eq!(table.failure_count(ProviderType::OpenAi), 0);
        assert!(table.blacklisted().is_empty());
    }

    #[test]
    fn blacklists_at_threshold() {
        let table = ProviderHealthTable::new();

        let first = table.record_failure(ProviderType::Mistral, 3, FIVE_MINUTES, "boom");
        let second = table.record_failure(ProviderType::Mistral, 3, FIVE_MINUTES, "boom");
        assert!(!first.blacklisted && !second.blacklisted);
        assert!(!table.is_blacklisted(ProviderType::Mistral));

        let third = table.record_failure(ProviderType::Mistral, 3, FIVE_MINUTES, "upstream error (503)");
        assert_eq!(
            third,
            FailureOutcome {
                failure_count: 3,
                blacklisted: true
            }
        );
        assert!(table.is_blacklisted(ProviderType::Mistral));

        let entry = table.entry(ProviderType::Mistral).unwrap();
        assert_eq!(entry.failure_count, 3);
        assert_eq!(entry.reason, "consecutive failures: 3, last error: upstream error (503)");
        assert!(entry.expires_at > entry.blacklisted_at);
    }

    #[test]
    fn success_resets_counter() {
        let table = ProviderHealthTable::new();
        table.record_failure(ProviderType::Gemini, 3, FIVE_MINUTES, "boom");
        table.record_failure(ProviderType::Gemini, 3, FIVE_MINUTES, "boom");

        table.record_success(ProviderType::Gemini);

        assert_eq!(table.failure_count(ProviderType::Gemini), 0);
        let outcome = table.record_failure(ProviderType::Gemini, 3, FIVE_MINUTES, "boom");
        assert_eq!(outcome.failure_count, 1);
        assert!(!table.is_blacklisted(ProviderType::Gemini));
    }

    #[test]
    fn success_drops_healthy_state() {
        let table = ProviderHealthTable::new();
        table.record_failure(ProviderType::Ollama, 3, FIVE_MINUTES, "boom");

        table.record_success(ProviderType::Ollama);
        table.record_success(ProviderType::Vllm);

        assert!(table.providers.is_empty());
    }

    #[test]
    fn success_keeps_active_blacklist() {
        let table = ProviderHealthTable::new();
        table.record_failure(ProviderType::Cohere, 1, FIVE_MINUTES, "boom");

        table.record_success(ProviderType::Cohere);

        assert!(table.is_blacklisted(ProviderType::Cohere));
        assert_eq!(table.failure_count(ProviderType::Cohere), 0);
    }

    #[test]
    fn expired_entry_is_removed_lazily() {
        let table = ProviderHealthTable::new();
        table.record_failure(ProviderType::Bedrock, 1, FIVE_MINUTES, "boom");
        assert!(table.is_blacklisted(ProviderType::Bedrock));

        table.expire_now(ProviderType::Bedrock);

        assert!(!table.is_blacklisted(ProviderType::Bedrock));
        // Counter went with the entry
        assert_eq!(table.failure_count(ProviderType::Bedrock), 0);
        // Idempotent once gone
        assert!(!table.is_blacklisted(ProviderType::Bedrock));
    }

    #[test]
    fn short_duration_expires() {
        let table = ProviderHealthTable::new();
        table.blacklist(ProviderType::Ollama, Duration::from_millis(1), "manual");

        std::thread::sleep(Duration::from_millis(5));

        assert!(!table.is_blacklisted(ProviderType::Ollama));
    }

    #[test]
    fn manual_blacklist_captures_current_count() {
        let table = ProviderHealthTable::new();
        table.blacklist(ProviderType::Vllm, FIVE_MINUTES, "maintenance");
        assert_eq!(table.entry(ProviderType::Vllm).unwrap().failure_count, 0);

        table.record_failure(ProviderType::HuggingFace, 10, FIVE_MINUTES, "boom");
        table.record_failure(ProviderType::HuggingFace, 10, FIVE_MINUTES, "boom");
        table.blacklist(ProviderType::HuggingFace, FIVE_MINUTES, "maintenance");

        let entry = table.entry(ProviderType::HuggingFace).unwrap();
        assert_eq!(entry.failure_count, 2);
        assert_eq!(entry.reason, "maintenance");
    }

    #[test]
    fn blacklist_replaces_existing_entry() {
        let table = ProviderHealthTable::new();
        table.blacklist(ProviderType::OpenAi, Duration::from_secs(1), "first");
        table.blacklist(ProviderType::OpenAi, FIVE_MINUTES, "second");

        let entry = table.entry(ProviderType::OpenAi).unwrap();
        assert_eq!(entry.reason, "second");
        assert!(entry.remaining() > Duration::from_secs(60));
    }

    #[test]
    fn unblacklist_clears_entry_and_counter() {
        let table = ProviderHealthTable::new();
        table.record_failure(ProviderType::Anthropic, 2, FIVE_MINUTES, "boom");
        table.record_failure(ProviderType::Anthropic, 2, FIVE_MINUTES, "boom");

        assert!(table.unblacklist(ProviderType::Anthropic));

        assert!(!table.is_blacklisted(ProviderType::Anthropic));
        assert_eq!(table.failure_count(ProviderType::Anthropic), 0);
        // No-op when nothing is tracked
        assert!(!table.unblacklist(ProviderType::Anthropic));
    }

    #[test]
    fn failure_after_expiry_starts_new_streak() {
        let table = ProviderHealthTable::new();
        table.record_failure(ProviderType::Mistral, 2, FIVE_MINUTES, "boom");
        table.record_failure(ProviderType::Mistral, 2, FIVE_MINUTES, "boom");
        table.expire_now(ProviderType::Mistral);

        let outcome = table.record_failure(ProviderType::Mistral, 2, FIVE_MINUTES, "boom");

        assert_eq!(outcome.failure_count, 1);
        assert!(!outcome.blacklisted);
    }

    #[test]
    fn snapshot_sweeps_expired_entries() {
        let table = ProviderHealthTable::new();
        table.blacklist(ProviderType::OpenAi, FIVE_MINUTES, "a");
        table.blacklist(ProviderType::Gemini, FIVE_MINUTES, "b");
        table.expire_now(ProviderType::Gemini);

        let snapshot = table.blacklisted();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&ProviderType::OpenAi].reason, "a");
        assert_eq!(table.failure_count(ProviderType::Gemini), 0);
    }

    #[test]
    fn concurrent_failures_are_not_lost() {
        let table = Arc::new(ProviderHealthTable::new());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let table = Arc::clone(&table);
                scope.spawn(move || {
                    for _ in 0..250 {
                        table.record_failure(ProviderType::OpenAi, u32::MAX, FIVE_MINUTES, "boom");
                    }
                });
            }
        });

        assert_eq!(table.failure_count(ProviderType::OpenAi), 2000);
    }

    #[test]
    fn concurrent_successes_do_not_erase_failures() {
        let table = Arc::new(ProviderHealthTable::new());

        for _ in 0..200 {
            std::thread::scope(|scope| {
                let successes = Arc::clone(&table);
                scope.spawn(move || successes.record_success(ProviderType::Mistral));

                let failures = Arc::clone(&table);
                scope.spawn(move || {
                    let outcome = failures.record_failure(ProviderType::Mistral, u32::MAX, FIVE_MINUTES, "boom");
                    assert_eq!(outcome.failure_count, 1);
                });
            });

            // Whichever ran last decides the state, never a half-applied mix
            let count = table.failure_count(ProviderType::Mistral);
            let state_kept = table.providers.contains_key(&ProviderType::Mistral);
            assert_eq!(count == 1, state_kept);

            table.record_success(ProviderType::Mistral);
        }
    }

    #[test]
    fn concurrent_threshold_blacklists_exactly_once_per_crossing() {
        let table = Arc::new(ProviderHealthTable::new());
        let crossings = std::sync::atomic::AtomicU32::new(0);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let table = Arc::clone(&table);
                let crossings = &crossings;
                scope.spawn(move || {
                    for _ in 0..5 {
                        let outcome = table.record_failure(ProviderType::Anthropic, 20, FIVE_MINUTES, "boom");
                        if outcome.failure_count == 20 {
                            crossings.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(crossings.into_inner(), 1);
        assert!(table.is_blacklisted(ProviderType::Anthropic));
    }
}
