//! Metrics collection and reporting
//!
//! Every `record_*` call updates an in-process snapshot and forwards to the
//! `metrics` facade, so an installed recorder (Prometheus, statsd, ...) sees
//! the same numbers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const EVENTS_EVALUATED: &str = "leakguard_events_evaluated_total";
pub const POLICY_MATCHES: &str = "leakguard_policy_matches_total";
pub const POLICIES_REJECTED: &str = "leakguard_policies_rejected_total";
pub const ACTION_FAILURES: &str = "leakguard_action_failures_total";
pub const CLASSIFICATION_LATENCY: &str = "leakguard_classification_latency_us";

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    ::metrics::describe_counter!(EVENTS_EVALUATED, "Total number of events evaluated against the policy set");
    ::metrics::describe_counter!(POLICY_MATCHES, "Total number of policy matches by policy id");
    ::metrics::describe_counter!(POLICIES_REJECTED, "Total number of policy definitions rejected at load");
    ::metrics::describe_counter!(ACTION_FAILURES, "Total number of failed action executions by action");
    ::metrics::describe_histogram!(
        CLASSIFICATION_LATENCY,
        ::metrics::Unit::Microseconds,
        "Content classification latency in microseconds"
    );
}

/// Metrics collector for Leakguard decisions
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    events_evaluated: AtomicU64,
    policy_matches: AtomicU64,
    events_with_matches: AtomicU64,
    policies_rejected: AtomicU64,
    action_failures: AtomicU64,
    classification_latency_us: AtomicU64,
    classified_events: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    /// Record one evaluated event and its policy matches
    pub fn record_evaluation<'a>(&self, matched_policy_ids: impl IntoIterator<Item = &'a str>) {
        self.inner.events_evaluated.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(EVENTS_EVALUATED).increment(1);

        let mut matched = 0u64;
        for policy_id in matched_policy_ids {
            matched += 1;
            ::metrics::counter!(POLICY_MATCHES, "policy" => policy_id.to_string()).increment(1);
        }

        if matched > 0 {
            self.inner.policy_matches.fetch_add(matched, Ordering::Relaxed);
            self.inner.events_with_matches.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record policies rejected during a load
    pub fn record_rejected_policies(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.inner.policies_rejected.fetch_add(count, Ordering::Relaxed);
        ::metrics::counter!(POLICIES_REJECTED).increment(count);
    }

    /// Record a failed action execution
    pub fn record_action_failure(&self, action: &str) {
        self.inner.action_failures.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(ACTION_FAILURES, "action" => action.to_string()).increment(1);
    }

    /// Record classification latency
    pub fn record_classification(&self, latency_us: u64) {
        self.inner.classified_events.fetch_add(1, Ordering::Relaxed);
        self.inner
            .classification_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);
        ::metrics::histogram!(CLASSIFICATION_LATENCY).record(latency_us as f64);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_evaluated: self.inner.events_evaluated.load(Ordering::Relaxed),
            policy_matches: self.inner.policy_matches.load(Ordering::Relaxed),
            events_with_matches: self.inner.events_with_matches.load(Ordering::Relaxed),
            policies_rejected: self.inner.policies_rejected.load(Ordering::Relaxed),
            action_failures: self.inner.action_failures.load(Ordering::Relaxed),
            classification_latency_us: self.inner.classification_latency_us.load(Ordering::Relaxed),
            classified_events: self.inner.classified_events.load(Ordering::Relaxed),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_evaluated: u64,
    pub policy_matches: u64,
    pub events_with_matches: u64,
    pub policies_rejected: u64,
    pub action_failures: u64,
    pub classification_latency_us: u64,
    pub classified_events: u64,
}

impl MetricsSnapshot {
    /// Calculate average classification latency
    pub fn avg_classification_latency_us(&self) -> u64 {
        if self.classified_events == 0 {
            0
        } else {
            self.classification_latency_us / self.classified_events
        }
    }

    /// Fraction of evaluated events that matched at least one policy
    pub fn match_rate(&self) -> f64 {
        if self.events_evaluated == 0 {
            0.0
        } else {
            self.events_with_matches as f64 / self.events_evaluated as f64
        }
    }
}
