//! Policy evaluation engine
//!
//! The engine holds an immutable, rank-ordered [`PolicySet`] behind a
//! swappable handle. Every evaluation takes one snapshot of the handle up
//! front, so a concurrent reload is observed either entirely or not at all.

use leakguard_core::{parse_window, Error, Result, Severity, SharedClock};
use leakguard_telemetry::MetricsCollector;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::policy::{load_policy_dir, Policy, PolicyDefinition};
use crate::tracker::{ThresholdTracker, TrackerConfig};
use crate::Action;

/// One policy whose static and stateful conditions both held for an event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyMatch {
    pub policy_id: String,
    pub policy_name: String,
    pub priority: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub actions: Vec<Action>,
    pub compliance_tags: Vec<String>,
}

impl From<&Policy> for PolicyMatch {
    fn from(policy: &Policy) -> Self {
        Self {
            policy_id: policy.id.clone(),
            policy_name: policy.name.clone(),
            priority: policy.priority,
            severity: policy.severity,
            actions: policy.actions.clone(),
            compliance_tags: policy.compliance_tags.clone(),
        }
    }
}

/// A policy rejected during a load
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("policy '{policy_id}' rejected: {reason}")]
pub struct PolicyLoadError {
    pub policy_id: String,
    pub reason: String,
}

/// Outcome of a load or reload
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Policies now active
    pub loaded: usize,

    /// Policies that failed validation or compilation
    pub rejected: Vec<PolicyLoadError>,

    /// Generation number of the new active set
    pub generation: u64,
}

impl LoadReport {
    /// True if every supplied policy was accepted
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Immutable, priority-ordered policy set
#[derive(Debug, Default)]
pub struct PolicySet {
    policies: Vec<Arc<Policy>>,
    generation: u64,
}

impl PolicySet {
    /// Policies in evaluation order
    pub fn policies(&self) -> &[Arc<Policy>] {
        &self.policies
    }

    /// Monotonic load counter
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Look up a policy by id
    pub fn get(&self, id: &str) -> Option<&Arc<Policy>> {
        self.policies.iter().find(|p| p.id == id)
    }
}

/// Policy evaluation engine
pub struct PolicyEngine {
    active: RwLock<Option<Arc<PolicySet>>>,
    tracker: ThresholdTracker,
    metrics: MetricsCollector,
    default_window: Duration,
}

impl PolicyEngine {
    /// Create an unloaded engine with default tracker settings
    pub fn new() -> Self {
        Self::with_tracker(&TrackerConfig::default(), ThresholdTracker::new(&TrackerConfig::default()))
    }

    /// Create an unloaded engine from tracker configuration
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::with_tracker(config, ThresholdTracker::new(config))
    }

    /// Create an unloaded engine whose windows run on `clock`
    pub fn with_clock(config: &TrackerConfig, clock: SharedClock) -> Self {
        Self::with_tracker(config, ThresholdTracker::with_clock(config, clock))
    }

    fn with_tracker(config: &TrackerConfig, tracker: ThresholdTracker) -> Self {
        Self {
            active: RwLock::new(None),
            tracker,
            metrics: MetricsCollector::new(),
            default_window: parse_window(&config.default_window),
        }
    }

    /// Report metrics into an existing collector
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    /// Load a policy set.
    ///
    /// Invalid policies are rejected individually and the rest are loaded.
    /// The resulting set replaces any existing one atomically. Concurrent
    /// loads are serialized on the swap, so the last set installed always
    /// carries the highest generation.
    pub fn load_policies(&self, definitions: &[PolicyDefinition]) -> LoadReport {
        let (policies, rejected) = self.compile_set(definitions);

        let loaded = policies.len();
        let generation = {
            let mut active = self.active.write();
            let generation = active.as_ref().map_or(0, |set| set.generation) + 1;
            let set = PolicySet { policies, generation };

            let keep: HashSet<&str> = set.policies.iter().map(|p| p.id.as_str()).collect();
            self.tracker.retain_policies(&keep);

            *active = Some(Arc::new(set));
            generation
        };

        let report = LoadReport {
            loaded,
            rejected,
            generation,
        };

        self.metrics.record_rejected_policies(report.rejected.len() as u64);
        info!(
            loaded = report.loaded,
            rejected = report.rejected.len(),
            generation = report.generation,
            "Policy set loaded"
        );

        report
    }

    /// Replace the active policy set.
    ///
    /// Windows of policies present in both sets are kept.
    pub fn reload(&self, definitions: &[PolicyDefinition]) -> LoadReport {
        self.load_policies(definitions)
    }

    /// Load every policy file in `dir`
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<LoadReport> {
        let (definitions, unreadable) = load_policy_dir(dir)?;
        let mut report = self.load_policies(&definitions);

        self.metrics.record_rejected_policies(unreadable.len() as u64);
        report.rejected.extend(unreadable.into_iter().map(|file| PolicyLoadError {
            policy_id: file.path.display().to_string(),
            reason: file.error.to_string(),
        }));

        Ok(report)
    }

    /// Evaluate an event against the active policy set.
    ///
    /// Matches come back in evaluation order, highest priority first. Fails
    /// only if no policy set has been loaded.
    pub fn evaluate(&self, event: &Value) -> Result<Vec<PolicyMatch>> {
        let set = self.snapshot().ok_or(Error::NotLoaded)?;

        let mut matches = Vec::new();
        let mut window_entry: Option<Arc<Value>> = None;

        for policy in set.policies() {
            if !policy.enabled || !policy.conditions.evaluate(event) {
                continue;
            }

            if let Some(rule) = &policy.stateful {
                let entry = window_entry.get_or_insert_with(|| Arc::new(event.clone()));
                if !self.tracker.check(&policy.id, rule.window, Arc::clone(entry), &rule.threshold) {
                    debug!(policy = %policy.id, "Conditions met, threshold not reached");
                    continue;
                }
            }

            debug!(policy = %policy.id, priority = policy.priority, "Policy matched");
            matches.push(PolicyMatch::from(policy.as_ref()));

            if policy.stop_on_match {
                debug!(policy = %policy.id, "Stopping evaluation after match");
                break;
            }
        }

        self.metrics
            .record_evaluation(matches.iter().map(|m| m.policy_id.as_str()));

        Ok(matches)
    }

    /// Current policy set, if loaded
    pub fn snapshot(&self) -> Option<Arc<PolicySet>> {
        self.active.read().clone()
    }

    /// Look up an active policy by id
    pub fn policy(&self, id: &str) -> Option<Arc<Policy>> {
        self.snapshot()?.get(id).cloned()
    }

    /// True once a policy set has been loaded
    pub fn is_loaded(&self) -> bool {
        self.active.read().is_some()
    }

    /// Threshold tracker backing stateful policies
    pub fn tracker(&self) -> &ThresholdTracker {
        &self.tracker
    }

    /// Metrics collector
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    fn compile_set(&self, definitions: &[PolicyDefinition]) -> (Vec<Arc<Policy>>, Vec<PolicyLoadError>) {
        let mut policies: Vec<Arc<Policy>> = Vec::with_capacity(definitions.len());
        let mut rejected = Vec::new();
        let mut seen = HashSet::new();

        for definition in definitions {
            if !seen.insert(definition.id.as_str()) {
                let err = PolicyLoadError {
                    policy_id: definition.id.clone(),
                    reason: "duplicate policy id".to_string(),
                };
                warn!(policy = %definition.id, "Duplicate policy id, keeping the first definition");
                rejected.push(err);
                continue;
            }

            match Policy::compile_with_window(definition, self.default_window) {
                Ok(policy) => {
                    if !policy.enabled {
                        debug!(policy = %policy.id, "Policy loaded disabled");
                    }
                    policies.push(Arc::new(policy));
                }
                Err(e) => {
                    error!(policy = %definition.id, error = %e, "Rejected policy");
                    rejected.push(PolicyLoadError {
                        policy_id: definition.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Stable: equal priorities keep load order
        policies.sort_by(|a, b| b.priority.cmp(&a.priority));

        (policies, rejected)
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}
