//! Sliding-window threshold tracking for stateful policies
//!
//! Each policy owns one time-ordered window of the events that satisfied its
//! static conditions. A check appends the current event, prunes everything
//! older than `now - window`, and counts what remains, all under the
//! policy's lock so two concurrent events cannot both pass on a stale count.

use chrono::{DateTime, Utc};
use leakguard_core::{Clock, SharedClock, SystemClock};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::policy::Threshold;

/// Tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Upper bound on retained events per policy window
    #[serde(default = "default_max_events")]
    pub max_events_per_policy: usize,

    /// Window used when a policy's window cannot be parsed
    #[serde(default = "default_window")]
    pub default_window: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_events_per_policy: default_max_events(),
            default_window: default_window(),
        }
    }
}

fn default_max_events() -> usize {
    10_000
}

fn default_window() -> String {
    "5m".to_string()
}

#[derive(Debug)]
struct WindowEntry {
    at: DateTime<Utc>,
    event: Arc<Value>,
}

type Window = Arc<Mutex<VecDeque<WindowEntry>>>;

/// Per-policy sliding windows
pub struct ThresholdTracker {
    clock: SharedClock,
    max_events_per_policy: usize,
    windows: RwLock<HashMap<String, Window>>,
}

impl ThresholdTracker {
    /// Tracker on the system clock
    pub fn new(config: &TrackerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Tracker on an explicit clock
    pub fn with_clock(config: &TrackerConfig, clock: SharedClock) -> Self {
        Self {
            clock,
            max_events_per_policy: config.max_events_per_policy.max(1),
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Record `event` in the policy's window and test the threshold.
    ///
    /// With a `distinct_field`, the count is the number of distinct values of
    /// that field across the window. Events where the field is absent or
    /// `null` do not contribute a value.
    pub fn check(&self, policy_id: &str, window: Duration, event: Arc<Value>, threshold: &Threshold) -> bool {
        let entries = self.window(policy_id);
        let mut entries = entries.lock();

        let now = self.clock.now();
        entries.push_back(WindowEntry { at: now, event });

        let cutoff = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| now.checked_sub_signed(w))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        while entries.front().is_some_and(|entry| entry.at < cutoff) {
            entries.pop_front();
        }

        while entries.len() > self.max_events_per_policy {
            entries.pop_front();
        }

        let count = match &threshold.distinct_field {
            Some(field) => entries
                .iter()
                .filter_map(|entry| field.resolve(&entry.event))
                .filter(|value| !value.is_null())
                .map(Value::to_string)
                .collect::<HashSet<_>>()
                .len(),
            None => entries.len(),
        };

        debug!(
            policy = %policy_id,
            count,
            required = threshold.count,
            retained = entries.len(),
            "Threshold check"
        );

        count >= threshold.count
    }

    /// Number of events currently retained for a policy
    pub fn window_len(&self, policy_id: &str) -> usize {
        self.windows
            .read()
            .get(policy_id)
            .map(|window| window.lock().len())
            .unwrap_or(0)
    }

    /// Drop window state for policies not in `keep`
    pub fn retain_policies(&self, keep: &HashSet<&str>) {
        self.windows.write().retain(|id, _| keep.contains(id.as_str()));
    }

    fn window(&self, policy_id: &str) -> Window {
        if let Some(window) = self.windows.read().get(policy_id) {
            return Arc::clone(window);
        }

        let mut windows = self.windows.write();
        Arc::clone(windows.entry(policy_id.to_string()).or_default())
    }
}

impl Default for ThresholdTracker {
    fn default() -> Self {
        Self::new(&TrackerConfig::default())
    }
}
