//! Event record helpers
//!
//! Events are nested JSON objects produced by endpoint agents. The engine
//! only reads them through dot-separated paths such as
//! `classification.labels` and attaches its results as new top-level keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Pre-split dot path into an event record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Split `path` on `.`
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(Error::policy("field path must not be empty"));
        }

        let segments: Vec<String> = trimmed.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(Error::policy(format!(
                "field path '{}' contains an empty segment",
                trimmed
            )));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// The path as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Resolve this path against an event.
    ///
    /// Returns `None` when any segment is missing or an intermediate value is
    /// not an object. An explicit JSON `null` at the leaf resolves to
    /// `Some(Value::Null)`, which is distinct from absence.
    pub fn resolve<'a>(&self, event: &'a Value) -> Option<&'a Value> {
        let mut current = event;
        for segment in &self.segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Remove the value at this path from its parent object
    pub fn remove(&self, event: &mut Value) -> Option<Value> {
        let (last, parents) = self.segments.split_last()?;
        let mut current = event;
        for segment in parents {
            current = current.as_object_mut()?.get_mut(segment)?;
        }
        current.as_object_mut()?.remove(last)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Event severity as reported by agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a severity string, case-insensitively
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Check that an event carries the minimum structure policies rely on:
/// an `event` object with `type` and `severity`.
pub fn validate_event(event: &Value) -> Result<()> {
    let root = event
        .as_object()
        .ok_or_else(|| Error::invalid_event("event must be a JSON object"))?;

    let inner = root
        .get("event")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::invalid_event("missing required field: event"))?;

    for field in ["type", "severity"] {
        if !inner.contains_key(field) {
            return Err(Error::invalid_event(format!(
                "missing required field: event.{}",
                field
            )));
        }
    }

    Ok(())
}

/// Fill defaults the engine's annotations assume.
///
/// Unknown severities become `medium`; `blocked` and `quarantined` default
/// to `false`. Non-object events are left untouched.
pub fn normalize_event(event: &mut Value) {
    let Some(root) = event.as_object_mut() else {
        return;
    };

    if let Some(inner) = root.get_mut("event").and_then(Value::as_object_mut) {
        let severity = inner.get("severity").and_then(Value::as_str).map(Severity::parse);
        match severity {
            Some(Some(parsed)) => {
                inner.insert("severity".into(), Value::from(parsed.as_str()));
            }
            Some(None) | None => {
                warn!(
                    provided = ?inner.get("severity"),
                    "Invalid severity, defaulting to medium"
                );
                inner.insert("severity".into(), Value::from(Severity::Medium.as_str()));
            }
        }
    }

    root.entry("blocked").or_insert(Value::Bool(false));
    root.entry("quarantined").or_insert(Value::Bool(false));

    debug!(event_id = ?root.get("event_id"), "Event normalized");
}
