//! Policy definitions and their compiled form

use leakguard_core::duration::try_parse_window;
use leakguard_core::{Error, FieldPath, Result, Severity, DEFAULT_WINDOW};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::condition::{ConditionNode, ConditionSpec};
use crate::Action;

/// A policy as authored in YAML/JSON or stored in a policy database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    /// Stable policy identifier
    pub id: String,

    /// Human readable name
    pub name: String,

    /// Description of what this policy enforces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Version of the policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Whether this policy is evaluated at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Higher priorities are evaluated and reported first
    #[serde(default = "default_priority")]
    pub priority: i64,

    /// Policy severity, used as the default alert severity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,

    /// Static condition tree
    pub conditions: ConditionSpec,

    /// Optional sliding-window threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stateful: Option<StatefulSpec>,

    /// Actions to take when matched, in order
    #[serde(default)]
    pub actions: Vec<Action>,

    /// Regulatory references (PCI-DSS, GDPR, ...)
    #[serde(default, alias = "compliance")]
    pub compliance_tags: Vec<String>,

    /// Stop evaluating lower-ranked policies once this one matches
    #[serde(default)]
    pub stop_on_match: bool,
}

impl PolicyDefinition {
    /// Parse a policy from YAML.
    ///
    /// Accepts a bare policy document or one wrapped in a top-level
    /// `policy:` key.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let document: PolicyDocument = serde_yaml::from_str(yaml)?;
        Ok(document.into_definition())
    }

    /// Parse a policy from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let document: PolicyDocument = serde_json::from_str(json)?;
        Ok(document.into_definition())
    }

    /// Load a policy from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PolicyDocument {
    Wrapped { policy: PolicyDefinition },
    Bare(PolicyDefinition),
}

impl PolicyDocument {
    fn into_definition(self) -> PolicyDefinition {
        match self {
            Self::Wrapped { policy } | Self::Bare(policy) => policy,
        }
    }
}

/// A policy file that could not be parsed
#[derive(Debug)]
pub struct UnreadablePolicy {
    pub path: PathBuf,
    pub error: Error,
}

/// Read every `*.yml`, `*.yaml` and `*.json` file in `dir`.
///
/// Files that fail to parse are returned separately so that one bad file
/// does not prevent the rest from loading. Files are read in name order.
pub fn load_policy_dir(dir: impl AsRef<Path>) -> Result<(Vec<PolicyDefinition>, Vec<UnreadablePolicy>)> {
    let dir = dir.as_ref();
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("yml" | "yaml" | "json")
                )
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        warn!(path = %dir.display(), "No policy files found");
    }

    let mut definitions = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();

    for path in paths {
        match PolicyDefinition::from_file(&path) {
            Ok(definition) => {
                debug!(policy = %definition.id, file = %path.display(), "Parsed policy file");
                definitions.push(definition);
            }
            Err(error) => {
                warn!(file = %path.display(), error = %error, "Failed to parse policy file");
                unreadable.push(UnreadablePolicy { path, error });
            }
        }
    }

    Ok((definitions, unreadable))
}

/// Authored sliding-window clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatefulSpec {
    /// Window length, e.g. `"5m"`, or seconds
    #[serde(default = "default_window")]
    pub window: WindowSpec,

    /// Threshold to reach within the window
    #[serde(default)]
    pub threshold: ThresholdSpec,
}

/// Window written either as a duration string or as seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WindowSpec {
    Seconds(u64),
    Text(String),
    /// Anything else (floats, negatives, booleans); resolves to the fallback
    Other(Value),
}

impl WindowSpec {
    /// Resolve to a duration, using `fallback` when the text is unparsable
    pub fn to_duration(&self, fallback: Duration) -> Duration {
        match self {
            Self::Seconds(secs) => Duration::from_secs(*secs),
            Self::Text(raw) => try_parse_window(raw).unwrap_or_else(|| {
                warn!(window = %raw, fallback_secs = fallback.as_secs(), "Unparsable window, using fallback");
                fallback
            }),
            Self::Other(raw) => {
                warn!(window = %raw, fallback_secs = fallback.as_secs(), "Unsupported window value, using fallback");
                fallback
            }
        }
    }
}

/// Authored threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSpec {
    /// Events (or distinct values) required within the window
    #[serde(default = "default_count")]
    pub count: usize,

    /// Count distinct values of this field instead of events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct_field: Option<String>,
}

impl Default for ThresholdSpec {
    fn default() -> Self {
        Self {
            count: default_count(),
            distinct_field: None,
        }
    }
}

/// Compiled threshold
#[derive(Debug, Clone)]
pub struct Threshold {
    pub count: usize,
    pub distinct_field: Option<FieldPath>,
}

/// Compiled sliding-window clause
#[derive(Debug, Clone)]
pub struct StatefulRule {
    pub window: Duration,
    pub threshold: Threshold,
}

impl StatefulRule {
    fn compile(spec: &StatefulSpec, default_window: Duration) -> Result<Self> {
        if spec.threshold.count == 0 {
            return Err(Error::policy("threshold count must be at least 1"));
        }

        let distinct_field = spec
            .threshold
            .distinct_field
            .as_deref()
            .map(FieldPath::parse)
            .transpose()?;

        Ok(Self {
            window: spec.window.to_duration(default_window),
            threshold: Threshold {
                count: spec.threshold.count,
                distinct_field,
            },
        })
    }
}

/// A validated policy ready for evaluation
#[derive(Debug, Clone)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub priority: i64,
    pub severity: Option<Severity>,
    pub conditions: ConditionNode,
    pub stateful: Option<StatefulRule>,
    pub actions: Vec<Action>,
    pub compliance_tags: Vec<String>,
    pub stop_on_match: bool,
}

impl Policy {
    /// Validate and compile a definition
    pub fn compile(definition: &PolicyDefinition) -> Result<Self> {
        Self::compile_with_window(definition, DEFAULT_WINDOW)
    }

    /// Compile, falling back to `default_window` for unparsable windows
    pub fn compile_with_window(definition: &PolicyDefinition, default_window: Duration) -> Result<Self> {
        if definition.id.trim().is_empty() {
            return Err(Error::policy("missing required field: id"));
        }
        if definition.name.trim().is_empty() {
            return Err(Error::policy("missing required field: name"));
        }

        let conditions = ConditionNode::compile(&definition.conditions)?;
        if conditions.has_empty_all() {
            warn!(
                policy = %definition.id,
                "Policy contains an empty 'all' block, which always matches"
            );
        }

        let stateful = definition
            .stateful
            .as_ref()
            .map(|spec| StatefulRule::compile(spec, default_window))
            .transpose()?;

        Ok(Self {
            id: definition.id.clone(),
            name: definition.name.clone(),
            enabled: definition.enabled,
            priority: definition.priority,
            severity: definition.severity,
            conditions,
            stateful,
            actions: definition.actions.clone(),
            compliance_tags: definition.compliance_tags.clone(),
            stop_on_match: definition.stop_on_match,
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_priority() -> i64 {
    100
}

fn default_count() -> usize {
    1
}

fn default_window() -> WindowSpec {
    WindowSpec::Text("5m".to_string())
}
