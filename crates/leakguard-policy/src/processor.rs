//! Event processing pipeline
//!
//! validate -> normalize -> classify -> evaluate -> enforce -> annotate
//!
//! The processor owns no policy state of its own. It wires a shared
//! [`ContentClassifier`], [`PolicyEngine`] and [`ActionExecutor`] together
//! and writes the results back onto the event.

use leakguard_classifiers::{ClassificationResult, ContentClassifier};
use leakguard_core::{
    normalize_event, validate_event, Clock, Error, FieldPath, Result, Severity, SharedClock, SystemClock,
};
use leakguard_telemetry::{AuditEvent, AuditSeverity, AuditTrail, MetricsCollector, DEFAULT_MAX_RECORDS};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::engine::{PolicyEngine, PolicyMatch};
use crate::executor::{enforce, ActionExecutor, EnforcementOutcome, TracingExecutor};

/// Processor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Dot path of the content to classify
    #[serde(default = "default_content_field")]
    pub content_field: String,

    /// Replace sensitive content with a redacted copy
    #[serde(default)]
    pub redact_content: bool,

    /// Marker substituted for each sensitive match
    #[serde(default = "default_redaction")]
    pub redaction: String,

    /// Decision records kept in memory; older ones are evicted
    #[serde(default = "default_max_audit_records")]
    pub max_audit_records: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            content_field: default_content_field(),
            redact_content: false,
            redaction: default_redaction(),
            max_audit_records: default_max_audit_records(),
        }
    }
}

fn default_content_field() -> String {
    "content".to_string()
}

fn default_redaction() -> String {
    "[REDACTED]".to_string()
}

fn default_max_audit_records() -> usize {
    DEFAULT_MAX_RECORDS
}

/// Result of processing one event
#[derive(Debug, Clone)]
pub struct ProcessedEvent {
    /// The event with classification and decision keys attached
    pub event: Value,

    /// Classification of the event content, if it had any
    pub classification: Option<ClassificationResult>,

    /// Matched policies, highest priority first
    pub matches: Vec<PolicyMatch>,

    /// Effect of the matched policies' actions
    pub outcome: EnforcementOutcome,
}

impl ProcessedEvent {
    pub fn is_blocked(&self) -> bool {
        self.outcome.blocked
    }
}

/// Classifies, evaluates and enforces events
pub struct EventProcessor {
    classifier: Arc<ContentClassifier>,
    engine: Arc<PolicyEngine>,
    executor: Arc<dyn ActionExecutor>,
    config: ProcessorConfig,
    content_field: FieldPath,
    clock: SharedClock,
    metrics: MetricsCollector,
    audit: Mutex<AuditTrail>,
}

impl EventProcessor {
    /// Create a processor that enforces through `tracing` only
    pub fn new(classifier: Arc<ContentClassifier>, engine: Arc<PolicyEngine>, config: ProcessorConfig) -> Result<Self> {
        let content_field = FieldPath::parse(&config.content_field)
            .map_err(|e| Error::config(format!("invalid content_field: {}", e)))?;
        let metrics = engine.metrics().clone();
        let audit = AuditTrail::with_max_records(config.max_audit_records);

        Ok(Self {
            classifier,
            engine,
            executor: Arc::new(TracingExecutor),
            config,
            content_field,
            clock: Arc::new(SystemClock),
            metrics,
            audit: Mutex::new(audit),
        })
    }

    /// Use a different action executor
    pub fn with_executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Use a different clock for evaluation timestamps
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Policy engine in use
    pub fn engine(&self) -> &Arc<PolicyEngine> {
        &self.engine
    }

    /// Metrics collector shared with the engine
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Decision audit trail
    pub fn audit(&self) -> MutexGuard<'_, AuditTrail> {
        self.audit.lock()
    }

    /// Process one event.
    ///
    /// Fails if the event is malformed or no policy set is loaded. Action
    /// failures are reported in the outcome, not as an error.
    pub async fn process(&self, mut event: Value) -> Result<ProcessedEvent> {
        validate_event(&event)?;
        normalize_event(&mut event);

        let classification = self.classify(&mut event)?;
        let matches = self.engine.evaluate(&event)?;
        let outcome = enforce(self.executor.as_ref(), &matches, &event, &self.metrics).await;

        self.annotate(&mut event, &matches, &outcome)?;

        if self.config.redact_content {
            if let Some(result) = &classification {
                self.redact(&mut event, result);
            }
        }

        if !matches.is_empty() {
            self.record_audit(&event, &matches, &outcome);
        }

        debug!(
            event_id = %event_id(&event),
            matched = matches.len(),
            blocked = outcome.blocked,
            "Event processed"
        );

        Ok(ProcessedEvent {
            event,
            classification,
            matches,
            outcome,
        })
    }

    fn content<'a>(&self, event: &'a Value) -> Option<&'a str> {
        self.content_field
            .resolve(event)
            .or_else(|| event.get("content_redacted"))
            .and_then(Value::as_str)
            .filter(|content| !content.is_empty())
    }

    fn classify(&self, event: &mut Value) -> Result<Option<ClassificationResult>> {
        let Some(content) = self.content(event) else {
            return Ok(None);
        };

        let result = self.classifier.classify(content);
        self.metrics.record_classification(result.latency_us);

        insert(event, "classification", serde_json::to_value(&result)?);
        Ok(Some(result))
    }

    fn annotate(&self, event: &mut Value, matches: &[PolicyMatch], outcome: &EnforcementOutcome) -> Result<()> {
        let root = root_mut(event);

        root.insert("blocked".to_string(), Value::Bool(outcome.blocked));
        root.insert("quarantined".to_string(), Value::Bool(outcome.quarantined));

        let Some(primary) = matches.first() else {
            return Ok(());
        };

        root.insert("policy".to_string(), serde_json::to_value(primary)?);
        root.insert("policies_matched".to_string(), serde_json::to_value(matches)?);
        root.insert(
            "policy_evaluated_at".to_string(),
            Value::String(self.clock.now().to_rfc3339()),
        );

        if let Some(reason) = &outcome.block_reason {
            root.insert("block_reason".to_string(), json!(reason));
        }
        if let Some(path) = &outcome.quarantine_path {
            root.insert("quarantine_path".to_string(), json!(path));
        }
        if let Some(reason) = &outcome.quarantine_reason {
            root.insert("quarantine_reason".to_string(), json!(reason));
        }
        if let Some(alert) = outcome.alerts.first() {
            root.insert("alert".to_string(), serde_json::to_value(alert)?);
        }
        if !outcome.notifications.is_empty() {
            root.insert("notifications".to_string(), serde_json::to_value(&outcome.notifications)?);
        }
        if !outcome.failures.is_empty() {
            root.insert("action_failures".to_string(), serde_json::to_value(&outcome.failures)?);
        }

        Ok(())
    }

    fn redact(&self, event: &mut Value, classification: &ClassificationResult) {
        if !classification.is_sensitive() {
            return;
        }

        let Some(content) = self.content_field.resolve(event).and_then(Value::as_str) else {
            return;
        };
        let redacted = self.classifier.redact(content, &self.config.redaction);

        self.content_field.remove(event);
        insert(event, "content_redacted", Value::String(redacted));
    }

    fn record_audit(&self, event: &Value, matches: &[PolicyMatch], outcome: &EnforcementOutcome) {
        let severity = if outcome.alerts.iter().any(|a| a.severity == Severity::Critical) {
            AuditSeverity::Critical
        } else if outcome.blocked || outcome.quarantined {
            AuditSeverity::High
        } else {
            AuditSeverity::Warning
        };

        let audit_event = AuditEvent::new("policy_matched")
            .with_subject(event_id(event))
            .with_policies(matches.iter().map(|m| m.policy_id.as_str()))
            .with_severity(severity)
            .with_data(json!({
                "blocked": outcome.blocked,
                "quarantined": outcome.quarantined,
                "labels": event.pointer("/classification/labels"),
            }));

        let mut audit = self.audit.lock();
        let recorded = audit.add_event(audit_event);
        info!(
            event_id = recorded.subject.as_deref().unwrap_or("unknown"),
            policies = ?recorded.policy_ids,
            hash = recorded.hash.as_deref().unwrap_or_default(),
            "Decision recorded"
        );
    }
}

fn root_mut(event: &mut Value) -> &mut Map<String, Value> {
    if !event.is_object() {
        *event = Value::Object(Map::new());
    }
    match event {
        Value::Object(map) => map,
        _ => unreachable!("event root was just made an object"),
    }
}

fn insert(event: &mut Value, key: &str, value: Value) {
    root_mut(event).insert(key.to_string(), value);
}

fn event_id(event: &Value) -> String {
    match event.get("event_id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Null) | None => "unknown".to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionSpec;
    use crate::policy::PolicyDefinition;
    use crate::Action;
    use leakguard_core::ManualClock;

    fn pan_policy() -> PolicyDefinition {
        PolicyDefinition {
            id: "pol-pan".to_string(),
            name: "PAN block".to_string(),
            description: None,
            version: None,
            enabled: true,
            priority: 100,
            severity: Some(Severity::Critical),
            conditions: ConditionSpec::leaf("classification.labels", "contains", "PAN"),
            stateful: None,
            actions: vec![Action::block(), Action::alert()],
            compliance_tags: vec!["PCI-DSS 3.4".to_string()],
            stop_on_match: false,
        }
    }

    fn processor(config: ProcessorConfig) -> EventProcessor {
        let engine = Arc::new(PolicyEngine::new());
        engine.load_policies(&[pan_policy()]);
        let classifier = Arc::new(ContentClassifier::new().unwrap());
        EventProcessor::new(classifier, engine, config).unwrap()
    }

    fn event(content: &str) -> Value {
        json!({
            "event_id": "evt-1",
            "event": {"type": "clipboard", "severity": "low"},
            "content": content,
        })
    }

    #[tokio::test]
    async fn test_pan_event_is_blocked_and_annotated() {
        let processor = processor(ProcessorConfig::default());
        let processed = processor.process(event("card 4532015112830366")).await.unwrap();

        assert!(processed.is_blocked());
        assert_eq!(processed.matches.len(), 1);
        assert_eq!(processed.matches[0].actions, vec![Action::block(), Action::alert()]);

        let event = &processed.event;
        assert_eq!(event["blocked"], json!(true));
        assert_eq!(event["quarantined"], json!(false));
        assert_eq!(event["policy"]["policy_id"], json!("pol-pan"));
        assert_eq!(event["policies_matched"].as_array().map(Vec::len), Some(1));
        assert_eq!(event["alert"]["severity"], json!("critical"));
        assert!(event["classification"]["labels"]
            .as_array()
            .unwrap()
            .contains(&json!("PAN")));
        assert!(event.get("policy_evaluated_at").is_some());
        assert_eq!(processor.audit().len(), 1);
        assert!(processor.audit().verify());
    }

    #[tokio::test]
    async fn test_evaluation_timestamp_comes_from_clock() {
        let clock = Arc::new(ManualClock::default());
        clock.set("2026-03-01T12:00:00Z".parse().unwrap());
        let processor = processor(ProcessorConfig::default()).with_clock(clock.clone());

        let processed = processor.process(event("card 4532015112830366")).await.unwrap();
        assert_eq!(processed.event["policy_evaluated_at"], json!("2026-03-01T12:00:00+00:00"));

        clock.advance(chrono::Duration::seconds(30));
        let processed = processor.process(event("card 4532015112830366")).await.unwrap();
        assert_eq!(processed.event["policy_evaluated_at"], json!("2026-03-01T12:00:30+00:00"));
    }

    #[tokio::test]
    async fn test_unmatched_event() {
        let processor = processor(ProcessorConfig::default());
        let processed = processor.process(event("hello world")).await.unwrap();

        assert!(processed.matches.is_empty());
        assert_eq!(processed.event["blocked"], json!(false));
        assert!(processed.event.get("policy").is_none());
        assert!(processor.audit().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_event_is_rejected() {
        let processor = processor(ProcessorConfig::default());
        let result = processor.process(json!({"content": "card 4532015112830366"})).await;
        assert!(matches!(result, Err(Error::InvalidEvent(_))));
    }

    #[tokio::test]
    async fn test_event_without_content_is_not_classified() {
        let processor = processor(ProcessorConfig::default());
        let processed = processor
            .process(json!({"event": {"type": "usb", "severity": "bogus"}}))
            .await
            .unwrap();

        assert!(processed.classification.is_none());
        assert!(processed.event.get("classification").is_none());
        assert_eq!(processed.event["event"]["severity"], json!("medium"));
    }

    #[tokio::test]
    async fn test_redaction() {
        let processor = processor(ProcessorConfig {
            redact_content: true,
            ..ProcessorConfig::default()
        });
        let processed = processor
            .process(event("card 4532015112830366"))
            .await
            .unwrap();

        assert!(processed.event.get("content").is_none());
        assert_eq!(processed.event["content_redacted"], json!("card [REDACTED]"));
    }

    #[tokio::test]
    async fn test_redaction_of_nested_content_field() {
        let processor = processor(ProcessorConfig {
            content_field: "payload.text".to_string(),
            redact_content: true,
            ..ProcessorConfig::default()
        });
        let processed = processor
            .process(json!({
                "event_id": "evt-2",
                "event": {"type": "chat", "severity": "low"},
                "payload": {"text": "card 4532015112830366", "channel": "general"},
            }))
            .await
            .unwrap();

        assert!(processed.is_blocked());
        assert!(processed.event["payload"].get("text").is_none());
        assert_eq!(processed.event["payload"]["channel"], json!("general"));
        assert_eq!(processed.event["content_redacted"], json!("card [REDACTED]"));
        assert!(!processed.event.to_string().contains("4532015112830366"));
    }

    #[tokio::test]
    async fn test_audit_trail_is_bounded() {
        let processor = processor(ProcessorConfig {
            max_audit_records: 2,
            ..ProcessorConfig::default()
        });

        for _ in 0..5 {
            processor.process(event("card 4532015112830366")).await.unwrap();
        }

        let audit = processor.audit();
        assert_eq!(audit.len(), 2);
        assert_eq!(audit.evicted(), 3);
        assert!(audit.verify());
    }

    #[test]
    fn test_invalid_content_field() {
        let engine = Arc::new(PolicyEngine::new());
        let classifier = Arc::new(ContentClassifier::new().unwrap());
        let config = ProcessorConfig {
            content_field: "a..b".to_string(),
            ..ProcessorConfig::default()
        };
        assert!(EventProcessor::new(classifier, engine, config).is_err());
    }
}
