//! End-to-end tests for the policy engine and event processor


use chrono::Duration as ChronoDuration;
use leakguard_classifiers::ContentClassifier;
use leakguard_core::{Error, ManualClock};
use leakguard_policy::{
    ActionKind, EventProcessor, PolicyDefinition, PolicyEngine, PolicyMatch, ProcessorConfig, TrackerConfig,
};
use mock_executor::{RecordedAction, RecordingExecutor};
use serde_json::{json, Value};
use std::sync::Arc;

const PAN_BLOCK: &str = r#"
policy:
  id: pol-pan-block
  name: PAN block
  priority: 100
  severity: critical
  conditions:
    field: classification.labels
    operator: contains
    value: PAN
  actions:
    - type: block
    - type: alert
  compliance:
    - PCI-DSS 3.4
"#;

const BURST: &str = r#"
id: pol-burst
name: Repeated file writes
conditions:
  all:
    - field: event.type
      operator: equals
      value: file_write
stateful:
  window: 5m
  threshold:
    count: 3
"#;

const DISTINCT_USERS: &str = r#"
id: pol-distinct
name: Many users exfiltrating
conditions:
  field: event.type
  value: file_write
stateful:
  window: 5m
  threshold:
    count: 3
    distinct_field: user_id
"#;

fn file_write(user: &str) -> Value {
    json!({
        "event": {"type": "file_write", "severity": "high"},
        "user_id": user,
    })
}

fn ids(matches: &[PolicyMatch]) -> Vec<&str> {
    matches.iter().map(|m| m.policy_id.as_str()).collect()
}

fn clocked_engine(yaml: &str) -> (PolicyEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let engine = PolicyEngine::with_clock(&TrackerConfig::default(), clock.clone());
    let report = engine.load_policies(&[PolicyDefinition::from_yaml(yaml).unwrap()]);
    assert!(report.is_clean());
    (engine, clock)
}

#[test]
fn test_threshold_reached_within_window() {
    let (engine, clock) = clocked_engine(BURST);

    assert!(engine.evaluate(&file_write("alice")).unwrap().is_empty());
    clock.advance(ChronoDuration::minutes(2));
    assert!(engine.evaluate(&file_write("alice")).unwrap().is_empty());
    clock.advance(ChronoDuration::minutes(2));

    let matches = engine.evaluate(&file_write("alice")).unwrap();
    assert_eq!(ids(&matches), vec!["pol-burst"]);
}

#[test]
fn test_threshold_not_reached_after_expiry() {
    let (engine, clock) = clocked_engine(BURST);

    assert!(engine.evaluate(&file_write("alice")).unwrap().is_empty());
    clock.advance(ChronoDuration::minutes(3));
    assert!(engine.evaluate(&file_write("alice")).unwrap().is_empty());
    clock.advance(ChronoDuration::minutes(3));

    assert!(engine.evaluate(&file_write("alice")).unwrap().is_empty());
}

#[test]
fn test_non_matching_events_do_not_enter_window() {
    let (engine, _clock) = clocked_engine(BURST);
    let usb = json!({"event": {"type": "usb_insert", "severity": "low"}});

    for _ in 0..5 {
        assert!(engine.evaluate(&usb).unwrap().is_empty());
    }
    assert_eq!(engine.tracker().window_len("pol-burst"), 0);
}

#[test]
fn test_distinct_field_threshold() {
    let (engine, _clock) = clocked_engine(DISTINCT_USERS);

    assert!(engine.evaluate(&file_write("alice")).unwrap().is_empty());
    assert!(engine.evaluate(&file_write("bob")).unwrap().is_empty());
    assert!(engine.evaluate(&file_write("alice")).unwrap().is_empty());

    let matches = engine.evaluate(&file_write("carol")).unwrap();
    assert_eq!(ids(&matches), vec!["pol-distinct"]);
}

#[test]
fn test_priority_order() {
    let engine = PolicyEngine::new();
    let definitions: Vec<PolicyDefinition> = [10, 100, 50]
        .iter()
        .map(|priority| {
            PolicyDefinition::from_yaml(&format!(
                "id: p{priority}\nname: priority {priority}\npriority: {priority}\nconditions:\n  all: []\n"
            ))
            .unwrap()
        })
        .collect();
    engine.load_policies(&definitions);

    let matches = engine.evaluate(&json!({})).unwrap();
    let priorities: Vec<i64> = matches.iter().map(|m| m.priority).collect();
    assert_eq!(priorities, vec![100, 50, 10]);
}

#[test]
fn test_reload_is_atomic_under_concurrent_evaluation() {
    fn set(prefix: &str, n: usize) -> Vec<PolicyDefinition> {
        (0..n)
            .map(|i| {
                PolicyDefinition::from_yaml(&format!(
                    "id: {prefix}-{i}\nname: {prefix} {i}\nconditions:\n  all: []\n"
                ))
                .unwrap()
            })
            .collect()
    }

    let set_a = set("a", 4);
    let set_b = set("b", 7);

    let engine = Arc::new(PolicyEngine::new());
    engine.load_policies(&set_a);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let matches = engine.evaluate(&json!({})).unwrap();
                    let from_a = matches.iter().filter(|m| m.policy_id.starts_with("a-")).count();
                    let from_b = matches.iter().filter(|m| m.policy_id.starts_with("b-")).count();
                    assert!(
                        (from_a == 4 && from_b == 0) || (from_a == 0 && from_b == 7),
                        "mixed policy sets: {} from A, {} from B",
                        from_a,
                        from_b
                    );
                }
            })
        })
        .collect();

    for i in 0..200 {
        engine.reload(if i % 2 == 0 { &set_b } else { &set_a });
    }

    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_load_dir_with_partial_failures() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pan.yaml"), PAN_BLOCK).unwrap();
    std::fs::write(dir.path().join("burst.yml"), BURST).unwrap();
    std::fs::write(
        dir.path().join("bad-operator.yaml"),
        "id: bad\nname: bad\nconditions:\n  field: a\n  operator: sounds_like\n  value: b\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("garbage.yaml"), ": : :").unwrap();

    let engine = PolicyEngine::new();
    let report = engine.load_dir(dir.path()).unwrap();

    assert_eq!(report.loaded, 2);
    assert_eq!(report.rejected.len(), 2);
    assert!(report.rejected.iter().any(|r| r.policy_id == "bad"));
    assert!(engine.policy("pol-pan-block").is_some());
    assert!(engine.policy("pol-burst").is_some());
}

#[test]
fn test_mistyped_literal_does_not_disable_siblings() {
    let engine = PolicyEngine::new();
    let report = engine.load_policies(&[PolicyDefinition::from_yaml(
        r#"
id: pol-usb
name: USB or high score
conditions:
  any:
    - field: score
      operator: ">"
      value: high
    - field: event.type
      operator: "=="
      value: usb
"#,
    )
    .unwrap()]);
    assert!(report.is_clean());

    let usb = json!({"event": {"type": "usb", "severity": "low"}, "score": 99});
    assert_eq!(ids(&engine.evaluate(&usb).unwrap()), vec!["pol-usb"]);

    let file = json!({"event": {"type": "file", "severity": "low"}, "score": 99});
    assert!(engine.evaluate(&file).unwrap().is_empty());
}

#[test]
fn test_evaluate_before_load_is_an_error() {
    let engine = PolicyEngine::new();
    assert!(matches!(engine.evaluate(&json!({})), Err(Error::NotLoaded)));
}

#[tokio::test]
async fn test_pan_event_end_to_end() {
    let engine = Arc::new(PolicyEngine::new());
    engine.load_policies(&[PolicyDefinition::from_yaml(PAN_BLOCK).unwrap()]);

    let executor = Arc::new(RecordingExecutor::new());
    let processor = EventProcessor::new(
        Arc::new(ContentClassifier::new().unwrap()),
        Arc::clone(&engine),
        ProcessorConfig::default(),
    )
    .unwrap()
    .with_executor(executor.clone());

    let processed = processor
        .process(json!({
            "event_id": "evt-42",
            "event": {"type": "clipboard_copy", "severity": "medium"},
            "content": "card 4532015112830366",
        }))
        .await
        .unwrap();

    assert_eq!(ids(&processed.matches), vec!["pol-pan-block"]);
    assert_eq!(
        processed.matches[0].actions.iter().map(|a| a.kind()).collect::<Vec<_>>(),
        vec![ActionKind::Block, ActionKind::Alert]
    );
    assert_eq!(processed.event["blocked"], json!(true));
    assert_eq!(processed.event["policy"]["policy_id"], json!("pol-pan-block"));
    assert_eq!(
        executor.calls(),
        vec![
            RecordedAction {
                policy_id: "pol-pan-block".to_string(),
                kind: ActionKind::Block,
            },
            RecordedAction {
                policy_id: "pol-pan-block".to_string(),
                kind: ActionKind::Alert,
            },
        ]
    );

    let snapshot = processor.metrics().snapshot();
    assert_eq!(snapshot.events_evaluated, 1);
    assert_eq!(snapshot.policy_matches, 1);
    assert_eq!(snapshot.classified_events, 1);
}

#[tokio::test]
async fn test_luhn_invalid_card_is_not_blocked() {
    let engine = Arc::new(PolicyEngine::new());
    engine.load_policies(&[PolicyDefinition::from_yaml(PAN_BLOCK).unwrap()]);

    let processor = EventProcessor::new(
        Arc::new(ContentClassifier::new().unwrap()),
        engine,
        ProcessorConfig::default(),
    )
    .unwrap();

    let processed = processor
        .process(json!({
            "event": {"type": "clipboard_copy", "severity": "medium"},
            "content": "card 4532015112830367",
        }))
        .await
        .unwrap();

    assert!(processed.matches.is_empty());
    assert_eq!(processed.event["blocked"], json!(false));
}

#[tokio::test]
async fn test_executor_failures_are_reported_not_fatal() {
    let engine = Arc::new(PolicyEngine::new());
    engine.load_policies(&[PolicyDefinition::from_yaml(PAN_BLOCK).unwrap()]);

    let executor = Arc::new(RecordingExecutor::new().failing(ActionKind::Block));
    let processor = EventProcessor::new(
        Arc::new(ContentClassifier::new().unwrap()),
        engine,
        ProcessorConfig::default(),
    )
    .unwrap()
    .with_executor(executor.clone());

    let processed = processor
        .process(json!({
            "event": {"type": "clipboard_copy", "severity": "medium"},
            "content": "card 4532015112830366",
        }))
        .await
        .unwrap();

    assert!(processed.is_blocked());
    assert_eq!(processed.outcome.failures.len(), 1);
    assert_eq!(processed.outcome.failures[0].action, ActionKind::Block);
    assert_eq!(executor.kinds(), vec![ActionKind::Block, ActionKind::Alert]);
    assert_eq!(processor.metrics().snapshot().action_failures, 1);
}

#[tokio::test]
async fn test_concurrent_processing_shares_one_window() {
    let engine = Arc::new(PolicyEngine::new());
    engine.load_policies(&[PolicyDefinition::from_yaml(BURST).unwrap()]);

    let processor = Arc::new(
        EventProcessor::new(
            Arc::new(ContentClassifier::new().unwrap()),
            engine,
            ProcessorConfig::default(),
        )
        .unwrap(),
    );

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let processor = Arc::clone(&processor);
            tokio::spawn(async move {
                processor
                    .process(file_write(&format!("user-{}", i)))
                    .await
                    .map(|processed| processed.matches.len())
            })
        })
        .collect();

    let mut matched = 0;
    for result in futures::future::join_all(tasks).await {
        matched += result.unwrap().unwrap();
    }

    // Events 3 through 20 reach the threshold
    assert_eq!(matched, 18);
}
