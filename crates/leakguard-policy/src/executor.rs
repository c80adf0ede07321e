//! Action executor for policy enforcement
//!
//! The engine only decides which actions apply. Carrying them out (blocking
//! the endpoint operation, moving a file, sending a notification) belongs
//! to an [`ActionExecutor`]. [`enforce`] walks the matches in priority
//! order, records the decision for every action, and hands each one to the
//! executor. Executor failures are collected and never stop the remaining
//! actions.

use async_trait::async_trait;
use leakguard_core::{Result, Severity};
use leakguard_telemetry::MetricsCollector;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::action::{Action, ActionKind, LogLevel};
use crate::engine::PolicyMatch;

/// Carries out policy actions
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Block the observed operation
    async fn block(&self, policy: &PolicyMatch, event: &Value, reason: &str) -> Result<()>;

    /// Raise an alert
    async fn alert(&self, policy: &PolicyMatch, event: &Value, alert: &AlertRecord) -> Result<()>;

    /// Move the event's file to `destination`
    async fn quarantine(&self, policy: &PolicyMatch, event: &Value, destination: &str) -> Result<()>;

    /// Deliver a notification
    async fn notify(&self, policy: &PolicyMatch, event: &Value, notification: &NotificationRecord) -> Result<()>;

    /// Write the decision to the log
    async fn log(&self, policy: &PolicyMatch, event: &Value, level: LogLevel, message: &str) -> Result<()>;
}

/// Executor that only records actions through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingExecutor;

#[async_trait]
impl ActionExecutor for TracingExecutor {
    async fn block(&self, policy: &PolicyMatch, event: &Value, reason: &str) -> Result<()> {
        warn!(event_id = %event_id(event), policy = %policy.policy_id, reason = %reason, "Action blocked");
        Ok(())
    }

    async fn alert(&self, policy: &PolicyMatch, event: &Value, alert: &AlertRecord) -> Result<()> {
        info!(
            event_id = %event_id(event),
            policy = %policy.policy_id,
            severity = %alert.severity.as_str(),
            "Alert generated"
        );
        Ok(())
    }

    async fn quarantine(&self, policy: &PolicyMatch, event: &Value, destination: &str) -> Result<()> {
        let file = event
            .pointer("/file/path")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>");
        warn!(
            event_id = %event_id(event),
            policy = %policy.policy_id,
            file = %file,
            destination = %destination,
            "File quarantined"
        );
        Ok(())
    }

    async fn notify(&self, policy: &PolicyMatch, event: &Value, notification: &NotificationRecord) -> Result<()> {
        info!(
            event_id = %event_id(event),
            policy = %policy.policy_id,
            channels = ?notification.channels,
            "Notification scheduled"
        );
        Ok(())
    }

    async fn log(&self, policy: &PolicyMatch, event: &Value, level: LogLevel, message: &str) -> Result<()> {
        let event_id = event_id(event);
        match level {
            LogLevel::Debug => debug!(event_id = %event_id, policy = %policy.policy_id, "{}", message),
            LogLevel::Info => info!(event_id = %event_id, policy = %policy.policy_id, "{}", message),
            LogLevel::Warn => warn!(event_id = %event_id, policy = %policy.policy_id, "{}", message),
            LogLevel::Error => error!(event_id = %event_id, policy = %policy.policy_id, "{}", message),
        }
        Ok(())
    }
}

/// Alert raised by a policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub id: String,
    pub policy_id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: String,
    pub acknowledged: bool,
}

/// Notification requested by a policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub channels: Vec<String>,
    pub message: String,
    pub policy: String,
}

/// An action the executor failed to carry out
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionFailure {
    pub policy_id: String,
    pub action: ActionKind,
    pub error: String,
}

/// Combined effect of every action applied to one event
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnforcementOutcome {
    pub blocked: bool,
    pub block_reason: Option<String>,
    pub quarantined: bool,
    pub quarantine_path: Option<String>,
    pub quarantine_reason: Option<String>,
    pub alerts: Vec<AlertRecord>,
    pub notifications: Vec<NotificationRecord>,
    pub failures: Vec<ActionFailure>,
}

impl EnforcementOutcome {
    /// Create an empty outcome
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge another outcome into this one.
    ///
    /// The first block and quarantine decisions win, since outcomes are
    /// merged in priority order.
    pub fn merge(&mut self, other: EnforcementOutcome) {
        if other.blocked {
            self.blocked = true;
            self.block_reason = self.block_reason.take().or(other.block_reason);
        }
        if other.quarantined {
            self.quarantined = true;
            self.quarantine_path = self.quarantine_path.take().or(other.quarantine_path);
            self.quarantine_reason = self.quarantine_reason.take().or(other.quarantine_reason);
        }

        self.alerts.extend(other.alerts);
        self.notifications.extend(other.notifications);
        self.failures.extend(other.failures);
    }
}

/// Apply the actions of every match, in order
pub async fn enforce(
    executor: &dyn ActionExecutor,
    matches: &[PolicyMatch],
    event: &Value,
    metrics: &MetricsCollector,
) -> EnforcementOutcome {
    let mut outcome = EnforcementOutcome::new();

    for policy in matches {
        for action in &policy.actions {
            outcome.merge(apply(executor, policy, action, event, metrics).await);
        }
    }

    outcome
}

async fn apply(
    executor: &dyn ActionExecutor,
    policy: &PolicyMatch,
    action: &Action,
    event: &Value,
    metrics: &MetricsCollector,
) -> EnforcementOutcome {
    let mut outcome = EnforcementOutcome::new();

    let result = match action {
        Action::Block { message } => {
            let reason = message
                .clone()
                .unwrap_or_else(|| format!("Blocked by policy: {}", policy.policy_name));
            outcome.blocked = true;
            outcome.block_reason = Some(reason.clone());
            executor.block(policy, event, &reason).await
        }
        Action::Alert { severity, message } => {
            let alert = AlertRecord {
                id: format!("alert-{}", event_id(event)),
                policy_id: policy.policy_id.clone(),
                title: format!("DLP Policy Violation: {}", policy.policy_name),
                description: message
                    .clone()
                    .unwrap_or_else(|| format!("Policy violation: {}", policy.policy_name)),
                severity: severity.or(policy.severity).unwrap_or_default(),
                status: "new".to_string(),
                acknowledged: false,
            };
            let result = executor.alert(policy, event, &alert).await;
            outcome.alerts.push(alert);
            result
        }
        Action::Quarantine { destination } => {
            if !event.get("file").is_some_and(Value::is_object) {
                debug!(policy = %policy.policy_id, "Quarantine skipped, event has no file");
                return outcome;
            }
            outcome.quarantined = true;
            outcome.quarantine_path = Some(destination.clone());
            outcome.quarantine_reason = Some(format!("Quarantined by policy: {}", policy.policy_name));
            executor.quarantine(policy, event, destination).await
        }
        Action::Notify { channels, message } => {
            let notification = NotificationRecord {
                channels: channels.clone(),
                message: message
                    .clone()
                    .unwrap_or_else(|| format!("Policy violation: {}", policy.policy_name)),
                policy: policy.policy_name.clone(),
            };
            let result = executor.notify(policy, event, &notification).await;
            outcome.notifications.push(notification);
            result
        }
        Action::Log { level, message } => {
            let message = message
                .clone()
                .unwrap_or_else(|| format!("Policy matched: {}", policy.policy_name));
            executor.log(policy, event, *level, &message).await
        }
    };

    if let Err(e) = result {
        let kind = action.kind();
        error!(
            policy = %policy.policy_id,
            action = %kind,
            error = %e,
            "Action execution failed"
        );
        metrics.record_action_failure(kind.as_str());
        outcome.failures.push(ActionFailure {
            policy_id: policy.policy_id.clone(),
            action: kind,
            error: e.to_string(),
        });
    }

    outcome
}

fn event_id(event: &Value) -> String {
    match event.get("event_id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Null) | None => "unknown".to_string(),
        Some(other) => other.to_string(),
    }
}
