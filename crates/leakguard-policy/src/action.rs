//! Policy action definitions

use leakguard_core::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action to take when a policy matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Block the observed operation
    Block {
        /// Reason reported to the endpoint
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Raise an alert
    Alert {
        /// Alert severity; defaults to the policy severity
        #[serde(default, skip_serializing_if = "Option::is_none")]
        severity: Option<Severity>,

        /// Alert description
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Move the file involved into quarantine
    Quarantine {
        /// Quarantine location
        #[serde(default = "default_quarantine_path")]
        destination: String,
    },

    /// Send notifications
    Notify {
        /// Channels (email addresses, webhooks, chat rooms)
        #[serde(default)]
        channels: Vec<String>,

        /// Notification body
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Log the event
    Log {
        /// Log level
        #[serde(default)]
        level: LogLevel,

        /// Message to log
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl Action {
    /// Plain block action
    pub fn block() -> Self {
        Self::Block { message: None }
    }

    /// Plain alert action
    pub fn alert() -> Self {
        Self::Alert {
            severity: None,
            message: None,
        }
    }

    /// Quarantine to the default location
    pub fn quarantine() -> Self {
        Self::Quarantine {
            destination: default_quarantine_path(),
        }
    }

    /// Notify the given channels
    pub fn notify<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Notify {
            channels: channels.into_iter().map(Into::into).collect(),
            message: None,
        }
    }

    /// Log at info level
    pub fn log() -> Self {
        Self::Log {
            level: LogLevel::Info,
            message: None,
        }
    }

    /// Action kind, for logs and metrics
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Block { .. } => ActionKind::Block,
            Self::Alert { .. } => ActionKind::Alert,
            Self::Quarantine { .. } => ActionKind::Quarantine,
            Self::Notify { .. } => ActionKind::Notify,
            Self::Log { .. } => ActionKind::Log,
        }
    }
}

/// Discriminant of [`Action`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Block,
    Alert,
    Quarantine,
    Notify,
    Log,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Alert => "alert",
            Self::Quarantine => "quarantine",
            Self::Notify => "notify",
            Self::Log => "log",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

fn default_quarantine_path() -> String {
    "/var/quarantine/leakguard".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_action() {
        let action: Action = serde_json::from_str(r#"{"type": "block"}"#).unwrap();
        assert_eq!(action, Action::block());
        assert_eq!(action.kind(), ActionKind::Block);
    }

    #[test]
    fn test_alert_action() {
        let json = r#"{"type": "alert", "severity": "critical", "message": "PAN leaving the network"}"#;
        let action: Action = serde_json::from_str(json).unwrap();

        match action {
            Action::Alert { severity, message } => {
                assert_eq!(severity, Some(Severity::Critical));
                assert_eq!(message.as_deref(), Some("PAN leaving the network"));
            }
            _ => panic!("Wrong action type"),
        }
    }

    #[test]
    fn test_quarantine_default_destination() {
        let action: Action = serde_yaml::from_str("type: quarantine").unwrap();
        assert_eq!(action, Action::quarantine());
    }

    #[test]
    fn test_notify_action() {
        let yaml = r#"
type: notify
channels:
  - "security-team@company.com"
"#;
        let action: Action = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(action, Action::notify(["security-team@company.com"]));
    }

    #[test]
    fn test_unknown_action_rejected() {
        assert!(serde_json::from_str::<Action>(r#"{"type": "shred"}"#).is_err());
    }
}
