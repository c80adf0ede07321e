//! Error types for Leakguard

/// Result type alias using Leakguard's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Leakguard operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed policy definitions
    #[error("policy error: {0}")]
    Policy(String),

    /// Classifier construction errors
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Event records missing required structure
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// Evaluation requested before any policy set was loaded
    #[error("policy engine has no loaded policy set")]
    NotLoaded,

    /// Action executor failures
    #[error("action error: {0}")]
    Action(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a new policy error
    pub fn policy(msg: impl Into<String>) -> Self {
        Self::Policy(msg.into())
    }

    /// Create a new classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new invalid event error
    pub fn invalid_event(msg: impl Into<String>) -> Self {
        Self::InvalidEvent(msg.into())
    }

    /// Create a new action error
    pub fn action(msg: impl Into<String>) -> Self {
        Self::Action(msg.into())
    }
}
