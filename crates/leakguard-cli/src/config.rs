//! Leakguard configuration

use leakguard_classifiers::ClassifierConfig;
use leakguard_policy::{ProcessorConfig, TrackerConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakguardConfig {
    /// Directory of policy files
    #[serde(default = "default_policies_dir")]
    pub policies_dir: PathBuf,

    /// Content classifier settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Sliding-window settings
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Event pipeline settings
    #[serde(default)]
    pub processor: ProcessorConfig,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

impl LeakguardConfig {
    /// Load configuration from file and CLI overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load(config_path: &Path, cli: &crate::Cli) -> anyhow::Result<Self> {
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        // Apply CLI overrides
        if let Some(policies) = &cli.policies {
            config.policies_dir = policies.clone();
        }

        if let Some(field) = &cli.content_field {
            config.processor.content_field = field.clone();
        }

        if cli.redact {
            config.processor.redact_content = true;
        }

        if cli.json_logs {
            config.log_format = LogFormat::Json;
        }

        Ok(config)
    }
}

impl Default for LeakguardConfig {
    fn default() -> Self {
        Self {
            policies_dir: default_policies_dir(),
            classifier: ClassifierConfig::default(),
            tracker: TrackerConfig::default(),
            processor: ProcessorConfig::default(),
            log_format: LogFormat::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_policies_dir() -> PathBuf {
    PathBuf::from("./policies")
}
