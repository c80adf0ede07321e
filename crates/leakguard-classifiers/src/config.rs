//! Configuration for the content classifier

use leakguard_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Tunables and injected signal data for [`ContentClassifier`](crate::ContentClassifier)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Entropy above which content is flagged `HIGH_ENTROPY`
    #[serde(default = "default_entropy_threshold")]
    pub entropy_threshold: f64,

    /// Score contributed by the entropy signal
    #[serde(default = "default_entropy_score")]
    pub entropy_score: f64,

    /// Scorer verdicts must exceed this to contribute
    #[serde(default = "default_scorer_threshold")]
    pub scorer_threshold: f64,

    /// Weight applied to accepted scorer verdicts
    #[serde(default = "default_scorer_weight")]
    pub scorer_weight: f64,

    /// Keyword dictionary: label -> keywords
    #[serde(default)]
    pub keywords: BTreeMap<String, Vec<String>>,

    /// SHA-256 hex digests of known sensitive documents
    #[serde(default)]
    pub fingerprints: Vec<String>,
}

impl ClassifierConfig {
    /// Parse configuration from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            entropy_threshold: default_entropy_threshold(),
            entropy_score: default_entropy_score(),
            scorer_threshold: default_scorer_threshold(),
            scorer_weight: default_scorer_weight(),
            keywords: BTreeMap::new(),
            fingerprints: Vec::new(),
        }
    }
}

fn default_entropy_threshold() -> f64 {
    crate::entropy::HIGH_ENTROPY_THRESHOLD
}

fn default_entropy_score() -> f64 {
    0.7
}

fn default_scorer_threshold() -> f64 {
    0.75
}

fn default_scorer_weight() -> f64 {
    0.8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config = ClassifierConfig::from_yaml("{}").unwrap();
        assert_eq!(config.entropy_threshold, 3.5);
        assert_eq!(config.scorer_threshold, 0.75);
        assert!(config.keywords.is_empty());
    }

    #[test]
    fn test_keywords() {
        let yaml = r#"
entropy_threshold: 4.0
keywords:
  CONFIDENTIAL:
    - "confidential"
    - "internal only"
"#;
        let config = ClassifierConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.entropy_threshold, 4.0);
        assert_eq!(config.keywords["CONFIDENTIAL"].len(), 2);
    }
}
