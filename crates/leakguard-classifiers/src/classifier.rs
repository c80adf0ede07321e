//! Hybrid content classifier
//!
//! Combines independent signal sources into one [`ClassificationResult`]:
//! - fingerprint exact match against known sensitive documents
//! - regex pattern detection (with Luhn validation for PAN)
//! - Shannon entropy analysis
//! - an optional keyword dictionary
//! - an optional pluggable [`Scorer`]
//!
//! Every source is additive; none of them excludes another.

use crate::config::ClassifierConfig;
use crate::entropy::shannon_entropy;
use crate::fingerprint::{content_hash, FingerprintRegistry, InMemoryFingerprints};
use crate::patterns::{density_score, KeywordDictionary, PatternCatalogue};
use crate::scorer::Scorer;
use leakguard_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Label emitted for fingerprint matches
pub const KNOWN_SENSITIVE_DOC: &str = "KNOWN_SENSITIVE_DOC";

/// Label emitted for high-entropy content
pub const HIGH_ENTROPY: &str = "HIGH_ENTROPY";

/// Method names recorded in [`ClassificationResult::methods`]
pub mod methods {
    pub const FINGERPRINT: &str = "fingerprint";
    pub const REGEX: &str = "regex";
    pub const ENTROPY: &str = "entropy";
    pub const KEYWORD: &str = "keyword";
    pub const SCORER: &str = "scorer";
}

/// Result of classifying one piece of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Overall sensitivity score (0.0-1.0)
    pub score: f64,

    /// Detected labels, de-duplicated
    pub labels: BTreeSet<String>,

    /// Agreement-weighted confidence (0.0-1.0)
    pub confidence: f64,

    /// Shannon entropy of the content
    pub entropy: f64,

    /// Signal sources that contributed
    pub methods: BTreeSet<String>,

    /// Match count per pattern or keyword label
    #[serde(default)]
    pub label_counts: BTreeMap<String, usize>,

    /// Latency in microseconds
    #[serde(skip)]
    pub latency_us: u64,
}

impl ClassificationResult {
    /// A result with nothing detected
    pub fn empty() -> Self {
        Self {
            score: 0.0,
            labels: BTreeSet::new(),
            confidence: 0.0,
            entropy: 0.0,
            methods: BTreeSet::new(),
            label_counts: BTreeMap::new(),
            latency_us: 0,
        }
    }

    /// Whether a label was detected
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    /// True if any signal source fired
    pub fn is_sensitive(&self) -> bool {
        !self.labels.is_empty()
    }
}

/// One signal source's contribution
struct Contribution {
    score: f64,
    labels: Vec<String>,
    method: &'static str,
}

/// Aggregate confidence from contributed scores.
///
/// Rewards several methods agreeing and penalizes a spread of distinct
/// labels.
pub fn confidence(scores: &[f64], distinct_labels: usize) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }

    let avg = scores.iter().sum::<f64>() / scores.len() as f64;
    let method_factor = 0.7 + 0.15 * scores.len().min(3) as f64 / 3.0;
    let label_consistency = 1.0 / (1.0 + 0.1 * distinct_labels as f64);

    (avg * method_factor * label_consistency).min(1.0)
}

/// Hybrid DLP content classifier
pub struct ContentClassifier {
    config: ClassifierConfig,
    catalogue: PatternCatalogue,
    keywords: Option<KeywordDictionary>,
    fingerprints: Arc<dyn FingerprintRegistry>,
    scorer: Option<Arc<dyn Scorer>>,
}

impl ContentClassifier {
    /// Create a classifier with default settings and an empty fingerprint set
    pub fn new() -> Result<Self> {
        Self::from_config(ClassifierConfig::default())
    }

    /// Create a classifier from configuration.
    ///
    /// Fingerprints listed in the configuration are registered in a fresh
    /// in-memory registry.
    pub fn from_config(config: ClassifierConfig) -> Result<Self> {
        let keywords = KeywordDictionary::new(&config.keywords)?;
        let fingerprints = Arc::new(InMemoryFingerprints::with_hashes(&config.fingerprints));

        Ok(Self {
            catalogue: PatternCatalogue::new()?,
            keywords,
            fingerprints,
            scorer: None,
            config,
        })
    }

    /// Use an external fingerprint registry
    pub fn with_fingerprints(mut self, registry: Arc<dyn FingerprintRegistry>) -> Self {
        for hash in &self.config.fingerprints {
            registry.add(hash);
        }
        self.fingerprints = registry;
        self
    }

    /// Attach a pluggable scorer
    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Fingerprint registry in use
    pub fn fingerprints(&self) -> &Arc<dyn FingerprintRegistry> {
        &self.fingerprints
    }

    /// Register `content` as a known sensitive document and return its hash
    pub fn register_document(&self, content: &str) -> String {
        let hash = content_hash(content);
        self.fingerprints.add(&hash);
        hash
    }

    /// Replace every pattern match in `content` with `replacement`
    pub fn redact(&self, content: &str, replacement: &str) -> String {
        self.catalogue.redact(content, replacement)
    }

    /// Classify content. Never fails: empty or unremarkable content yields
    /// a zero score and no labels.
    pub fn classify(&self, content: &str) -> ClassificationResult {
        let start = Instant::now();
        let mut contributions: Vec<Contribution> = Vec::new();
        let mut label_counts = BTreeMap::new();

        // 1. Fingerprint exact match
        if !content.is_empty() && !self.fingerprints.is_empty() {
            let hash = content_hash(content);
            if self.fingerprints.contains(&hash) {
                contributions.push(Contribution {
                    score: 1.0,
                    labels: vec![KNOWN_SENSITIVE_DOC.to_string()],
                    method: methods::FINGERPRINT,
                });
            }
        }

        // 2. Pattern detection
        let detection = self.catalogue.detect(content);
        if let Some(max_count) = detection.max_count() {
            contributions.push(Contribution {
                score: density_score(max_count),
                labels: detection.counts.keys().cloned().collect(),
                method: methods::REGEX,
            });
        }
        label_counts.extend(detection.counts);

        // 3. Entropy analysis
        let entropy = shannon_entropy(content);
        if entropy > self.config.entropy_threshold {
            contributions.push(Contribution {
                score: self.config.entropy_score,
                labels: vec![HIGH_ENTROPY.to_string()],
                method: methods::ENTROPY,
            });
        }

        // 4. Keyword dictionary
        if let Some(keywords) = &self.keywords {
            let counts = keywords.detect(content);
            if let Some(max_count) = counts.values().copied().max() {
                contributions.push(Contribution {
                    score: density_score(max_count),
                    labels: counts.keys().cloned().collect(),
                    method: methods::KEYWORD,
                });
                for (label, count) in counts {
                    *label_counts.entry(label).or_insert(0) += count;
                }
            }
        }

        // 5. Pluggable scorer
        if let Some(scorer) = &self.scorer {
            let verdict = scorer.score(content);
            if verdict.score > self.config.scorer_threshold {
                contributions.push(Contribution {
                    score: verdict.score * self.config.scorer_weight,
                    labels: vec![verdict.label],
                    method: methods::SCORER,
                });
            } else {
                debug!(
                    scorer = %scorer.name(),
                    score = verdict.score,
                    "Scorer verdict below threshold"
                );
            }
        }

        let scores: Vec<f64> = contributions.iter().map(|c| c.score).collect();
        let mut labels = BTreeSet::new();
        let mut used_methods = BTreeSet::new();
        for contribution in contributions {
            labels.extend(contribution.labels);
            used_methods.insert(contribution.method.to_string());
        }

        let score = scores.iter().copied().fold(0.0_f64, f64::max).min(1.0);
        let confidence = confidence(&scores, labels.len());

        ClassificationResult {
            score,
            labels,
            confidence,
            entropy,
            methods: used_methods,
            label_counts,
            latency_us: start.elapsed().as_micros() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::StaticScorer;

    fn classifier() -> ContentClassifier {
        ContentClassifier::new().unwrap()
    }

    #[test]
    fn test_empty_content() {
        let result = classifier().classify("");
        assert!(!result.is_sensitive());
        assert_eq!(
            result,
            ClassificationResult {
                latency_us: result.latency_us,
                ..ClassificationResult::empty()
            }
        );
    }

    #[test]
    fn test_pan_content() {
        let result = classifier().classify("card 4532015112830366");

        assert!(result.has_label("PAN"));
        assert!(result.methods.contains(methods::REGEX));
        // One PAN match: 0.9 * 1 / 5; the entropy signal (0.7) dominates the max.
        assert!(result.entropy > 3.5);
        assert!((result.score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_pan_not_labelled() {
        let result = classifier().classify("card 4532015112830367");
        assert!(!result.has_label("PAN"));
    }

    #[test]
    fn test_fingerprint_match() {
        let classifier = classifier();
        let doc = "Q3 acquisition memo";
        let hash = classifier.register_document(doc);
        assert!(classifier.fingerprints().contains(&hash));

        let result = classifier.classify(doc);
        assert_eq!(result.score, 1.0);
        assert!(result.has_label(KNOWN_SENSITIVE_DOC));
        assert!(result.methods.contains(methods::FINGERPRINT));

        let other = classifier.classify("Q3 acquisition memo!");
        assert!(!other.has_label(KNOWN_SENSITIVE_DOC));
    }

    #[test]
    fn test_fingerprints_from_config() {
        let config = ClassifierConfig {
            fingerprints: vec![content_hash("board minutes")],
            ..ClassifierConfig::default()
        };
        let classifier = ContentClassifier::from_config(config).unwrap();

        assert!(classifier.classify("board minutes").has_label(KNOWN_SENSITIVE_DOC));
    }

    #[test]
    fn test_scorer_above_threshold() {
        let classifier = classifier().with_scorer(Arc::new(StaticScorer::new(0.9, "SOURCE_CODE")));
        let result = classifier.classify("aaaa");

        assert!(result.has_label("SOURCE_CODE"));
        assert!(result.methods.contains(methods::SCORER));
        assert!((result.score - 0.72).abs() < 1e-9);
    }

    #[test]
    fn test_scorer_below_threshold_ignored() {
        let classifier = classifier().with_scorer(Arc::new(StaticScorer::new(0.75, "SOURCE_CODE")));
        let result = classifier.classify("aaaa");

        assert!(result.labels.is_empty());
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_keyword_signal() {
        let mut config = ClassifierConfig::default();
        config
            .keywords
            .insert("CONFIDENTIAL".to_string(), vec!["confidential".to_string()]);
        let classifier = ContentClassifier::from_config(config).unwrap();

        let result = classifier.classify("confidential");
        assert!(result.has_label("CONFIDENTIAL"));
        assert!(result.methods.contains(methods::KEYWORD));
        assert_eq!(result.label_counts.get("CONFIDENTIAL"), Some(&1));
    }

    #[test]
    fn test_confidence_formula() {
        // Single method, single label: 0.7 * (0.7 + 0.05) / 1.1
        let c = confidence(&[0.7], 1);
        assert!((c - 0.7 * 0.75 / 1.1).abs() < 1e-12);

        // Three agreeing methods saturate the method factor
        let c = confidence(&[1.0, 1.0, 1.0, 1.0], 0);
        assert!((c - 0.85).abs() < 1e-12);

        assert_eq!(confidence(&[], 3), 0.0);
    }

    #[test]
    fn test_redact() {
        let redacted = classifier().redact("ssn 123-45-6789", "***");
        assert_eq!(redacted, "ssn ***");
    }

    #[test]
    fn test_result_serialization() {
        let result = classifier().classify("card 4532015112830366");
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["labels"], serde_json::json!(["HIGH_ENTROPY", "PAN"]));
        assert_eq!(value["methods"], serde_json::json!(["entropy", "regex"]));
        assert_eq!(value["label_counts"]["PAN"], serde_json::json!(1));
        assert!(value.get("latency_us").is_none());
    }
}
