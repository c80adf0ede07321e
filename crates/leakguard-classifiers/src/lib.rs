//! Leakguard Classifiers
//!
//! Content classification for data-loss prevention.
//!
//! A [`ContentClassifier`] turns raw text into a [`ClassificationResult`] by
//! combining several independent signals:
//! - Fingerprints: SHA-256 exact match against registered documents
//! - Patterns: regex catalogue for PAN, SSN, EMAIL, PHONE, API_KEY, SECRET, IP_ADDRESS
//! - Entropy: Shannon entropy as a heuristic for encoded or encrypted data
//! - Keywords: optional operator-defined dictionary
//! - Scorer: optional pluggable statistical signal
//!
//! Classification is a pure function of its input and the injected
//! fingerprint registry and scorer, so one classifier can be shared across
//! worker threads.

pub mod classifier;
pub mod config;
pub mod entropy;
pub mod fingerprint;
pub mod luhn;
pub mod patterns;
pub mod scorer;

pub use classifier::{
    confidence, ClassificationResult, ContentClassifier, HIGH_ENTROPY, KNOWN_SENSITIVE_DOC,
};
pub use config::ClassifierConfig;
pub use entropy::{shannon_entropy, HIGH_ENTROPY_THRESHOLD};
pub use fingerprint::{content_hash, FingerprintRegistry, InMemoryFingerprints};
pub use luhn::luhn_valid;
pub use patterns::{KeywordDictionary, PatternCatalogue, PatternDetection, SensitiveLabel};
pub use scorer::{Scorer, ScorerVerdict, StaticScorer};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{ClassificationResult, ContentClassifier};
    pub use crate::config::ClassifierConfig;
    pub use crate::fingerprint::{FingerprintRegistry, InMemoryFingerprints};
    pub use crate::scorer::{Scorer, ScorerVerdict};
}
