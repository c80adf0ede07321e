//! Pattern detection for well-known sensitive data
//!
//! Two matchers live here: the fixed regex catalogue for PAN, SSN, EMAIL,
//! PHONE, API_KEY, SECRET and IP_ADDRESS, and an optional keyword
//! dictionary built on Aho-Corasick for operator-defined labels.

use crate::luhn::{is_numeric_candidate, luhn_valid};
use aho_corasick::{AhoCorasick, MatchKind};
use leakguard_core::{Error, Result};
use regex::{NoExpand, Regex};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Labels produced by the regex catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SensitiveLabel {
    Pan,
    Ssn,
    Email,
    Phone,
    ApiKey,
    Secret,
    IpAddress,
}

impl SensitiveLabel {
    /// Every label, in catalogue order
    pub const ALL: [SensitiveLabel; 7] = [
        Self::Pan,
        Self::Ssn,
        Self::Email,
        Self::Phone,
        Self::ApiKey,
        Self::Secret,
        Self::IpAddress,
    ];

    /// Label name as it appears in classification results
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pan => "PAN",
            Self::Ssn => "SSN",
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::ApiKey => "API_KEY",
            Self::Secret => "SECRET",
            Self::IpAddress => "IP_ADDRESS",
        }
    }

    fn patterns(&self) -> &'static [&'static str] {
        match self {
            Self::Pan => &[
                // Visa
                r"\b4[0-9]{12}(?:[0-9]{3})?\b",
                // Mastercard
                r"\b5[1-5][0-9]{14}\b",
                // Amex
                r"\b3[47][0-9]{13}\b",
                // Discover
                r"\b6(?:011|5[0-9]{2})[0-9]{12}\b",
            ],
            Self::Ssn => &[r"\b\d{3}-\d{2}-\d{4}\b", r"\b\d{9}\b"],
            Self::Email => &[r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"],
            Self::Phone => &[r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b", r"\+\d{1,3}[-.]?\d{1,14}\b"],
            Self::ApiKey => &[
                // AWS access key id
                r"AKIA[0-9A-Z]{16}",
                r#"(?i)api[_-]?key["']?\s*[:=]\s*["']?[a-zA-Z0-9_\-]{32,}["']?"#,
            ],
            Self::Secret => &[
                r#"(?i)secret["']?\s*[:=]\s*["']?[a-zA-Z0-9_\-]{16,}["']?"#,
                r#"(?i)password["']?\s*[:=]\s*["']?[a-zA-Z0-9_\-!@#$%^&*]{8,}["']?"#,
            ],
            Self::IpAddress => &[r"\b(?:\d{1,3}\.){3}\d{1,3}\b"],
        }
    }
}

impl fmt::Display for SensitiveLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score contributed by a density-based source given its busiest label.
pub fn density_score(max_label_count: usize) -> f64 {
    (0.9 * max_label_count as f64 / 5.0).min(0.95)
}

/// Outcome of running the regex catalogue over some content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternDetection {
    /// Distinct match count per surviving label
    pub counts: BTreeMap<String, usize>,

    /// Labels that matched but were discarded by validation
    pub rejected: Vec<SensitiveLabel>,
}

impl PatternDetection {
    /// Highest per-label count, if any label survived
    pub fn max_count(&self) -> Option<usize> {
        self.counts.values().copied().max()
    }
}

/// Precompiled regex catalogue
pub struct PatternCatalogue {
    sets: Vec<(SensitiveLabel, Vec<Regex>)>,
}

impl PatternCatalogue {
    /// Compile the built-in catalogue
    pub fn new() -> Result<Self> {
        let mut sets = Vec::with_capacity(SensitiveLabel::ALL.len());

        for label in SensitiveLabel::ALL {
            let regexes = label
                .patterns()
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        Error::classifier(format!("Failed to compile {} regex: {}", label, e))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            sets.push((label, regexes));
        }

        Ok(Self { sets })
    }

    /// Run every pattern and union the matches per label.
    ///
    /// Matches are de-duplicated by span, so overlapping patterns for the
    /// same label do not double count. PAN survives only if every numeric
    /// candidate passes the Luhn check.
    pub fn detect(&self, content: &str) -> PatternDetection {
        let mut detection = PatternDetection::default();

        for (label, regexes) in &self.sets {
            let mut spans: BTreeSet<(usize, usize)> = BTreeSet::new();
            let mut all_valid = true;

            for regex in regexes {
                for m in regex.find_iter(content) {
                    if spans.insert((m.start(), m.end()))
                        && *label == SensitiveLabel::Pan
                        && is_numeric_candidate(m.as_str())
                        && !luhn_valid(m.as_str())
                    {
                        all_valid = false;
                    }
                }
            }

            if spans.is_empty() {
                continue;
            }

            if !all_valid {
                debug!(label = %label, candidates = spans.len(), "Discarding label after Luhn validation");
                detection.rejected.push(*label);
                continue;
            }

            detection.counts.insert(label.as_str().to_string(), spans.len());
        }

        detection
    }

    /// Replace every catalogue match with `replacement`
    pub fn redact(&self, content: &str, replacement: &str) -> String {
        let mut redacted = content.to_string();
        for (_, regexes) in &self.sets {
            for regex in regexes {
                if regex.is_match(&redacted) {
                    redacted = regex.replace_all(&redacted, NoExpand(replacement)).into_owned();
                }
            }
        }
        redacted
    }
}

/// Operator-supplied keyword dictionary, matched case-insensitively
pub struct KeywordDictionary {
    matcher: AhoCorasick,
    pattern_labels: Vec<String>,
}

impl KeywordDictionary {
    /// Build a dictionary from `label -> keywords`.
    ///
    /// Returns `Ok(None)` when no keywords are configured.
    pub fn new(entries: &BTreeMap<String, Vec<String>>) -> Result<Option<Self>> {
        let (labels, keywords): (Vec<String>, Vec<String>) = entries
            .iter()
            .flat_map(|(label, words)| {
                words
                    .iter()
                    .filter(|w| !w.trim().is_empty())
                    .map(move |w| (label.clone(), w.clone()))
            })
            .unzip();

        if keywords.is_empty() {
            return Ok(None);
        }

        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostLongest)
            .build(&keywords)
            .map_err(|e| Error::classifier(format!("Failed to build keyword matcher: {}", e)))?;

        Ok(Some(Self {
            matcher,
            pattern_labels: labels,
        }))
    }

    /// Count keyword hits per label
    pub fn detect(&self, content: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for m in self.matcher.find_iter(content) {
            let label = &self.pattern_labels[m.pattern().as_usize()];
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }
}
