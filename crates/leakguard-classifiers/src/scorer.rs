//! Pluggable statistical scorer
//!
//! A scorer is an optional extra signal (for example a model served
//! out-of-process). The classifier holds `Option<Arc<dyn Scorer>>`; no
//! scorer means the signal is simply not consulted.

/// Verdict returned by a [`Scorer`]
#[derive(Debug, Clone, PartialEq)]
pub struct ScorerVerdict {
    /// Score in `[0, 1]`
    pub score: f64,

    /// Label to attach when the verdict is strong enough
    pub label: String,
}

impl ScorerVerdict {
    /// Create a new verdict
    pub fn new(score: f64, label: impl Into<String>) -> Self {
        Self {
            score,
            label: label.into(),
        }
    }
}

/// Capability interface for content scorers
pub trait Scorer: Send + Sync {
    /// Score the given content
    fn score(&self, content: &str) -> ScorerVerdict;

    /// Scorer name, for logging
    fn name(&self) -> &str;
}

/// Scorer that returns a fixed verdict; handy for wiring tests and demos
#[derive(Debug, Clone)]
pub struct StaticScorer {
    verdict: ScorerVerdict,
}

impl StaticScorer {
    /// Always answer with `score` and `label`
    pub fn new(score: f64, label: impl Into<String>) -> Self {
        Self {
            verdict: ScorerVerdict::new(score, label),
        }
    }
}

impl Scorer for StaticScorer {
    fn score(&self, _content: &str) -> ScorerVerdict {
        self.verdict.clone()
    }

    fn name(&self) -> &str {
        "static"
    }
}
