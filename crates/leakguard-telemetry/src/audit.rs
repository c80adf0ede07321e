//! Hash-chained audit trail of policy decisions
//!
//! The trail keeps the most recent records in memory. Older records are
//! evicted, but the chain head keeps advancing, so every retained record
//! still links to its predecessor's hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use uuid::Uuid;

/// Records kept by [`AuditTrail::new`]
pub const DEFAULT_MAX_RECORDS: usize = 10_000;

/// Audit trail with hash-chained events for tamper detection
#[derive(Debug)]
pub struct AuditTrail {
    events: VecDeque<AuditEvent>,
    chain_hash: Option<String>,
    max_records: usize,
    evicted: u64,
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::with_max_records(DEFAULT_MAX_RECORDS)
    }
}

impl AuditTrail {
    /// Create a new audit trail keeping [`DEFAULT_MAX_RECORDS`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a trail that retains at most `max_records` (minimum 1)
    pub fn with_max_records(max_records: usize) -> Self {
        Self {
            events: VecDeque::new(),
            chain_hash: None,
            max_records: max_records.max(1),
            evicted: 0,
        }
    }

    /// Append an event, linking it to the previous one and evicting the
    /// oldest record once the trail is full
    pub fn add_event(&mut self, mut event: AuditEvent) -> &AuditEvent {
        event.previous_hash = self.chain_hash.clone();

        let hash = compute_hash(&event);
        event.hash = Some(hash.clone());

        self.chain_hash = Some(hash);
        while self.events.len() >= self.max_records {
            self.events.pop_front();
            self.evicted += 1;
        }
        self.events.push_back(event);
        &self.events[self.events.len() - 1]
    }

    /// Verify the integrity of the retained records.
    ///
    /// The oldest retained record anchors the chain; evicted records can
    /// no longer be checked.
    pub fn verify(&self) -> bool {
        let mut prev_hash: Option<&String> = self.events.front().and_then(|e| e.previous_hash.as_ref());
        if self.evicted == 0 && prev_hash.is_some() {
            return false;
        }

        for event in &self.events {
            if event.previous_hash.as_ref() != prev_hash {
                return false;
            }

            if event.hash.as_deref() != Some(compute_hash(event).as_str()) {
                return false;
            }

            prev_hash = event.hash.as_ref();
        }

        prev_hash == self.chain_hash.as_ref()
    }

    /// Retained events, oldest first
    pub fn events(&self) -> &VecDeque<AuditEvent> {
        &self.events
    }

    /// Maximum number of retained records
    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Records dropped to stay within [`max_records`](Self::max_records)
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Hash of the most recent event
    pub fn head(&self) -> Option<&str> {
        self.chain_hash.as_deref()
    }
}

/// Hash everything except the event's own hash
fn compute_hash(event: &AuditEvent) -> String {
    let mut hasher = Sha256::new();

    hasher.update(event.id.as_bytes());
    hasher.update(event.event_type.as_bytes());
    if let Some(ref subject) = event.subject {
        hasher.update(subject.as_bytes());
    }
    for policy in &event.policy_ids {
        hasher.update(policy.as_bytes());
        hasher.update([0u8]);
    }
    if let Some(ref data) = event.data {
        hasher.update(data.as_bytes());
    }
    hasher.update(event.timestamp.to_rfc3339().as_bytes());
    hasher.update(event.severity.as_str().as_bytes());
    if let Some(ref prev) = event.previous_hash {
        hasher.update(prev.as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

/// A single audit event in the trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique audit record id
    pub id: String,

    /// Event type/category
    pub event_type: String,

    /// Id of the observed event this record is about
    pub subject: Option<String>,

    /// Policies involved in the decision
    pub policy_ids: Vec<String>,

    /// Event data (JSON serialized)
    pub data: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Severity level
    pub severity: AuditSeverity,

    /// Hash of this event
    pub hash: Option<String>,

    /// Hash of previous event (for chaining)
    pub previous_hash: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            subject: None,
            policy_ids: Vec::new(),
            data: None,
            timestamp: Utc::now(),
            severity: AuditSeverity::Info,
            hash: None,
            previous_hash: None,
        }
    }

    /// Set the observed event id
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the policies involved
    pub fn with_policies<I, S>(mut self, policy_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy_ids = policy_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set event data
    pub fn with_data(mut self, data: impl Serialize) -> Self {
        self.data = serde_json::to_string(&data).ok();
        self
    }

    /// Set severity
    pub fn with_severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    High,
    Critical,
}

impl AuditSeverity {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_trail() {
        let mut trail = AuditTrail::new();

        trail.add_event(AuditEvent::new("policy_matched").with_policies(["pol-pci"]));
        trail.add_event(AuditEvent::new("event_blocked").with_subject("evt-1"));

        assert!(trail.verify());
        assert_eq!(trail.len(), 2);
        assert_eq!(trail.events()[1].previous_hash, trail.events()[0].hash);
        assert_eq!(trail.head(), trail.events()[1].hash.as_deref());
    }

    #[test]
    fn test_tamper_detection() {
        let mut trail = AuditTrail::new();

        trail.add_event(AuditEvent::new("policy_matched").with_policies(["pol-pci"]));
        trail.add_event(AuditEvent::new("policy_matched").with_policies(["pol-usb"]));

        trail.events[0].policy_ids = vec!["pol-other".to_string()];

        assert!(!trail.verify());
    }

    #[test]
    fn test_trail_is_bounded() {
        let mut trail = AuditTrail::with_max_records(3);
        let mut heads = Vec::new();

        for i in 0..10 {
            let recorded = trail.add_event(AuditEvent::new("policy_matched").with_subject(format!("evt-{i}")));
            heads.push(recorded.hash.clone());
        }

        assert_eq!(trail.len(), 3);
        assert_eq!(trail.evicted(), 7);
        assert_eq!(trail.max_records(), 3);
        assert_eq!(trail.events()[0].subject.as_deref(), Some("evt-7"));
        assert_eq!(trail.events()[0].previous_hash, heads[6]);
        assert_eq!(trail.head(), heads[9].as_deref());
        assert!(trail.verify());

        trail.events[1].subject = Some("evt-forged".to_string());
        assert!(!trail.verify());
    }

    #[test]
    fn test_dropping_the_newest_record_is_detected() {
        let mut trail = AuditTrail::new();
        assert_eq!(trail.max_records(), DEFAULT_MAX_RECORDS);

        trail.add_event(AuditEvent::new("policy_matched"));
        trail.add_event(AuditEvent::new("policy_matched"));
        trail.events.pop_back();

        assert!(!trail.verify());
    }
}
