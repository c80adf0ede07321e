//! Leakguard Telemetry
//!
//! Metrics and audit trail functionality for Leakguard.
//!
//! Provides:
//! - Counters and histograms for evaluations, matches, and rejected policies
//! - Hash-chained audit trail of policy decisions

pub mod audit;
pub mod metrics;

pub use audit::{AuditEvent, AuditSeverity, AuditTrail, DEFAULT_MAX_RECORDS};
pub use metrics::{describe_metrics, MetricsCollector, MetricsSnapshot};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::audit::{AuditEvent, AuditTrail};
    pub use crate::metrics::MetricsCollector;
}
