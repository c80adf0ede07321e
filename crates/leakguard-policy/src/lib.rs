//! Leakguard Policy Engine
//!
//! Declarative DLP policies evaluated against classified events.
//!
//! Policies are defined in YAML or JSON and specify:
//! - Conditions (`all` / `any` / `not` trees over dot-path event fields)
//! - An optional sliding-window threshold (`stateful`)
//! - Actions (block, alert, quarantine, notify, log)
//! - Compliance references (PCI-DSS, GDPR, HIPAA, ...)
//!
//! Loaded policies are compiled once, ranked by descending priority and
//! published as an immutable set that reloads replace atomically.

pub mod action;
pub mod condition;
pub mod engine;
pub mod executor;
pub mod policy;
pub mod processor;
pub mod tracker;

pub use action::{Action, ActionKind, LogLevel};
pub use condition::{evaluate, ConditionNode, ConditionSpec, Operator, Predicate};
pub use engine::{LoadReport, PolicyEngine, PolicyLoadError, PolicyMatch, PolicySet};
pub use executor::{
    enforce, ActionExecutor, ActionFailure, AlertRecord, EnforcementOutcome, NotificationRecord,
    TracingExecutor,
};
pub use policy::{load_policy_dir, Policy, PolicyDefinition, StatefulRule, StatefulSpec, Threshold};
pub use processor::{EventProcessor, ProcessedEvent, ProcessorConfig};
pub use tracker::{ThresholdTracker, TrackerConfig};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::action::Action;
    pub use crate::condition::ConditionSpec;
    pub use crate::engine::{PolicyEngine, PolicyMatch};
    pub use crate::executor::{ActionExecutor, EnforcementOutcome};
    pub use crate::policy::PolicyDefinition;
    pub use crate::processor::{EventProcessor, ProcessorConfig};
}
