//! Leakguard Core
//!
//! Core types, traits, and utilities shared across Leakguard components.
//!
//! This crate provides:
//! - Error types and result handling
//! - Dot-path addressing into nested event records
//! - Event validation and normalization helpers
//! - An injectable wall clock for window-based state
//! - Duration parsing for policy windows

pub mod clock;
pub mod duration;
pub mod error;
pub mod event;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use duration::{parse_window, DEFAULT_WINDOW};
pub use error::{Error, Result};
pub use event::{normalize_event, validate_event, FieldPath, Severity};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::{Clock, SharedClock, SystemClock};
    pub use crate::error::{Error, Result};
    pub use crate::event::FieldPath;
}
