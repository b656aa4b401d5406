//! Observability for the control-plane core.
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle events
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. No async or background threads
//! 4. Deterministic output
//!
//! Observability failure must never affect convergence: every log call is
//! infallible at the call site.

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event with fields at INFO severity.
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(Severity::Info, event.as_str(), fields);
}

/// Log a lifecycle event with fields at WARN severity.
pub fn warn_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(Severity::Warn, event.as_str(), fields);
}

/// Log a lifecycle event with fields at ERROR severity.
pub fn error_event(event: Event, fields: &[(&str, &str)]) {
    Logger::error(event.as_str(), fields);
}
