//! Structured JSON logger for the control plane.
//!
//! - Structured logs (JSON), one log line = one event
//! - Deterministic key ordering
//! - Explicit severity levels
//! - Synchronous, no buffering

use std::fmt;
use std::io::{self, Write};

/// Log severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues (lost mastership, stale writes, oracle hiccups)
    Warn = 2,
    /// Operation failures
    Error = 3,
    /// Unrecoverable, process exits
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured logger that outputs JSON lines.
///
/// Logging must never stall or fail southbound event processing, so the
/// logger is synchronous, infallible at the call site, and allocation-light.
/// Error and fatal lines go to stderr, everything else to stdout.
pub struct Logger;

impl Logger {
    /// Log an event with the given severity and fields.
    ///
    /// Fields are output in deterministic order (alphabetical by key).
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        let line = Self::render(severity, event, fields);
        if severity >= Severity::Error {
            Self::emit(&mut io::stderr(), &line);
        } else {
            Self::emit(&mut io::stdout(), &line);
        }
    }

    /// Log at ERROR level
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    /// Render one JSON log line. Keys come out as `event`, `severity`, then
    /// the fields sorted alphabetically, so identical calls produce
    /// byte-identical lines.
    fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut line = String::with_capacity(256);
        line.push('{');
        Self::push_field(&mut line, "event", event);
        line.push(',');
        Self::push_field(&mut line, "severity", severity.as_str());

        let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
        sorted.sort_by_key(|(key, _)| *key);
        for (key, value) in sorted {
            line.push(',');
            Self::push_field(&mut line, key, value);
        }

        line.push('}');
        line.push('\n');
        line
    }

    fn push_field(line: &mut String, key: &str, value: &str) {
        line.push('"');
        Self::escape_into(line, key);
        line.push_str("\":\"");
        Self::escape_into(line, value);
        line.push('"');
    }

    /// Escape special characters for JSON strings.
    fn escape_into(line: &mut String, s: &str) {
        for c in s.chars() {
            match c {
                '"' => line.push_str("\\\""),
                '\\' => line.push_str("\\\\"),
                '\n' => line.push_str("\\n"),
                '\r' => line.push_str("\\r"),
                '\t' => line.push_str("\\t"),
                c if c.is_control() => {
                    line.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => line.push(c),
            }
        }
    }

    fn emit<W: Write>(writer: &mut W, line: &str) {
        // One write_all call so concurrent callers do not interleave lines
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }
}

/// Render a log line to a string for testing
#[cfg(test)]
pub fn capture_log(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    Logger::render(severity, event, fields)
}
