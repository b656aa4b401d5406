//! Mastership-fenced write timestamps.
//!
//! Every replicated write carries a `Timestamp` of the form
//! `(term, tick)`:
//!
//! - `term` is the mastership generation under which the writer believed it
//!   was authoritative for the device,
//! - `tick` is a per-device counter, monotonic on the writing node.
//!
//! Ordering is lexicographic, so any write from a newer mastership term
//! dominates every write from an older term regardless of local counters.
//! This is what lets the storage layer fence stale writers instead of
//! trusting each caller to have checked its role recently enough.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A fenced logical timestamp: `(term, tick)`, ordered lexicographically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp {
    /// Mastership generation of the writer.
    pub term: u64,
    /// Per-device write counter, monotonic per writing node.
    pub tick: u64,
}

impl Timestamp {
    /// Create a timestamp.
    pub fn new(term: u64, tick: u64) -> Self {
        Self { term, tick }
    }

    /// Whether this timestamp belongs to an older mastership term.
    pub fn is_stale_term(&self, other: &Timestamp) -> bool {
        self.term < other.term
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.term, self.tick)
    }
}
