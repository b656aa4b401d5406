//! # Mastership Errors
//!
//! Error types for the mastership-oracle boundary. Oracle calls are remote
//! round trips in a full deployment, so every fallible call is allowed to
//! fail; the coordinator maps any failure to the lost-mastership fallback.

use thiserror::Error;

/// Result type for mastership operations
pub type MastershipResult<T> = Result<T, MastershipError>;

/// Mastership errors
#[derive(Debug, Clone, Error)]
pub enum MastershipError {
    /// The oracle could not be reached or timed out
    #[error("mastership oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// No mastership term is active on this node for the device, so a
    /// write timestamp cannot be produced
    #[error("no active mastership term for device {0}")]
    NoActiveTerm(String),
}
