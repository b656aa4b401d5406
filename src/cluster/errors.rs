//! # Cluster Storage Errors
//!
//! Error types for the replicated-map primitive.

use thiserror::Error;

/// Result type for cluster-storage operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Cluster storage errors
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    /// A shared table lock was poisoned by a panicking writer
    #[error("storage lock poisoned: {0}")]
    LockPoisoned(String),

    /// A value could not be serialized for replication
    #[error("serialization failed: {0}")]
    Serialization(String),
}
