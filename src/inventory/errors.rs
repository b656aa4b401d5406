//! Inventory Store Error Types
//!
//! Expected absence (unknown device, unknown port) is never an error here;
//! those paths return `None`/empty, because southbound races routinely
//! produce events for devices not yet or no longer tracked. Errors are
//! reserved for rejected authority (stale mastership term) and storage
//! faults.

use std::fmt;

use crate::cluster::ClusterError;
use crate::mastership::MastershipError;

/// Inventory error type
#[derive(Debug, Clone)]
pub struct InventoryError {
    /// Error kind
    pub kind: InventoryErrorKind,
    /// Error message
    pub message: String,
}

/// Inventory error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryErrorKind {
    /// Mutation attempted under a mastership generation that is no longer
    /// current; discarded, never retried by the store itself
    StaleMastership,

    /// No active mastership term on this node for the device, so no write
    /// timestamp could be produced
    NoActiveTerm,

    /// Underlying replicated-table fault
    Storage,
}

impl InventoryError {
    /// Create a new inventory error.
    pub fn new(kind: InventoryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a stale-mastership error.
    pub fn stale_mastership(message: impl Into<String>) -> Self {
        Self::new(InventoryErrorKind::StaleMastership, message)
    }

    /// Create a no-active-term error.
    pub fn no_active_term(message: impl Into<String>) -> Self {
        Self::new(InventoryErrorKind::NoActiveTerm, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(InventoryErrorKind::Storage, message)
    }

    /// Whether the mutation lost to mastership fencing. The coordinator may
    /// re-read the term and retry at its level; the store will not.
    pub fn is_stale(&self) -> bool {
        matches!(
            self.kind,
            InventoryErrorKind::StaleMastership | InventoryErrorKind::NoActiveTerm
        )
    }
}

impl fmt::Display for InventoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InventoryError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for InventoryError {}

impl From<ClusterError> for InventoryError {
    fn from(err: ClusterError) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<MastershipError> for InventoryError {
    fn from(err: MastershipError) -> Self {
        match err {
            MastershipError::NoActiveTerm(device) => Self::no_active_term(device),
            other => Self::storage(other.to_string()),
        }
    }
}

/// Result type for inventory operations
pub type InventoryResult<T> = Result<T, InventoryError>;
