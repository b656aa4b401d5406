//! Observable control-plane events.
//!
//! Every decision the coordinator or store takes that an operator would
//! care about has a typed event here. Events are explicit and typed; the
//! string name is the JSON `event` field in the log line.

use std::fmt;

/// Observable events in the device control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Mastership lifecycle
    /// Local node was granted mastership for a device
    MastershipAcquired,
    /// Local node lost or relinquished mastership for a device
    MastershipLost,
    /// Local node became a standby candidate for a device
    StandbyEntered,
    /// A mastership notification did not match the recorded term master
    StaleMastershipNotification,
    /// A mastership oracle call failed or timed out
    OracleUnavailable,

    // Device lifecycle
    /// Device connected and entered the inventory
    DeviceConnected,
    /// Device descriptor replaced (hw/sw version change)
    DeviceUpdated,
    /// Device marked offline
    DeviceOffline,
    /// Device administratively removed
    DeviceRemoved,
    /// Device re-probed after a mastership handoff
    DeviceReprobed,

    // Port lifecycle
    /// Port list re-synchronized for a device
    PortsUpdated,
    /// Single port status changed
    PortStatusChanged,

    // Store admission
    /// A write carrying a stale mastership term was rejected
    StaleWriteRejected,
    /// A store mutation failed for a non-fencing reason
    StoreWriteFailed,
    /// A concurrent-write conflict was resolved by last-writer-wins merge
    ReplicationConflictResolved,
    /// An inventory event arrived from a remote replica
    RemoteEventApplied,
}

impl Event {
    /// Returns the event name used in structured logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::MastershipAcquired => "MASTERSHIP_ACQUIRED",
            Event::MastershipLost => "MASTERSHIP_LOST",
            Event::StandbyEntered => "STANDBY_ENTERED",
            Event::StaleMastershipNotification => "STALE_MASTERSHIP_NOTIFICATION",
            Event::OracleUnavailable => "ORACLE_UNAVAILABLE",
            Event::DeviceConnected => "DEVICE_CONNECTED",
            Event::DeviceUpdated => "DEVICE_UPDATED",
            Event::DeviceOffline => "DEVICE_OFFLINE",
            Event::DeviceRemoved => "DEVICE_REMOVED",
            Event::DeviceReprobed => "DEVICE_REPROBED",
            Event::PortsUpdated => "PORTS_UPDATED",
            Event::PortStatusChanged => "PORT_STATUS_CHANGED",
            Event::StaleWriteRejected => "STALE_WRITE_REJECTED",
            Event::StoreWriteFailed => "STORE_WRITE_FAILED",
            Event::ReplicationConflictResolved => "REPLICATION_CONFLICT_RESOLVED",
            Event::RemoteEventApplied => "REMOTE_EVENT_APPLIED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
