//! Mastership terms.
//!
//! A term associates one device with at most one master node and an ordered
//! list of standby candidates at a given generation. The generation strictly
//! increases every time the master changes for a device and never resets;
//! it is the fencing token every inventory write carries.

use serde::{Deserialize, Serialize};

use crate::cluster::NodeId;
use crate::inventory::DeviceId;

use super::role::MastershipRole;

/// The oracle's record of who administers a device, at which generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MastershipTerm {
    pub device: DeviceId,
    /// Monotonic per device; bumped whenever the master changes.
    pub generation: u64,
    /// Current master, absent while no node holds the device.
    pub master: Option<NodeId>,
    /// Standby candidates in promotion order.
    pub backups: Vec<NodeId>,
}

impl MastershipTerm {
    /// Whether `node` is the recorded master for this term.
    pub fn is_master(&self, node: &NodeId) -> bool {
        self.master.as_ref() == Some(node)
    }

    /// The role this term assigns to `node`.
    pub fn role_of(&self, node: &NodeId) -> MastershipRole {
        if self.is_master(node) {
            MastershipRole::Master
        } else if self.backups.contains(node) {
            MastershipRole::Standby
        } else {
            MastershipRole::None
        }
    }
}

/// Mastership-change notification delivered to every node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MastershipEvent {
    pub device: DeviceId,
    pub master: Option<NodeId>,
    pub backups: Vec<NodeId>,
}

impl MastershipEvent {
    /// The role this notification suggests for `node`. Notifications can be
    /// stale; the coordinator re-verifies against the current term before
    /// acting on a suggested master role.
    pub fn role_of(&self, node: &NodeId) -> MastershipRole {
        if self.master.as_ref() == Some(node) {
            MastershipRole::Master
        } else if self.backups.contains(node) {
            MastershipRole::Standby
        } else {
            MastershipRole::None
        }
    }
}
