//! Per-device mastership role state.
//!
//! Each node tracks, per device, whether it is the master, a standby
//! candidate, or uninvolved. The role value is transitioned only through
//! [`RoleTable::apply`], driven by oracle notifications and by the
//! coordinator's own grant/relinquish decisions; nothing else
//! read-modify-writes it.
//!
//! States: `None → Master ↔ Standby`. Master is also exited when the
//! southbound provider reports it cannot assert the role.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::inventory::DeviceId;

/// A node's relationship to a specific device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MastershipRole {
    /// Sole administrative authority for the device.
    Master,
    /// Eligible to take over on master failure.
    Standby,
    /// No relationship to the device.
    None,
}

impl MastershipRole {
    /// Whether this role authorizes inventory mutations.
    pub fn is_master(&self) -> bool {
        matches!(self, Self::Master)
    }

    /// Role name for observability.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "MASTER",
            Self::Standby => "STANDBY",
            Self::None => "NONE",
        }
    }
}

/// Result of applying a role transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleChange {
    pub previous: MastershipRole,
    pub current: MastershipRole,
}

impl RoleChange {
    /// Whether the transition actually changed the role.
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Explicit per-device role table for the local node.
pub struct RoleTable {
    roles: RwLock<HashMap<DeviceId, MastershipRole>>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self {
            roles: RwLock::new(HashMap::new()),
        }
    }

    /// The local role for a device. Unknown devices are `None`.
    pub fn role(&self, device: &DeviceId) -> MastershipRole {
        self.roles
            .read()
            .ok()
            .and_then(|r| r.get(device).copied())
            .unwrap_or(MastershipRole::None)
    }

    /// Whether the local node is master for the device.
    pub fn is_master(&self, device: &DeviceId) -> bool {
        self.role(device).is_master()
    }

    /// Apply a role assignment, returning the transition that took place.
    /// Applying the current role again is idempotent.
    pub fn apply(&self, device: &DeviceId, role: MastershipRole) -> RoleChange {
        let mut roles = match self.roles.write() {
            Ok(roles) => roles,
            Err(_) => {
                return RoleChange {
                    previous: MastershipRole::None,
                    current: role,
                }
            }
        };
        let previous = if role == MastershipRole::None {
            roles.remove(device).unwrap_or(MastershipRole::None)
        } else {
            roles.insert(device.clone(), role).unwrap_or(MastershipRole::None)
        };
        RoleChange {
            previous,
            current: role,
        }
    }

    /// Drop all role state for a device (administrative removal).
    pub fn forget(&self, device: &DeviceId) {
        if let Ok(mut roles) = self.roles.write() {
            roles.remove(device);
        }
    }

    /// Devices for which the local node currently holds mastership.
    pub fn mastered_devices(&self) -> Vec<DeviceId> {
        self.roles
            .read()
            .map(|r| {
                r.iter()
                    .filter(|(_, role)| role.is_master())
                    .map(|(d, _)| d.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for RoleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceId {
        DeviceId::new("of:0000000000000001")
    }

    #[test]
    fn test_unknown_device_is_none() {
        let table = RoleTable::new();
        assert_eq!(table.role(&device()), MastershipRole::None);
        assert!(!table.is_master(&device()));
    }

    #[test]
    fn test_apply_master() {
        let table = RoleTable::new();
        let change = table.apply(&device(), MastershipRole::Master);
        assert_eq!(change.previous, MastershipRole::None);
        assert_eq!(change.current, MastershipRole::Master);
        assert!(change.changed());
        assert!(table.is_master(&device()));
    }

    #[test]
    fn test_master_to_standby_and_back() {
        let table = RoleTable::new();
        table.apply(&device(), MastershipRole::Master);
        let change = table.apply(&device(), MastershipRole::Standby);
        assert_eq!(change.previous, MastershipRole::Master);
        assert!(!table.is_master(&device()));

        let change = table.apply(&device(), MastershipRole::Master);
        assert_eq!(change.previous, MastershipRole::Standby);
        assert!(table.is_master(&device()));
    }

    #[test]
    fn test_reapply_is_idempotent() {
        let table = RoleTable::new();
        table.apply(&device(), MastershipRole::Standby);
        let change = table.apply(&device(), MastershipRole::Standby);
        assert!(!change.changed());
    }

    #[test]
    fn test_none_clears_entry() {
        let table = RoleTable::new();
        table.apply(&device(), MastershipRole::Master);
        table.apply(&device(), MastershipRole::None);
        assert_eq!(table.role(&device()), MastershipRole::None);
        assert!(table.mastered_devices().is_empty());
    }

    #[test]
    fn test_mastered_devices() {
        let table = RoleTable::new();
        let d1 = DeviceId::new("of:1");
        let d2 = DeviceId::new("of:2");
        table.apply(&d1, MastershipRole::Master);
        table.apply(&d2, MastershipRole::Standby);
        assert_eq!(table.mastered_devices(), vec![d1]);
    }
}
