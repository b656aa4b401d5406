//! Inventory value types.
//!
//! Descriptors are immutable values: an update replaces the stored
//! descriptor wholesale, never merges fields. Identity types are opaque
//! newtypes so callers cannot confuse device, provider, and port keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, stable, cluster-wide unique device identifier (URI-style).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the southbound provider that owns a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Port number, unique within one device.
pub type PortNumber = u64;

/// Kind of network element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    Switch,
    Router,
    Roadm,
    OpticalAmplifier,
    Other,
}

/// Immutable device description as reported by a southbound provider.
///
/// Two descriptors are considered materially different only when the
/// hardware or software version changed; everything else rides along with
/// whichever descriptor was accepted last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub device_type: DeviceType,
    pub manufacturer: String,
    pub hw_version: String,
    pub sw_version: String,
    pub serial_number: String,
    pub chassis_id: String,
}

impl DeviceDescriptor {
    /// Whether this descriptor differs from `other` in a way that warrants
    /// replacing the stored one (hw/sw version change).
    pub fn differs_from(&self, other: &DeviceDescriptor) -> bool {
        self.hw_version != other.hw_version || self.sw_version != other.sw_version
    }
}

/// Kind of port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortType {
    Copper,
    Fiber,
    Virtual,
}

/// Port description, keyed by `(device, number)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub number: PortNumber,
    pub enabled: bool,
    pub port_type: PortType,
    /// Port speed in Mbps.
    pub speed: u64,
}

/// Stored device record: the accepted descriptor plus the provider that
/// reported it. Availability is tracked in a separate table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub provider: ProviderId,
    pub descriptor: DeviceDescriptor,
}

/// Replicated key of the ports table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortKey {
    pub device: DeviceId,
    pub number: PortNumber,
}

impl PortKey {
    pub fn new(device: DeviceId, number: PortNumber) -> Self {
        Self { device, number }
    }
}
