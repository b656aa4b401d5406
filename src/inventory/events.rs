//! Inventory change events.
//!
//! Emitted by the store, re-posted by the coordinator to the event sink.
//! Subscribers must treat availability and update events as
//! level-triggered: replication can re-deliver them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{DeviceId, PortDescriptor};

/// Type of inventory event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryEventKind {
    /// Device entered the inventory
    DeviceAdded,
    /// Device descriptor replaced (hw/sw version change)
    DeviceUpdated,
    /// Device availability flag toggled
    AvailabilityChanged,
    /// Device administratively removed
    DeviceRemoved,
    /// Port appeared on a device
    PortAdded,
    /// Port enabled flag changed
    PortUpdated,
    /// Port pruned from a device
    PortRemoved,
}

impl std::fmt::Display for InventoryEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InventoryEventKind::DeviceAdded => "DEVICE_ADDED",
            InventoryEventKind::DeviceUpdated => "DEVICE_UPDATED",
            InventoryEventKind::AvailabilityChanged => "AVAILABILITY_CHANGED",
            InventoryEventKind::DeviceRemoved => "DEVICE_REMOVED",
            InventoryEventKind::PortAdded => "PORT_ADDED",
            InventoryEventKind::PortUpdated => "PORT_UPDATED",
            InventoryEventKind::PortRemoved => "PORT_REMOVED",
        };
        write!(f, "{}", name)
    }
}

/// One inventory change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryEvent {
    /// Event type
    pub kind: InventoryEventKind,

    /// Subject device
    pub device: DeviceId,

    /// Port subject (port events only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<PortDescriptor>,

    /// New availability (availability events only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,

    /// Local emission time
    pub timestamp: DateTime<Utc>,
}

impl InventoryEvent {
    fn new(kind: InventoryEventKind, device: DeviceId) -> Self {
        Self {
            kind,
            device,
            port: None,
            available: None,
            timestamp: Utc::now(),
        }
    }

    /// A DEVICE_ADDED event
    pub fn device_added(device: DeviceId) -> Self {
        Self::new(InventoryEventKind::DeviceAdded, device)
    }

    /// A DEVICE_UPDATED event
    pub fn device_updated(device: DeviceId) -> Self {
        Self::new(InventoryEventKind::DeviceUpdated, device)
    }

    /// An AVAILABILITY_CHANGED event
    pub fn availability_changed(device: DeviceId, available: bool) -> Self {
        let mut event = Self::new(InventoryEventKind::AvailabilityChanged, device);
        event.available = Some(available);
        event
    }

    /// A DEVICE_REMOVED event
    pub fn device_removed(device: DeviceId) -> Self {
        Self::new(InventoryEventKind::DeviceRemoved, device)
    }

    /// A PORT_ADDED event
    pub fn port_added(device: DeviceId, port: PortDescriptor) -> Self {
        let mut event = Self::new(InventoryEventKind::PortAdded, device);
        event.port = Some(port);
        event
    }

    /// A PORT_UPDATED event
    pub fn port_updated(device: DeviceId, port: PortDescriptor) -> Self {
        let mut event = Self::new(InventoryEventKind::PortUpdated, device);
        event.port = Some(port);
        event
    }

    /// A PORT_REMOVED event carrying the last stored state of the port
    pub fn port_removed(device: DeviceId, port: PortDescriptor) -> Self {
        let mut event = Self::new(InventoryEventKind::PortRemoved, device);
        event.port = Some(port);
        event
    }
}
