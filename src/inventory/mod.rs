//! Device Inventory Store.
//!
//! The replicated cache of device descriptors, per-device port maps, and
//! availability flags. The store computes diffs, applies last-writer-wins
//! merge through the cluster tables, and emits precise change events.
//!
//! Core invariants:
//! - A descriptor exists iff some provider reported the device connected
//!   and no administrative removal happened since; disconnect only clears
//!   availability.
//! - Mutations are admitted only under the current mastership term for the
//!   device; stale terms are fenced at the storage layer.
//! - A device's port set is always fully replaced by the most recent
//!   accepted update, never partially merged from two concurrent updates.

mod errors;
mod events;
mod store;
mod types;

pub use errors::{InventoryError, InventoryErrorKind, InventoryResult};
pub use events::{InventoryEvent, InventoryEventKind};
pub use store::DeviceStore;
pub use types::{
    DeviceDescriptor, DeviceId, DeviceRecord, DeviceType, PortDescriptor, PortKey, PortNumber,
    PortType, ProviderId,
};
