//! Device Lifecycle Coordinator.
//!
//! Consumes southbound provider callbacks and mastership-change
//! notifications, applies the mastership-fencing protocol before mutating
//! the inventory store, and drives role instructions back to providers.
//!
//! Per-device state machine on each node: `NONE → MASTER ↔ STANDBY`,
//! transitioned by oracle notifications; MASTER is also exited when a
//! provider reports it cannot assert the role.

mod config;
mod controller;

pub use config::CoordinatorConfig;
pub use controller::DeviceCoordinator;
