//! netfabric - mastership-gated device/port inventory core for a
//! distributed network control plane
//!
//! Multiple cluster nodes jointly manage a shared inventory of network
//! devices and ports; each device is administered by exactly one node at a
//! time. This crate holds the state machine reconciling southbound
//! connect/disconnect/port reports against cluster-wide mastership, and
//! the replicated store recording device and port state with eventually
//! consistent propagation and change events.

pub mod cluster;
pub mod coordinator;
pub mod inventory;
pub mod mastership;
pub mod notify;
pub mod observability;
pub mod provider;
