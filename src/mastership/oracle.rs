//! Mastership Oracle boundary.
//!
//! The election algorithm is external; the coordinator only reads terms and
//! requests changes through [`MastershipOracle`]. Calls may be remote round
//! trips, so every mutating or term-reading call is fallible and must be
//! bounded in latency by the implementation; the coordinator treats any
//! failure as lost mastership.
//!
//! [`InMemoryOracle`] is the standalone/test implementation: deterministic
//! first-requester-wins seating with FIFO standby promotion. Multi-node
//! tests create one shared oracle and one [`OracleView`] per simulated
//! node.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::cluster::NodeId;
use crate::inventory::DeviceId;

use super::errors::{MastershipError, MastershipResult};
use super::role::MastershipRole;
use super::term::{MastershipEvent, MastershipTerm};

/// Node-scoped view of the cluster's mastership state.
pub trait MastershipOracle: Send + Sync {
    /// Ask for mastership of a device. Returns the role the oracle settled
    /// on for the local node: `Master` if granted (or already held),
    /// `Standby` if another node holds the device.
    fn request_mastership(&self, device: &DeviceId) -> MastershipResult<MastershipRole>;

    /// The role currently recorded for the local node, without contending.
    fn local_role(&self, device: &DeviceId) -> MastershipRole;

    /// The current term for a device, `None` if the device has never been
    /// contended.
    fn term(&self, device: &DeviceId) -> MastershipResult<Option<MastershipTerm>>;

    /// Withdraw the local node from mastership and standby candidacy.
    fn relinquish(&self, device: &DeviceId) -> MastershipResult<()>;
}

#[derive(Debug, Clone, Default)]
struct TermState {
    generation: u64,
    master: Option<NodeId>,
    backups: Vec<NodeId>,
}

/// Deterministic in-memory oracle shared by all simulated nodes.
///
/// Mastership-change notifications are queued; the hosting runtime (or
/// test) drains them with [`InMemoryOracle::drain_events`] and feeds them
/// to each node's coordinator, which is exactly the asynchronous delivery
/// the real collaborator exhibits.
pub struct InMemoryOracle {
    terms: RwLock<HashMap<DeviceId, TermState>>,
    events: Mutex<Vec<MastershipEvent>>,
}

impl InMemoryOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            terms: RwLock::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
        })
    }

    /// A node-scoped handle implementing [`MastershipOracle`].
    pub fn view(self: &Arc<Self>, node: NodeId) -> OracleView {
        OracleView {
            node,
            inner: Arc::clone(self),
        }
    }

    /// Drain queued mastership-change notifications in emission order.
    pub fn drain_events(&self) -> Vec<MastershipEvent> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }

    fn push_event(&self, device: &DeviceId, state: &TermState) {
        if let Ok(mut events) = self.events.lock() {
            events.push(MastershipEvent {
                device: device.clone(),
                master: state.master,
                backups: state.backups.clone(),
            });
        }
    }

    fn request(&self, node: NodeId, device: &DeviceId) -> MastershipRole {
        let mut terms = match self.terms.write() {
            Ok(terms) => terms,
            Err(_) => return MastershipRole::None,
        };
        let state = terms.entry(device.clone()).or_default();

        if state.master == Some(node) {
            return MastershipRole::Master;
        }
        if state.master.is_none() {
            // Seat the requester; the generation bumps on every master change
            state.generation += 1;
            state.master = Some(node);
            state.backups.retain(|n| *n != node);
            let snapshot = state.clone();
            drop(terms);
            self.push_event(device, &snapshot);
            return MastershipRole::Master;
        }

        if !state.backups.contains(&node) {
            state.backups.push(node);
            let snapshot = state.clone();
            drop(terms);
            self.push_event(device, &snapshot);
        }
        MastershipRole::Standby
    }

    fn role(&self, node: NodeId, device: &DeviceId) -> MastershipRole {
        self.terms
            .read()
            .ok()
            .and_then(|terms| {
                terms.get(device).map(|state| {
                    if state.master == Some(node) {
                        MastershipRole::Master
                    } else if state.backups.contains(&node) {
                        MastershipRole::Standby
                    } else {
                        MastershipRole::None
                    }
                })
            })
            .unwrap_or(MastershipRole::None)
    }

    fn current_term(&self, device: &DeviceId) -> Option<MastershipTerm> {
        self.terms.read().ok().and_then(|terms| {
            terms.get(device).map(|state| MastershipTerm {
                device: device.clone(),
                generation: state.generation,
                master: state.master,
                backups: state.backups.clone(),
            })
        })
    }

    fn withdraw(&self, node: NodeId, device: &DeviceId) {
        let mut terms = match self.terms.write() {
            Ok(terms) => terms,
            Err(_) => return,
        };
        let Some(state) = terms.get_mut(device) else {
            return;
        };

        let mut changed = false;
        if state.master == Some(node) {
            state.master = None;
            changed = true;
            // FIFO promotion of the first standby, bumping the generation
            if !state.backups.is_empty() {
                let promoted = state.backups.remove(0);
                state.generation += 1;
                state.master = Some(promoted);
            }
        }
        let before = state.backups.len();
        state.backups.retain(|n| *n != node);
        changed |= state.backups.len() != before;

        if changed {
            let snapshot = state.clone();
            drop(terms);
            self.push_event(device, &snapshot);
        }
    }
}

/// Per-node handle onto a shared [`InMemoryOracle`].
pub struct OracleView {
    node: NodeId,
    inner: Arc<InMemoryOracle>,
}

impl MastershipOracle for OracleView {
    fn request_mastership(&self, device: &DeviceId) -> MastershipResult<MastershipRole> {
        Ok(self.inner.request(self.node, device))
    }

    fn local_role(&self, device: &DeviceId) -> MastershipRole {
        self.inner.role(self.node, device)
    }

    fn term(&self, device: &DeviceId) -> MastershipResult<Option<MastershipTerm>> {
        Ok(self.inner.current_term(device))
    }

    fn relinquish(&self, device: &DeviceId) -> MastershipResult<()> {
        self.inner.withdraw(self.node, device);
        Ok(())
    }
}

/// Always-failing oracle, for exercising degraded paths in tests.
pub struct UnavailableOracle;

impl MastershipOracle for UnavailableOracle {
    fn request_mastership(&self, device: &DeviceId) -> MastershipResult<MastershipRole> {
        Err(MastershipError::OracleUnavailable(device.to_string()))
    }

    fn local_role(&self, _device: &DeviceId) -> MastershipRole {
        MastershipRole::None
    }

    fn term(&self, device: &DeviceId) -> MastershipResult<Option<MastershipTerm>> {
        Err(MastershipError::OracleUnavailable(device.to_string()))
    }

    fn relinquish(&self, device: &DeviceId) -> MastershipResult<()> {
        Err(MastershipError::OracleUnavailable(device.to_string()))
    }
}
