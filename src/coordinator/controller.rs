//! Device Lifecycle Coordinator.
//!
//! Every southbound notification is gated through cluster mastership
//! before it may touch the inventory, and every mastership change is
//! answered with a role instruction back to the owning provider.
//!
//! Failure semantics: correctness depends on eventual convergence, not on
//! any single call succeeding. Oracle calls that fail or race resolve to
//! the NONE/STANDBY fallback and a warning log; no southbound operation
//! ever observes a hard error. The one exception is administrative
//! removal, which has no "next event" to retry it and therefore surfaces
//! its result synchronously.
//!
//! The coordinator performs no cross-call locking. Each operation is
//! self-contained and idempotent-safe; cluster-wide mutual exclusion per
//! device is exactly what the mastership oracle provides, and same-node
//! thread races serialize inside the store's conditional updates.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::inventory::{
    DeviceDescriptor, DeviceId, DeviceStore, InventoryEvent, InventoryEventKind, InventoryResult,
    PortDescriptor, ProviderId,
};
use crate::mastership::{
    MastershipEvent, MastershipOracle, MastershipRole, RoleTable, TermClock,
};
use crate::notify::{EventDispatcher, EventReceiver};
use crate::observability::{error_event, log_event, warn_event, Event};
use crate::provider::ProviderRegistry;

use super::config::CoordinatorConfig;

/// Coordinates southbound reports, mastership, the inventory store, and
/// event delivery for one cluster node.
pub struct DeviceCoordinator {
    config: CoordinatorConfig,
    oracle: Arc<dyn MastershipOracle>,
    clock: Arc<TermClock>,
    store: Arc<DeviceStore>,
    providers: Arc<ProviderRegistry>,
    roles: RoleTable,
    dispatcher: Arc<EventDispatcher>,
    remote_events: Mutex<EventReceiver>,
}

impl DeviceCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        oracle: Arc<dyn MastershipOracle>,
        providers: Arc<ProviderRegistry>,
    ) -> Self {
        let clock = Arc::new(TermClock::new());
        let store = Arc::new(DeviceStore::new(Arc::clone(&clock)));
        let (tx, rx) = mpsc::unbounded_channel();
        store.set_remote_event_sender(tx);

        Self {
            config,
            oracle,
            clock,
            store,
            providers,
            roles: RoleTable::new(),
            dispatcher: Arc::new(EventDispatcher::new()),
            remote_events: Mutex::new(rx),
        }
    }

    /// Local node identity.
    pub fn node(&self) -> crate::cluster::NodeId {
        self.config.node
    }

    /// The inventory store this coordinator mutates.
    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.store
    }

    /// The event sink subscribers attach to.
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// The local role currently held for a device.
    pub fn local_role(&self, device: &DeviceId) -> MastershipRole {
        self.roles.role(device)
    }

    // =========================================================================
    // Southbound callbacks
    // =========================================================================

    /// A provider reports a device connected.
    ///
    /// Mastership is requested first; if another node owns the device this
    /// call is a no-op beyond recording standby candidacy. On a grant the
    /// current term is re-read and verified before any store mutation,
    /// closing the window where mastership flips between grant and write.
    pub fn connect(&self, provider: ProviderId, device: DeviceId, descriptor: DeviceDescriptor) {
        let role = match self.oracle.request_mastership(&device) {
            Ok(role) => role,
            Err(err) => {
                warn_event(
                    Event::OracleUnavailable,
                    &[("device", device.as_str()), ("error", &err.to_string())],
                );
                return;
            }
        };
        if !role.is_master() {
            // Another node owns the device; it will record the connect
            self.roles.apply(&device, role);
            return;
        }

        let Some(term) = self.verified_term(&device) else {
            self.roles.apply(&device, MastershipRole::Standby);
            return;
        };
        self.clock.set_active_term(&device, term.generation);

        match self
            .store
            .create_or_update(provider.clone(), device.clone(), descriptor)
        {
            Ok(Some(event)) => {
                let logged = if event.kind == InventoryEventKind::DeviceUpdated {
                    Event::DeviceUpdated
                } else {
                    Event::DeviceConnected
                };
                log_event(
                    logged,
                    &[
                        ("device", device.as_str()),
                        ("term", &term.generation.to_string()),
                    ],
                );
                self.dispatcher.dispatch(&event);
            }
            Ok(None) => {}
            Err(err) if err.is_stale() => {
                warn_event(
                    Event::StaleWriteRejected,
                    &[("device", device.as_str()), ("error", &err.to_string())],
                );
                return;
            }
            Err(err) => {
                error_event(
                    Event::StoreWriteFailed,
                    &[("device", device.as_str()), ("error", &err.to_string())],
                );
                return;
            }
        }

        let change = self.roles.apply(&device, MastershipRole::Master);
        if change.changed() {
            log_event(Event::MastershipAcquired, &[("device", device.as_str())]);
        }
        if let Some(p) = self.providers.get(&provider) {
            p.role_changed(&device, MastershipRole::Master);
        }
    }

    /// A provider reports a device disconnected.
    ///
    /// Only the master marks the device offline; other nodes just withdraw
    /// their candidacy. A stale-write rejection here usually means
    /// mastership moved but the term notification has not arrived yet, so
    /// the term is re-fetched and the mark retried once if this node is
    /// still the recorded master. Candidacy is relinquished afterwards in
    /// every case.
    pub fn disconnect(&self, device: &DeviceId) {
        if !self.roles.is_master(device) {
            let _ = self.oracle.relinquish(device);
            self.roles.apply(device, MastershipRole::None);
            return;
        }

        let mut outcome = self.store.mark_offline(device);
        if matches!(&outcome, Err(err) if err.is_stale()) {
            if let Ok(Some(term)) = self.oracle.term(device) {
                if term.is_master(&self.config.node) {
                    self.clock.set_active_term(device, term.generation);
                    outcome = self.store.mark_offline(device);
                }
            }
        }

        match outcome {
            Ok(Some(event)) => {
                log_event(Event::DeviceOffline, &[("device", device.as_str())]);
                self.dispatcher.dispatch(&event);
            }
            Ok(None) => {}
            Err(err) => {
                warn_event(
                    Event::StaleWriteRejected,
                    &[("device", device.as_str()), ("error", &err.to_string())],
                );
            }
        }

        if self.oracle.relinquish(device).is_err() {
            warn_event(Event::OracleUnavailable, &[("device", device.as_str())]);
        }
        let change = self.roles.apply(device, MastershipRole::None);
        if change.previous.is_master() {
            log_event(Event::MastershipLost, &[("device", device.as_str())]);
        }
    }

    /// A provider reports the full port list of a device.
    pub fn update_ports(&self, device: &DeviceId, ports: Vec<PortDescriptor>) {
        if !self.roles.is_master(device) {
            return;
        }
        match self.store.update_ports(device, ports) {
            Ok(events) => {
                if !events.is_empty() {
                    log_event(
                        Event::PortsUpdated,
                        &[
                            ("device", device.as_str()),
                            ("events", &events.len().to_string()),
                        ],
                    );
                }
                self.dispatcher.dispatch_all(&events);
            }
            Err(err) => {
                warn_event(
                    Event::StaleWriteRejected,
                    &[("device", device.as_str()), ("error", &err.to_string())],
                );
            }
        }
    }

    /// A provider reports a single port status change.
    pub fn port_status_changed(&self, device: &DeviceId, port: PortDescriptor) {
        if !self.roles.is_master(device) {
            return;
        }
        match self.store.update_port_status(device, &port) {
            Ok(Some(event)) => {
                log_event(
                    Event::PortStatusChanged,
                    &[
                        ("device", device.as_str()),
                        ("port", &port.number.to_string()),
                    ],
                );
                self.dispatcher.dispatch(&event);
            }
            Ok(None) => {}
            Err(err) => {
                warn_event(
                    Event::StaleWriteRejected,
                    &[("device", device.as_str()), ("error", &err.to_string())],
                );
            }
        }
    }

    /// A provider reports it could not assert the master role on the
    /// device. Mastership is handed back so another node can take over.
    pub fn role_assert_failed(&self, device: &DeviceId) {
        warn_event(Event::MastershipLost, &[("device", device.as_str())]);
        let _ = self.oracle.relinquish(device);
        self.roles.apply(device, MastershipRole::Standby);
    }

    // =========================================================================
    // Mastership callbacks
    // =========================================================================

    /// A mastership-change notification from the oracle.
    ///
    /// Notifications can be stale: before acting as master the current term
    /// is re-read, and on mismatch this node steps back to standby instead
    /// of split-braining. A known-but-offline device is re-probed on
    /// takeover to recover updates missed during the handoff.
    pub fn on_mastership_event(&self, event: &MastershipEvent) {
        let node = self.config.node;
        match event.role_of(&node) {
            MastershipRole::Master => {
                let Some(term) = self.verified_term(&event.device) else {
                    let _ = self.oracle.relinquish(&event.device);
                    self.roles.apply(&event.device, MastershipRole::Standby);
                    return;
                };
                self.clock.set_active_term(&event.device, term.generation);

                if self.config.reprobe_on_handoff
                    && self.store.is_known(&event.device)
                    && !self.store.is_available(&event.device)
                {
                    self.reprobe(&event.device);
                }

                let change = self.roles.apply(&event.device, MastershipRole::Master);
                if change.changed() {
                    log_event(
                        Event::MastershipAcquired,
                        &[
                            ("device", event.device.as_str()),
                            ("term", &term.generation.to_string()),
                        ],
                    );
                }
                self.instruct_provider(&event.device, MastershipRole::Master);
            }
            MastershipRole::Standby => {
                let change = self.roles.apply(&event.device, MastershipRole::Standby);
                if change.changed() {
                    log_event(Event::StandbyEntered, &[("device", event.device.as_str())]);
                }
                self.instruct_provider(&event.device, MastershipRole::Standby);
            }
            MastershipRole::None => {
                let change = self.roles.apply(&event.device, MastershipRole::None);
                if change.previous.is_master() {
                    log_event(Event::MastershipLost, &[("device", event.device.as_str())]);
                }
            }
        }
    }

    // =========================================================================
    // Administrative operations
    // =========================================================================

    /// Administratively remove a device from the inventory.
    ///
    /// Deliberately not gated on mastership: removal is a cluster-wide
    /// operation validated by the caller. This is the one path where
    /// failure surfaces synchronously, since no later event retries it.
    pub fn remove_device(&self, device: &DeviceId) -> InventoryResult<()> {
        let event = self.store.remove(device)?;
        if let Some(event) = event {
            log_event(Event::DeviceRemoved, &[("device", device.as_str())]);
            self.dispatcher.dispatch(&event);
        }
        let _ = self.oracle.relinquish(device);
        self.roles.forget(device);
        self.clock.forget(device);
        Ok(())
    }

    // =========================================================================
    // Replication plumbing
    // =========================================================================

    /// Forward inventory events produced by remote merges to subscribers.
    /// Returns the number of events delivered to the dispatcher.
    pub fn drain_remote_events(&self) -> usize {
        let mut drained: Vec<InventoryEvent> = Vec::new();
        if let Ok(mut rx) = self.remote_events.lock() {
            while let Ok(event) = rx.try_recv() {
                drained.push(event);
            }
        }
        for event in &drained {
            self.dispatcher.dispatch(event);
        }
        drained.len()
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Re-read the current term and verify this node is its recorded
    /// master. `None` means "do not act as master": either the oracle was
    /// unreachable or the grant was already overtaken.
    fn verified_term(&self, device: &DeviceId) -> Option<crate::mastership::MastershipTerm> {
        let term = match self.oracle.term(device) {
            Ok(Some(term)) => term,
            Ok(None) => return None,
            Err(err) => {
                warn_event(
                    Event::OracleUnavailable,
                    &[("device", device.as_str()), ("error", &err.to_string())],
                );
                return None;
            }
        };
        if !term.is_master(&self.config.node) {
            warn_event(
                Event::StaleMastershipNotification,
                &[
                    ("device", device.as_str()),
                    ("term", &term.generation.to_string()),
                ],
            );
            return None;
        }
        Some(term)
    }

    fn reprobe(&self, device: &DeviceId) {
        let Some(record) = self.store.device(device) else {
            return;
        };
        if let Some(provider) = self.providers.get(&record.provider) {
            log_event(Event::DeviceReprobed, &[("device", device.as_str())]);
            provider.trigger_probe(device);
        }
    }

    fn instruct_provider(&self, device: &DeviceId, role: MastershipRole) {
        let Some(record) = self.store.device(device) else {
            return;
        };
        if let Some(provider) = self.providers.get(&record.provider) {
            provider.role_changed(device, role);
        }
    }
}
