//! Device Inventory Store.
//!
//! Holds the cluster-replicated device and port state behind three keyed
//! tables (devices, ports, availability), computes diffs against incoming
//! southbound reports, and emits precise change events.
//!
//! Admission rule: every mutation carries a write timestamp minted by the
//! [`TermClock`] for the subject device, and is admitted only if its term
//! is at least the highest term observed in any stored entry for that
//! device. The tables additionally reject timestamps that do not exceed
//! the stored entry's, so a writer whose mastership term has passed is
//! fenced at the storage layer even if its caller-level role check raced
//! a handoff, including writes to keys the newer term never touched.
//!
//! Events for remote changes (entries merged from peer replicas) are
//! forwarded through an unbounded channel registered by the coordinator;
//! the store never holds a reference back to it.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cluster::{EcMap, MapChange, Origin, Timestamp, WriteResult};
use crate::mastership::TermClock;
use crate::observability::{log_event, warn_event, Event};

use super::errors::{InventoryError, InventoryResult};
use super::events::InventoryEvent;
use super::types::{
    DeviceDescriptor, DeviceId, DeviceRecord, PortDescriptor, PortKey, PortNumber, ProviderId,
};

/// Outcome branch of a create-or-update, used to pick the emitted event.
enum ConnectBranch {
    Added,
    Updated,
    Unchanged,
}

/// Replicated inventory of devices, ports, and availability flags.
pub struct DeviceStore {
    clock: Arc<TermClock>,
    devices: EcMap<DeviceId, DeviceRecord>,
    ports: EcMap<PortKey, PortDescriptor>,
    availability: EcMap<DeviceId, bool>,
}

impl DeviceStore {
    pub fn new(clock: Arc<TermClock>) -> Self {
        Self {
            clock,
            devices: EcMap::new("devices"),
            ports: EcMap::new("ports"),
            availability: EcMap::new("availability"),
        }
    }

    /// Register the channel remote-merge events are forwarded through.
    ///
    /// Only changes of remote origin flow here; events for local mutations
    /// are returned from the mutating call itself so local emission order
    /// matches application order.
    pub fn set_remote_event_sender(&self, sender: mpsc::UnboundedSender<InventoryEvent>) {
        let tx = sender.clone();
        self.devices.set_listener(Box::new(
            move |change: &MapChange<DeviceId, DeviceRecord>| {
                if change.origin != Origin::Remote {
                    return;
                }
                let event = match (&change.old, &change.new) {
                    (None, Some(_)) => InventoryEvent::device_added(change.key.clone()),
                    (Some(_), Some(_)) => {
                        // A remote write replaced a live local record:
                        // concurrent writers resolved by last-writer-wins
                        warn_event(
                            Event::ReplicationConflictResolved,
                            &[("device", change.key.as_str())],
                        );
                        InventoryEvent::device_updated(change.key.clone())
                    }
                    (Some(_), None) => InventoryEvent::device_removed(change.key.clone()),
                    (None, None) => return,
                };
                log_event(Event::RemoteEventApplied, &[("device", change.key.as_str())]);
                let _ = tx.send(event);
            },
        ));

        let tx = sender.clone();
        self.availability
            .set_listener(Box::new(move |change: &MapChange<DeviceId, bool>| {
                if change.origin != Origin::Remote {
                    return;
                }
                let Some(available) = change.new else {
                    // Tombstone from a removal; the device event covers it
                    return;
                };
                if change.old == Some(available) {
                    return;
                }
                let _ = tx.send(InventoryEvent::availability_changed(
                    change.key.clone(),
                    available,
                ));
            }));

        let tx = sender;
        self.ports
            .set_listener(Box::new(move |change: &MapChange<PortKey, PortDescriptor>| {
                if change.origin != Origin::Remote {
                    return;
                }
                let device = change.key.device.clone();
                let event = match (&change.old, &change.new) {
                    (None, Some(new)) => InventoryEvent::port_added(device, new.clone()),
                    (Some(old), Some(new)) if old.enabled != new.enabled => {
                        InventoryEvent::port_updated(device, new.clone())
                    }
                    (Some(old), None) => InventoryEvent::port_removed(device, old.clone()),
                    _ => return,
                };
                let _ = tx.send(event);
            }));
    }

    // =========================================================================
    // Mutations (mastership-fenced)
    // =========================================================================

    /// Record a device connection or attribute update.
    ///
    /// Three-way branch, so subscribers can tell "device replaced" from
    /// "link flapped":
    /// - unknown device: store the descriptor, emit DEVICE_ADDED
    /// - hw/sw version changed: replace wholesale, emit DEVICE_UPDATED
    /// - descriptor unchanged: only the availability flag is raised;
    ///   AVAILABILITY_CHANGED if it was down, no event if already up
    pub fn create_or_update(
        &self,
        provider: ProviderId,
        device: DeviceId,
        descriptor: DeviceDescriptor,
    ) -> InventoryResult<Option<InventoryEvent>> {
        let ts = self.admit(&device)?;

        let mut branch = ConnectBranch::Unchanged;
        let result = self
            .devices
            .update(device.clone(), ts, |current| match current {
                None => {
                    branch = ConnectBranch::Added;
                    Some(DeviceRecord {
                        provider: provider.clone(),
                        descriptor: descriptor.clone(),
                    })
                }
                Some(record) if record.descriptor.differs_from(&descriptor) => {
                    branch = ConnectBranch::Updated;
                    Some(DeviceRecord {
                        provider: provider.clone(),
                        descriptor: descriptor.clone(),
                    })
                }
                Some(_) => None,
            })?;
        self.reject_if_stale(&device, &result, ts)?;

        match branch {
            ConnectBranch::Added => {
                self.raise_availability_after_accept(&device, ts)?;
                Ok(Some(InventoryEvent::device_added(device)))
            }
            ConnectBranch::Updated => {
                self.raise_availability_after_accept(&device, ts)?;
                Ok(Some(InventoryEvent::device_updated(device)))
            }
            ConnectBranch::Unchanged => {
                let result = self.availability.update(device.clone(), ts, |current| {
                    if current == Some(&true) {
                        None
                    } else {
                        Some(true)
                    }
                })?;
                self.reject_if_stale(&device, &result, ts)?;
                if result.is_accepted() {
                    Ok(Some(InventoryEvent::availability_changed(device, true)))
                } else {
                    // Pure reconnect of an already-online device
                    Ok(None)
                }
            }
        }
    }

    /// Clear the availability flag. Emits AVAILABILITY_CHANGED only on a
    /// true→false transition; unknown or already-offline devices are a
    /// no-op.
    pub fn mark_offline(&self, device: &DeviceId) -> InventoryResult<Option<InventoryEvent>> {
        if !self.devices.contains(device) {
            return Ok(None);
        }
        let ts = self.admit(device)?;

        let result = self.availability.update(device.clone(), ts, |current| {
            if current == Some(&true) {
                Some(false)
            } else {
                None
            }
        })?;
        self.reject_if_stale(device, &result, ts)?;

        if result.is_accepted() {
            Ok(Some(InventoryEvent::availability_changed(
                device.clone(),
                false,
            )))
        } else {
            Ok(None)
        }
    }

    /// Re-synchronize the full port list of a device. The incoming list is
    /// the new ground truth:
    /// - absent ports are created (PORT_ADDED)
    /// - present ports are updated only when the enabled flag differs
    ///   (PORT_UPDATED); other differences keep port identity stable
    /// - stored ports missing from the list are pruned (PORT_REMOVED)
    pub fn update_ports(
        &self,
        device: &DeviceId,
        incoming: Vec<PortDescriptor>,
    ) -> InventoryResult<Vec<InventoryEvent>> {
        if !self.devices.contains(device) {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        for descriptor in &incoming {
            match self.apply_port(device, descriptor) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(err) => return self.fenced_mid_batch(device, events, err),
            }
        }

        let incoming_numbers: Vec<PortNumber> = incoming.iter().map(|p| p.number).collect();
        for (key, stored) in self.ports.entries() {
            if key.device != *device || incoming_numbers.contains(&key.number) {
                continue;
            }
            match self.prune_port(device, key) {
                Ok(true) => events.push(InventoryEvent::port_removed(device.clone(), stored)),
                Ok(false) => {}
                Err(err) => return self.fenced_mid_batch(device, events, err),
            }
        }

        Ok(events)
    }

    /// Apply a single port status report. Same enabled-flag-only update
    /// rule as [`DeviceStore::update_ports`]; unknown devices and unknown
    /// ports are a no-op.
    pub fn update_port_status(
        &self,
        device: &DeviceId,
        descriptor: &PortDescriptor,
    ) -> InventoryResult<Option<InventoryEvent>> {
        if !self.devices.contains(device) {
            return Ok(None);
        }
        let key = PortKey::new(device.clone(), descriptor.number);
        if !self.ports.contains(&key) {
            return Ok(None);
        }
        self.apply_port(device, descriptor)
    }

    /// Administrative removal: deletes the device, its ports, and its
    /// availability flag. Emits DEVICE_REMOVED if the device existed.
    ///
    /// Removal bypasses mastership, so the tombstone timestamp is taken
    /// from the active term when this node holds one and otherwise derived
    /// from the newest entry the removal deletes, ensuring the delete is
    /// never fenced out by the device's own history. Port and availability
    /// writes land at later ticks than the device record, so the device
    /// record's timestamp alone is not enough.
    pub fn remove(&self, device: &DeviceId) -> InventoryResult<Option<InventoryEvent>> {
        let Some(stored) = self.devices.versioned(device) else {
            return Ok(None);
        };
        if stored.value.is_none() {
            return Ok(None);
        }

        let mut newest = stored.timestamp;
        for (key, entry) in self.ports.export() {
            if key.device == *device && entry.timestamp > newest {
                newest = entry.timestamp;
            }
        }
        if let Some(entry) = self.availability.versioned(device) {
            if entry.timestamp > newest {
                newest = entry.timestamp;
            }
        }

        let successor = Timestamp::new(newest.term, newest.tick + 1);
        let ts = match self.clock.timestamp(device) {
            Ok(clock_ts) if clock_ts > successor => clock_ts,
            _ => successor,
        };

        let result = self.devices.remove(device.clone(), ts)?;
        if !result.is_accepted() {
            // A newer write landed between the read and the delete
            return Err(InventoryError::stale_mastership(format!(
                "remove of {} lost to a newer write",
                device
            )));
        }

        for (key, _) in self.ports.entries() {
            if key.device == *device {
                self.ports.remove(key, ts)?;
            }
        }
        self.availability.remove(device.clone(), ts)?;

        Ok(Some(InventoryEvent::device_removed(device.clone())))
    }

    // =========================================================================
    // Reads (served from the local cache)
    // =========================================================================

    /// The stored record for a device.
    pub fn device(&self, device: &DeviceId) -> Option<DeviceRecord> {
        self.devices.get(device)
    }

    /// The stored descriptor for a device.
    pub fn descriptor(&self, device: &DeviceId) -> Option<DeviceDescriptor> {
        self.devices.get(device).map(|r| r.descriptor)
    }

    /// All known devices.
    pub fn devices(&self) -> Vec<(DeviceId, DeviceRecord)> {
        self.devices.entries()
    }

    /// Number of known devices.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Whether a device is known.
    pub fn is_known(&self, device: &DeviceId) -> bool {
        self.devices.contains(device)
    }

    /// Whether a device is currently available.
    pub fn is_available(&self, device: &DeviceId) -> bool {
        self.availability.get(device).unwrap_or(false)
    }

    /// Devices whose availability flag is raised.
    pub fn available_devices(&self) -> Vec<DeviceId> {
        self.availability
            .entries()
            .into_iter()
            .filter_map(|(device, available)| available.then_some(device))
            .collect()
    }

    /// Ports of a device, ordered by port number.
    pub fn ports(&self, device: &DeviceId) -> Vec<PortDescriptor> {
        let mut ports: Vec<PortDescriptor> = self
            .ports
            .entries()
            .into_iter()
            .filter_map(|(key, port)| (key.device == *device).then_some(port))
            .collect();
        ports.sort_by_key(|p| p.number);
        ports
    }

    /// A single port of a device.
    pub fn port(&self, device: &DeviceId, number: PortNumber) -> Option<PortDescriptor> {
        self.ports.get(&PortKey::new(device.clone(), number))
    }

    // =========================================================================
    // Replication
    // =========================================================================

    /// Push this replica's full state into a peer (anti-entropy). The peer
    /// applies last-writer-wins per entry and surfaces resulting events on
    /// its remote-event channel.
    pub fn push_sync(&self, peer: &DeviceStore) -> InventoryResult<usize> {
        let mut applied = 0;
        applied += peer.devices.merge_export(self.devices.export())?;
        applied += peer.ports.merge_export(self.ports.export())?;
        applied += peer.availability.merge_export(self.availability.export())?;
        Ok(applied)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Produce an admitted write timestamp for a mutation of `device`.
    ///
    /// Admission is device-scoped: once any stored entry for the device
    /// carries a newer mastership term, every write from an older term is
    /// refused, including writes to keys that newer term never touched.
    /// This is what keeps a whole port batch from a stale writer out
    /// instead of letting its unseen keys slip through per-entry fencing.
    fn admit(&self, device: &DeviceId) -> InventoryResult<Timestamp> {
        let ts = self.clock.timestamp(device)?;
        let observed = self.observed_term(device);
        if ts.term < observed {
            return Err(InventoryError::stale_mastership(format!(
                "write to {} under term {} refused; term {} already observed",
                device, ts.term, observed
            )));
        }
        Ok(ts)
    }

    /// Highest mastership term carried by any stored entry for the device,
    /// tombstones included.
    fn observed_term(&self, device: &DeviceId) -> u64 {
        let mut observed = 0;
        if let Some(entry) = self.devices.versioned(device) {
            observed = observed.max(entry.timestamp.term);
        }
        if let Some(entry) = self.availability.versioned(device) {
            observed = observed.max(entry.timestamp.term);
        }
        for (key, entry) in self.ports.export() {
            if key.device == *device {
                observed = observed.max(entry.timestamp.term);
            }
        }
        observed
    }

    /// A later step of a batch was fenced after earlier writes landed.
    /// The landed writes are durable, so their events must still reach
    /// subscribers; the fence itself degrades to a warning. A fence before
    /// any write landed stays a hard error.
    fn fenced_mid_batch(
        &self,
        device: &DeviceId,
        events: Vec<InventoryEvent>,
        err: InventoryError,
    ) -> InventoryResult<Vec<InventoryEvent>> {
        if events.is_empty() || !err.is_stale() {
            return Err(err);
        }
        warn_event(
            Event::StaleWriteRejected,
            &[("device", device.as_str()), ("error", &err.to_string())],
        );
        Ok(events)
    }

    fn prune_port(&self, device: &DeviceId, key: PortKey) -> InventoryResult<bool> {
        let ts = self.admit(device)?;
        let result = self.ports.remove(key, ts)?;
        self.reject_if_stale(device, &result, ts)?;
        Ok(result.is_accepted())
    }

    fn apply_port(
        &self,
        device: &DeviceId,
        descriptor: &PortDescriptor,
    ) -> InventoryResult<Option<InventoryEvent>> {
        let ts = self.admit(device)?;
        let key = PortKey::new(device.clone(), descriptor.number);

        let mut added = false;
        let result = self.ports.update(key, ts, |current| match current {
            None => {
                added = true;
                Some(descriptor.clone())
            }
            Some(stored) if stored.enabled != descriptor.enabled => Some(descriptor.clone()),
            Some(_) => None,
        })?;
        self.reject_if_stale(device, &result, ts)?;

        if !result.is_accepted() {
            return Ok(None);
        }
        let event = if added {
            InventoryEvent::port_added(device.clone(), descriptor.clone())
        } else {
            InventoryEvent::port_updated(device.clone(), descriptor.clone())
        };
        Ok(Some(event))
    }

    fn raise_availability(&self, device: &DeviceId, ts: Timestamp) -> InventoryResult<()> {
        let result = self.availability.update(device.clone(), ts, |current| {
            if current == Some(&true) {
                None
            } else {
                Some(true)
            }
        })?;
        self.reject_if_stale(device, &result, ts)?;
        Ok(())
    }

    /// Raise availability after the device write already landed. A remote
    /// merge racing in between the two table writes can fence the
    /// availability update; the accepted device write's event must still be
    /// emitted, so staleness degrades to a warning here.
    fn raise_availability_after_accept(
        &self,
        device: &DeviceId,
        ts: Timestamp,
    ) -> InventoryResult<()> {
        match self.raise_availability(device, ts) {
            Ok(()) => Ok(()),
            Err(err) if err.is_stale() => {
                warn_event(
                    Event::StaleWriteRejected,
                    &[("device", device.as_str()), ("error", &err.to_string())],
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn reject_if_stale<V>(
        &self,
        device: &DeviceId,
        result: &WriteResult<V>,
        attempted: Timestamp,
    ) -> InventoryResult<()> {
        if let WriteResult::RejectedStale { stored } = result {
            return Err(InventoryError::stale_mastership(format!(
                "write to {} at {} fenced by stored timestamp {}",
                device, attempted, stored
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::events::InventoryEventKind;
    use crate::inventory::types::{DeviceType, PortType};

    fn clock_for(device: &DeviceId, generation: u64) -> Arc<TermClock> {
        let clock = Arc::new(TermClock::new());
        clock.set_active_term(device, generation);
        clock
    }

    fn descriptor(hw: &str, sw: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            device_type: DeviceType::Switch,
            manufacturer: "acme".into(),
            hw_version: hw.into(),
            sw_version: sw.into(),
            serial_number: "sn-1".into(),
            chassis_id: "ch-1".into(),
        }
    }

    fn port(number: PortNumber, enabled: bool) -> PortDescriptor {
        PortDescriptor {
            number,
            enabled,
            port_type: PortType::Fiber,
            speed: 10_000,
        }
    }

    fn provider() -> ProviderId {
        ProviderId::new("sb.mock")
    }

    #[test]
    fn test_first_connect_adds_device() {
        let device = DeviceId::new("of:1");
        let store = DeviceStore::new(clock_for(&device, 1));

        let event = store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, InventoryEventKind::DeviceAdded);
        assert!(store.is_known(&device));
        assert!(store.is_available(&device));
    }

    #[test]
    fn test_version_change_updates_device() {
        let device = DeviceId::new("of:1");
        let store = DeviceStore::new(clock_for(&device, 1));
        store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();

        let event = store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.1"))
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, InventoryEventKind::DeviceUpdated);
        assert_eq!(store.descriptor(&device).unwrap().sw_version, "2.1");
    }

    #[test]
    fn test_idempotent_connect() {
        let device = DeviceId::new("of:1");
        let store = DeviceStore::new(clock_for(&device, 1));
        store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();

        // Identical descriptor while online: no event at all
        let event = store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();
        assert!(event.is_none());
    }

    #[test]
    fn test_reconnect_after_offline_is_availability_only() {
        let device = DeviceId::new("of:1");
        let store = DeviceStore::new(clock_for(&device, 1));
        store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();
        store.mark_offline(&device).unwrap();

        let event = store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, InventoryEventKind::AvailabilityChanged);
        assert_eq!(event.available, Some(true));
        assert!(store.is_available(&device));
    }

    #[test]
    fn test_mark_offline_transitions_once() {
        let device = DeviceId::new("of:1");
        let store = DeviceStore::new(clock_for(&device, 1));
        store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();

        let event = store.mark_offline(&device).unwrap().unwrap();
        assert_eq!(event.kind, InventoryEventKind::AvailabilityChanged);
        assert_eq!(event.available, Some(false));

        // Already offline: no event
        assert!(store.mark_offline(&device).unwrap().is_none());
    }

    #[test]
    fn test_mark_offline_unknown_device_is_noop() {
        let device = DeviceId::new("of:1");
        let store = DeviceStore::new(clock_for(&device, 1));
        assert!(store.mark_offline(&device).unwrap().is_none());
    }

    #[test]
    fn test_port_diff() {
        let device = DeviceId::new("of:1");
        let store = DeviceStore::new(clock_for(&device, 1));
        store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();
        store
            .update_ports(&device, vec![port(1, true), port(2, true), port(3, false)])
            .unwrap();

        // Incoming ground truth: {2:enabled, 3:enabled, 4:enabled}
        let events = store
            .update_ports(&device, vec![port(2, true), port(3, true), port(4, true)])
            .unwrap();

        let kinds: Vec<(InventoryEventKind, PortNumber)> = events
            .iter()
            .map(|e| (e.kind, e.port.as_ref().unwrap().number))
            .collect();
        assert!(kinds.contains(&(InventoryEventKind::PortUpdated, 3)));
        assert!(kinds.contains(&(InventoryEventKind::PortAdded, 4)));
        assert!(kinds.contains(&(InventoryEventKind::PortRemoved, 1)));
        // Port 2 unchanged: exactly the three events above
        assert_eq!(events.len(), 3);

        let numbers: Vec<PortNumber> = store.ports(&device).iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![2, 3, 4]);
    }

    #[test]
    fn test_cosmetic_port_difference_ignored() {
        let device = DeviceId::new("of:1");
        let store = DeviceStore::new(clock_for(&device, 1));
        store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();
        store.update_ports(&device, vec![port(1, true)]).unwrap();

        // Same enabled flag, different speed: no event, stored port keeps
        // its identity
        let mut faster = port(1, true);
        faster.speed = 40_000;
        let events = store.update_ports(&device, vec![faster]).unwrap();
        assert!(events.is_empty());
        assert_eq!(store.port(&device, 1).unwrap().speed, 10_000);
    }

    #[test]
    fn test_update_ports_unknown_device_is_noop() {
        let device = DeviceId::new("of:1");
        let store = DeviceStore::new(clock_for(&device, 1));
        let events = store.update_ports(&device, vec![port(1, true)]).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_port_status_unknown_port_is_noop() {
        let device = DeviceId::new("of:1");
        let store = DeviceStore::new(clock_for(&device, 1));
        store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();
        assert!(store
            .update_port_status(&device, &port(9, true))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_port_status_enabled_change() {
        let device = DeviceId::new("of:1");
        let store = DeviceStore::new(clock_for(&device, 1));
        store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();
        store.update_ports(&device, vec![port(1, true)]).unwrap();

        let event = store
            .update_port_status(&device, &port(1, false))
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, InventoryEventKind::PortUpdated);
        assert!(!store.port(&device, 1).unwrap().enabled);

        // Same flag again: no event
        assert!(store
            .update_port_status(&device, &port(1, false))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_remove_device_and_ports() {
        let device = DeviceId::new("of:1");
        let store = DeviceStore::new(clock_for(&device, 1));
        store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();
        store.update_ports(&device, vec![port(1, true)]).unwrap();

        let event = store.remove(&device).unwrap().unwrap();
        assert_eq!(event.kind, InventoryEventKind::DeviceRemoved);
        assert!(!store.is_known(&device));
        assert!(store.ports(&device).is_empty());
        assert!(!store.is_available(&device));

        // Removing again is a no-op
        assert!(store.remove(&device).unwrap().is_none());
    }

    #[test]
    fn test_remove_without_active_term() {
        // Administrative removal works on a node that never held mastership
        // and takes the ports with it, even though port writes carry later
        // ticks than the device record
        let device = DeviceId::new("of:1");
        let clock = clock_for(&device, 1);
        let store = DeviceStore::new(Arc::clone(&clock));
        store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();
        store
            .update_ports(&device, vec![port(1, true), port(2, true)])
            .unwrap();

        clock.forget(&device);
        let event = store.remove(&device).unwrap().unwrap();
        assert_eq!(event.kind, InventoryEventKind::DeviceRemoved);
        assert!(!store.is_known(&device));
        assert!(store.ports(&device).is_empty());
        assert!(!store.is_available(&device));
    }

    #[test]
    fn test_remove_replicated_state_on_node_without_term() {
        // A replica that only ever merged the master's writes can still
        // remove the device and every port replicated with it
        let device = DeviceId::new("of:1");
        let master = DeviceStore::new(clock_for(&device, 2));
        master
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();
        master
            .update_ports(&device, vec![port(1, true), port(2, false)])
            .unwrap();

        let replica = DeviceStore::new(Arc::new(TermClock::new()));
        master.push_sync(&replica).unwrap();
        assert_eq!(replica.ports(&device).len(), 2);

        let event = replica.remove(&device).unwrap().unwrap();
        assert_eq!(event.kind, InventoryEventKind::DeviceRemoved);
        assert!(!replica.is_known(&device));
        assert!(replica.ports(&device).is_empty());
        assert!(!replica.is_available(&device));
    }

    #[test]
    fn test_disconnect_does_not_destroy_descriptor() {
        let device = DeviceId::new("of:1");
        let store = DeviceStore::new(clock_for(&device, 1));
        store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();
        store.mark_offline(&device).unwrap();

        assert!(store.is_known(&device));
        assert_eq!(store.descriptor(&device).unwrap().hw_version, "1.0");
        assert!(!store.is_available(&device));
    }

    #[test]
    fn test_stale_term_write_rejected() {
        let device = DeviceId::new("of:1");

        // Node A writes under term 1, node B under term 2, sharing state
        // through replication
        let clock_a = clock_for(&device, 1);
        let store_a = DeviceStore::new(Arc::clone(&clock_a));
        store_a
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();

        let clock_b = clock_for(&device, 2);
        let store_b = DeviceStore::new(clock_b);
        store_a.push_sync(&store_b).unwrap();
        store_b.mark_offline(&device).unwrap();
        store_b.push_sync(&store_a).unwrap();

        // A, still on term 1, tries to mark its replica back online
        let err = store_a
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap_err();
        assert!(err.is_stale());
        assert!(!store_a.is_available(&device));
    }

    #[test]
    fn test_stale_port_batch_rejected_before_any_write() {
        // Term-2 port state replicated in fences a term-1 batch as a whole:
        // no port of the batch lands, so no event can be withheld
        let device = DeviceId::new("of:1");
        let store_a = DeviceStore::new(clock_for(&device, 1));
        store_a
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();

        let store_b = DeviceStore::new(clock_for(&device, 2));
        store_a.push_sync(&store_b).unwrap();
        store_b.update_ports(&device, vec![port(2, true)]).unwrap();
        store_b.push_sync(&store_a).unwrap();

        let err = store_a
            .update_ports(&device, vec![port(1, true), port(2, false)])
            .unwrap_err();
        assert!(err.is_stale());
        assert!(store_a.port(&device, 1).is_none());
        assert!(store_a.port(&device, 2).unwrap().enabled);
    }

    #[test]
    fn test_observed_term_fences_unseen_keys() {
        // The newer term only ever touched the availability flag, yet a
        // term-1 write to a fresh port key is still refused
        let device = DeviceId::new("of:1");
        let store_a = DeviceStore::new(clock_for(&device, 1));
        store_a
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();

        let store_b = DeviceStore::new(clock_for(&device, 2));
        store_a.push_sync(&store_b).unwrap();
        store_b.mark_offline(&device).unwrap();
        store_b.push_sync(&store_a).unwrap();

        let err = store_a
            .update_ports(&device, vec![port(1, true)])
            .unwrap_err();
        assert!(err.is_stale());
        assert!(store_a.ports(&device).is_empty());
    }

    #[test]
    fn test_no_active_term_is_stale() {
        let device = DeviceId::new("of:1");
        let store = DeviceStore::new(Arc::new(TermClock::new()));
        let err = store
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap_err();
        assert!(err.is_stale());
    }

    #[test]
    fn test_remote_events_forwarded() {
        let device = DeviceId::new("of:1");
        let store_a = DeviceStore::new(clock_for(&device, 1));
        let store_b = DeviceStore::new(clock_for(&device, 1));

        let (tx, mut rx) = mpsc::unbounded_channel();
        store_b.set_remote_event_sender(tx);

        store_a
            .create_or_update(provider(), device.clone(), descriptor("1.0", "2.0"))
            .unwrap();
        store_a.update_ports(&device, vec![port(1, true)]).unwrap();
        store_a.push_sync(&store_b).unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        assert!(kinds.contains(&InventoryEventKind::DeviceAdded));
        assert!(kinds.contains(&InventoryEventKind::AvailabilityChanged));
        assert!(kinds.contains(&InventoryEventKind::PortAdded));

        // Re-sync delivers nothing new
        store_a.push_sync(&store_b).unwrap();
        assert!(rx.try_recv().is_err());
    }
}
