//! Term clock: the fencing helper that turns active mastership terms into
//! write timestamps.
//!
//! The coordinator publishes the term it holds for a device with
//! [`TermClock::set_active_term`]; the store asks for a fresh
//! [`Timestamp`] for every mutation. A node that was never told a term for
//! a device cannot produce a timestamp at all, which stops racing writes
//! from before the first grant.
//!
//! `set_active_term` is monotonic: a stale notification carrying an older
//! generation is ignored, so a racing term change cannot roll the clock
//! back.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::cluster::Timestamp;
use crate::inventory::DeviceId;

use super::errors::{MastershipError, MastershipResult};

#[derive(Debug, Clone, Copy)]
struct ClockEntry {
    term: u64,
    tick: u64,
}

/// Per-device source of fenced write timestamps.
pub struct TermClock {
    entries: RwLock<HashMap<DeviceId, ClockEntry>>,
}

impl TermClock {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Record the mastership generation now authoritative for local writes
    /// to `device`. Lower generations are ignored; a new generation resets
    /// the tick counter.
    pub fn set_active_term(&self, device: &DeviceId, generation: u64) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(_) => return,
        };
        match entries.get_mut(device) {
            Some(entry) if entry.term >= generation => {}
            Some(entry) => {
                entry.term = generation;
                entry.tick = 0;
            }
            None => {
                entries.insert(
                    device.clone(),
                    ClockEntry {
                        term: generation,
                        tick: 0,
                    },
                );
            }
        }
    }

    /// The generation currently active for local writes, if any.
    pub fn active_term(&self, device: &DeviceId) -> Option<u64> {
        self.entries
            .read()
            .ok()
            .and_then(|e| e.get(device).map(|entry| entry.term))
    }

    /// Produce the next write timestamp for `device`. Monotonic per device
    /// on this node. Fails when no term was ever published for the device.
    pub fn timestamp(&self, device: &DeviceId) -> MastershipResult<Timestamp> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| MastershipError::NoActiveTerm(device.to_string()))?;
        let entry = entries
            .get_mut(device)
            .ok_or_else(|| MastershipError::NoActiveTerm(device.to_string()))?;
        entry.tick += 1;
        Ok(Timestamp::new(entry.term, entry.tick))
    }

    /// Drop clock state for a device (administrative removal).
    pub fn forget(&self, device: &DeviceId) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(device);
        }
    }
}

impl Default for TermClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceId {
        DeviceId::new("of:1")
    }

    #[test]
    fn test_no_term_no_timestamp() {
        let clock = TermClock::new();
        assert!(clock.timestamp(&device()).is_err());
    }

    #[test]
    fn test_timestamps_are_monotonic() {
        let clock = TermClock::new();
        clock.set_active_term(&device(), 1);
        let a = clock.timestamp(&device()).unwrap();
        let b = clock.timestamp(&device()).unwrap();
        assert!(b > a);
        assert_eq!(a.term, 1);
    }

    #[test]
    fn test_new_term_resets_tick_and_dominates() {
        let clock = TermClock::new();
        clock.set_active_term(&device(), 1);
        let old = clock.timestamp(&device()).unwrap();

        clock.set_active_term(&device(), 2);
        let new = clock.timestamp(&device()).unwrap();
        assert_eq!(new, Timestamp::new(2, 1));
        assert!(new > old);
    }

    #[test]
    fn test_stale_generation_ignored() {
        let clock = TermClock::new();
        clock.set_active_term(&device(), 5);
        clock.set_active_term(&device(), 3);
        assert_eq!(clock.active_term(&device()), Some(5));
    }

    #[test]
    fn test_forget() {
        let clock = TermClock::new();
        clock.set_active_term(&device(), 1);
        clock.forget(&device());
        assert_eq!(clock.active_term(&device()), None);
        assert!(clock.timestamp(&device()).is_err());
    }
}
