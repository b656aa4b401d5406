//! Eventually-consistent replicated map primitive.
//!
//! Each inventory table (devices, ports, availability) is one `EcMap`.
//! The map stores versioned entries and resolves every write with a single
//! rule: an entry may only be replaced by a strictly newer [`Timestamp`].
//! Because timestamps are `(term, tick)` ordered, this one rule gives both
//! last-writer-wins convergence across replicas and mastership fencing of
//! stale local writers.
//!
//! Replication transport is out of scope; a remote peer's state enters
//! through [`EcMap::merge_remote`], which applies the same ordering rule.
//! Removals are tombstoned so a delayed update from an older term cannot
//! resurrect a deleted entry.
//!
//! All read-modify-write sequences go through [`EcMap::update`], which runs
//! the caller's closure under the table's write lock. Two local threads
//! racing on the same device therefore serialize here rather than losing
//! updates.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use super::errors::{ClusterError, ClusterResult};
use super::timestamp::Timestamp;

/// A value (or tombstone) plus the timestamp of the write that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<V> {
    /// `None` is a tombstone left by a removal.
    pub value: Option<V>,
    /// Timestamp supplied by the writer.
    pub timestamp: Timestamp,
}

impl<V> Versioned<V> {
    /// A live entry.
    pub fn live(value: V, timestamp: Timestamp) -> Self {
        Self {
            value: Some(value),
            timestamp,
        }
    }

    /// A tombstone.
    pub fn tombstone(timestamp: Timestamp) -> Self {
        Self {
            value: None,
            timestamp,
        }
    }
}

/// Outcome of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult<V> {
    /// Write applied; carries the previous live value if any.
    Accepted { previous: Option<V> },

    /// The caller's closure chose not to write; nothing changed.
    Unchanged { current: Option<V> },

    /// Write rejected: the stored entry carries a newer timestamp.
    /// When `stored.term` exceeds the write's term this is mastership
    /// fencing; otherwise it is a lost local race.
    RejectedStale { stored: Timestamp },
}

impl<V> WriteResult<V> {
    /// Whether the write landed.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Where a change originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Applied by this node.
    Local,
    /// Applied by merging a remote replica's entry.
    Remote,
}

/// Change notification carrying (key, old, new).
#[derive(Debug, Clone)]
pub struct MapChange<K, V> {
    pub key: K,
    pub old: Option<V>,
    pub new: Option<V>,
    pub timestamp: Timestamp,
    pub origin: Origin,
}

/// Change-notification callback.
pub type ChangeListener<K, V> = Box<dyn Fn(&MapChange<K, V>) + Send + Sync>;

/// An eventually-consistent, last-writer-wins keyed table.
pub struct EcMap<K, V> {
    /// Table name, for logging and lock-poison diagnostics.
    name: &'static str,
    entries: RwLock<HashMap<K, Versioned<V>>>,
    listener: RwLock<Option<ChangeListener<K, V>>>,
}

impl<K, V> EcMap<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Create an empty table.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
            listener: RwLock::new(None),
        }
    }

    /// Register the change-notification callback. At most one listener;
    /// registering again replaces the previous one.
    pub fn set_listener(&self, listener: ChangeListener<K, V>) {
        if let Ok(mut slot) = self.listener.write() {
            *slot = Some(listener);
        }
    }

    /// Read a live value. Tombstones and missing keys are both `None`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .read()
            .ok()
            .and_then(|m| m.get(key).and_then(|v| v.value.clone()))
    }

    /// Whether a live entry exists for the key.
    pub fn contains(&self, key: &K) -> bool {
        self.entries
            .read()
            .map(|m| m.get(key).is_some_and(|v| v.value.is_some()))
            .unwrap_or(false)
    }

    /// Snapshot of all live entries.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.entries
            .read()
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.value.clone().map(|val| (k.clone(), val)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|m| m.values().filter(|v| v.value.is_some()).count())
            .unwrap_or(0)
    }

    /// Whether the table has no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stored versioned entry, tombstones included. Replication and
    /// tests use this; normal reads go through [`EcMap::get`].
    pub fn versioned(&self, key: &K) -> Option<Versioned<V>> {
        self.entries.read().ok().and_then(|m| m.get(key).cloned())
    }

    /// Export every entry (tombstones included) for replica synchronization.
    pub fn export(&self) -> Vec<(K, Versioned<V>)> {
        self.entries
            .read()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// Unconditional-intent write: store `value` at `timestamp` unless the
    /// stored entry is newer.
    pub fn put(&self, key: K, value: V, timestamp: Timestamp) -> ClusterResult<WriteResult<V>> {
        self.update(key, timestamp, |_| Some(value))
    }

    /// Tombstone the key at `timestamp` unless the stored entry is newer.
    /// Removing an absent or already-removed key is `Unchanged`.
    pub fn remove(&self, key: K, timestamp: Timestamp) -> ClusterResult<WriteResult<V>> {
        let mut entries = self.write_lock()?;

        let stored = entries.get(&key);
        if let Some(existing) = stored {
            if existing.timestamp >= timestamp {
                return Ok(WriteResult::RejectedStale {
                    stored: existing.timestamp,
                });
            }
            if existing.value.is_none() {
                return Ok(WriteResult::Unchanged { current: None });
            }
        } else {
            return Ok(WriteResult::Unchanged { current: None });
        }

        let previous = entries
            .insert(key.clone(), Versioned::tombstone(timestamp))
            .and_then(|v| v.value);

        let change = MapChange {
            key,
            old: previous.clone(),
            new: None,
            timestamp,
            origin: Origin::Local,
        };
        drop(entries);
        self.notify(&change);

        Ok(WriteResult::Accepted { previous })
    }

    /// Atomic read-modify-write under the table's write lock.
    ///
    /// The closure sees the current live value and returns `Some(new)` to
    /// write or `None` to leave the entry untouched. The write is fenced:
    /// if the stored timestamp is not older than `timestamp` the closure is
    /// never run and the write is rejected as stale.
    pub fn update<F>(&self, key: K, timestamp: Timestamp, f: F) -> ClusterResult<WriteResult<V>>
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let mut entries = self.write_lock()?;

        if let Some(existing) = entries.get(&key) {
            if existing.timestamp >= timestamp {
                return Ok(WriteResult::RejectedStale {
                    stored: existing.timestamp,
                });
            }
        }

        let current = entries.get(&key).and_then(|v| v.value.as_ref());
        let Some(new_value) = f(current) else {
            let current = current.cloned();
            return Ok(WriteResult::Unchanged { current });
        };

        let previous = entries
            .insert(key.clone(), Versioned::live(new_value.clone(), timestamp))
            .and_then(|v| v.value);

        let change = MapChange {
            key,
            old: previous.clone(),
            new: Some(new_value),
            timestamp,
            origin: Origin::Local,
        };
        drop(entries);
        self.notify(&change);

        Ok(WriteResult::Accepted { previous })
    }

    /// Merge an entry received from a remote replica.
    ///
    /// Applies the same newest-timestamp-wins rule as local writes and
    /// returns whether the entry was applied. Re-delivery of an already
    /// merged entry is a no-op, so replication may be at-least-once.
    pub fn merge_remote(&self, key: K, incoming: Versioned<V>) -> ClusterResult<bool> {
        let mut entries = self.write_lock()?;

        if let Some(existing) = entries.get(&key) {
            if existing.timestamp >= incoming.timestamp {
                return Ok(false);
            }
        }

        let previous = entries
            .insert(key.clone(), incoming.clone())
            .and_then(|v| v.value);

        let change = MapChange {
            key,
            old: previous,
            new: incoming.value,
            timestamp: incoming.timestamp,
            origin: Origin::Remote,
        };
        drop(entries);
        self.notify(&change);

        Ok(true)
    }

    /// Merge a full export from a peer (anti-entropy sync).
    pub fn merge_export(&self, export: Vec<(K, Versioned<V>)>) -> ClusterResult<usize> {
        let mut applied = 0;
        for (key, versioned) in export {
            if self.merge_remote(key, versioned)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    fn write_lock(
        &self,
    ) -> ClusterResult<std::sync::RwLockWriteGuard<'_, HashMap<K, Versioned<V>>>> {
        self.entries
            .write()
            .map_err(|_| ClusterError::LockPoisoned(self.name.to_string()))
    }

    fn notify(&self, change: &MapChange<K, V>) {
        if let Ok(listener) = self.listener.read() {
            if let Some(listener) = listener.as_ref() {
                listener(change);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ts(term: u64, tick: u64) -> Timestamp {
        Timestamp::new(term, tick)
    }

    #[test]
    fn test_put_then_get() {
        let map: EcMap<String, u32> = EcMap::new("test");
        let result = map.put("a".into(), 1, ts(1, 0)).unwrap();
        assert!(result.is_accepted());
        assert_eq!(map.get(&"a".into()), Some(1));
    }

    #[test]
    fn test_newer_timestamp_replaces() {
        let map: EcMap<String, u32> = EcMap::new("test");
        map.put("a".into(), 1, ts(1, 0)).unwrap();
        let result = map.put("a".into(), 2, ts(1, 1)).unwrap();
        assert_eq!(result, WriteResult::Accepted { previous: Some(1) });
        assert_eq!(map.get(&"a".into()), Some(2));
    }

    #[test]
    fn test_stale_term_write_rejected() {
        let map: EcMap<String, u32> = EcMap::new("test");
        map.put("a".into(), 2, ts(2, 0)).unwrap();

        // A delayed write from term 1 must not land, whatever its tick
        let result = map.put("a".into(), 1, ts(1, 99)).unwrap();
        assert_eq!(result, WriteResult::RejectedStale { stored: ts(2, 0) });
        assert_eq!(map.get(&"a".into()), Some(2));
    }

    #[test]
    fn test_remove_leaves_tombstone() {
        let map: EcMap<String, u32> = EcMap::new("test");
        map.put("a".into(), 1, ts(1, 0)).unwrap();
        let result = map.remove("a".into(), ts(1, 1)).unwrap();
        assert_eq!(result, WriteResult::Accepted { previous: Some(1) });

        assert_eq!(map.get(&"a".into()), None);
        assert!(!map.contains(&"a".into()));
        // Tombstone still visible to replication
        let versioned = map.versioned(&"a".into()).unwrap();
        assert_eq!(versioned.value, None);
    }

    #[test]
    fn test_tombstone_fences_older_resurrection() {
        let map: EcMap<String, u32> = EcMap::new("test");
        map.put("a".into(), 1, ts(1, 0)).unwrap();
        map.remove("a".into(), ts(2, 0)).unwrap();

        let result = map.put("a".into(), 7, ts(1, 5)).unwrap();
        assert!(matches!(result, WriteResult::RejectedStale { .. }));
        assert_eq!(map.get(&"a".into()), None);
    }

    #[test]
    fn test_remove_unknown_is_unchanged() {
        let map: EcMap<String, u32> = EcMap::new("test");
        let result = map.remove("a".into(), ts(1, 0)).unwrap();
        assert_eq!(result, WriteResult::Unchanged { current: None });
    }

    #[test]
    fn test_update_closure_can_decline() {
        let map: EcMap<String, u32> = EcMap::new("test");
        map.put("a".into(), 1, ts(1, 0)).unwrap();

        let result = map
            .update("a".into(), ts(1, 1), |current| {
                // Same value, no write
                if current == Some(&1) {
                    None
                } else {
                    Some(9)
                }
            })
            .unwrap();
        assert_eq!(result, WriteResult::Unchanged { current: Some(1) });
        // Timestamp unchanged: the declined write did not bump the entry
        assert_eq!(map.versioned(&"a".into()).unwrap().timestamp, ts(1, 0));
    }

    #[test]
    fn test_merge_remote_lww() {
        let map: EcMap<String, u32> = EcMap::new("test");
        map.put("a".into(), 1, ts(1, 5)).unwrap();

        // Older remote entry ignored
        assert!(!map.merge_remote("a".into(), Versioned::live(0, ts(1, 3))).unwrap());
        assert_eq!(map.get(&"a".into()), Some(1));

        // Newer remote entry applied
        assert!(map.merge_remote("a".into(), Versioned::live(2, ts(2, 0))).unwrap());
        assert_eq!(map.get(&"a".into()), Some(2));

        // Re-delivery is a no-op
        assert!(!map.merge_remote("a".into(), Versioned::live(2, ts(2, 0))).unwrap());
    }

    #[test]
    fn test_listener_sees_old_and_new() {
        let map: Arc<EcMap<String, u32>> = Arc::new(EcMap::new("test"));
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = Arc::clone(&count);
        map.set_listener(Box::new(move |change| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            if change.new == Some(2) {
                assert_eq!(change.old, Some(1));
                assert_eq!(change.origin, Origin::Remote);
            }
        }));

        map.put("a".into(), 1, ts(1, 0)).unwrap();
        map.merge_remote("a".into(), Versioned::live(2, ts(1, 1))).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_convergence_over_permutations() {
        // Same write set, both orders, identical final state
        let writes = vec![
            ("a".to_string(), Versioned::live(1u32, ts(1, 0))),
            ("a".to_string(), Versioned::live(2u32, ts(1, 1))),
            ("b".to_string(), Versioned::live(3u32, ts(2, 0))),
            ("b".to_string(), Versioned::<u32>::tombstone(ts(2, 1))),
        ];

        let forward: EcMap<String, u32> = EcMap::new("fwd");
        let reverse: EcMap<String, u32> = EcMap::new("rev");
        for (k, v) in writes.iter().cloned() {
            forward.merge_remote(k, v).unwrap();
        }
        for (k, v) in writes.iter().rev().cloned() {
            reverse.merge_remote(k, v).unwrap();
        }

        assert_eq!(forward.get(&"a".into()), reverse.get(&"a".into()));
        assert_eq!(forward.get(&"b".into()), reverse.get(&"b".into()));
        assert_eq!(forward.versioned(&"b".into()), reverse.versioned(&"b".into()));
    }
}
