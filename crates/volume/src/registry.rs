//! Claim-slot registry
//!
//! Map of values that are expensive to construct. A key is claimed under the
//! lock by inserting an empty slot, the value is then built without the lock
//! and finally filled in. A second claim of the same key fails while the
//! first one is pending or filled. Dropping an unfilled [`Claim`] releases
//! the key again.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

/// Map of claimed keys to their values, `None` while the value is built
#[derive(Debug)]
pub struct Registry<K, V> {
    slots: Mutex<HashMap<K, Option<V>>>,
}

impl<K, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Registry<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the key, `None` if it is already claimed
    pub fn claim(&self, key: K) -> Option<Claim<'_, K, V>> {
        let mut slots = self.slots.lock();
        if slots.contains_key(&key) {
            return None;
        }
        slots.insert(key.clone(), None);
        Some(Claim {
            registry: self,
            key: Some(key),
        })
    }

    /// Remove the key, pending or filled
    pub fn remove(&self, key: &K) -> Option<V> {
        self.slots.lock().remove(key).flatten()
    }

    /// Whether the key is claimed
    pub fn contains(&self, key: &K) -> bool {
        self.slots.lock().contains_key(key)
    }

    /// Filled values, pending claims are skipped
    pub fn values(&self) -> Vec<V> {
        self.slots.lock().values().flatten().cloned().collect()
    }

    /// Number of claimed keys, pending included
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

/// Pending claim of one key
#[must_use = "an unfilled claim releases the key when dropped"]
pub struct Claim<'a, K: Eq + Hash + Clone, V: Clone> {
    registry: &'a Registry<K, V>,
    key: Option<K>,
}

impl<K: Eq + Hash + Clone, V: Clone> Claim<'_, K, V> {
    /// Store the value
    ///
    /// If the key was removed in the meantime, the value is not stored.
    pub fn fill(mut self, value: V) {
        if let Some(key) = self.key.take()
            && let Some(slot) = self.registry.slots.lock().get_mut(&key)
        {
            *slot = Some(value);
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Drop for Claim<'_, K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut slots = self.registry.slots.lock();
            if matches!(slots.get(&key), Some(None)) {
                slots.remove(&key);
            }
        }
    }
}
