//! Bounded argument-keyed cache for pure formulas.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;

struct Entries<K, V> {
    values: HashMap<K, V>,
    order: VecDeque<K>,
}

/// Memoizes a pure function by its argument tuple. Oldest entries are evicted first.
pub struct MemoCache<K, V> {
    capacity: usize,
    entries: Mutex<Entries<K, V>>,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(Entries {
                values: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_compute(&self, key: K, compute: impl FnOnce(&K) -> V) -> V {
        // Poisoning leaves the map consistent.
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = entries.values.get(&key) {
            return hit.clone();
        }

        let value = compute(&key);
        if entries.values.len() >= self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.values.remove(&oldest);
            }
        }
        entries.order.push_back(key.clone());
        entries.values.insert(key, value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
