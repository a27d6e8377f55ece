//! Indexed binary min-heap used by weighted pathfinding.
//!
//! A plain array heap cannot lower the priority of a buried entry without a
//! linear scan. This one maintains an auxiliary key-to-slot map, updated on
//! every swap, so [`IndexedHeap::decrease_key`] runs in O(log n).

use std::{cmp::Ordering, collections::HashMap, hash::Hash};

/// Binary min-heap of `(key, priority)` pairs with O(log n) decrease-key.
///
/// Keys must be unique: the caller checks [`IndexedHeap::contains`] before
/// inserting an existing key.
pub struct IndexedHeap<K> {
    entries: Vec<(K, f64)>,
    slots: HashMap<K, usize>,
}

impl<K: Clone + Eq + Hash> IndexedHeap<K> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            slots: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Add a new key. The key must not already be present.
    pub fn insert(&mut self, key: K, priority: f64) {
        debug_assert!(!self.contains(&key));
        self.entries.push((key.clone(), priority));
        let slot = self.entries.len() - 1;
        self.slots.insert(key, slot);
        self.sift_up(slot);
    }

    /// Remove and return the entry with the smallest priority, or `None` when
    /// the heap is empty.
    pub fn extract_min(&mut self) -> Option<(K, f64)> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        self.swap(0, last);
        let (key, priority) = self.entries.pop()?;
        self.slots.remove(&key);
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        Some((key, priority))
    }

    /// Lower an existing key's priority. No-op when the key is absent or the
    /// new priority is not smaller than the current one.
    pub fn decrease_key(&mut self, key: &K, priority: f64) {
        let Some(&slot) = self.slots.get(key) else {
            return;
        };
        if priority.total_cmp(&self.entries[slot].1) != Ordering::Less {
            return;
        }
        self.entries[slot].1 = priority;
        self.sift_up(slot);
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.entries[a].1.total_cmp(&self.entries[b].1) == Ordering::Less
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.entries.swap(a, b);
        self.slots.insert(self.entries[a].0.clone(), a);
        self.slots.insert(self.entries[b].0.clone(), b);
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !self.less(slot, parent) {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        loop {
            let left = 2 * slot + 1;
            let right = 2 * slot + 2;
            let mut smallest = slot;
            if left < self.entries.len() && self.less(left, smallest) {
                smallest = left;
            }
            if right < self.entries.len() && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == slot {
                break;
            }
            self.swap(slot, smallest);
            slot = smallest;
        }
    }
}

impl<K: Clone + Eq + Hash> Default for IndexedHeap<K> {
    fn default() -> Self {
        Self::new()
    }
}
