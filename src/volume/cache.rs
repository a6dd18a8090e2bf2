use std::collections::HashMap;

use ndarray::Array2;

/// Default number of decoded slices kept per volume.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

struct CacheEntry {
    slice: Array2<f64>,
    last_access: u64,
}

/// Bounded least-recently-used cache of decoded slices, keyed by slice index.
///
/// Owned by a single volume instance; nothing here is shared between volumes or threads.
pub struct SliceCache {
    entries: HashMap<usize, CacheEntry>,
    capacity: usize,
    /// Access counter for LRU eviction
    access_counter: u64,
}

impl SliceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            access_counter: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn get(&mut self, index: usize) -> Option<&Array2<f64>> {
        let entry = self.entries.get_mut(&index)?;
        self.access_counter += 1;
        entry.last_access = self.access_counter;
        Some(&entry.slice)
    }

    pub fn insert(&mut self, index: usize, slice: Array2<f64>) {
        // Evict the least recently touched entry when a new key would overflow the bound.
        if !self.entries.contains_key(&index) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| *k)
            {
                self.entries.remove(&oldest);
            }
        }

        self.access_counter += 1;
        self.entries.insert(
            index,
            CacheEntry {
                slice,
                last_access: self.access_counter,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.access_counter = 0;
    }
}

impl Default for SliceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
