//! Thread-safe handle registry for bridge-owned objects
//!
//! Threadsafe functions, async work items and async cleanup hooks are handed
//! to extensions as numeric ids disguised as pointers. A stale id simply
//! misses the map instead of touching freed memory.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Registry mapping numeric handles to values.
///
/// Handles are auto-incrementing u64 ids starting at 1, so a handle is never
/// NULL and never reused.
pub struct HandleRegistry<T> {
    map: DashMap<u64, T>,
    next_id: AtomicU64,
}

impl<T> HandleRegistry<T> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Insert a value and return its handle.
    pub fn insert(&self, value: T) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.map.insert(id, value);
        id
    }

    /// Remove a value by handle, returning it.
    pub fn remove(&self, id: u64) -> Option<T> {
        self.map.remove(&id).map(|(_, value)| value)
    }

    /// Handles whose value matches `filter`, in ascending (creation) order.
    pub fn ids_where(&self, mut filter: impl FnMut(&T) -> bool) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .map
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| *entry.key())
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl<T: Clone> HandleRegistry<T> {
    /// Clone a value out, so no shard lock is held while it is used.
    pub fn cloned(&self, id: u64) -> Option<T> {
        self.map.get(&id).map(|entry| entry.value().clone())
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a registry id to an opaque ABI handle.
pub(crate) fn to_handle<P>(id: u64) -> *mut P {
    id as usize as *mut P
}

/// Recover a registry id from an opaque ABI handle.
pub(crate) fn from_handle<P>(handle: *mut P) -> u64 {
    handle as usize as u64
}
