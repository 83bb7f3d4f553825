//! Per-field-name locks.
//!
//! Creating or deleting a field holds the exclusive lock for its name;
//! writes that touch a name (as a field or as a parameter key) hold the
//! shared lock. Reads take no lock. An entry is evicted once its last
//! guard is released.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{lock_api::ArcRwLockReadGuard, lock_api::ArcRwLockWriteGuard, RawRwLock, RwLock};

/// Guard on a field name that evicts the name's lock when released last.
pub struct FieldGuard<'a, G> {
    guard: Option<G>,
    name: String,
    locks: &'a FieldLocks,
}

impl<G> Drop for FieldGuard<'_, G> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(&self.name);
    }
}

/// Shared guard on a field name.
pub type FieldReadGuard<'a> = FieldGuard<'a, ArcRwLockReadGuard<RawRwLock, ()>>;
/// Exclusive guard on a field name.
pub type FieldWriteGuard<'a> = FieldGuard<'a, ArcRwLockWriteGuard<RawRwLock, ()>>;

/// Registry of reader/writer locks keyed by field name.
#[derive(Default)]
pub struct FieldLocks {
    locks: DashMap<String, Arc<RwLock<()>>>,
}

impl FieldLocks {
    /// Creates an empty lock registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, name: &str) -> Arc<RwLock<()>> {
        self.locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    // Only the map references the lock once nobody holds or waits for it.
    fn release(&self, name: &str) {
        self.locks
            .remove_if(name, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Takes the exclusive lock for a field name.
    pub fn exclusive(&self, name: &str) -> FieldWriteGuard<'_> {
        FieldGuard {
            guard: Some(self.lock_for(name).write_arc()),
            name: name.to_string(),
            locks: self,
        }
    }

    /// Takes shared locks for several names.
    ///
    /// Locks are acquired in sorted order so concurrent writers never
    /// deadlock against each other.
    pub fn shared<'a, I>(&self, names: I) -> Vec<FieldReadGuard<'_>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut sorted: Vec<&str> = names.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();
        sorted
            .into_iter()
            .map(|name| FieldGuard {
                guard: Some(self.lock_for(name).read_arc()),
                name: name.to_string(),
                locks: self,
            })
            .collect()
    }

    /// Number of names currently held or waited for.
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}
