//! Response matching table.
//!
//! Maps a transaction identifier to the records of its outstanding transactions. Several
//! transactions may be in flight under the same identifier (e.g. same AXI ID); they are
//! matched in the order they were registered.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Outstanding-transaction table keyed by `K`.
#[derive(Debug, Clone)]
pub struct MatchTable<K, V> {
    entries: HashMap<K, VecDeque<V>>,
    outstanding: usize,
}

impl<K: Eq + Hash, V> Default for MatchTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> MatchTable<K, V> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            outstanding: 0,
        }
    }

    /// Registers another outstanding record under `key`.
    pub fn register(&mut self, key: K, record: V) {
        self.entries.entry(key).or_default().push_back(record);
        self.outstanding += 1;
    }

    /// Registers `record` only if nothing is outstanding under `key`.
    ///
    /// Returns the record back when the key is already taken.
    pub fn register_unique(&mut self, key: K, record: V) -> Result<(), V> {
        if self.contains(&key) {
            return Err(record);
        }
        self.register(key, record);
        Ok(())
    }

    /// Returns the oldest record under `key`.
    pub fn lookup(&self, key: &K) -> Option<&V> {
        self.entries.get(key).and_then(VecDeque::front)
    }

    /// Returns the oldest record under `key` mutably.
    pub fn lookup_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key).and_then(VecDeque::front_mut)
    }

    /// Removes and returns the oldest record under `key`.
    pub fn retire(&mut self, key: &K) -> Option<V> {
        let queue = self.entries.get_mut(key)?;
        let record = queue.pop_front();
        if queue.is_empty() {
            let _ = self.entries.remove(key);
        }
        if record.is_some() {
            self.outstanding -= 1;
        }
        record
    }

    /// Returns `true` if any record is outstanding under `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of records outstanding under `key`.
    pub fn count(&self, key: &K) -> usize {
        self.entries.get(key).map_or(0, VecDeque::len)
    }

    /// Total number of outstanding records.
    pub const fn len(&self) -> usize {
        self.outstanding
    }

    /// Returns `true` when nothing is outstanding.
    pub const fn is_empty(&self) -> bool {
        self.outstanding == 0
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.outstanding = 0;
    }
}
