//! A single-value-per-key store with interior mutability, backed by
//! `slotmap` so that keys stay stable across insertions and removals.

use parking_lot::RwLock;
use std::hash::Hash;
use std::collections::HashMap;

/// A store that maps a generated key to an owned value, with interior
/// mutability so registries can be passed around as shared references.
pub struct Store<K, V> {
    data: RwLock<slotmap::SlotMap<K, V>>,
}

impl<K: slotmap::Key, V> Store<K, V> {
    pub fn new() -> Self {
        Self { data: RwLock::new(slotmap::SlotMap::with_key()) }
    }

    pub fn create(&self, value: V) -> K {
        self.data.write().insert(value)
    }

    pub fn map_fast<T>(&self, key: K, f: impl FnOnce(&V) -> T) -> T {
        f(self.data.read().get(key).expect("stale store key"))
    }

    pub fn modify_fast<T>(&self, key: K, f: impl FnOnce(&mut V) -> T) -> T {
        f(self.data.write().get_mut(key).expect("stale store key"))
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry, releasing backing memory. Used by teardown between
    /// compilations (`spec.md` §5).
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl<K: slotmap::Key, V> Default for Store<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A store keyed by a hashable, name-like key rather than a generated
/// handle — used for the type registry's named-type interning tables
/// (struct/class/interface/enum/typedef registries all key by name).
pub struct NamedStore<K, V> {
    data: RwLock<HashMap<K, V>>,
}

impl<K: Eq + Hash + Clone, V> NamedStore<K, V> {
    pub fn new() -> Self {
        Self { data: RwLock::new(HashMap::new()) }
    }

    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.data.read().get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.data.read().contains_key(key)
    }

    pub fn insert(&self, key: K, value: V) {
        self.data.write().insert(key, value);
    }

    /// Insert only if absent, returning the (possibly pre-existing) value.
    /// Grounds idempotent interning: the second request for the same name
    /// returns the same instance.
    pub fn get_or_insert_with(&self, key: K, make: impl FnOnce() -> V) -> V
    where
        V: Clone,
    {
        if let Some(existing) = self.get(&key) {
            return existing;
        }
        let mut data = self.data.write();
        data.entry(key).or_insert_with(make).clone()
    }

    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl<K: Eq + Hash + Clone, V> Default for NamedStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
