//! Keyed record storage for the mutable documents of the system (users,
//! managements, entities, employees, ressources).
//!
//! Ledgers are not records: they live in the event store.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Key/value store with read-modify-write under a single lock.
///
/// Keys are `Ord` so listings come back in key order; with UUIDv7 ids that
/// is creation order.
pub trait RecordStore<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;

    fn upsert(&self, key: K, value: V);

    /// Insert unless an existing record satisfies `conflicts`. Returns
    /// `false` (and stores nothing) on conflict. The check and the insert are
    /// atomic.
    fn insert_unique(&self, key: K, value: V, conflicts: &dyn Fn(&V) -> bool) -> bool;

    /// Insert or overwrite `key` unless a record stored under another key
    /// satisfies `conflicts`. Atomic like [`insert_unique`](Self::insert_unique).
    fn replace_unique(&self, key: K, value: V, conflicts: &dyn Fn(&V) -> bool) -> bool;

    fn remove(&self, key: &K) -> Option<V>;

    fn list(&self) -> Vec<V>;

    fn filter(&self, predicate: &dyn Fn(&V) -> bool) -> Vec<V>;

    /// Apply `mutate` to the stored record in place and return the updated
    /// value. `None` when the key is absent.
    fn update(&self, key: &K, mutate: &mut dyn FnMut(&mut V)) -> Option<V>;
}

impl<K, V, S> RecordStore<K, V> for Arc<S>
where
    S: RecordStore<K, V> + ?Sized,
{
    fn get(&self, key: &K) -> Option<V> {
        (**self).get(key)
    }

    fn upsert(&self, key: K, value: V) {
        (**self).upsert(key, value)
    }

    fn insert_unique(&self, key: K, value: V, conflicts: &dyn Fn(&V) -> bool) -> bool {
        (**self).insert_unique(key, value, conflicts)
    }

    fn replace_unique(&self, key: K, value: V, conflicts: &dyn Fn(&V) -> bool) -> bool {
        (**self).replace_unique(key, value, conflicts)
    }

    fn remove(&self, key: &K) -> Option<V> {
        (**self).remove(key)
    }

    fn list(&self) -> Vec<V> {
        (**self).list()
    }

    fn filter(&self, predicate: &dyn Fn(&V) -> bool) -> Vec<V> {
        (**self).filter(predicate)
    }

    fn update(&self, key: &K, mutate: &mut dyn FnMut(&mut V)) -> Option<V> {
        (**self).update(key, mutate)
    }
}

/// In-memory record store.
#[derive(Debug)]
pub struct InMemoryRecordStore<K, V> {
    inner: RwLock<BTreeMap<K, V>>,
}

impl<K, V> InMemoryRecordStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryRecordStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RecordStore<K, V> for InMemoryRecordStore<K, V>
where
    K: Clone + Ord + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(key).cloned()
    }

    fn upsert(&self, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(key, value);
        }
    }

    fn insert_unique(&self, key: K, value: V, conflicts: &dyn Fn(&V) -> bool) -> bool {
        let Ok(mut map) = self.inner.write() else {
            return false;
        };
        if map.contains_key(&key) || map.values().any(conflicts) {
            return false;
        }
        map.insert(key, value);
        true
    }

    fn replace_unique(&self, key: K, value: V, conflicts: &dyn Fn(&V) -> bool) -> bool {
        let Ok(mut map) = self.inner.write() else {
            return false;
        };
        if map.iter().any(|(k, v)| *k != key && conflicts(v)) {
            return false;
        }
        map.insert(key, value);
        true
    }

    fn remove(&self, key: &K) -> Option<V> {
        let mut map = self.inner.write().ok()?;
        map.remove(key)
    }

    fn list(&self) -> Vec<V> {
        match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        }
    }

    fn filter(&self, predicate: &dyn Fn(&V) -> bool) -> Vec<V> {
        match self.inner.read() {
            Ok(map) => map.values().filter(|v| predicate(v)).cloned().collect(),
            Err(_) => vec![],
        }
    }

    fn update(&self, key: &K, mutate: &mut dyn FnMut(&mut V)) -> Option<V> {
        let mut map = self.inner.write().ok()?;
        let value = map.get_mut(key)?;
        mutate(value);
        Some(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn list_is_key_ordered() {
        let store = InMemoryRecordStore::new();
        store.upsert(3, "c");
        store.upsert(1, "a");
        store.upsert(2, "b");
        assert_eq!(store.list(), ["a", "b", "c"]);
        assert_eq!(store.filter(&|v| *v != "b"), ["a", "c"]);
    }

    #[test]
    fn update_mutates_in_place() {
        let store = InMemoryRecordStore::new();
        store.upsert(1u32, 10u64);
        assert_eq!(store.update(&1, &mut |v| *v += 5), Some(15));
        assert_eq!(store.get(&1), Some(15));
        assert_eq!(store.update(&2, &mut |v| *v += 5), None);
    }

    #[test]
    fn insert_unique_refuses_conflicts() {
        let store = InMemoryRecordStore::new();
        assert!(store.insert_unique(1u32, "ada@example.com".to_string(), &|_| false));
        assert!(!store.insert_unique(2, "ada@example.com".to_string(), &|v| v == "ada@example.com"));
        assert!(!store.insert_unique(1, "other".to_string(), &|_| false));
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn replace_unique_ignores_the_record_itself() {
        let store = InMemoryRecordStore::new();
        store.upsert(1u32, "A".to_string());
        store.upsert(2u32, "B".to_string());
        assert!(store.replace_unique(1, "A".to_string(), &|v| v == "A"));
        assert!(!store.replace_unique(1, "B".to_string(), &|v| v == "B"));
        assert_eq!(store.get(&1).as_deref(), Some("A"));
    }

    #[test]
    fn concurrent_unique_inserts_keep_one() {
        let store = Arc::new(InMemoryRecordStore::new());
        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.insert_unique(i, "M001".to_string(), &|v| v == "M001"))
            })
            .collect();
        let stored = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(stored, 1);
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.upsert("counter", 0u64);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.update(&"counter", &mut |v| *v += 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get(&"counter"), Some(800));
    }

    #[test]
    fn remove_returns_the_record() {
        let store = InMemoryRecordStore::new();
        store.upsert(1, "a");
        assert_eq!(store.remove(&1), Some("a"));
        assert_eq!(store.remove(&1), None);
    }
}
