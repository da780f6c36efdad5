//! The ordered map, a hash table paired with an explicit key order.
//!
//! OrderedMap keeps a key→value mapping and the sequence in which keys are
//! observed. Both sit behind a single RwLock so that no caller can ever see
//! one updated without the other.
//!
//! **Reads** (`get`, `get_index`, `order`, `index_of`, `len`): shared lock,
//! any number in parallel.
//! **Writes** (`add`, `insert`, `set_order`, `delete`, `clear`): exclusive
//! lock for the whole body, so mapping and order change as one unit.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;

use crate::config::Config;
use crate::error::{OmResult, OrderedMapError};
use crate::traversal::Traversal;

/// Mapping and order, always locked together.
///
/// Invariant: `order` holds every key of `data` exactly once and nothing else.
pub(crate) struct Inner<K, V> {
    data: HashMap<K, V>,
    order: Vec<K>,
}

impl<K, V> Inner<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn with_capacity(capacity: usize) -> Self {
        Self {
            data: HashMap::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    /// Key and value at `index`, or None past the end.
    pub(crate) fn get_index(&self, index: usize) -> Option<(K, V)> {
        let key = self.order.get(index)?;
        self.data.get(key).map(|value| (key.clone(), value.clone()))
    }

    fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.order.iter().position(|k| k.borrow() == key)
    }

    /// Check that `candidate` is a permutation of the current keys.
    fn check_permutation(&self, candidate: &[K]) -> Result<(), String> {
        if candidate.len() != self.order.len() {
            return Err(format!(
                "expected {} keys, got {}",
                self.order.len(),
                candidate.len()
            ));
        }
        let mut seen: HashSet<&K> = HashSet::with_capacity(candidate.len());
        for (i, key) in candidate.iter().enumerate() {
            if !self.data.contains_key(key) {
                return Err(format!("key at position {} is not in the map", i));
            }
            if !seen.insert(key) {
                return Err(format!("key at position {} appears more than once", i));
            }
        }
        Ok(())
    }
}

/// Thread-safe map that remembers the order of its keys.
///
/// All methods take `&self`; share the map between threads with `Arc`.
/// Values are cloned out on every read, so no reference into the map ever
/// escapes the lock.
pub struct OrderedMap<K, V> {
    /// Mapping + order under one lock. Shared with traversal producers.
    pub(crate) inner: Arc<RwLock<Inner<K, V>>>,
    config: Config,
}

impl<K, V> OrderedMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create an empty map with the default configuration.
    pub fn new() -> Self {
        let config = Config::default();
        Self {
            inner: Arc::new(RwLock::new(Inner::with_capacity(config.initial_capacity))),
            config,
        }
    }

    /// Create an empty map after validating `config`.
    pub fn with_config(config: Config) -> OmResult<Self> {
        config.validate().map_err(OrderedMapError::InvalidConfig)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Inner::with_capacity(config.initial_capacity))),
            config,
        })
    }

    /// Append `key` to the end of the order.
    ///
    /// If the key is already present its value is overwritten and it keeps
    /// its current position; it is NOT moved to the end.
    pub fn add(&self, key: K, value: V) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        if let Some(slot) = inner.data.get_mut(&key) {
            *slot = value;
            return;
        }
        inner.order.push(key.clone());
        inner.data.insert(key, value);
    }

    /// Insert `key` at the zero-based `position`, shifting later keys right.
    ///
    /// `position == len()` appends. Anything larger fails with
    /// [`OrderedMapError::Range`] and leaves the map untouched.
    ///
    /// If the key is already present its value is overwritten and the key is
    /// moved so that it ends up at `position` (or last, when `position` was
    /// `len()`). A key never occupies two slots of the order.
    pub fn insert(&self, position: usize, key: K, value: V) -> OmResult<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let len = inner.order.len();
        if position > len {
            return Err(OrderedMapError::Range { position, len });
        }

        let mut position = position;
        if inner.data.insert(key.clone(), value).is_some() {
            if let Some(old) = inner.position(&key) {
                inner.order.remove(old);
            }
            position = position.min(inner.order.len());
        }
        inner.order.insert(position, key);
        Ok(())
    }

    /// Value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let inner = self.inner.read();
        inner.data.get(key).cloned()
    }

    /// Key and value at `index` in the order. None when out of range.
    pub fn get_index(&self, index: usize) -> Option<(K, V)> {
        let inner = self.inner.read();
        inner.get_index(index)
    }

    /// Copy of the current order. Changing it does not affect the map.
    pub fn order(&self) -> Vec<K> {
        let inner = self.inner.read();
        inner.order.clone()
    }

    /// Replace the order.
    ///
    /// Succeeds only if `new_order` holds exactly the current keys, each once.
    /// Otherwise returns [`OrderedMapError::InvalidOrder`] and the previous
    /// order stays in place. Check and swap happen under one write lock.
    pub fn set_order(&self, new_order: Vec<K>) -> OmResult<()> {
        let mut inner = self.inner.write();
        inner
            .check_permutation(&new_order)
            .map_err(|reason| OrderedMapError::InvalidOrder { reason })?;
        inner.order = new_order;
        Ok(())
    }

    /// Position of `key` in the order (linear scan).
    pub fn index_of<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let inner = self.inner.read();
        inner.position(key)
    }

    /// Remove `key` from mapping and order. Absent keys are a no-op.
    pub fn delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let value = inner.data.remove(key)?;
        if let Some(index) = inner.position(key) {
            inner.order.remove(index);
        }
        Some(value)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        let inner = self.inner.read();
        inner.len()
    }

    /// Returns true if the map has no entries.
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.read();
        inner.order.is_empty()
    }

    /// Check if key exists.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let inner = self.inner.read();
        inner.data.contains_key(key)
    }

    /// All pairs in order, taken under a single read lock.
    ///
    /// Unlike [`traverse`](Self::traverse) this is a consistent snapshot.
    pub fn entries(&self) -> Vec<(K, V)> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|k| inner.data.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.data.clear();
        inner.order.clear();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl<K, V> OrderedMap<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Begin a lazy, cancellable traversal in the current order.
    ///
    /// Entries are read one position at a time on a background thread, so
    /// concurrent writes may be partly visible. Stop early with
    /// [`Traversal::cancel`] or by dropping the handle.
    pub fn traverse(&self) -> OmResult<Traversal<K, V>> {
        Traversal::start(Arc::clone(&self.inner), &self.config.traversal_thread_name)
    }
}

impl<K, V> Default for OrderedMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self { Self::new() }
}

impl<K, V> FromIterator<(K, V)> for OrderedMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = Self::new();
        for (key, value) in iter {
            map.add(key, value);
        }
        map
    }
}

impl<K, V> Extend<(K, V)> for OrderedMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.add(key, value);
        }
    }
}

impl<K, V> fmt::Debug for OrderedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedMap")
            .field("len", &self.inner.read().order.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_a() -> OrderedMap<String, f64> {
        let map = OrderedMap::new();
        map.add("one".to_string(), 1.0);
        map.add("two".to_string(), 2.0);
        map.add("three".to_string(), 3.0);
        map
    }

    fn assert_consistent<K: Hash + Eq + Clone, V: Clone>(map: &OrderedMap<K, V>) {
        let inner = map.inner.read();
        assert_eq!(inner.data.len(), inner.order.len());
        for key in &inner.order {
            assert!(inner.data.contains_key(key));
        }
    }

    #[test]
    fn test_new_empty() {
        let map: OrderedMap<String, u32> = OrderedMap::new();
        assert_eq!(map.len(), 0);
        assert!(map.is_empty());
        assert!(map.order().is_empty());
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let bad = Config::small().with_thread_name("");
        let err = OrderedMap::<String, u32>::with_config(bad).unwrap_err();
        assert!(matches!(err, OrderedMapError::InvalidConfig(_)));
    }

    #[test]
    fn test_add_and_order() {
        let map = scenario_a();
        assert_eq!(map.order(), vec!["one", "two", "three"]);
        assert_eq!(map.index_of("two"), Some(1));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_add_duplicate_keeps_position() {
        let map = scenario_a();
        map.add("one".to_string(), 10.0);
        assert_eq!(map.order(), vec!["one", "two", "three"]);
        assert_eq!(map.get("one"), Some(10.0));
        assert_eq!(map.len(), 3);
        assert_consistent(&map);
    }

    #[test]
    fn test_insert_middle() {
        let map = scenario_a();
        map.insert(1, "oneb".to_string(), 1.5).unwrap();
        assert_eq!(map.order(), vec!["one", "oneb", "two", "three"]);
        assert_eq!(map.len(), 4);
        assert_eq!(map.get("oneb"), Some(1.5));
    }

    #[test]
    fn test_insert_front() {
        let map = scenario_a();
        map.insert(0, "zero".to_string(), 0.0).unwrap();
        assert_eq!(map.order(), vec!["zero", "one", "two", "three"]);
    }

    #[test]
    fn test_insert_at_len_appends() {
        let map = scenario_a();
        map.insert(3, "four".to_string(), 4.0).unwrap();
        assert_eq!(map.order(), vec!["one", "two", "three", "four"]);

        let empty: OrderedMap<String, f64> = OrderedMap::new();
        empty.insert(0, "only".to_string(), 1.0).unwrap();
        assert_eq!(empty.order(), vec!["only"]);
    }

    #[test]
    fn test_insert_out_of_range() {
        let map = scenario_a();
        let err = map.insert(4, "five".to_string(), 5.0).unwrap_err();
        assert_eq!(err, OrderedMapError::Range { position: 4, len: 3 });
        assert_eq!(map.order(), vec!["one", "two", "three"]);
        assert!(!map.contains_key("five"));
    }

    #[test]
    fn test_insert_existing_key_moves() {
        let map = scenario_a();
        map.insert(0, "three".to_string(), 30.0).unwrap();
        assert_eq!(map.order(), vec!["three", "one", "two"]);
        assert_eq!(map.get("three"), Some(30.0));

        map.insert(2, "three".to_string(), 31.0).unwrap();
        assert_eq!(map.order(), vec!["one", "two", "three"]);

        // position == len on an existing key lands it last
        map.insert(3, "one".to_string(), 11.0).unwrap();
        assert_eq!(map.order(), vec!["two", "three", "one"]);
        assert_eq!(map.len(), 3);
        assert_consistent(&map);
    }

    #[test]
    fn test_get_missing() {
        let map = scenario_a();
        assert_eq!(map.get("nope"), None);
        assert!(!map.contains_key("nope"));
    }

    #[test]
    fn test_get_index() {
        let map = scenario_a();
        assert_eq!(map.get_index(1), Some(("two".to_string(), 2.0)));
        assert_eq!(map.get_index(3), None);
        assert_eq!(map.get_index(usize::MAX), None);
    }

    #[test]
    fn test_order_is_a_copy() {
        let map = scenario_a();
        let mut order = map.order();
        order.push("bogus".to_string());
        order.swap(0, 1);
        assert_eq!(map.order(), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_set_order() {
        let map = scenario_a();
        map.set_order(vec!["three".into(), "one".into(), "two".into()]).unwrap();
        assert_eq!(map.order(), vec!["three", "one", "two"]);
        assert_eq!(map.get_index(0), Some(("three".to_string(), 3.0)));
    }

    #[test]
    fn test_set_order_round_trip() {
        let map = scenario_a();
        let before = map.entries();
        map.set_order(map.order()).unwrap();
        assert_eq!(map.entries(), before);
    }

    #[test]
    fn test_set_order_rejects_non_permutations() {
        let map = scenario_a();
        let cases: Vec<Vec<String>> = vec![
            vec!["three".into(), "one".into(), "five".into()],
            vec!["three".into(), "one".into(), "two".into(), "five".into(), "eleventy".into()],
            vec!["one".into(), "one".into(), "two".into()],
            vec![],
        ];
        for case in cases {
            let err = map.set_order(case).unwrap_err();
            assert!(matches!(err, OrderedMapError::InvalidOrder { .. }));
            assert_eq!(map.order(), vec!["one", "two", "three"]);
        }
    }

    #[test]
    fn test_index_of_missing() {
        let map = scenario_a();
        assert_eq!(map.index_of("one"), Some(0));
        assert_eq!(map.index_of("three"), Some(2));
        assert_eq!(map.index_of("zero"), None);
    }

    #[test]
    fn test_delete() {
        let map = scenario_a();
        assert_eq!(map.delete("two"), Some(2.0));
        assert_eq!(map.get("two"), None);
        assert_eq!(map.len(), 2);
        assert_eq!(map.order(), vec!["one", "three"]);
        assert_consistent(&map);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let map = scenario_a();
        assert_eq!(map.delete("nope"), None);
        assert_eq!(map.order(), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_entries_and_clear() {
        let mut map: OrderedMap<&'static str, i32> = [("a", 1), ("b", 2)].into_iter().collect();
        map.extend([("c", 3), ("a", 4)]);
        assert_eq!(map.entries(), vec![("a", 4), ("b", 2), ("c", 3)]);

        map.clear();
        assert!(map.is_empty());
        assert!(map.entries().is_empty());
    }

    #[test]
    fn test_debug_shows_len() {
        let map = scenario_a();
        assert!(format!("{:?}", map).contains("len: 3"));
    }
}
