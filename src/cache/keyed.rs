//! Caches indexed by a lookup key.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Capacity-one cache: holds the value for the most recent key and recomputes
/// whenever a different key is requested.
pub struct KeyedCache<K, T> {
    slot: RefCell<Option<(K, Rc<T>)>>,
    make: Box<dyn Fn(&K) -> T>,
}

impl<K: PartialEq + Clone, T> KeyedCache<K, T> {
    pub fn new(make: impl Fn(&K) -> T + 'static) -> Self {
        Self {
            slot: RefCell::new(None),
            make: Box::new(make),
        }
    }

    pub fn get(&self, key: &K) -> Rc<T> {
        if let Some((k, value)) = self.slot.borrow().as_ref() {
            if k == key {
                return Rc::clone(value);
            }
        }
        let value = Rc::new((self.make)(key));
        *self.slot.borrow_mut() = Some((key.clone(), Rc::clone(&value)));
        value
    }

    pub fn invalidate(&self) {
        self.slot.borrow_mut().take();
    }
}

/// Bounded key-value store evicting the least recently used entry.
///
/// Keys only need `PartialEq`, so lookups are linear. Capacities are small.
pub struct LruCache<K, V> {
    capacity: usize,
    entries: RefCell<Vec<(K, Rc<V>, u64)>>,
    tick: Cell<u64>,
}

impl<K: PartialEq + Clone, V> LruCache<K, V> {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "LRU cache needs a positive capacity");
        Self {
            capacity,
            entries: RefCell::new(Vec::with_capacity(capacity)),
            tick: Cell::new(0),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.set(self.tick.get() + 1);
        self.tick.get()
    }

    /// Look up `key`, computing and inserting the value with `make` on a miss.
    pub fn get_or_insert_with(&self, key: &K, make: impl FnOnce(&K) -> V) -> Rc<V> {
        let now = self.next_tick();
        if let Some(entry) = self.entries.borrow_mut().iter_mut().find(|e| &e.0 == key) {
            entry.2 = now;
            return Rc::clone(&entry.1);
        }

        let value = Rc::new(make(key));
        let mut entries = self.entries.borrow_mut();
        if entries.len() >= self.capacity {
            if let Some(oldest) = entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| e.2)
                .map(|(i, _)| i)
            {
                entries.swap_remove(oldest);
            }
        }
        entries.push((key.clone(), Rc::clone(&value), now));
        value
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.borrow().iter().any(|e| &e.0 == key)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyed_recomputes_on_new_key() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let cache = KeyedCache::new(move |k: &u32| {
            counter.set(counter.get() + 1);
            k * 10
        });

        assert_eq!(*cache.get(&1), 10);
        assert_eq!(*cache.get(&1), 10);
        assert_eq!(calls.get(), 1);
        assert_eq!(*cache.get(&2), 20);
        assert_eq!(*cache.get(&1), 10);
        assert_eq!(calls.get(), 3);

        cache.invalidate();
        cache.get(&1);
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_lru_evicts_oldest() {
        let cache: LruCache<&str, usize> = LruCache::new(2);
        cache.get_or_insert_with(&"a", |k| k.len());
        cache.get_or_insert_with(&"bb", |k| k.len());
        // touch "a" so "bb" becomes the oldest
        cache.get_or_insert_with(&"a", |_| unreachable!());
        cache.get_or_insert_with(&"ccc", |k| k.len());

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"bb"));
        assert!(cache.contains(&"ccc"));
    }
}
