//! Lazily computed values that are recomputed only after explicit invalidation.

use std::cell::RefCell;
use std::rc::Rc;

/// A single memoized value.
///
/// The remake closure receives the owner (`P`) the value is derived from.
/// Results are shared through `Rc`, so a caller may keep a result while the
/// cache is invalidated.
pub struct Cached<P: ?Sized, T> {
    payload: RefCell<Option<Rc<T>>>,
    remake: Box<dyn Fn(&P) -> T>,
}

impl<P: ?Sized, T> Cached<P, T> {
    pub fn new(remake: impl Fn(&P) -> T + 'static) -> Self {
        Self {
            payload: RefCell::new(None),
            remake: Box::new(remake),
        }
    }

    /// The memoized value, computing it first if needed.
    pub fn get(&self, parent: &P) -> Rc<T> {
        if let Some(value) = self.payload.borrow().as_ref() {
            return Rc::clone(value);
        }
        let value = Rc::new((self.remake)(parent));
        *self.payload.borrow_mut() = Some(Rc::clone(&value));
        value
    }

    /// The memoized value if it has been computed.
    pub fn get_if(&self) -> Option<Rc<T>> {
        self.payload.borrow().clone()
    }

    pub fn is_valid(&self) -> bool {
        self.payload.borrow().is_some()
    }

    pub fn invalidate(&self) {
        self.payload.borrow_mut().take();
    }
}

/// A vector of independently memoized values.
///
/// Its length follows `size_fn(parent)`. When that length differs from the
/// one seen last, every entry is dropped; this is the only automatic
/// invalidation.
pub struct CachedVector<P: ?Sized, T> {
    entries: RefCell<Vec<Option<Rc<T>>>>,
    size_fn: Box<dyn Fn(&P) -> usize>,
    remake: Box<dyn Fn(&P, usize) -> T>,
}

impl<P: ?Sized, T> CachedVector<P, T> {
    pub fn new(
        size_fn: impl Fn(&P) -> usize + 'static,
        remake: impl Fn(&P, usize) -> T + 'static,
    ) -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            size_fn: Box::new(size_fn),
            remake: Box::new(remake),
        }
    }

    fn sync_size(&self, parent: &P) -> usize {
        let n = (self.size_fn)(parent);
        let mut entries = self.entries.borrow_mut();
        if entries.len() != n {
            entries.clear();
            entries.resize_with(n, || None);
        }
        n
    }

    /// Current length as given by the size function.
    pub fn size(&self, parent: &P) -> usize {
        self.sync_size(parent)
    }

    /// Entry `i`, computing it first if needed.
    ///
    /// # Panics
    /// Panics if `i` is not below the current size.
    pub fn get(&self, parent: &P, i: usize) -> Rc<T> {
        let n = self.sync_size(parent);
        assert!(i < n, "cached vector index {i} out of range {n}");
        if let Some(value) = &self.entries.borrow()[i] {
            return Rc::clone(value);
        }
        let value = Rc::new((self.remake)(parent, i));
        self.entries.borrow_mut()[i] = Some(Rc::clone(&value));
        value
    }

    /// All entries, computing the missing ones.
    pub fn all(&self, parent: &P) -> Vec<Rc<T>> {
        let n = self.sync_size(parent);
        (0..n).map(|i| self.get(parent, i)).collect()
    }

    /// Call `f` on every entry that has already been computed.
    pub fn for_all_valid(&self, parent: &P, mut f: impl FnMut(usize, &T)) {
        self.sync_size(parent);
        let valid: Vec<(usize, Rc<T>)> = self
            .entries
            .borrow()
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|v| (i, Rc::clone(v))))
            .collect();
        for (i, value) in valid {
            f(i, &value);
        }
    }

    pub fn invalidate(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn invalidate_at(&self, i: usize) {
        if let Some(entry) = self.entries.borrow_mut().get_mut(i) {
            entry.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counter {
        base: Cell<i32>,
        calls: Cell<usize>,
        len: Cell<usize>,
    }

    impl Counter {
        fn new(base: i32) -> Self {
            Self {
                base: Cell::new(base),
                calls: Cell::new(0),
                len: Cell::new(3),
            }
        }
    }

    #[test]
    fn test_cached_get_until_invalidate() {
        let parent = Counter::new(7);
        let cache: Cached<Counter, i32> = Cached::new(|p: &Counter| {
            p.calls.set(p.calls.get() + 1);
            p.base.get() * 2
        });

        assert!(cache.get_if().is_none());
        let a = cache.get(&parent);
        let b = cache.get(&parent);
        assert_eq!(*a, 14);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(parent.calls.get(), 1);

        parent.base.set(10);
        assert_eq!(*cache.get(&parent), 14);

        cache.invalidate();
        assert!(!cache.is_valid());
        assert_eq!(*cache.get(&parent), 20);
        assert_eq!(parent.calls.get(), 2);
        // an Rc handed out before invalidation stays usable
        assert_eq!(*a, 14);
    }

    #[test]
    fn test_vector_per_index() {
        let parent = Counter::new(1);
        let cache: CachedVector<Counter, i32> = CachedVector::new(
            |p: &Counter| p.len.get(),
            |p: &Counter, i| {
                p.calls.set(p.calls.get() + 1);
                p.base.get() + i as i32
            },
        );

        assert_eq!(*cache.get(&parent, 2), 3);
        assert_eq!(*cache.get(&parent, 2), 3);
        assert_eq!(parent.calls.get(), 1);

        let mut seen = Vec::new();
        cache.for_all_valid(&parent, |i, v| seen.push((i, *v)));
        assert_eq!(seen, vec![(2, 3)]);

        parent.base.set(100);
        cache.invalidate_at(2);
        assert_eq!(*cache.get(&parent, 2), 102);
        assert_eq!(parent.calls.get(), 2);
    }

    #[test]
    fn test_vector_rebuilds_on_size_change() {
        let parent = Counter::new(0);
        let cache: CachedVector<Counter, i32> =
            CachedVector::new(|p: &Counter| p.len.get(), |p: &Counter, i| p.base.get() + i as i32);

        assert_eq!(cache.all(&parent).len(), 3);
        parent.base.set(50);
        assert_eq!(*cache.get(&parent, 0), 0);

        parent.len.set(4);
        assert_eq!(cache.size(&parent), 4);
        assert_eq!(*cache.get(&parent, 0), 50);
    }
}
