use std::fmt;
use std::rc::Rc;

use crate::counted_pool::{Key, PoolInner};

/// A strong owning handle on an item in a
/// [`CountedPool`][crate::CountedPool].
///
/// Handles are the unit of ownership: each live handle contributes one to the
/// item's reference count. Cloning a handle increments the count and dropping
/// one decrements it; the item is destroyed synchronously when the count
/// reaches zero.
///
/// # Example
///
/// ```rust
/// use counted_pool::CountedPool;
///
/// let pool = CountedPool::<Vec<u8>>::new();
/// let handle = pool.insert(vec![1, 2, 3]);
///
/// assert_eq!(handle.get().len(), 3);
/// assert_eq!(handle.ref_count(), 1);
/// ```
pub struct Handle<T> {
    inner: Rc<PoolInner<T>>,
    key: Key,
}

impl<T> Handle<T> {
    /// The caller has already incremented the item's reference count on behalf
    /// of this handle.
    pub(crate) fn new(inner: Rc<PoolInner<T>>, key: Key) -> Self {
        Self { inner, key }
    }

    /// The key of the item this handle owns.
    #[must_use]
    pub fn key(&self) -> Key {
        self.key
    }

    /// The item's current reference count.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        self.inner.slots.borrow().ref_count(self.key)
    }

    /// Returns a shared reference to the item.
    ///
    /// The reference borrows this handle, which is what makes it valid: a
    /// borrowed handle cannot be dropped, so the item's reference count stays
    /// at least one and the item cannot be destroyed while the reference
    /// lives. Other handles may be freely minted and released in the meantime,
    /// including from code reached through this very reference.
    #[must_use]
    pub fn get(&self) -> &T {
        let ptr = self.inner.slots.borrow().value_ptr(self.key);

        // SAFETY: This handle keeps the item's reference count at least one
        // for as long as the returned reference lives, the item is boxed so it
        // never moves, and no API hands out exclusive references to items.
        unsafe { ptr.as_ref() }
    }
}

impl<T> Clone for Handle<T> {
    /// Mints another owning handle for the same item, incrementing its
    /// reference count.
    fn clone(&self) -> Self {
        self.inner.slots.borrow().inc_ref(self.key);

        Self {
            inner: Rc::clone(&self.inner),
            key: self.key,
        }
    }
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        let was_last = self.inner.slots.borrow().dec_ref(self.key);

        if was_last {
            let value = self.inner.slots.borrow_mut().remove(self.key);

            // The item is dropped with no borrow of the slot storage held, so
            // its destructor may release further handles into this pool.
            drop(value);
        }
    }
}

impl<T> fmt::Debug for Handle<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug formatting.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("key", &self.key)
            .field("ref_count", &self.ref_count())
            .finish_non_exhaustive()
    }
}
