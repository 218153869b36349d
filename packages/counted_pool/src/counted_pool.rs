use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop};
use std::ptr::NonNull;
use std::rc::Rc;

use crate::Handle;

/// An object pool whose items are collectively owned by reference-counting
/// [`Handle`]s.
///
/// The pool itself is a facade: cloning a `CountedPool` clones the facade, not
/// the contents, so all clones address the same storage. This is what allows an
/// item to carry a pool clone plus its own [`Key`] and mint owning handles on
/// itself on demand.
///
/// Items are destroyed synchronously when their last handle is released. An
/// item's destructor may itself release handles into the same pool - the pool
/// takes no internal borrow while running item destructors.
///
/// # Example
///
/// ```rust
/// use counted_pool::CountedPool;
///
/// let pool = CountedPool::<i32>::new();
///
/// let item = pool.insert(42);
/// assert_eq!(*item.get(), 42);
/// assert_eq!(pool.len(), 1);
///
/// drop(item);
/// assert!(pool.is_empty());
/// ```
pub struct CountedPool<T> {
    inner: Rc<PoolInner<T>>,
}

/// The storage shared by a pool facade and every handle minted from it.
pub(crate) struct PoolInner<T> {
    pub(crate) slots: RefCell<Slots<T>>,
}

/// A key that identifies an item in a [`CountedPool`].
///
/// Keys are opaque and copyable. They carry no ownership: holding a key does
/// not keep the item alive, and a key may be reused for a different item after
/// the one it named is destroyed. Passing a dead key to
/// [`CountedPool::acquire()`] is a contract violation and panics.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Key {
    index: usize,
}

impl<T> CountedPool<T> {
    /// Creates a new empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(PoolInner {
                slots: RefCell::new(Slots::new()),
            }),
        }
    }

    /// The number of items in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.slots.borrow().len
    }

    /// Whether the pool holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts an item and returns its first owning handle.
    ///
    /// The item starts with a reference count of one. Discarding the returned
    /// handle immediately destroys the item again.
    ///
    /// # Example
    ///
    /// ```rust
    /// use counted_pool::CountedPool;
    ///
    /// let pool = CountedPool::<&str>::new();
    /// let item = pool.insert("payload");
    ///
    /// assert_eq!(item.ref_count(), 1);
    /// ```
    #[must_use]
    pub fn insert(&self, value: T) -> Handle<T> {
        self.begin_insert().insert(value)
    }

    /// Starts a two-phase insertion.
    ///
    /// The returned inserter exposes the item's future [`Key`] before the value
    /// exists, which lets a value record its own identity during construction.
    /// Abandoning the inserter without calling
    /// [`insert()`][CountedPoolInserter::insert] leaves the pool unchanged.
    ///
    /// # Example
    ///
    /// ```rust
    /// use counted_pool::CountedPool;
    ///
    /// let pool = CountedPool::<String>::new();
    ///
    /// let inserter = pool.begin_insert();
    /// let key = inserter.key();
    /// let item = inserter.insert(format!("I live at {key:?}"));
    ///
    /// assert_eq!(item.key(), key);
    /// ```
    #[must_use]
    pub fn begin_insert(&self) -> CountedPoolInserter<'_, T> {
        let key = self.inner.slots.borrow_mut().reserve_entry();

        CountedPoolInserter { pool: self, key }
    }

    /// Mints an additional owning handle for the item identified by `key`,
    /// incrementing its reference count.
    ///
    /// # Panics
    ///
    /// Panics if the key is not associated with an item in the pool.
    #[must_use]
    pub fn acquire(&self, key: Key) -> Handle<T> {
        self.inner.slots.borrow().inc_ref(key);

        Handle::new(Rc::clone(&self.inner), key)
    }
}

impl<T> Clone for CountedPool<T> {
    /// Clones the facade. The clone addresses the same storage as the
    /// original; no items are copied.
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for CountedPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for CountedPool<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug formatting.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountedPool")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// A pending insertion into a [`CountedPool`], created by
/// [`CountedPool::begin_insert()`].
///
/// The inserter reserves a slot so that [`key()`][Self::key] is already final.
/// Dropping the inserter without inserting returns the reservation to the
/// pool's free list.
pub struct CountedPoolInserter<'p, T> {
    pool: &'p CountedPool<T>,
    key: Key,
}

impl<T> CountedPoolInserter<'_, T> {
    /// The key of the item this inserter will insert.
    #[must_use]
    pub fn key(&self) -> Key {
        self.key
    }

    /// Completes the insertion and returns the item's first owning handle.
    ///
    /// The item starts with a reference count of one.
    #[must_use]
    pub fn insert(self, value: T) -> Handle<T> {
        // The reservation is consumed here, so the drop logic that would
        // release it must not run.
        let this = ManuallyDrop::new(self);

        let inner = Rc::clone(&this.pool.inner);
        inner.slots.borrow_mut().occupy(this.key, value);

        Handle::new(inner, this.key)
    }
}

impl<T> Drop for CountedPoolInserter<'_, T> {
    fn drop(&mut self) {
        self.pool
            .inner
            .slots
            .borrow_mut()
            .release_reservation(self.key);
    }
}

impl<T> fmt::Debug for CountedPoolInserter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountedPoolInserter")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// The slot storage of a pool. Vacant slots form an intrusive free list so
/// indices (and therefore keys) are recycled.
pub(crate) struct Slots<T> {
    entries: Vec<Entry<T>>,
    first_free: Option<usize>,
    len: usize,

    /// Tells drop check that dropping the storage may drop `T` values.
    _items: PhantomData<T>,
}

enum Entry<T> {
    Occupied(Slot<T>),
    Reserved,
    Vacant { next_free: Option<usize> },
}

/// One live item: its boxed storage and the number of owning handles.
///
/// The count lives in a `Cell` so that handle bookkeeping only ever needs a
/// shared borrow of the slot storage. Exclusive borrows are reserved for
/// insertion and removal, which never run user code while held.
struct Slot<T> {
    value: NonNull<T>,
    ref_count: Cell<usize>,
}

impl<T> Slots<T> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            first_free: None,
            len: 0,
            _items: PhantomData,
        }
    }

    fn occupied(&self, key: Key) -> &Slot<T> {
        match self.entries.get(key.index) {
            Some(Entry::Occupied(slot)) => slot,
            _ => panic!("key was not associated with an item in the pool"),
        }
    }

    /// Increments the reference count of the item identified by `key`.
    ///
    /// # Panics
    ///
    /// Panics if the key names no live item, if the count was zero (an item
    /// about to be destroyed cannot be resurrected) or if the count would
    /// overflow.
    pub(crate) fn inc_ref(&self, key: Key) {
        let slot = self.occupied(key);
        let previous = slot.ref_count.get();

        assert_ne!(
            previous, 0,
            "attempted to resurrect an item whose last handle was already released"
        );

        slot.ref_count.set(previous.checked_add(1).expect(
            "reference count overflow - indicates a defect in handle bookkeeping",
        ));
    }

    /// Decrements the reference count of the item identified by `key` and
    /// returns `true` if this released the last reference.
    ///
    /// # Panics
    ///
    /// Panics if the count would underflow, which means a handle was released
    /// twice.
    pub(crate) fn dec_ref(&self, key: Key) -> bool {
        let slot = self.occupied(key);

        let new = slot.ref_count.get().checked_sub(1).expect(
            "reference count underflow - a handle was released twice",
        );

        slot.ref_count.set(new);
        new == 0
    }

    pub(crate) fn ref_count(&self, key: Key) -> usize {
        self.occupied(key).ref_count.get()
    }

    pub(crate) fn value_ptr(&self, key: Key) -> NonNull<T> {
        self.occupied(key).value
    }

    fn reserve_entry(&mut self) -> Key {
        if let Some(index) = self.first_free {
            let entry = self
                .entries
                .get_mut(index)
                .expect("free list references an entry that does not exist");

            let Entry::Vacant { next_free } = *entry else {
                panic!("free list references an entry that is not vacant");
            };

            self.first_free = next_free;
            *entry = Entry::Reserved;

            Key { index }
        } else {
            let index = self.entries.len();
            self.entries.push(Entry::Reserved);

            Key { index }
        }
    }

    fn occupy(&mut self, key: Key, value: T) {
        let value = NonNull::from(Box::leak(Box::new(value)));

        let entry = self
            .entries
            .get_mut(key.index)
            .expect("reservation references an entry that does not exist");

        debug_assert!(
            matches!(entry, Entry::Reserved),
            "insertion completed into an entry that was not reserved"
        );

        *entry = Entry::Occupied(Slot {
            value,
            ref_count: Cell::new(1),
        });

        self.len = self
            .len
            .checked_add(1)
            .expect("pool cannot hold more items than virtual memory can fit");
    }

    fn release_reservation(&mut self, key: Key) {
        let next_free = self.first_free;

        let entry = self
            .entries
            .get_mut(key.index)
            .expect("reservation references an entry that does not exist");

        debug_assert!(
            matches!(entry, Entry::Reserved),
            "released a reservation for an entry that was not reserved"
        );

        *entry = Entry::Vacant { next_free };
        self.first_free = Some(key.index);
    }

    /// Vacates the entry and returns the boxed item so the caller can drop it
    /// after all borrows of the slot storage are released.
    pub(crate) fn remove(&mut self, key: Key) -> Box<T> {
        let next_free = self.first_free;

        let entry = self
            .entries
            .get_mut(key.index)
            .expect("key was not associated with an item in the pool");

        match mem::replace(entry, Entry::Vacant { next_free }) {
            Entry::Occupied(slot) => {
                self.first_free = Some(key.index);
                self.len = self
                    .len
                    .checked_sub(1)
                    .expect("pool length underflow - more items removed than inserted");

                debug_assert_eq!(
                    slot.ref_count.get(),
                    0,
                    "item removed while owning handles are still outstanding"
                );

                // SAFETY: The pointer came from `Box::leak` in `occupy()` and the
                // entry was vacated above, so this is the only reclamation.
                unsafe { Box::from_raw(slot.value.as_ptr()) }
            }
            previous => {
                *entry = previous;
                panic!("key was not associated with an item in the pool");
            }
        }
    }
}

impl<T> Drop for Slots<T> {
    fn drop(&mut self) {
        // An occupied entry at this point means handles were leaked without
        // being dropped; the allocations still have to be reclaimed.
        for entry in &mut self.entries {
            if let Entry::Occupied(slot) = entry {
                // SAFETY: The pointer came from `Box::leak` in `occupy()` and the
                // whole storage is going away, so nothing can reach it again.
                drop(unsafe { Box::from_raw(slot.value.as_ptr()) });
            }
        }
    }
}
