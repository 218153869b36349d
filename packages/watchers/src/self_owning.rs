use std::cell::RefCell;
use std::fmt;

use counted_pool::{CountedPool, Handle, Key};

use crate::{SharedDispatcher, Watcher, WatcherId};

/// A watcher that co-owns itself while it is started.
///
/// Three parties are interested in a watcher's lifetime: the external owner
/// that created it, the dispatcher that will fire it at some future time, and
/// the callback, which may cancel its own watcher while it is executing. A
/// plain [`Watcher`] dies with its owner's last handle, which is wrong for the
/// dispatcher: a started watcher must stay reachable until it is cancelled,
/// even if the owner has long lost interest.
///
/// `SelfOwningWatcher` lives in a [`CountedPool`] and closes the gap with two
/// self-references on its own pool entry:
///
/// * a *persistent* one, acquired by [`start()`] and released by [`cancel()`],
///   held exactly while the watcher is registered with the dispatcher;
/// * a *transient* one, held for the duration of each [`invoke()`] call, so
///   that a callback cancelling its own watcher (dropping the persistent
///   reference mid-call) never destroys the watcher while its invocation is
///   still on the stack.
///
/// Destruction is therefore possible only once the watcher is stopped, no
/// invocation is in progress and the external owner has released its handles.
///
/// # Example
///
/// A callback cancels its own watcher mid-invocation; the watcher survives
/// until the invocation returns:
///
/// ```rust
/// use std::cell::{Cell, RefCell};
/// use std::rc::Rc;
///
/// use counted_pool::{CountedPool, Key};
/// use watchers::{Dispatcher, SelfOwningWatcher, WatcherId};
///
/// struct NoopDispatcher;
///
/// # impl Dispatcher for NoopDispatcher {
/// #     fn register(&mut self, _id: WatcherId) -> bool {
/// #         true
/// #     }
/// #     fn unregister(&mut self, _id: WatcherId) -> bool {
/// #         true
/// #     }
/// # }
/// let pool = CountedPool::new();
/// let dispatcher = Rc::new(RefCell::new(NoopDispatcher));
/// let key_cell: Rc<Cell<Option<Key>>> = Rc::new(Cell::new(None));
///
/// let watcher = SelfOwningWatcher::new_in(&pool, dispatcher, WatcherId::new(15), {
///     let pool = pool.clone();
///     let key_cell = Rc::clone(&key_cell);
///
///     move |_id| {
///         let key = key_cell.get().expect("key is published before the watcher fires");
///         let own = pool.acquire(key);
///         assert!(own.get().cancel());
///     }
/// });
/// key_cell.set(Some(watcher.key()));
///
/// assert!(watcher.get().start());
/// assert_eq!(watcher.ref_count(), 2);
///
/// // The dispatcher fires; afterwards the watcher is stopped but intact.
/// pool.acquire(watcher.key()).get().invoke();
///
/// assert!(!watcher.get().is_active());
/// assert_eq!(watcher.ref_count(), 1);
/// ```
pub struct SelfOwningWatcher {
    watcher: Watcher,

    /// Facade clone of the pool this watcher lives in, used together with
    /// `key` to mint handles on itself.
    pool: CountedPool<SelfOwningWatcher>,
    key: Key,

    /// The persistent self-reference. `Some` exactly while started.
    self_ref: RefCell<Option<Handle<SelfOwningWatcher>>>,
}

impl SelfOwningWatcher {
    /// Creates a stopped watcher inside `pool` and returns the external
    /// owner's handle on it.
    ///
    /// The new watcher holds no self-reference yet: until [`start()`] is
    /// called, its reference count is exactly the number of external handles,
    /// and dropping them all destroys it.
    ///
    /// [`start()`]: Self::start
    #[must_use]
    pub fn new_in(
        pool: &CountedPool<Self>,
        dispatcher: SharedDispatcher,
        id: WatcherId,
        callback: impl FnMut(WatcherId) + 'static,
    ) -> Handle<Self> {
        let inserter = pool.begin_insert();
        let key = inserter.key();

        inserter.insert(Self {
            watcher: Watcher::new(dispatcher, id, callback),
            pool: pool.clone(),
            key,
            self_ref: RefCell::new(None),
        })
    }

    /// The identity this watcher registers under.
    #[must_use]
    pub fn id(&self) -> WatcherId {
        self.watcher.id()
    }

    /// Whether the watcher is currently started.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.watcher.is_active()
    }

    /// The watcher's own pool key, the identity a dispatcher embedding keeps
    /// to later mint the handle it fires the watcher through.
    #[must_use]
    pub fn key(&self) -> Key {
        self.key
    }

    /// Starts the watcher and takes the persistent self-reference.
    ///
    /// Returns `false` without taking any reference if the watcher is already
    /// started or the dispatcher refuses the registration.
    pub fn start(&self) -> bool {
        if !self.watcher.start() {
            return false;
        }

        // While started, the watcher is its own co-owner: it stays alive even
        // if the external owner drops every handle before cancelling.
        let previous = self.self_ref.replace(Some(self.pool.acquire(self.key)));
        debug_assert!(
            previous.is_none(),
            "a stopped watcher must not hold a persistent self-reference"
        );

        true
    }

    /// Stops the watcher and releases the persistent self-reference.
    ///
    /// Returns `false` and leaves the (absent) self-reference untouched if the
    /// watcher is not started. Cancelling from within the watcher's own
    /// callback is fully supported; the transient reference taken by
    /// [`invoke()`][Self::invoke] defers destruction until the invocation
    /// returns.
    pub fn cancel(&self) -> bool {
        if !self.watcher.cancel() {
            return false;
        }

        let released = self.self_ref.take();
        debug_assert!(
            released.is_some(),
            "a started watcher must hold a persistent self-reference"
        );
        drop(released);

        true
    }

    /// Runs the callback once. Called by the dispatcher, through a handle,
    /// when the watched event occurs.
    ///
    /// # Panics
    ///
    /// Panics if the watcher is not started or if the callback calls
    /// `invoke()` re-entrantly.
    pub fn invoke(&self) {
        // Taken before anything else: if the callback cancels this watcher and
        // no other handle remains, this reference keeps the watcher alive
        // until the call returns, on every exit path including unwinding.
        let _in_call = self.pool.acquire(self.key);

        self.watcher.invoke();
    }
}

impl fmt::Debug for SelfOwningWatcher {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug formatting.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfOwningWatcher")
            .field("watcher", &self.watcher)
            .field("key", &self.key)
            .field("self_referenced", &self.self_ref.borrow().is_some())
            .finish_non_exhaustive()
    }
}
