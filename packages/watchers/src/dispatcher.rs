use std::cell::RefCell;
use std::rc::Rc;

/// The identity a dispatcher keys watcher registrations on.
///
/// For a signal watcher this is the signal number; other watcher kinds assign
/// their own meaning to the raw value. The identity carries no ownership.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct WatcherId(u32);

impl WatcherId {
    /// Wraps a raw identity value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw identity value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// The event loop collaborator that tracks which watchers are active.
///
/// The dispatcher's own bookkeeping - how it maps identities to pending OS
/// events and when it decides to fire - is outside this crate. Watchers only
/// ever call the two registration operations below, always from the one thread
/// the event loop runs on.
pub trait Dispatcher {
    /// Records interest in events for `id`.
    ///
    /// Returns `false` if the dispatcher rejects the identity, for example
    /// because it is out of range or already taken.
    fn register(&mut self, id: WatcherId) -> bool;

    /// Removes interest in events for `id`.
    ///
    /// Returns `false` if nothing was registered under the identity.
    fn unregister(&mut self, id: WatcherId) -> bool;
}

/// A dispatcher as shared between the event loop embedding and its watchers.
pub type SharedDispatcher = Rc<RefCell<dyn Dispatcher>>;
