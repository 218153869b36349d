//! Watchers that keep themselves alive while registered with an event-loop
//! dispatcher.
//!
//! A watcher is one registered interest in an asynchronous event: it carries a
//! callback and an identity that the event loop's dispatcher keys its
//! registration table on. The hard part of the arrangement is lifetime. The
//! owner that created a watcher may drop every reference it holds long before
//! the dispatcher fires, and the callback may cancel the very watcher it
//! belongs to while that watcher's invocation is still on the stack. Getting
//! either wrong means a leaked registration or a destroyed watcher being
//! fired.
//!
//! [`SelfOwningWatcher`] resolves both by co-owning itself through a
//! [`counted_pool::CountedPool`]: it holds a persistent handle on its own pool
//! entry while started, and a transient one for the duration of each
//! invocation. [`Watcher`] is the plain state machine underneath, usable on
//! its own when ordinary ownership is enough.
//!
//! Everything here is single-threaded by design: the dispatcher, the watchers
//! and their callbacks all run on the one event-loop thread, and calls nest
//! rather than race.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use counted_pool::CountedPool;
//! use watchers::{Dispatcher, SelfOwningWatcher, WatcherId};
//!
//! struct NoopDispatcher;
//!
//! impl Dispatcher for NoopDispatcher {
//!     fn register(&mut self, _id: WatcherId) -> bool {
//!         true
//!     }
//!
//!     fn unregister(&mut self, _id: WatcherId) -> bool {
//!         true
//!     }
//! }
//!
//! let pool = CountedPool::new();
//! let dispatcher = Rc::new(RefCell::new(NoopDispatcher));
//!
//! let watcher = SelfOwningWatcher::new_in(&pool, dispatcher, WatcherId::new(2), |id| {
//!     println!("watcher {id:?} fired");
//! });
//!
//! // Starting takes the persistent self-reference...
//! assert!(watcher.get().start());
//! assert_eq!(watcher.ref_count(), 2);
//!
//! // ...and cancelling releases it again.
//! assert!(watcher.get().cancel());
//! assert_eq!(watcher.ref_count(), 1);
//! ```

mod dispatcher;
mod self_owning;
mod watcher;

#[cfg(test)]
mod test_utils;

pub use dispatcher::{Dispatcher, SharedDispatcher, WatcherId};
pub use self_owning::SelfOwningWatcher;
pub use watcher::{Watcher, WatcherCallback};
