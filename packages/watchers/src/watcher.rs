use std::cell::{Cell, RefCell};
use std::fmt;

use crate::{SharedDispatcher, WatcherId};

/// The callback a watcher runs when the dispatcher fires it.
pub type WatcherCallback = Box<dyn FnMut(WatcherId)>;

/// One registered interest in an asynchronous event.
///
/// A watcher is either stopped (the initial state) or started. [`start()`]
/// registers it with the dispatcher and [`cancel()`] unregisters it; both
/// signal an already-current state or a dispatcher refusal by returning
/// `false` with no state change. While started, the dispatcher fires the
/// watcher by calling [`invoke()`], which runs the callback exactly once.
///
/// The callback may call [`cancel()`] (or [`start()`]) on its own watcher
/// while it is executing. It may not call [`invoke()`] re-entrantly.
///
/// All methods take `&self`: watcher state lives in cells because the watcher,
/// the dispatcher and the callback all run on the one event-loop thread and
/// calls nest rather than race.
///
/// [`start()`]: Self::start
/// [`cancel()`]: Self::cancel
/// [`invoke()`]: Self::invoke
pub struct Watcher {
    dispatcher: SharedDispatcher,
    id: WatcherId,
    callback: RefCell<WatcherCallback>,
    active: Cell<bool>,
}

impl Watcher {
    /// Creates a stopped watcher that will run `callback` whenever the
    /// dispatcher fires it.
    pub fn new(
        dispatcher: SharedDispatcher,
        id: WatcherId,
        callback: impl FnMut(WatcherId) + 'static,
    ) -> Self {
        Self {
            dispatcher,
            id,
            callback: RefCell::new(Box::new(callback)),
            active: Cell::new(false),
        }
    }

    /// The identity this watcher registers under.
    #[must_use]
    pub fn id(&self) -> WatcherId {
        self.id
    }

    /// Whether the watcher is currently started.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Starts the watcher by registering it with the dispatcher.
    ///
    /// Returns `false` without any state change if the watcher is already
    /// started or if the dispatcher refuses the registration.
    pub fn start(&self) -> bool {
        if self.active.get() {
            return false;
        }

        if !self.dispatcher.borrow_mut().register(self.id) {
            return false;
        }

        self.active.set(true);
        true
    }

    /// Stops the watcher by unregistering it from the dispatcher.
    ///
    /// Returns `false` without any state change if the watcher is not
    /// started. The state transition is not gated on the dispatcher's answer;
    /// a refused unregistration leaves a stale table entry for the dispatcher
    /// to reconcile.
    pub fn cancel(&self) -> bool {
        if !self.active.get() {
            return false;
        }

        _ = self.dispatcher.borrow_mut().unregister(self.id);

        self.active.set(false);
        true
    }

    /// Runs the callback once. Called by the dispatcher when the watched event
    /// occurs.
    ///
    /// Invoking does not change the started state; stopping is the callback's
    /// or a later [`cancel()`][Self::cancel]'s decision.
    ///
    /// # Panics
    ///
    /// Panics if the watcher is not started - the dispatcher must only fire
    /// watchers it currently has registered - or if the callback calls
    /// `invoke()` re-entrantly.
    pub fn invoke(&self) {
        assert!(
            self.active.get(),
            "invoke() called on a watcher that is not started"
        );

        let mut callback = self.callback.borrow_mut();
        (*callback)(self.id);
    }
}

impl fmt::Debug for Watcher {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug formatting.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id)
            .field("active", &self.active.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::arithmetic_side_effects,
        reason = "we do not need to worry about these things when writing test code"
    )]

    use std::rc::{Rc, Weak};

    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::Dispatcher;
    use crate::test_utils::RecordingDispatcher;

    fn new_dispatcher() -> Rc<RefCell<RecordingDispatcher>> {
        Rc::new(RefCell::new(RecordingDispatcher::new()))
    }

    #[test]
    fn start_registers_with_dispatcher() {
        let dispatcher = new_dispatcher();
        let watcher = Watcher::new(Rc::clone(&dispatcher) as SharedDispatcher, WatcherId::new(2), |_| {});

        assert!(!watcher.is_active());

        assert!(watcher.start());

        assert!(watcher.is_active());
        assert!(dispatcher.borrow().is_registered(WatcherId::new(2)));
    }

    #[test]
    fn second_start_is_rejected_without_state_change() {
        let dispatcher = new_dispatcher();
        let watcher = Watcher::new(Rc::clone(&dispatcher) as SharedDispatcher, WatcherId::new(2), |_| {});

        assert!(watcher.start());
        assert!(!watcher.start());

        assert!(watcher.is_active());
        assert_eq!(dispatcher.borrow().registered_len(), 1);
    }

    #[test]
    fn cancel_unregisters_from_dispatcher() {
        let dispatcher = new_dispatcher();
        let watcher = Watcher::new(Rc::clone(&dispatcher) as SharedDispatcher, WatcherId::new(2), |_| {});

        assert!(watcher.start());
        assert!(watcher.cancel());

        assert!(!watcher.is_active());
        assert!(!dispatcher.borrow().is_registered(WatcherId::new(2)));
    }

    #[test]
    fn cancel_before_start_is_rejected() {
        let dispatcher = new_dispatcher();
        let watcher = Watcher::new(Rc::clone(&dispatcher) as SharedDispatcher, WatcherId::new(2), |_| {});

        assert!(!watcher.cancel());
        assert!(!watcher.is_active());
    }

    #[test]
    fn second_cancel_is_rejected() {
        let dispatcher = new_dispatcher();
        let watcher = Watcher::new(Rc::clone(&dispatcher) as SharedDispatcher, WatcherId::new(2), |_| {});

        assert!(watcher.start());
        assert!(watcher.cancel());
        assert!(!watcher.cancel());
    }

    #[test]
    fn refused_registration_leaves_watcher_stopped() {
        let dispatcher = Rc::new(RefCell::new(RecordingDispatcher::rejecting(&[
            WatcherId::new(9),
        ])));
        let watcher = Watcher::new(Rc::clone(&dispatcher) as SharedDispatcher, WatcherId::new(9), |_| {});

        assert!(!watcher.start());
        assert!(!watcher.is_active());
        assert_eq!(dispatcher.borrow().registered_len(), 0);
    }

    #[test]
    fn invoke_runs_callback_once_with_watcher_id() {
        let dispatcher = new_dispatcher();

        let seen: Rc<RefCell<Vec<WatcherId>>> = Rc::new(RefCell::new(Vec::new()));

        let watcher = Watcher::new(Rc::clone(&dispatcher) as SharedDispatcher, WatcherId::new(7), {
            let seen = Rc::clone(&seen);
            move |id| seen.borrow_mut().push(id)
        });

        assert!(watcher.start());

        watcher.invoke();
        assert_eq!(*seen.borrow(), [WatcherId::new(7)]);

        // Invoking does not stop the watcher; the next fire runs the callback
        // again.
        watcher.invoke();
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    #[should_panic(expected = "not started")]
    fn invoke_on_stopped_watcher_panics() {
        let dispatcher = new_dispatcher();
        let watcher = Watcher::new(Rc::clone(&dispatcher) as SharedDispatcher, WatcherId::new(2), |_| {});

        watcher.invoke();
    }

    #[test]
    fn callback_may_cancel_its_own_watcher() {
        let dispatcher = new_dispatcher();

        let watcher = Rc::new_cyclic(|weak: &Weak<Watcher>| {
            let weak = Weak::clone(weak);

            Watcher::new(Rc::clone(&dispatcher) as SharedDispatcher, WatcherId::new(2), move |_| {
                let watcher = weak.upgrade().expect("watcher is alive while invoked");
                assert!(watcher.cancel());
            })
        });

        assert!(watcher.start());

        watcher.invoke();

        assert!(!watcher.is_active());
        assert!(!dispatcher.borrow().is_registered(WatcherId::new(2)));
    }

    #[test]
    fn cancel_ignores_dispatcher_unregister_result() {
        let dispatcher = new_dispatcher();
        let watcher = Watcher::new(Rc::clone(&dispatcher) as SharedDispatcher, WatcherId::new(2), |_| {});

        assert!(watcher.start());

        // Someone else already scrubbed the table entry.
        assert!(dispatcher.borrow_mut().unregister(WatcherId::new(2)));

        // The state machine still stops cleanly.
        assert!(watcher.cancel());
        assert!(!watcher.is_active());
    }

    #[test]
    fn thread_affinity() {
        assert_not_impl_any!(Watcher: Send, Sync);
    }
}
