//! A toy event-loop embedding:
//!
//! * A dispatcher that tracks registered watcher identities.
//! * A self-owning watcher that outlives its external handle.
//! * A callback that cancels its own watcher mid-invocation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use counted_pool::{CountedPool, Key};
use watchers::{Dispatcher, SelfOwningWatcher, WatcherId};

const SIGINT: WatcherId = WatcherId::new(2);

/// Tracks which watcher identities are currently registered.
struct TableDispatcher {
    registered: Vec<WatcherId>,
}

impl TableDispatcher {
    fn is_registered(&self, id: WatcherId) -> bool {
        self.registered.contains(&id)
    }
}

impl Dispatcher for TableDispatcher {
    fn register(&mut self, id: WatcherId) -> bool {
        if self.registered.contains(&id) {
            return false;
        }

        self.registered.push(id);
        true
    }

    fn unregister(&mut self, id: WatcherId) -> bool {
        match self.registered.iter().position(|candidate| *candidate == id) {
            Some(position) => {
                _ = self.registered.remove(position);
                true
            }
            None => false,
        }
    }
}

fn main() {
    let pool = CountedPool::new();
    let dispatcher = Rc::new(RefCell::new(TableDispatcher {
        registered: Vec::new(),
    }));

    // The watcher stops itself after three deliveries.
    let remaining = Rc::new(Cell::new(3_u32));
    let key_cell: Rc<Cell<Option<Key>>> = Rc::new(Cell::new(None));

    let watcher = SelfOwningWatcher::new_in(&pool, Rc::clone(&dispatcher) as watchers::SharedDispatcher, SIGINT, {
        let pool = pool.clone();
        let remaining = Rc::clone(&remaining);
        let key_cell = Rc::clone(&key_cell);

        move |id| {
            let left = remaining.get().saturating_sub(1);
            remaining.set(left);
            println!("signal {} delivered, {left} deliveries remaining", id.raw());

            if left == 0 {
                let key = key_cell.get().expect("key is published before the loop fires");
                let own = pool.acquire(key);
                assert!(own.get().cancel());
                println!("watcher cancelled itself");
            }
        }
    });
    let key = watcher.key();
    key_cell.set(Some(key));

    assert!(watcher.get().start());

    // The external owner loses interest; the watcher keeps itself alive.
    drop(watcher);
    println!("external handle dropped, pool still holds {} watcher(s)", pool.len());

    // The loop delivers the signal for as long as the identity is registered.
    while dispatcher.borrow().is_registered(SIGINT) {
        let fired = pool.acquire(key);
        fired.get().invoke();
    }

    println!("pool is now empty: {}", pool.is_empty());
}
