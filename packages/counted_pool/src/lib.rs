//! A single-threaded object pool whose items are reference-counted.
//!
//! Every item in a [`CountedPool`] is owned collectively by the [`Handle`]s that
//! point at it. Cloning a handle increments the item's reference count, dropping
//! one decrements it, and the item is destroyed synchronously the moment the
//! last handle is released. What sets this pool apart from `Rc` is that handles
//! can also be minted from the item's raw identity, its [`Key`] - including by
//! the item itself, which is how self-owning objects such as event-loop
//! watchers express "I keep myself alive while I am registered" without a
//! literal self-pointer.
//!
//! # Example
//!
//! ```rust
//! use counted_pool::CountedPool;
//!
//! let pool = CountedPool::<String>::new();
//!
//! let greeting = pool.insert("Hello".to_string());
//! assert_eq!(greeting.get(), "Hello");
//! assert_eq!(greeting.ref_count(), 1);
//!
//! // Cloning a handle is just a count increment.
//! let another = greeting.clone();
//! assert_eq!(greeting.ref_count(), 2);
//!
//! // Anyone holding the key can mint a further owning handle.
//! let third = pool.acquire(greeting.key());
//! assert_eq!(greeting.ref_count(), 3);
//!
//! drop(another);
//! drop(third);
//! drop(greeting);
//!
//! // The last release destroyed the item.
//! assert!(pool.is_empty());
//! ```
//!
//! # Items that know their own key
//!
//! Two-phase insertion via [`CountedPool::begin_insert()`] yields the key
//! before the value exists, so a value can record its own identity during
//! construction and later acquire handles on itself:
//!
//! ```rust
//! use counted_pool::{CountedPool, Key};
//!
//! struct Entry {
//!     own_key: Key,
//! }
//!
//! let pool = CountedPool::<Entry>::new();
//!
//! let inserter = pool.begin_insert();
//! let key = inserter.key();
//! let handle = inserter.insert(Entry { own_key: key });
//!
//! assert_eq!(handle.get().own_key, handle.key());
//! ```
//!
//! The pool is deliberately single-threaded: counts are plain cells, not
//! atomics, and none of the types are `Send` or `Sync`.

mod counted_pool;
mod handle;

pub use counted_pool::{CountedPool, CountedPoolInserter, Key};
pub use handle::Handle;
