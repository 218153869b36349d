//! Basic usage of the `counted_pool` crate:
//!
//! * Creating a pool.
//! * Inserting an item and holding owning handles.
//! * Minting additional handles from a key.
//! * Observing destruction when the last handle is released.

use counted_pool::CountedPool;

fn main() {
    let pool = CountedPool::<String>::new();

    // Inserting an item yields its first owning handle.
    let alice = pool.insert("Alice".to_string());
    println!(
        "inserted {:?} at {:?}, reference count {}",
        alice.get(),
        alice.key(),
        alice.ref_count()
    );

    // Anyone holding the key can mint another owning handle.
    let alice_again = pool.acquire(alice.key());
    println!("reference count after acquire: {}", alice_again.ref_count());

    // Releasing one handle does not destroy the item.
    drop(alice);
    println!(
        "reference count after dropping the first handle: {}",
        alice_again.ref_count()
    );

    // Releasing the last one does, synchronously.
    drop(alice_again);
    println!("pool is now empty: {}", pool.is_empty());
}
