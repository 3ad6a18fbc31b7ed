//! Basic usage example for `ObjectPool`.
//!
//! This example walks through the lifecycle of a small pool: creating the slab, filling it,
//! recycling a slot and destroying the pool. Set up with a `tracing` subscriber so the pool's
//! diagnostic events are printed as well.

use fixed_pool::{ObjectPool, PoolError};
use new_zealand::nz;
use tracing::Level;

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::TRACE).init();

    let mut pool = ObjectPool::<f64>::builder().capacity(nz!(3)).build();

    println!(
        "Built pool with capacity {}, created: {}",
        pool.capacity(),
        pool.is_created()
    );

    pool.create().unwrap();

    let a = pool.allocate().unwrap();
    let b = pool.allocate().unwrap();
    let c = pool.allocate().unwrap();

    // SAFETY: Each pointer is valid for a write of one f64 and nobody else uses it.
    unsafe {
        a.write(1.0);
        b.write(2.0);
        c.write(3.0);
    }

    println!("Allocated slots at {a:?}, {b:?} and {c:?}");

    match pool.allocate() {
        Err(PoolError::Exhausted { capacity }) => {
            println!("Pool is exhausted after {capacity} allocations");
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }

    // SAFETY: b came from this pool and f64 needs no drop.
    unsafe { pool.deallocate(b).unwrap() };

    let reused = pool.allocate().unwrap();
    println!("Freed slot {b:?} was handed out again as {reused:?}");
    assert_eq!(reused, b);

    let local = 0.0_f64;
    println!(
        "Pointer to a local variable belongs to the pool: {}",
        pool.is_pointer_valid(&local)
    );

    match pool.destroy() {
        Err(PoolError::ObjectsOutstanding { count }) => {
            println!("Cannot destroy the pool yet, {count} objects are in use");
        }
        other => panic!("expected refusal, got {other:?}"),
    }

    // SAFETY: All three pointers came from this pool and f64 needs no drop.
    unsafe {
        pool.deallocate(a).unwrap();
        pool.deallocate(reused).unwrap();
        pool.deallocate(c).unwrap();
    }

    pool.destroy().unwrap();

    println!("Pool destroyed, created: {}", pool.is_created());
}
