//! Constructing a type in its own pool through `PoolBinding`.
//!
//! The `Order` type declares which pool it lives in once. Two independent capabilities build on
//! that declaration and both end up constructing into the same pool.

use std::num::NonZero;

use fixed_pool::{PoolBinding, PoolRegistry, SystemAllocator};
use new_zealand::nz;

#[derive(Debug)]
struct Order {
    symbol: &'static str,
    quantity: u32,
}

impl PoolBinding for Order {
    type Allocator = SystemAllocator;
    const CAPACITY: NonZero<usize> = nz!(16);
}

/// Orders that can be placed by a trader.
trait Place: PoolBinding {
    fn place(symbol: &'static str, quantity: u32) -> Self;
}

/// Orders that cancel an earlier one.
trait Cancel: PoolBinding {
    fn cancel_of(original: &Self) -> Self;
}

impl Place for Order {
    fn place(symbol: &'static str, quantity: u32) -> Self {
        Self { symbol, quantity }
    }
}

impl Cancel for Order {
    fn cancel_of(original: &Self) -> Self {
        Self {
            symbol: original.symbol,
            quantity: 0,
        }
    }
}

fn main() {
    let mut registry = PoolRegistry::new();
    registry.create_bound::<Order>().unwrap();

    let placed = registry.construct(Order::place("ACME", 100)).unwrap();
    let cancelled = registry.construct(Order::cancel_of(&placed)).unwrap();

    println!("Placed {} x {}: {placed:?}", placed.quantity, placed.symbol);
    println!("Cancelled {} x {}: {cancelled:?}", cancelled.quantity, cancelled.symbol);

    let pool = registry.bound_pool_mut::<Order>().unwrap();
    println!(
        "Both orders live in pool {} which has {} of {} slots in use",
        pool.id(),
        pool.len(),
        pool.capacity()
    );
    assert_eq!(placed.pool_id(), cancelled.pool_id());

    registry.destruct(cancelled).unwrap();
    registry.destruct(placed).unwrap();

    registry.destroy_bound::<Order>().unwrap();
    println!("Pool destroyed, registry holds {} pools", registry.len());
}
