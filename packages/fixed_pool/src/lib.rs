#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A fixed-capacity object pool that serves allocations of one type from a single slab.
//!
//! This crate provides [`ObjectPool<T>`], which carves one block of memory obtained from a
//! [`BackingAllocator`] into equally sized slots for objects of type `T`. The block is
//! allocated once when the pool is created and released once when it is destroyed. In between,
//! allocating and freeing an object are constant-time operations on an intrusive freelist that
//! never touch the backing allocator.
//!
//! # Key Features
//!
//! - **Fixed capacity**: The pool never grows. Running out of slots is an error, not a trigger
//!   for reallocation.
//! - **Explicit lifecycle**: [`create()`][ObjectPool::create] and
//!   [`destroy()`][ObjectPool::destroy] control exactly when memory is obtained and released.
//! - **Stable addresses**: Slots never move while the pool is created.
//! - **LIFO reuse**: The most recently freed slot is the next one handed out, which keeps hot
//!   memory in cache.
//! - **Lazy threading**: Untouched slots are linked into the freelist only when first needed,
//!   so creating even a large pool does not write to its memory.
//! - **Pluggable memory source**: Any [`BackingAllocator`] can provide the slab.
//! - **Pointer validation**: Returned pointers are verified to belong to the pool.
//! - **Bound construction**: Types that implement [`PoolBinding`] are constructed in their pool
//!   through a [`PoolRegistry`] without naming the pool configuration.
//!
//! # Usage Modes
//!
//! ## Raw memory
//!
//! The pool hands out uninitialized memory. The caller constructs the object, later drops it and
//! returns the memory.
//!
//! ```rust
//! use fixed_pool::ObjectPool;
//! use new_zealand::nz;
//!
//! let mut pool = ObjectPool::<f64>::builder().capacity(nz!(3)).build();
//! pool.create().unwrap();
//!
//! let a = pool.allocate().unwrap();
//! let b = pool.allocate().unwrap();
//! let c = pool.allocate().unwrap();
//!
//! // The pool is full now.
//! assert!(pool.allocate().is_err());
//!
//! // SAFETY: The memory is valid for writes of one f64 each and nobody else uses it.
//! unsafe {
//!     a.write(1.0);
//!     b.write(2.0);
//!     c.write(3.0);
//! }
//!
//! // SAFETY: The pointers came from this pool and f64 needs no drop.
//! unsafe {
//!     pool.deallocate(b).unwrap();
//!     pool.deallocate(a).unwrap();
//!     pool.deallocate(c).unwrap();
//! }
//!
//! pool.destroy().unwrap();
//! ```
//!
//! ## Handles
//!
//! [`insert()`][ObjectPool::insert] moves a value into the pool and returns a [`PooledMut<T>`]
//! that gives safe access to it.
//!
//! ```rust
//! use fixed_pool::ObjectPool;
//!
//! let mut pool = ObjectPool::<String>::new();
//! pool.create().unwrap();
//!
//! let mut greeting = pool.insert("Hello".to_string()).unwrap();
//! greeting.push_str(", pool!");
//! assert_eq!(&*greeting, "Hello, pool!");
//!
//! pool.remove(greeting).unwrap();
//! pool.destroy().unwrap();
//! ```
//!
//! ## Bound construction
//!
//! ```rust
//! use std::num::NonZero;
//!
//! use fixed_pool::{PoolBinding, PoolRegistry, SystemAllocator};
//! use new_zealand::nz;
//!
//! struct Order {
//!     quantity: u32,
//! }
//!
//! impl PoolBinding for Order {
//!     type Allocator = SystemAllocator;
//!     const CAPACITY: NonZero<usize> = nz!(128);
//! }
//!
//! let mut registry = PoolRegistry::new();
//! registry.create_bound::<Order>().unwrap();
//!
//! let order = registry.construct(Order { quantity: 5 }).unwrap();
//! assert_eq!(order.quantity, 5);
//!
//! registry.destruct(order).unwrap();
//! registry.destroy_bound::<Order>().unwrap();
//! ```
//!
//! # Validation
//!
//! The regular operations report misuse as [`PoolError`]. The `_unchecked` variants of
//! [`allocate()`][ObjectPool::allocate_unchecked] and
//! [`deallocate()`][ObjectPool::deallocate_unchecked] skip verification in optimized builds and
//! panic on misuse in builds with debug assertions.
//!
//! # Diagnostics
//!
//! The pool emits [`tracing`] events: `debug` when a pool is created or destroyed and `trace`
//! for every allocation and deallocation.

mod allocator;
mod binding;
mod builder;
mod drop_policy;
mod error;
mod layout;
mod pool;
mod pooled_mut;
mod registry;
mod slab;

pub use allocator::*;
pub use binding::*;
pub use builder::*;
pub use drop_policy::*;
pub use error::*;
pub(crate) use layout::*;
pub use pool::{DEFAULT_CAPACITY, ObjectPool};
pub use pooled_mut::PooledMut;
pub use registry::PoolRegistry;
pub(crate) use slab::*;
