use std::num::NonZero;

use crate::{BackingAllocator, DEFAULT_CAPACITY};

/// Declares the pool that objects of a type are constructed in.
///
/// A type that implements this trait can be constructed and destructed through a
/// [`PoolRegistry`][crate::PoolRegistry] without naming the pool configuration at each call
/// site: [`construct()`][crate::PoolRegistry::construct] allocates from the bound pool and moves
/// the value into it, [`destruct()`][crate::PoolRegistry::destruct] drops the value and returns
/// its slot.
///
/// A type can only have one binding. Capabilities that need pooled construction should require
/// `PoolBinding` as a supertrait instead of declaring a pool of their own, so a type that has
/// several such capabilities still resolves all of them to the same pool.
///
/// # Example
///
/// ```
/// use std::num::NonZero;
///
/// use fixed_pool::{PoolBinding, PoolRegistry, SystemAllocator};
/// use new_zealand::nz;
///
/// struct Particle {
///     position: (f32, f32),
/// }
///
/// impl PoolBinding for Particle {
///     type Allocator = SystemAllocator;
///     const CAPACITY: NonZero<usize> = nz!(64);
/// }
///
/// /// A capability that relies on pooled construction.
/// trait Spawn: PoolBinding {
///     fn at_origin() -> Self;
/// }
///
/// impl Spawn for Particle {
///     fn at_origin() -> Self {
///         Self { position: (0.0, 0.0) }
///     }
/// }
///
/// let mut registry = PoolRegistry::new();
/// registry.create_bound::<Particle>().unwrap();
///
/// let particle = registry.construct(Particle::at_origin()).unwrap();
/// assert_eq!(particle.position, (0.0, 0.0));
///
/// registry.destruct(particle).unwrap();
/// registry.destroy_bound::<Particle>().unwrap();
/// ```
pub trait PoolBinding: Sized + 'static {
    /// The backing allocator of the bound pool. A fresh instance is created when the pool is.
    type Allocator: BackingAllocator + Default + 'static;

    /// The capacity of the bound pool.
    const CAPACITY: NonZero<usize> = DEFAULT_CAPACITY;
}
