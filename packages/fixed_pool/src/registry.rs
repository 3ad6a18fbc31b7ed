use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZero;

use tracing::debug;

use crate::{BackingAllocator, ObjectPool, PoolBinding, PoolError, PooledMut, Result};

/// Identifies the one pool a registry may hold for an item type, capacity and allocator type.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
struct PoolKey {
    item: TypeId,
    capacity: usize,
    allocator: TypeId,
}

impl PoolKey {
    fn of<T: 'static, A: 'static>(capacity: usize) -> Self {
        Self {
            item: TypeId::of::<T>(),
            capacity,
            allocator: TypeId::of::<A>(),
        }
    }
}

/// Holds at most one [`ObjectPool`] for each combination of item type, capacity and backing
/// allocator type.
///
/// The registry is an ordinary value. The owner decides when pools are created and destroyed
/// and passes the registry to any code that allocates through it. Pools of types that implement
/// [`PoolBinding`] can be managed without spelling out their configuration.
///
/// Dropping the registry drops every pool in it, subject to each pool's
/// [`DropPolicy`][crate::DropPolicy].
///
/// # Example
///
/// ```
/// use fixed_pool::{ObjectPool, PoolRegistry, SystemAllocator};
/// use new_zealand::nz;
///
/// let mut registry = PoolRegistry::new();
/// registry
///     .register(ObjectPool::<u64>::builder().capacity(nz!(8)).build())
///     .unwrap();
///
/// let pool = registry.pool_mut::<u64, SystemAllocator>(nz!(8)).unwrap();
/// let item = pool.insert(42).unwrap();
/// pool.remove(item).unwrap();
///
/// registry.destroy::<u64, SystemAllocator>(nz!(8)).unwrap();
/// assert!(registry.is_empty());
/// ```
///
/// # Thread safety
///
/// The registry is neither [`Send`] nor [`Sync`]. Each thread that needs pools keeps its own
/// registry, or the pools are shared individually behind a lock.
#[derive(Default)]
pub struct PoolRegistry {
    pools: HashMap<PoolKey, Box<dyn Any>>,
}

impl PoolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `pool` to the registry, creating the pool first if it is not created yet.
    ///
    /// A registered pool that has been destroyed directly (through
    /// [`pool_mut()`][Self::pool_mut]) no longer counts as present and is replaced by `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::AlreadyCreated`] if the registry already holds a created pool with
    /// the same item type, capacity and allocator type, and the error from
    /// [`ObjectPool::create()`] if creating the pool fails. The registry is unchanged and `pool`
    /// is dropped in both cases.
    pub fn register<T: 'static, A: BackingAllocator + 'static>(
        &mut self,
        mut pool: ObjectPool<T, A>,
    ) -> Result<()> {
        let capacity = pool.capacity();

        if self
            .existing::<T, A>(capacity)
            .is_some_and(|existing| existing.is_created())
        {
            return Err(PoolError::AlreadyCreated);
        }

        if !pool.is_created() {
            pool.create()?;
        }

        debug!(
            item = type_name::<T>(),
            capacity,
            allocator = type_name::<A>(),
            pool_id = pool.id(),
            "pool registered"
        );

        // Replaces a stale entry whose pool is no longer created.
        self.pools
            .insert(PoolKey::of::<T, A>(capacity), Box::new(pool));

        Ok(())
    }

    /// Returns the pool for the given item type, capacity and allocator type.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotCreated`] if the registry holds no such pool.
    pub fn pool_mut<T: 'static, A: BackingAllocator + 'static>(
        &mut self,
        capacity: NonZero<usize>,
    ) -> Result<&mut ObjectPool<T, A>> {
        let key = PoolKey::of::<T, A>(capacity.get());

        self.pools
            .get_mut(&key)
            .map(|pool| {
                pool.downcast_mut::<ObjectPool<T, A>>()
                    .expect("the key identifies the pool type")
            })
            .ok_or(PoolError::NotCreated)
    }

    fn existing<T: 'static, A: BackingAllocator + 'static>(
        &self,
        capacity: usize,
    ) -> Option<&ObjectPool<T, A>> {
        self.pools
            .get(&PoolKey::of::<T, A>(capacity))
            .map(|pool| {
                pool.downcast_ref::<ObjectPool<T, A>>()
                    .expect("the key identifies the pool type")
            })
    }

    /// Destroys the pool for the given item type, capacity and allocator type and removes it
    /// from the registry.
    ///
    /// A registered pool that has already been destroyed directly (through
    /// [`pool_mut()`][Self::pool_mut]) is only removed.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotCreated`] if the registry holds no such pool and the error from
    /// [`ObjectPool::destroy()`] if the pool cannot be destroyed. The pool stays in the registry
    /// in that case.
    pub fn destroy<T: 'static, A: BackingAllocator + 'static>(
        &mut self,
        capacity: NonZero<usize>,
    ) -> Result<()> {
        let pool = self.pool_mut::<T, A>(capacity)?;

        if pool.is_created() {
            pool.destroy()?;
        }

        self.pools.remove(&PoolKey::of::<T, A>(capacity.get()));

        debug!(
            item = type_name::<T>(),
            capacity = capacity.get(),
            allocator = type_name::<A>(),
            "pool unregistered"
        );

        Ok(())
    }

    /// Returns `true` if the registry holds a pool for the given item type, capacity and
    /// allocator type.
    #[must_use]
    pub fn contains<T: 'static, A: BackingAllocator + 'static>(
        &self,
        capacity: NonZero<usize>,
    ) -> bool {
        self.pools
            .contains_key(&PoolKey::of::<T, A>(capacity.get()))
    }

    /// Returns the number of pools in the registry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Returns `true` if the registry holds no pools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Creates the pool that `T` is bound to and adds it to the registry.
    ///
    /// If the bound pool is registered but has been destroyed directly (through
    /// [`bound_pool_mut()`][Self::bound_pool_mut]), that pool is created again.
    ///
    /// # Errors
    ///
    /// As for [`register()`][Self::register].
    pub fn create_bound<T: PoolBinding>(&mut self) -> Result<()> {
        if let Ok(pool) = self.bound_pool_mut::<T>() {
            return pool.create();
        }

        self.register(
            ObjectPool::<T>::builder()
                .capacity(T::CAPACITY)
                .allocator(T::Allocator::default())
                .build(),
        )
    }

    /// Returns the pool that `T` is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotCreated`] if the bound pool has not been created.
    pub fn bound_pool_mut<T: PoolBinding>(&mut self) -> Result<&mut ObjectPool<T, T::Allocator>> {
        self.pool_mut::<T, T::Allocator>(T::CAPACITY)
    }

    /// Destroys the pool that `T` is bound to and removes it from the registry.
    ///
    /// # Errors
    ///
    /// As for [`destroy()`][Self::destroy].
    pub fn destroy_bound<T: PoolBinding>(&mut self) -> Result<()> {
        self.destroy::<T, T::Allocator>(T::CAPACITY)
    }

    /// Moves `value` into the pool that `T` is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotCreated`] if the bound pool has not been created and
    /// [`PoolError::Exhausted`] if it is full. The value is dropped in that case.
    pub fn construct<T: PoolBinding>(&mut self, value: T) -> Result<PooledMut<T>> {
        self.bound_pool_mut::<T>()?.insert(value)
    }

    /// Drops the object behind `handle` and returns its slot to the pool that `T` is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotCreated`] if the bound pool does not exist and
    /// [`PoolError::ForeignHandle`] if the handle was issued by a different pool.
    pub fn destruct<T: PoolBinding>(&mut self, handle: PooledMut<T>) -> Result<()> {
        self.bound_pool_mut::<T>()?.remove(handle)
    }
}

impl fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("pools", &self.pools.keys().collect::<Vec<_>>())
            .finish()
    }
}
