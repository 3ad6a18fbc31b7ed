use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::num::NonZero;

use crate::{BackingAllocator, DEFAULT_CAPACITY, DropPolicy, ObjectPool, SystemAllocator};

/// Builder for creating an instance of [`ObjectPool`].
///
/// You only need to use this builder if you want to customize the pool configuration.
/// The default configuration used by [`ObjectPool::new()`][1] holds up to
/// [`DEFAULT_CAPACITY`] objects in memory from the [`SystemAllocator`].
///
/// Building the pool does not allocate. The slab is allocated by
/// [`ObjectPool::create()`][2].
///
/// # Examples
///
/// ```
/// use fixed_pool::{DropPolicy, ObjectPool};
/// use new_zealand::nz;
///
/// let pool = ObjectPool::<u32>::builder()
///     .capacity(nz!(64))
///     .drop_policy(DropPolicy::MustNotDropItems)
///     .build();
///
/// assert_eq!(pool.capacity(), 64);
/// assert!(!pool.is_created());
/// ```
///
/// [1]: ObjectPool::new
/// [2]: ObjectPool::create
#[must_use]
pub struct ObjectPoolBuilder<T, A = SystemAllocator> {
    capacity: NonZero<usize>,
    allocator: A,
    drop_policy: DropPolicy,

    _item: PhantomData<T>,
}

impl<T, A: fmt::Debug> fmt::Debug for ObjectPoolBuilder<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPoolBuilder")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("capacity", &self.capacity)
            .field("allocator", &self.allocator)
            .field("drop_policy", &self.drop_policy)
            .finish()
    }
}

impl<T> ObjectPoolBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            allocator: SystemAllocator,
            drop_policy: DropPolicy::default(),
            _item: PhantomData,
        }
    }
}

impl<T, A> ObjectPoolBuilder<T, A> {
    /// Sets the maximum number of objects that can be allocated from the pool at the same time.
    ///
    /// The capacity never changes after the pool is built.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_pool::ObjectPool;
    /// use new_zealand::nz;
    ///
    /// let pool = ObjectPool::<f64>::builder().capacity(nz!(3)).build();
    /// assert_eq!(pool.capacity(), 3);
    /// ```
    pub fn capacity(mut self, capacity: NonZero<usize>) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the [backing allocator][BackingAllocator] that provides the memory for the slab.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_pool::{ObjectPool, SystemAllocator};
    ///
    /// let pool = ObjectPool::<u64>::builder()
    ///     .allocator(SystemAllocator)
    ///     .build();
    /// ```
    pub fn allocator<B: BackingAllocator>(self, allocator: B) -> ObjectPoolBuilder<T, B> {
        ObjectPoolBuilder {
            capacity: self.capacity,
            allocator,
            drop_policy: self.drop_policy,
            _item: PhantomData,
        }
    }

    /// Sets the [drop policy][DropPolicy] for the pool. This governs what happens when the pool
    /// is dropped while objects allocated from it are still in use.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_pool::{DropPolicy, ObjectPool};
    ///
    /// let pool = ObjectPool::<u32>::builder()
    ///     .drop_policy(DropPolicy::MustNotDropItems)
    ///     .build();
    /// ```
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }
}

impl<T, A: BackingAllocator> ObjectPoolBuilder<T, A> {
    /// Builds the object pool with the specified configuration.
    ///
    /// The pool is not created yet - call [`ObjectPool::create()`] before allocating from it.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_pool::ObjectPool;
    ///
    /// let pool = ObjectPool::<u32>::builder().build();
    /// ```
    #[must_use]
    pub fn build(self) -> ObjectPool<T, A> {
        ObjectPool::new_inner(self.capacity, self.allocator, self.drop_policy)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;

    use new_zealand::nz;
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(ObjectPoolBuilder<u64>: Send, Sync, fmt::Debug);

    #[test]
    fn defaults() {
        let builder = ObjectPoolBuilder::<u64>::new();

        assert_eq!(builder.capacity, DEFAULT_CAPACITY);
        assert_eq!(builder.drop_policy, DropPolicy::MayLeakItems);
        assert_eq!(builder.allocator, SystemAllocator);
    }

    #[test]
    fn settings_reach_the_pool() {
        let pool = ObjectPoolBuilder::<u64>::new()
            .capacity(nz!(7))
            .drop_policy(DropPolicy::MustNotDropItems)
            .build();

        assert_eq!(pool.capacity(), 7);
        assert!(!pool.is_created());
    }

    #[test]
    fn allocator_replaces_type() {
        #[derive(Debug, Default)]
        struct Tagged {
            tag: Cell<u32>,
        }

        impl BackingAllocator for Tagged {
            fn allocate(&self, size: usize) -> crate::Result<std::ptr::NonNull<u8>> {
                self.tag.set(self.tag.get() + 1);
                SystemAllocator.allocate(size)
            }

            unsafe fn deallocate(&self, ptr: std::ptr::NonNull<u8>, size: usize) {
                // SAFETY: Forwarding the caller's guarantees.
                unsafe {
                    SystemAllocator.deallocate(ptr, size);
                }
            }
        }

        let mut pool: ObjectPool<u64, Tagged> = ObjectPoolBuilder::<u64>::new()
            .allocator(Tagged::default())
            .build();

        pool.create().unwrap();
        assert_eq!(pool.allocator().tag.get(), 1);
    }

    #[test]
    fn debug_names_item_type() {
        let builder = ObjectPoolBuilder::<String>::new();
        let output = format!("{builder:?}");

        assert!(output.contains("String"));
        assert!(output.contains("1000"));
    }

    #[test]
    #[should_panic]
    fn zero_sized_item_panics() {
        drop(ObjectPoolBuilder::<()>::new().build());
    }
}
