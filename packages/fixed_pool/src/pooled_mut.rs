use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

/// Exclusive handle to an object constructed in an [`ObjectPool`][crate::ObjectPool].
///
/// Returned by [`ObjectPool::insert()`][crate::ObjectPool::insert] and
/// [`PoolRegistry::construct()`][crate::PoolRegistry::construct]. The handle cannot be copied or
/// cloned, so it is impossible to return the same object to the pool twice. Returning the handle
/// via [`ObjectPool::remove()`][crate::ObjectPool::remove] drops the object and recycles its slot.
///
/// Dropping the handle without returning it leaves the object in the pool. The slot stays in use
/// until the pool is destroyed, which it will refuse to do while the slot is in use.
///
/// # Example
///
/// ```rust
/// use fixed_pool::ObjectPool;
///
/// let mut pool = ObjectPool::<String>::new();
/// pool.create().unwrap();
///
/// let mut item = pool.insert("Hello".to_string()).unwrap();
///
/// // Direct access through Deref and DerefMut.
/// item.push_str(", World!");
/// assert_eq!(&*item, "Hello, World!");
///
/// // The handle is consumed, so it cannot be used again.
/// pool.remove(item).unwrap();
/// pool.destroy().unwrap();
/// ```
///
/// # Thread safety
///
/// The handle is [`Send`] if `T` is [`Send`] and [`Sync`] if `T` is [`Sync`], the same as a
/// `Box<T>`.
#[must_use = "dropping the handle leaves the object in the pool; return it via remove()"]
pub struct PooledMut<T> {
    /// Ensures this handle can only be returned to the pool it came from.
    pub(crate) pool_id: u64,

    pub(crate) ptr: NonNull<T>,
}

impl<T> PooledMut<T> {
    #[must_use]
    pub(crate) fn new(pool_id: u64, ptr: NonNull<T>) -> Self {
        Self { pool_id, ptr }
    }

    /// Returns a pointer to the object.
    ///
    /// The pointer stays valid until the handle is returned to the pool. The owner of the
    /// handle has exclusive access to the object.
    #[must_use]
    #[inline]
    pub fn ptr(&self) -> NonNull<T> {
        self.ptr
    }

    /// Returns the ID of the pool that issued this handle.
    #[must_use]
    #[inline]
    pub fn pool_id(&self) -> u64 {
        self.pool_id
    }
}

impl<T> Deref for PooledMut<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        // SAFETY: The object was initialized when the handle was created and the pool keeps the
        // slab alive while any slot is in use. The handle is the sole owner of the object.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for PooledMut<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: As in deref(), plus we hold an exclusive reference to the sole handle.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: fmt::Debug> fmt::Debug for PooledMut<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledMut")
            .field("pool_id", &self.pool_id)
            .field("ptr", &self.ptr)
            .field("value", &**self)
            .finish()
    }
}

// SAFETY: The handle owns the object like a Box does, so it can move between threads
// whenever the object can.
unsafe impl<T: Send> Send for PooledMut<T> {}

// SAFETY: Shared access to the handle only grants shared access to the object.
unsafe impl<T: Sync> Sync for PooledMut<T> {}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::fmt::Debug;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use crate::{ObjectPool, PooledMut};

    assert_impl_all!(PooledMut<u64>: Send, Sync, Debug);
    assert_impl_all!(PooledMut<Cell<u64>>: Send);
    assert_not_impl_any!(PooledMut<Cell<u64>>: Sync);
    assert_not_impl_any!(PooledMut<std::rc::Rc<u64>>: Send, Sync);
    assert_not_impl_any!(PooledMut<u64>: Clone, Copy);

    #[test]
    fn deref_reads_and_writes_the_object() {
        let mut pool = ObjectPool::<Vec<u32>>::new();
        pool.create().unwrap();

        let mut item = pool.insert(vec![1, 2]).unwrap();
        item.push(3);

        assert_eq!(*item, vec![1, 2, 3]);
        // SAFETY: The handle is alive, so the object is too.
        assert_eq!(unsafe { item.ptr().as_ref() }.len(), 3);
        assert_eq!(item.pool_id(), pool.id());

        pool.remove(item).unwrap();
        pool.destroy().unwrap();
    }

    #[test]
    fn debug_shows_value() {
        let mut pool = ObjectPool::<u32>::new();
        pool.create().unwrap();

        let item = pool.insert(42).unwrap();
        let output = format!("{item:?}");

        assert!(output.contains("PooledMut"));
        assert!(output.contains("42"));

        pool.remove(item).unwrap();
    }
}
