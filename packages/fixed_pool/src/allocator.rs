use std::alloc::{Layout, alloc, dealloc};
use std::fmt::Debug;
use std::ptr::NonNull;

use crate::{PoolError, Result};

/// Provides the single block of raw memory that an [`ObjectPool`][crate::ObjectPool] carves
/// into slots.
///
/// The pool calls [`allocate()`][Self::allocate] once when it is created and
/// [`deallocate()`][Self::deallocate] once when it is destroyed. Implementations must not
/// contain any pool-specific logic, which allows callers to substitute arena or OS-level
/// allocation strategies for the default [`SystemAllocator`].
///
/// The requested block has no alignment requirement beyond one byte. The pool requests enough
/// padding to align the slots itself.
///
/// # Example
///
/// ```
/// use std::ptr::NonNull;
///
/// use fixed_pool::{BackingAllocator, ObjectPool, SystemAllocator};
///
/// /// Forwards to the system allocator but remembers how many bytes are in use.
/// #[derive(Debug, Default)]
/// struct Measured {
///     in_use: std::cell::Cell<usize>,
/// }
///
/// impl BackingAllocator for Measured {
///     fn allocate(&self, size: usize) -> fixed_pool::Result<NonNull<u8>> {
///         let ptr = SystemAllocator.allocate(size)?;
///         self.in_use.set(self.in_use.get() + size);
///         Ok(ptr)
///     }
///
///     unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
///         self.in_use.set(self.in_use.get() - size);
///         // SAFETY: Forwarding the caller's guarantees.
///         unsafe { SystemAllocator.deallocate(ptr, size) };
///     }
/// }
///
/// let mut pool = ObjectPool::<u64>::builder()
///     .allocator(Measured::default())
///     .build();
///
/// pool.create().unwrap();
/// assert!(pool.allocator().in_use.get() > 0);
///
/// pool.destroy().unwrap();
/// assert_eq!(pool.allocator().in_use.get(), 0);
/// ```
pub trait BackingAllocator: Debug {
    /// Allocates a block of `size` bytes with byte alignment.
    ///
    /// Never returns a null pointer on success.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::OutOfMemory`] if the memory cannot be provided.
    fn allocate(&self, size: usize) -> Result<NonNull<u8>>;

    /// Releases a block previously returned by [`allocate()`][Self::allocate].
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate()` on this same allocator instance, called
    /// with the same `size`, and must not have been deallocated already. The allocator does not
    /// re-check this.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize);
}

/// The default [`BackingAllocator`], a thin wrapper over the global Rust allocator.
///
/// # Example
///
/// ```
/// use fixed_pool::{BackingAllocator, SystemAllocator};
///
/// let block = SystemAllocator.allocate(64).unwrap();
///
/// // SAFETY: The block was allocated above with the same size and is released exactly once.
/// unsafe { SystemAllocator.deallocate(block, 64) };
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SystemAllocator;

impl SystemAllocator {
    fn layout(size: usize) -> Result<Layout> {
        Layout::from_size_align(size, 1).map_err(|_layout_error| PoolError::OutOfMemory { size })
    }
}

impl BackingAllocator for SystemAllocator {
    fn allocate(&self, size: usize) -> Result<NonNull<u8>> {
        // The global allocator must never be asked for zero bytes.
        if size == 0 {
            return Err(PoolError::OutOfMemory { size });
        }

        let layout = Self::layout(size)?;

        // SAFETY: The layout is valid and not zero-sized (guarded above).
        let ptr = unsafe { alloc(layout) };

        NonNull::new(ptr).ok_or(PoolError::OutOfMemory { size })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        let layout = Self::layout(size)
            .expect("caller guarantees the size was accepted by allocate(), so it is valid");

        // SAFETY: The caller guarantees that the pointer came from allocate() with this same
        // size, so the layout matches the one used for allocation.
        unsafe {
            dealloc(ptr.as_ptr(), layout);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(SystemAllocator: Send, Sync, Copy, Default, Debug);

    #[test]
    fn allocate_and_deallocate() {
        let ptr = SystemAllocator.allocate(128).unwrap();

        // The memory is ours to write.
        // SAFETY: The block is 128 bytes long and exclusively owned by this test.
        unsafe {
            ptr.as_ptr().write_bytes(0xAB, 128);
        }

        // SAFETY: Allocated above with the same size, released once.
        unsafe {
            SystemAllocator.deallocate(ptr, 128);
        }
    }

    #[test]
    fn zero_size_is_out_of_memory() {
        assert_eq!(
            SystemAllocator.allocate(0),
            Err(PoolError::OutOfMemory { size: 0 })
        );
    }

    #[test]
    fn unrepresentable_size_is_out_of_memory() {
        // Larger than isize::MAX, which no layout can describe.
        let size = usize::MAX;

        assert_eq!(
            SystemAllocator.allocate(size),
            Err(PoolError::OutOfMemory { size })
        );
    }
}
