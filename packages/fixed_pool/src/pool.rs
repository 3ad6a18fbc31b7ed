use std::alloc::Layout;
use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::num::NonZero;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use new_zealand::nz;
use tracing::{debug, trace, warn};

use crate::{
    BackingAllocator, DropPolicy, ObjectPoolBuilder, PoolError, PooledMut, Result, Slab,
    SlabLayout, SystemAllocator,
};

/// The capacity of a pool built without specifying one.
pub const DEFAULT_CAPACITY: NonZero<usize> = nz!(1000);

/// Global counter for generating unique pool IDs.
static POOL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generates a unique pool ID.
fn generate_pool_id() -> u64 {
    POOL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A fixed-capacity pool of memory for objects of type `T`.
///
/// The pool serves all allocations from a single slab obtained from its [`BackingAllocator`]
/// when the pool is [created][Self::create]. No further calls are made to the backing
/// allocator until the pool is [destroyed][Self::destroy], which releases the slab. The
/// capacity is fixed when the pool is built - an exhausted pool does not grow.
///
/// Freed slots are recycled last-in-first-out: the most recently freed slot is the next one
/// to be allocated.
///
/// There are two ways to use the pool:
///
/// * [`allocate()`][1] hands out uninitialized memory for one object. The caller constructs the
///   object in place, later drops it and returns the memory via [`deallocate()`][2] (or does
///   both in one step via [`delete_object()`][3]).
/// * [`insert()`][4] moves a value into the pool and returns a [`PooledMut<T>`] handle, which
///   gives safe access to the object. [`remove()`][5] drops the object and recycles the slot.
///
/// Types that always live in a pool can declare their pool via
/// [`PoolBinding`][crate::PoolBinding] and be constructed through a
/// [`PoolRegistry`][crate::PoolRegistry].
///
/// # Checked and unchecked operations
///
/// The regular operations verify the pool lifecycle, the remaining capacity and the origin of
/// returned pointers and report violations as [`PoolError`]. The `_unchecked` variants skip all
/// verification in optimized builds, leaving it to the caller to uphold the same contract. In
/// builds with debug assertions they still verify it and panic on violations.
///
/// # Thread safety
///
/// The pool is not internally synchronized. It is [`Send`] if `T` and the allocator are, so it
/// can be moved to another thread or shared behind a `Mutex`, but it is never [`Sync`].
///
/// # Example
///
/// ```
/// use fixed_pool::ObjectPool;
/// use new_zealand::nz;
///
/// let mut pool = ObjectPool::<f64>::builder().capacity(nz!(3)).build();
/// pool.create().unwrap();
///
/// let ptr = pool.allocate().unwrap();
///
/// // SAFETY: The memory is valid for a write of one f64 and nobody else uses it.
/// unsafe { ptr.write(1.5) };
///
/// // SAFETY: The pointer came from this pool and f64 needs no drop.
/// unsafe { pool.deallocate(ptr).unwrap() };
///
/// // The same slot is handed out again.
/// assert_eq!(pool.allocate().unwrap(), ptr);
/// # unsafe { pool.deallocate(ptr).unwrap() };
///
/// pool.destroy().unwrap();
/// ```
///
/// [1]: Self::allocate
/// [2]: Self::deallocate
/// [3]: Self::delete_object
/// [4]: Self::insert
/// [5]: Self::remove
pub struct ObjectPool<T, A: BackingAllocator = SystemAllocator> {
    /// Identifies handles issued by this pool.
    pool_id: u64,

    capacity: NonZero<usize>,

    allocator: A,

    /// `None` until the pool is created and after it is destroyed.
    slab: Option<Slab>,

    drop_policy: DropPolicy,

    _item: PhantomData<T>,
}

impl<T> ObjectPool<T> {
    /// Creates a new, not yet created, pool with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    ///
    /// # Example
    ///
    /// ```
    /// use fixed_pool::{DEFAULT_CAPACITY, ObjectPool};
    ///
    /// let mut pool = ObjectPool::<u64>::new();
    /// assert_eq!(pool.capacity(), DEFAULT_CAPACITY.get());
    ///
    /// pool.create().unwrap();
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a new pool with a custom configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use fixed_pool::ObjectPool;
    /// use new_zealand::nz;
    ///
    /// let pool = ObjectPool::<u64>::builder().capacity(nz!(16)).build();
    /// ```
    #[inline]
    pub fn builder() -> ObjectPoolBuilder<T> {
        ObjectPoolBuilder::new()
    }
}

impl<T> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: BackingAllocator> ObjectPool<T, A> {
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    #[must_use]
    pub(crate) fn new_inner(capacity: NonZero<usize>, allocator: A, drop_policy: DropPolicy) -> Self {
        assert!(
            size_of::<T>() > 0,
            "ObjectPool must have non-zero item size"
        );

        Self {
            pool_id: generate_pool_id(),
            capacity,
            allocator,
            slab: None,
            drop_policy,
            _item: PhantomData,
        }
    }

    /// Returns the unique ID of this pool, also carried by every [`PooledMut<T>`] it issues.
    #[must_use]
    #[inline]
    pub fn id(&self) -> u64 {
        self.pool_id
    }

    /// Returns the maximum number of objects that can be allocated at the same time.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Returns the number of objects that can still be allocated.
    ///
    /// This is zero if the pool has not been created.
    #[must_use]
    #[inline]
    pub fn remaining(&self) -> usize {
        self.slab.as_ref().map_or(0, Slab::remaining)
    }

    /// Returns the number of objects currently allocated.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.slab.as_ref().map_or(0, Slab::len)
    }

    /// Returns `true` if no objects are currently allocated.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the pool is created and every slot is allocated.
    #[must_use]
    #[inline]
    pub fn is_full(&self) -> bool {
        self.slab.as_ref().is_some_and(Slab::is_full)
    }

    /// Returns `true` if the slab has been allocated and not yet released.
    #[must_use]
    #[inline]
    pub fn is_created(&self) -> bool {
        self.slab.is_some()
    }

    /// Returns the backing allocator of the pool.
    #[must_use]
    #[inline]
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Allocates the slab from the backing allocator, making the pool ready for use.
    ///
    /// A pool that has been destroyed can be created again.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::AlreadyCreated`] if the pool is already created and
    /// [`PoolError::OutOfMemory`] if the backing allocator cannot provide the slab. The pool is
    /// unchanged in both cases.
    ///
    /// # Example
    ///
    /// ```
    /// use fixed_pool::{ObjectPool, PoolError};
    ///
    /// let mut pool = ObjectPool::<u64>::new();
    ///
    /// pool.create().unwrap();
    /// assert_eq!(pool.create(), Err(PoolError::AlreadyCreated));
    /// ```
    pub fn create(&mut self) -> Result<()> {
        if self.slab.is_some() {
            return Err(PoolError::AlreadyCreated);
        }

        let layout = SlabLayout::calculate(Layout::new::<T>(), self.capacity)
            .ok_or(PoolError::OutOfMemory { size: usize::MAX })?;

        let slab = Slab::new(layout, self.capacity, &self.allocator)?;

        debug!(
            pool_id = self.pool_id,
            item = type_name::<T>(),
            capacity = self.capacity.get(),
            slot_stride = layout.slot_stride(),
            buffer_size = layout.buffer_size(),
            buffer = ?slab.buffer_ptr(),
            "object pool created"
        );

        self.slab = Some(slab);

        Ok(())
    }

    /// Returns the slab to the backing allocator.
    ///
    /// Afterwards the pool reports itself as not created and can be created again.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotCreated`] if the pool is not created (including when it has
    /// already been destroyed) and [`PoolError::ObjectsOutstanding`] if any objects allocated
    /// from the pool have not been returned. The pool is unchanged in both cases.
    ///
    /// # Example
    ///
    /// ```
    /// use fixed_pool::{ObjectPool, PoolError};
    ///
    /// let mut pool = ObjectPool::<u64>::new();
    /// pool.create().unwrap();
    ///
    /// let item = pool.insert(7).unwrap();
    /// assert_eq!(pool.destroy(), Err(PoolError::ObjectsOutstanding { count: 1 }));
    ///
    /// pool.remove(item).unwrap();
    /// pool.destroy().unwrap();
    /// assert_eq!(pool.destroy(), Err(PoolError::NotCreated));
    /// ```
    pub fn destroy(&mut self) -> Result<()> {
        let slab = self.slab.as_ref().ok_or(PoolError::NotCreated)?;

        if !slab.is_empty() {
            return Err(PoolError::ObjectsOutstanding { count: slab.len() });
        }

        let slab = self
            .slab
            .take()
            .expect("guarded by the NotCreated check above");

        debug!(
            pool_id = self.pool_id,
            item = type_name::<T>(),
            buffer = ?slab.buffer_ptr(),
            "object pool destroyed"
        );

        // SAFETY: The slab was created with our allocator and is consumed here, so it is
        // released exactly once. No objects are in use, so no pointers into it remain in use.
        unsafe {
            slab.release(&self.allocator);
        }

        Ok(())
    }

    /// Returns `true` if `ptr` points to the start of one of the pool's slots.
    ///
    /// This checks that the pool is created, that the pointer is non-null, within the slab and
    /// at a slot boundary. It cannot tell whether the slot is currently allocated.
    ///
    /// # Example
    ///
    /// ```
    /// use fixed_pool::ObjectPool;
    ///
    /// let mut pool = ObjectPool::<u64>::new();
    /// pool.create().unwrap();
    ///
    /// let ptr = pool.allocate().unwrap();
    /// assert!(pool.is_pointer_valid(ptr.as_ptr()));
    ///
    /// let local = 5_u64;
    /// assert!(!pool.is_pointer_valid(&local));
    /// # unsafe { pool.deallocate(ptr).unwrap() };
    /// ```
    #[must_use]
    pub fn is_pointer_valid(&self, ptr: *const T) -> bool {
        self.slab
            .as_ref()
            .is_some_and(|slab| slab.index_of(ptr.cast()).is_some())
    }

    /// Allocates memory for one object and returns a pointer to it.
    ///
    /// The memory is uninitialized, properly aligned for `T` and stays valid until it is
    /// returned via [`deallocate()`][Self::deallocate] or [`delete_object()`][Self::delete_object].
    /// The caller is responsible for constructing the object in it.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotCreated`] if the pool is not created and
    /// [`PoolError::Exhausted`] if every slot is in use.
    pub fn allocate(&mut self) -> Result<NonNull<T>> {
        let slab = self.slab.as_mut().ok_or(PoolError::NotCreated)?;

        if slab.is_full() {
            return Err(PoolError::Exhausted {
                capacity: self.capacity.get(),
            });
        }

        // SAFETY: We checked above that the slab is not full.
        let ptr = unsafe { slab.allocate() }.cast::<T>();

        trace!(pool_id = self.pool_id, item = type_name::<T>(), ?ptr, "allocate");

        Ok(ptr)
    }

    /// Allocates memory for one object without verifying the preconditions.
    ///
    /// Behaves like [`allocate()`][Self::allocate] for a pool that is created and not full.
    ///
    /// # Safety
    ///
    /// The pool must be created and must not be full.
    ///
    /// # Panics
    ///
    /// In builds with debug assertions, panics if the safety requirements are violated.
    #[must_use]
    pub unsafe fn allocate_unchecked(&mut self) -> NonNull<T> {
        debug_assert!(
            self.slab.is_some(),
            "allocate_unchecked() called on an object pool of {} that is not created",
            type_name::<T>()
        );

        // SAFETY: The caller guarantees that the pool is created.
        let slab = unsafe { self.slab.as_mut().unwrap_unchecked() };

        // SAFETY: The caller guarantees that the pool is not full.
        // The slab verifies this in debug builds.
        let ptr = unsafe { slab.allocate() }.cast::<T>();

        trace!(pool_id = self.pool_id, item = type_name::<T>(), ?ptr, "allocate_unchecked");

        ptr
    }

    /// Returns the memory of one object to the pool.
    ///
    /// The pool does not drop the object - use [`delete_object()`][Self::delete_object] for that.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotCreated`] if the pool is not created and
    /// [`PoolError::InvalidPointer`] if `ptr` does not point to one of the pool's slots or no
    /// slot is allocated.
    ///
    /// # Safety
    ///
    /// If `ptr` points to one of the pool's slots, that slot must be currently allocated, the
    /// object in it must already be dropped (or never have been constructed, or not need
    /// dropping), and the caller must not use the memory afterwards.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<T>) -> Result<()> {
        let index = self.checked_index(ptr)?;

        // SAFETY: The index identifies one of our slots; the caller guarantees that it is
        // allocated and no longer in use.
        unsafe {
            self.slab_mut().deallocate(index);
        }

        trace!(pool_id = self.pool_id, item = type_name::<T>(), ?ptr, "deallocate");

        Ok(())
    }

    /// Returns the memory of one object to the pool without verifying the pointer.
    ///
    /// # Safety
    ///
    /// The pool must be created, `ptr` must have been returned by one of this pool's allocation
    /// methods and not returned since, the object in it must already be dropped (or never have
    /// been constructed, or not need dropping), and the caller must not use the memory
    /// afterwards.
    ///
    /// # Panics
    ///
    /// In builds with debug assertions, panics if `ptr` does not point to one of the pool's
    /// slots.
    pub unsafe fn deallocate_unchecked(&mut self, ptr: NonNull<T>) {
        debug_assert!(
            self.is_pointer_valid(ptr.as_ptr()),
            "deallocate_unchecked() called with {ptr:?}, which is not a slot of an object pool of {}",
            type_name::<T>()
        );

        // SAFETY: The caller guarantees that the pool is created.
        let slab = unsafe { self.slab.as_mut().unwrap_unchecked() };

        // SAFETY: The caller guarantees that the pointer came from this pool.
        let index = unsafe { slab.index_of(ptr.as_ptr().cast()).unwrap_unchecked() };

        // SAFETY: The caller guarantees that the slot is allocated and no longer in use.
        unsafe {
            slab.deallocate(index);
        }

        trace!(pool_id = self.pool_id, item = type_name::<T>(), ?ptr, "deallocate_unchecked");
    }

    /// Drops the object at `ptr` in place and returns its memory to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotCreated`] if the pool is not created and
    /// [`PoolError::InvalidPointer`] if `ptr` does not point to one of the pool's slots or no
    /// slot is allocated. Nothing is dropped in that case.
    ///
    /// # Safety
    ///
    /// If `ptr` points to one of the pool's slots, that slot must be currently allocated and hold
    /// an initialized object, and the caller must not use the memory afterwards.
    ///
    /// # Example
    ///
    /// ```
    /// use fixed_pool::ObjectPool;
    ///
    /// let mut pool = ObjectPool::<String>::new();
    /// pool.create().unwrap();
    ///
    /// let ptr = pool.allocate().unwrap();
    ///
    /// // SAFETY: The memory is valid for a write of one String and nobody else uses it.
    /// unsafe { ptr.write("pooled".to_string()) };
    ///
    /// // SAFETY: The slot holds an initialized String that we no longer use.
    /// unsafe { pool.delete_object(ptr).unwrap() };
    ///
    /// pool.destroy().unwrap();
    /// ```
    pub unsafe fn delete_object(&mut self, ptr: NonNull<T>) -> Result<()> {
        let index = self.checked_index(ptr)?;

        // SAFETY: The caller guarantees that the slot holds an initialized object that nobody
        // else uses.
        unsafe {
            ptr.drop_in_place();
        }

        // SAFETY: The index identifies one of our slots, which is allocated and whose object
        // we just dropped.
        unsafe {
            self.slab_mut().deallocate(index);
        }

        trace!(pool_id = self.pool_id, item = type_name::<T>(), ?ptr, "delete_object");

        Ok(())
    }

    /// Moves `value` into the pool and returns an exclusive handle to it.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotCreated`] if the pool is not created and
    /// [`PoolError::Exhausted`] if every slot is in use. The value is dropped in that case.
    ///
    /// # Example
    ///
    /// ```
    /// use fixed_pool::ObjectPool;
    ///
    /// let mut pool = ObjectPool::<String>::new();
    /// pool.create().unwrap();
    ///
    /// let item = pool.insert("Hello".to_string()).unwrap();
    /// assert_eq!(&*item, "Hello");
    ///
    /// pool.remove(item).unwrap();
    /// ```
    pub fn insert(&mut self, value: T) -> Result<PooledMut<T>> {
        let ptr = self.allocate()?;

        // SAFETY: The memory is freshly allocated, aligned and sized for T, and unused.
        unsafe {
            ptr.write(value);
        }

        Ok(PooledMut::new(self.pool_id, ptr))
    }

    /// Drops the object behind `handle` and returns its slot to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ForeignHandle`] if the handle was issued by a different pool. The
    /// object then stays in the pool that issued it.
    pub fn remove(&mut self, handle: PooledMut<T>) -> Result<()> {
        self.verify_own_handle(&handle)?;

        // SAFETY: The handle proves that the slot was allocated by this pool, holds an
        // initialized object and is not in use elsewhere. The handle is consumed.
        unsafe { self.delete_object(handle.ptr) }
    }

    /// Moves the object behind `handle` out of the pool and returns its slot to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ForeignHandle`] if the handle was issued by a different pool. The
    /// object then stays in the pool that issued it.
    ///
    /// # Example
    ///
    /// ```
    /// use fixed_pool::ObjectPool;
    ///
    /// let mut pool = ObjectPool::<String>::new();
    /// pool.create().unwrap();
    ///
    /// let item = pool.insert("taken".to_string()).unwrap();
    /// let value = pool.take(item).unwrap();
    ///
    /// assert_eq!(value, "taken");
    /// assert!(pool.is_empty());
    /// ```
    pub fn take(&mut self, handle: PooledMut<T>) -> Result<T> {
        self.verify_own_handle(&handle)?;

        let index = self.checked_index(handle.ptr)?;

        // SAFETY: The handle proves that the slot holds an initialized object that nobody else
        // uses. The handle is consumed, so the object is moved out exactly once.
        let value = unsafe { handle.ptr.read() };

        // SAFETY: The index identifies one of our slots, which is allocated and whose object
        // we just moved out.
        unsafe {
            self.slab_mut().deallocate(index);
        }

        trace!(pool_id = self.pool_id, item = type_name::<T>(), ptr = ?handle.ptr, "take");

        Ok(value)
    }

    fn verify_own_handle(&self, handle: &PooledMut<T>) -> Result<()> {
        if handle.pool_id == self.pool_id {
            Ok(())
        } else {
            Err(PoolError::ForeignHandle {
                handle_pool_id: handle.pool_id,
                pool_id: self.pool_id,
            })
        }
    }

    /// Resolves a pointer returned by the caller to a slot index, verifying that it is ours.
    fn checked_index(&self, ptr: NonNull<T>) -> Result<usize> {
        let slab = self.slab.as_ref().ok_or(PoolError::NotCreated)?;

        let invalid = PoolError::InvalidPointer {
            address: ptr.as_ptr().addr(),
        };

        // With nothing allocated, no pointer can legitimately be returned.
        if slab.is_empty() {
            return Err(invalid);
        }

        slab.index_of(ptr.as_ptr().cast()).ok_or(invalid)
    }

    fn slab_mut(&mut self) -> &mut Slab {
        self.slab
            .as_mut()
            .expect("callers verify that the pool is created before calling this")
    }
}

impl<T, A: BackingAllocator> Drop for ObjectPool<T, A> {
    fn drop(&mut self) {
        let Some(slab) = self.slab.take() else {
            return;
        };

        if slab.is_empty() {
            // SAFETY: The slab was created with our allocator and is consumed here, so it is
            // released exactly once. No objects are in use, so no pointers into it remain in use.
            unsafe {
                slab.release(&self.allocator);
            }

            return;
        }

        let count = slab.len();

        // Objects are still in use, so the slab goes out of scope without being released. This
        // leaks the memory but keeps every outstanding pointer and handle valid.
        drop(slab);

        match self.drop_policy {
            DropPolicy::MayLeakItems => {
                warn!(
                    pool_id = self.pool_id,
                    item = type_name::<T>(),
                    count,
                    "object pool dropped with objects in use, leaking its slab"
                );
            }
            DropPolicy::MustNotDropItems => {
                // If we are already panicking, we do not want to panic again because that will
                // simply obscure whatever the original panic was, leading to debug difficulties.
                if !thread::panicking() {
                    panic!(
                        "dropped an object pool of {} with {count} objects in use and a policy that says it must be empty when dropped",
                        type_name::<T>()
                    );
                }
            }
        }
    }
}

impl<T, A: BackingAllocator> fmt::Debug for ObjectPool<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("pool_id", &self.pool_id)
            .field("capacity", &self.capacity)
            .field("created", &self.is_created())
            .field("len", &self.len())
            .field("allocator", &self.allocator)
            .field("drop_policy", &self.drop_policy)
            .finish_non_exhaustive()
    }
}

// SAFETY: The slab pointers are owned exclusively by the pool and nothing about them is tied to
// a thread, so as long as the objects and the allocator can move between threads, the pool can
// do so, too.
unsafe impl<T: Send, A: BackingAllocator + Send> Send for ObjectPool<T, A> {}
