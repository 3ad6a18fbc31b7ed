use thiserror::Error;

/// Errors reported by the checked operations of an [`ObjectPool`][crate::ObjectPool] and
/// a [`PoolRegistry`][crate::PoolRegistry].
///
/// Every variant describes a contract violation by the caller or a failure to obtain the
/// backing memory. None of them leave the pool in a corrupted state - an operation that
/// returns an error has not modified the pool.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum PoolError {
    /// The pool (or the registry entry for it) has already been created.
    #[error("the object pool has already been created")]
    AlreadyCreated,

    /// The pool has not been created yet or has already been destroyed.
    #[error("the object pool has not been created")]
    NotCreated,

    /// Every slot of the pool is in use.
    #[error("the object pool is exhausted: all {capacity} slots are in use")]
    Exhausted {
        /// The fixed capacity of the exhausted pool.
        capacity: usize,
    },

    /// The backing allocator could not provide the memory for the slab.
    ///
    /// A `size` of `usize::MAX` means the required size could not even be represented.
    #[error("the backing allocator could not provide {size} bytes")]
    OutOfMemory {
        /// The number of bytes requested from the backing allocator.
        size: usize,
    },

    /// The pointer was not issued by this pool.
    #[error("the pointer {address:#x} does not identify a slot of this object pool")]
    InvalidPointer {
        /// The address of the rejected pointer.
        address: usize,
    },

    /// The pool cannot be destroyed because objects allocated from it are still in use.
    #[error("the object pool still has {count} objects in use")]
    ObjectsOutstanding {
        /// The number of slots that have not been returned to the pool.
        count: usize,
    },

    /// A handle was returned to a pool that did not issue it.
    #[error("the handle belongs to pool {handle_pool_id}, not to pool {pool_id}")]
    ForeignHandle {
        /// The ID of the pool that issued the handle.
        handle_pool_id: u64,

        /// The ID of the pool the handle was returned to.
        pool_id: u64,
    },
}

/// A specialized `Result` type for object pool operations, returning the crate's
/// [`PoolError`] type as the error value.
pub type Result<T> = std::result::Result<T, PoolError>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(PoolError: Send, Sync, Debug, Clone);

    #[test]
    fn messages_carry_details() {
        let error = PoolError::Exhausted { capacity: 3 };
        assert_eq!(
            error.to_string(),
            "the object pool is exhausted: all 3 slots are in use"
        );

        let error = PoolError::InvalidPointer { address: 0x1000 };
        assert!(error.to_string().contains("0x1000"));

        let error = PoolError::ObjectsOutstanding { count: 2 };
        assert!(error.to_string().contains('2'));
    }

    #[test]
    fn is_std_error() {
        let error: Box<dyn std::error::Error> = Box::new(PoolError::NotCreated);
        assert_eq!(error.to_string(), "the object pool has not been created");
    }
}
