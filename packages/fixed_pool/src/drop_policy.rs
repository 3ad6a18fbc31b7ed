/// Determines what happens when an [`ObjectPool`][crate::ObjectPool] is dropped while objects
/// allocated from it are still in use.
///
/// A created pool without objects in use always returns its slab to the backing allocator when
/// dropped. The pool never drops the objects themselves - it does not know which slots hold
/// initialized values.
///
/// # Examples
///
/// ```
/// use fixed_pool::{DropPolicy, ObjectPool};
///
/// // The drop policy is set when the pool is built.
/// let pool = ObjectPool::<u32>::builder()
///     .drop_policy(DropPolicy::MustNotDropItems)
///     .build();
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// The slab is leaked so that pointers to the objects still in use stay valid. This is the
    /// default.
    #[default]
    MayLeakItems,

    /// The pool will panic if objects are still in use when it is dropped. The slab is leaked
    /// before panicking.
    ///
    /// This may be valuable if the application must return every object before shutting down,
    /// as a leak check.
    MustNotDropItems,
}
