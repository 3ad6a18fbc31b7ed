use std::num::NonZero;
use std::ptr::NonNull;

use crate::{BackingAllocator, Result, SlabLayout, SlotLink, align_up};

/// Link value of a vacant slot that has never been handed out. Every slot from that one to the
/// end of the slab is untouched, so the slot after it is the next one to use.
const NO_SUCCESSOR: SlotLink = SlotLink::MAX;

/// The backing storage of an `ObjectPool`: one block from a [`BackingAllocator`], carved into
/// `capacity` equally sized slots plus one reserved slot.
///
/// Vacant slots form an intrusive freelist. Each vacant slot stores the index of the next vacant
/// slot in its own memory, with the most recently freed slot at the head (LIFO). Slots that were
/// never handed out are not linked up front - the head of the list carries [`NO_SUCCESSOR`] and
/// the slot after it is threaded in lazily when the head is taken.
///
/// The slab does not know the type of the items and never reads or drops them. It does not
/// release its memory on drop either. The owner must call [`release()`][Self::release] with the
/// allocator that provided the memory, or deliberately leak the block.
///
/// # Out of band access
///
/// The slab does not create or keep references to the slots, so it is valid to access slot
/// memory via pointers obtained from [`allocate()`][Self::allocate] even when not holding an
/// exclusive reference to the slab.
#[derive(Debug)]
pub(crate) struct Slab {
    layout: SlabLayout,

    capacity: NonZero<usize>,

    /// The block exactly as returned by the backing allocator, needed to release it.
    buffer_ptr: NonNull<u8>,

    /// Start of slot 0, the first address in the block that satisfies the slot alignment.
    first_slot_ptr: NonNull<u8>,

    /// Index of the next slot to hand out. Think of this as a virtual stack of the most recently
    /// freed slots, with the stack entries stored in the slots themselves. Points at the reserved
    /// slot (index == capacity) if the slab is full.
    next_free_index: usize,

    /// Number of slots that can still be handed out.
    remaining: usize,
}

impl Slab {
    /// Obtains the memory for a slab from `allocator`.
    ///
    /// # Errors
    ///
    /// Returns the allocator's error if it cannot provide the memory. Nothing is allocated in
    /// that case.
    pub(crate) fn new<A: BackingAllocator>(
        layout: SlabLayout,
        capacity: NonZero<usize>,
        allocator: &A,
    ) -> Result<Self> {
        let buffer_ptr = allocator.allocate(layout.buffer_size())?;

        let address = buffer_ptr.as_ptr().addr();
        let aligned_address = align_up(address, layout.slot_align())
            .expect("a live allocation with alignment padding cannot end beyond the address space");

        // Less than slot_align, which is the amount of padding included in the buffer size.
        let padding = aligned_address.wrapping_sub(address);

        // SAFETY: The buffer includes slot_align - 1 bytes of padding in front of the slots,
        // so the offset stays inside the allocation.
        let first_slot_ptr = unsafe { buffer_ptr.add(padding) };

        let mut slab = Self {
            layout,
            capacity,
            buffer_ptr,
            first_slot_ptr,
            next_free_index: 0,
            remaining: capacity.get(),
        };

        // SAFETY: Slot 0 always exists because capacity is non-zero.
        unsafe {
            slab.write_link(0, NO_SUCCESSOR);
        }

        Ok(slab)
    }

    #[must_use]
    pub(crate) fn capacity(&self) -> NonZero<usize> {
        self.capacity
    }

    /// Returns the number of slots that can still be handed out.
    #[must_use]
    pub(crate) fn remaining(&self) -> usize {
        self.remaining
    }

    /// Returns the number of slots currently handed out.
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        // Cannot wrap because remaining never exceeds capacity.
        self.capacity.get().wrapping_sub(self.remaining)
    }

    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.remaining == self.capacity.get()
    }

    #[must_use]
    pub(crate) fn is_full(&self) -> bool {
        self.remaining == 0
    }

    /// The block as returned by the backing allocator.
    #[must_use]
    pub(crate) fn buffer_ptr(&self) -> NonNull<u8> {
        self.buffer_ptr
    }

    /// # Safety
    ///
    /// `index` must not exceed the capacity. The reserved slot at `index == capacity` is valid
    /// for storing links but never for items.
    unsafe fn slot_ptr(&self, index: usize) -> NonNull<u8> {
        debug_assert!(
            index <= self.capacity.get(),
            "slot {index} out of bounds in slab of capacity {}",
            self.capacity
        );

        // Cannot overflow because that would imply the slab extends beyond virtual memory.
        let offset = index.wrapping_mul(self.layout.slot_stride());

        // SAFETY: The caller guarantees the index is within the capacity + 1 slots we allocated.
        unsafe { self.first_slot_ptr.byte_add(offset) }
    }

    /// # Safety
    ///
    /// `index` must not exceed the capacity and the slot must be vacant with a link written.
    unsafe fn read_link(&self, index: usize) -> SlotLink {
        // SAFETY: Forwarding the bounds guarantee from the caller.
        let slot_ptr = unsafe { self.slot_ptr(index) };

        // SAFETY: Slots are aligned for links (ensured by SlabLayout) and the caller guarantees
        // that a link was written to this vacant slot.
        unsafe { slot_ptr.cast::<SlotLink>().read() }
    }

    /// # Safety
    ///
    /// `index` must not exceed the capacity and the slot must not hold a live item.
    #[expect(clippy::needless_pass_by_ref_mut, reason = "writes through the slab's memory")]
    unsafe fn write_link(&mut self, index: usize, link: SlotLink) {
        // SAFETY: Forwarding the bounds guarantee from the caller.
        let slot_ptr = unsafe { self.slot_ptr(index) };

        // SAFETY: Slots are aligned and sized for links (ensured by SlabLayout) and the caller
        // guarantees nobody is using the slot for an item.
        unsafe {
            slot_ptr.cast::<SlotLink>().write(link);
        }
    }

    /// Takes the next vacant slot and returns a pointer to its (uninitialized) memory.
    ///
    /// # Safety
    ///
    /// The slab must not be full.
    #[must_use]
    pub(crate) unsafe fn allocate(&mut self) -> NonNull<u8> {
        debug_assert!(
            !self.is_full(),
            "cannot allocate from a full slab of capacity {}",
            self.capacity
        );

        // Pop the next free index from the stack of free slots.
        let index = self.next_free_index;

        // SAFETY: The head always refers to a vacant slot with a link, and is below capacity
        // because the caller guarantees the slab is not full.
        let link = unsafe { self.read_link(index) };

        self.next_free_index = if link == NO_SUCCESSOR {
            // This slot was untouched, so the slot after it is untouched as well.
            // Cannot overflow - index is below capacity.
            let next_index = index.wrapping_add(1);

            // SAFETY: next_index is at most capacity, the reserved slot.
            unsafe {
                self.write_link(next_index, NO_SUCCESSOR);
            }

            next_index
        } else {
            link
        };

        // Cannot wrap - the caller guarantees the slab is not full.
        self.remaining = self.remaining.wrapping_sub(1);

        #[cfg(debug_assertions)]
        self.integrity_check();

        // SAFETY: index is below capacity, as established above.
        unsafe { self.slot_ptr(index) }
    }

    /// Returns the slot at `index` to the slab, making it the next one to be handed out.
    ///
    /// The memory of the slot is overwritten. The slab does not drop anything in it.
    ///
    /// # Safety
    ///
    /// `index` must identify a slot that is currently handed out (e.g. via
    /// [`index_of()`][Self::index_of]) and the caller must no longer use its memory.
    pub(crate) unsafe fn deallocate(&mut self, index: usize) {
        debug_assert!(
            index < self.capacity.get(),
            "slot {index} out of bounds in slab of capacity {}",
            self.capacity
        );
        debug_assert!(
            !self.is_empty(),
            "slot {index} returned to a slab of capacity {} with no slots in use",
            self.capacity
        );

        // Push the returned slot onto the free stack.
        // SAFETY: The caller guarantees the index is in bounds and no longer in use.
        unsafe {
            self.write_link(index, self.next_free_index);
        }

        self.next_free_index = index;

        // Cannot overflow - a slot was in use, so remaining is below capacity.
        self.remaining = self.remaining.wrapping_add(1);

        #[cfg(debug_assertions)]
        self.integrity_check();
    }

    /// Returns the index of the slot that starts at `ptr`, or `None` if `ptr` is not the start
    /// of one of the slab's item slots.
    ///
    /// This only checks the address - it cannot tell whether the slot is currently in use.
    #[must_use]
    pub(crate) fn index_of(&self, ptr: *const u8) -> Option<usize> {
        let offset = ptr
            .addr()
            .checked_sub(self.first_slot_ptr.as_ptr().addr())?;

        let stride = self.layout.slot_stride();

        if offset.checked_rem(stride)? != 0 {
            return None;
        }

        let index = offset.checked_div(stride)?;

        (index < self.capacity.get()).then_some(index)
    }

    /// Returns the memory of the slab to `allocator`.
    ///
    /// # Safety
    ///
    /// `allocator` must be the allocator the slab was created with. Any pointers into the slab
    /// become dangling.
    pub(crate) unsafe fn release<A: BackingAllocator>(self, allocator: &A) {
        // SAFETY: The caller guarantees this is the allocator that provided the block, and we
        // pass the same size we requested from it. Consuming self ensures a single release.
        unsafe {
            allocator.deallocate(self.buffer_ptr, self.layout.buffer_size());
        }
    }

    /// Walks the freelist and verifies that it accounts for exactly the vacant slots.
    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(debug_assertions)]
    pub(crate) fn integrity_check(&self) {
        let capacity = self.capacity.get();

        let mut index = self.next_free_index;
        let mut recycled_count: usize = 0;

        loop {
            assert!(
                index <= capacity,
                "freelist reaches slot {index} beyond the reserved slot of slab of capacity {capacity}"
            );

            // SAFETY: Bounds checked above. Every slot on the freelist is vacant with a link.
            let link = unsafe { self.read_link(index) };

            if link == NO_SUCCESSOR {
                break;
            }

            assert!(
                index < capacity,
                "reserved slot links to {link} in slab of capacity {capacity}"
            );

            recycled_count = recycled_count
                .checked_add(1)
                .expect("guarded by cycle check below");

            assert!(
                recycled_count <= capacity,
                "freelist of slab of capacity {capacity} contains a cycle"
            );

            index = link;
        }

        // The list ends at the first untouched slot - it and everything after it are vacant.
        let untouched_count = capacity
            .checked_sub(index)
            .expect("guarded by bounds check in loop");

        assert_eq!(
            recycled_count.checked_add(untouched_count),
            Some(self.remaining),
            "freelist of slab of capacity {capacity} does not match the remaining count"
        );
    }
}
