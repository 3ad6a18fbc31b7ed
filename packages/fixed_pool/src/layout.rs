use std::alloc::Layout;
use std::num::NonZero;

/// The type stored in a vacant slot to point at the next vacant slot.
pub(crate) type SlotLink = usize;

/// Layout calculations for a [`Slab`][crate::Slab].
///
/// Every slot must be able to hold either one item or one [`SlotLink`], so the slot size is
/// the larger of the two, padded to the stricter of the two alignments. The backing block is
/// sized for one slot more than the capacity (the reserved slot that holds the end-of-list
/// marker once every real slot is in use) plus enough padding to align the first slot
/// regardless of where the backing allocator places the block.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct SlabLayout {
    /// Distance in bytes between the starts of two adjacent slots.
    slot_stride: usize,

    /// Alignment of every slot, at least that of the item.
    slot_align: usize,

    /// Number of bytes to request from the backing allocator.
    buffer_size: usize,
}

impl SlabLayout {
    /// Calculates the layout of a slab holding `capacity` items of `item_layout`.
    ///
    /// Returns `None` if the size of the backing block does not fit in `usize`.
    ///
    /// # Panics
    ///
    /// Panics if the item layout has zero size.
    #[must_use]
    pub(crate) fn calculate(item_layout: Layout, capacity: NonZero<usize>) -> Option<Self> {
        assert!(
            item_layout.size() > 0,
            "SlabLayout cannot be calculated for zero-sized item layout"
        );

        let link_layout = Layout::new::<SlotLink>();

        let slot_layout = Layout::from_size_align(
            item_layout.size().max(link_layout.size()),
            item_layout.align().max(link_layout.align()),
        )
        .ok()?
        .pad_to_align();

        let slot_count = capacity.get().checked_add(1)?;

        let buffer_size = slot_layout
            .size()
            .checked_mul(slot_count)?
            // Alignments are powers of two, so this cannot underflow.
            .checked_add(slot_layout.align().wrapping_sub(1))?;

        Some(Self {
            slot_stride: slot_layout.size(),
            slot_align: slot_layout.align(),
            buffer_size,
        })
    }

    #[must_use]
    pub(crate) fn slot_stride(&self) -> usize {
        self.slot_stride
    }

    #[must_use]
    pub(crate) fn slot_align(&self) -> usize {
        self.slot_align
    }

    #[must_use]
    pub(crate) fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

/// Rounds `address` up to the nearest multiple of `align`, which must be a power of two.
///
/// Returns `None` if the rounded address does not fit in `usize`.
#[must_use]
pub(crate) fn align_up(address: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two(), "alignment {align} is not a power of two");

    let mask = align.wrapping_sub(1);

    Some(address.checked_add(mask)? & !mask)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use new_zealand::nz;

    use super::*;

    #[test]
    fn small_item_uses_link_size() {
        let layout = SlabLayout::calculate(Layout::new::<u8>(), nz!(3)).unwrap();

        assert_eq!(layout.slot_stride(), size_of::<SlotLink>());
        assert_eq!(layout.slot_align(), align_of::<SlotLink>());
        assert_eq!(
            layout.buffer_size(),
            size_of::<SlotLink>() * 4 + align_of::<SlotLink>() - 1
        );
    }

    #[test]
    fn large_item_uses_item_size() {
        let layout = SlabLayout::calculate(Layout::new::<[u64; 4]>(), nz!(10)).unwrap();

        assert_eq!(layout.slot_stride(), 32);
        assert_eq!(layout.buffer_size(), 32 * 11 + layout.slot_align() - 1);
    }

    #[test]
    fn odd_sized_item_is_padded_for_links() {
        // 12 bytes, 4-byte aligned - the link in the next slot would be misaligned without
        // padding the stride up to the link alignment.
        let layout = SlabLayout::calculate(Layout::new::<[u32; 3]>(), nz!(2)).unwrap();

        assert_eq!(layout.slot_stride() % align_of::<SlotLink>(), 0);
        assert!(layout.slot_stride() >= 12);
    }

    #[test]
    fn over_aligned_item_keeps_its_alignment() {
        #[allow(dead_code, reason = "only the layout matters")]
        #[repr(align(64))]
        struct CacheLine(u8);

        let layout = SlabLayout::calculate(Layout::new::<CacheLine>(), nz!(5)).unwrap();

        assert_eq!(layout.slot_align(), 64);
        assert_eq!(layout.slot_stride(), 64);
        assert_eq!(layout.buffer_size(), 64 * 6 + 63);
    }

    #[test]
    fn overflowing_capacity_is_none() {
        let huge = NonZero::new(usize::MAX).unwrap();
        assert!(SlabLayout::calculate(Layout::new::<u64>(), huge).is_none());

        let large = NonZero::new(usize::MAX / 8).unwrap();
        assert!(SlabLayout::calculate(Layout::new::<u64>(), large).is_none());
    }

    #[test]
    #[should_panic]
    fn zero_sized_item_panics() {
        _ = SlabLayout::calculate(Layout::new::<()>(), nz!(1));
    }

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 8), Some(0));
        assert_eq!(align_up(1, 8), Some(8));
        assert_eq!(align_up(8, 8), Some(8));
        assert_eq!(align_up(9, 8), Some(16));
        assert_eq!(align_up(17, 1), Some(17));
        assert_eq!(align_up(65, 64), Some(128));
    }

    #[test]
    fn align_up_overflow_is_none() {
        assert_eq!(align_up(usize::MAX, 8), None);
        assert_eq!(align_up(usize::MAX, 1), Some(usize::MAX));
    }
}
