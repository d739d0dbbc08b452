use crate::address::address_type;
use crate::{PageSize, PhysicalFrame, Size4K};

/// Physical memory address.
///
/// Page-table entries, MMIO windows and frame bases are physical and must go
/// through the direct map before they can be dereferenced.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

address_type!(PhysicalAddress, "PA", core::ops::Add::add);

impl PhysicalAddress {
    /// Clears the in-page bits for an `S`-sized page.
    #[inline]
    #[must_use]
    pub const fn align_down<S: PageSize>(self) -> Self {
        Self(self.0 & !S::MASK)
    }

    #[inline]
    #[must_use]
    pub const fn frame(self) -> PhysicalFrame {
        PhysicalFrame::from_index(self.0 >> Size4K::SHIFT)
    }
}
