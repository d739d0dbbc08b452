use crate::{PageSize, PhysicalAddress, Size4K};
use core::fmt;
use core::ops::Add;

/// A 4 KiB physical frame, identified by `address / 4096`.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalFrame(u64);

impl PhysicalFrame {
    #[inline]
    #[must_use]
    pub const fn from_index(index: u64) -> Self {
        Self(index)
    }

    /// The frame containing `pa`.
    #[inline]
    #[must_use]
    pub const fn containing(pa: PhysicalAddress) -> Self {
        pa.frame()
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 << Size4K::SHIFT)
    }
}

impl Add<u64> for PhysicalFrame {
    type Output = Self;

    #[inline]
    fn add(self, rhs: u64) -> Self {
        Self(self.0 + rhs)
    }
}

impl From<PhysicalFrame> for PhysicalAddress {
    #[inline]
    fn from(frame: PhysicalFrame) -> Self {
        frame.base()
    }
}

impl fmt::Display for PhysicalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame #{} ({})", self.0, self.base())
    }
}
