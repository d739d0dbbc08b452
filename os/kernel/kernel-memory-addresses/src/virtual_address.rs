use crate::PageSize;
use crate::address::address_type;

/// Virtual memory address.
///
/// Not checked for canonical form.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u64);

address_type!(VirtualAddress, "VA", u64::wrapping_add);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr.addr() as u64)
    }

    #[inline]
    #[must_use]
    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    /// Byte offset inside the `S`-sized page.
    #[inline]
    #[must_use]
    pub const fn offset<S: PageSize>(self) -> u64 {
        self.0 & S::MASK
    }

    /// PML4, PDPT, PD and PT slots, 9 bits each, top level first.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn table_indices(self) -> [usize; 4] {
        let mut out = [0; 4];
        let mut level = 0;
        while level < 4 {
            let shift = 39 - 9 * level;
            out[level] = ((self.0 >> shift) & 0x1FF) as usize;
            level += 1;
        }
        out
    }
}
