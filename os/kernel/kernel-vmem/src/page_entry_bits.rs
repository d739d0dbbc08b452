use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// A single 64-bit page-table entry, common superset of PML4E/PDPTE/PDE/PTE.
///
/// | Bits  | Name   | Meaning |
/// |-------|--------|---------|
/// | 0     | P      | Present |
/// | 1     | RW     | Writable |
/// | 2     | US     | User accessible |
/// | 3     | PWT    | Write-through |
/// | 4     | PCD    | Cache disable |
/// | 5     | A      | Accessed |
/// | 6     | D      | Dirty (leaf only) |
/// | 7     | PS     | Huge page (PD level: 2 MiB) |
/// | 8     | G      | Global (leaf only) |
/// | 9–11  | avail  | OS use |
/// | 12–51 | addr   | Physical frame bits [51:12] |
/// | 52–62 | avail  | OS use / protection key |
/// | 63    | NX     | Execute disable |
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    pub present: bool,
    pub writable: bool,
    pub user_access: bool,
    pub write_through: bool,
    pub cache_disabled: bool,
    pub accessed: bool,
    pub dirty: bool,
    pub large_page: bool,
    pub global_translation: bool,
    #[bits(3)]
    pub os_available_low: u8,
    #[bits(40)]
    phys_addr_bits_51_12: u64,
    #[bits(11)]
    pub os_available_high: u16,
    pub no_execute: bool,
}

const _: () = assert!(size_of::<PageEntryBits>() == 8);

impl PageEntryBits {
    /// Mask of the physical-address field.
    pub const ADDRESS_MASK: u64 = 0x000F_FFFF_FFFF_F000;

    /// A leaf or table entry pointing at `phys` with the given control bits.
    #[inline]
    #[must_use]
    pub const fn from_parts(phys: PhysicalAddress, flags: PageFlags) -> Self {
        Self::from_bits((phys.as_u64() & Self::ADDRESS_MASK) | (flags.bits() & !Self::ADDRESS_MASK))
    }

    /// Entry linking to a next-level table.
    #[inline]
    #[must_use]
    pub const fn table_link(table: PhysicalAddress, user: bool) -> Self {
        Self::from_parts(table, PageFlags::KERNEL_RW).with_user_access(user)
    }

    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        self.set_phys_addr_bits_51_12(phys.as_u64() >> 12);
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.phys_addr_bits_51_12() << 12)
    }

    /// Everything but the address field.
    #[inline]
    #[must_use]
    pub const fn flags(&self) -> PageFlags {
        PageFlags::from_bits_retain(self.into_bits() & !Self::ADDRESS_MASK)
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.into_bits() == 0
    }
}

bitflags::bitflags! {
    /// Caller-facing protection and cache bits of a mapping.
    ///
    /// The values are the raw entry bits, so `PageFlags::KERNEL_RW | PageFlags::PCD`
    /// can be stored in an entry as-is.
    #[repr(transparent)]
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct PageFlags: u64 {
        const PRESENT = 1 << 0;
        const WRITE = 1 << 1;
        const USER = 1 << 2;
        /// Write-through.
        const PWT = 1 << 3;
        /// Cache disable.
        const PCD = 1 << 4;
        const ACCESSED = 1 << 5;
        const DIRTY = 1 << 6;
        /// `PS`: the entry maps a large page.
        const HUGE = 1 << 7;
        const GLOBAL = 1 << 8;
        const NX = 1 << 63;
    }
}

impl PageFlags {
    /// Present, writable, supervisor-only.
    pub const KERNEL_RW: Self = Self::PRESENT.union(Self::WRITE);
    /// [`KERNEL_RW`](Self::KERNEL_RW) without execute permission.
    pub const KERNEL_RW_NX: Self = Self::KERNEL_RW.union(Self::NX);
    /// Device registers: uncached, write-through, never executed.
    pub const MMIO: Self = Self::KERNEL_RW_NX.union(Self::PCD).union(Self::PWT);
}
