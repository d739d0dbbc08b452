//! # Virtual Memory Support
//!
//! Four-level x86-64 paging for the kernel: an [`AddressSpace`] rooted at one
//! PML4, the [`PageEntryBits`] entry layout, caller-facing [`PageFlags`], and the
//! two seams the mapper needs from the rest of the kernel ([`FrameAlloc`] and
//! [`PhysMapper`]).
//!
//! ## x86-64 Virtual Address → Physical Address Walk
//!
//! ```text
//! | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  PML4 |  PDPT |   PD  |   PT  | Offset |
//! ```
//!
//! Each level holds 512 entries of 8 bytes. The walk stops early at a PD entry
//! with `PS=1`, which maps a 2 MiB page directly:
//!
//! ```text
//!  PML4  →  PDPT  →  PD  →  PT  →  4 KiB page
//!                     │
//!                     └──► PS=1 → 2 MiB page
//! ```
//!
//! ## Ownership
//!
//! Intermediate tables are allocated from the [`FrameAlloc`] on first use,
//! zero-filled, and linked from exactly one parent entry. They are never
//! freed again. Leaf frames belong to the caller: unmapping clears the entry
//! but does not return the frame.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod address_space;
mod page_entry_bits;
mod page_table;

pub use crate::address_space::{AddressSpace, MapError, NOT_MAPPED};
pub use crate::page_entry_bits::{PageEntryBits, PageFlags};
pub use crate::page_table::{ENTRIES_PER_TABLE, PageTable};
pub use kernel_memory_addresses::{
    PageSize, PhysicalAddress, PhysicalFrame, Size2M, Size4K, VirtualAddress,
};

/// Source of zero-or-more 4 KiB frames for page tables.
pub trait FrameAlloc {
    /// Hands out one frame, or `None` when physical memory is exhausted.
    fn alloc_4k(&mut self) -> Option<PhysicalFrame>;
}

/// Makes physical memory addressable from the current address space.
///
/// The kernel implements this with the higher-half direct map; tests back it
/// with a heap buffer.
pub trait PhysMapper {
    /// The virtual address through which `pa` is reachable.
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress;

    /// Views the physical memory at `pa` as a `T`.
    ///
    /// # Safety
    /// `pa` must be mapped, suitably aligned for `T`, and not aliased by any
    /// other live reference for `'a`.
    #[inline]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { &mut *self.phys_to_virt(pa).as_mut_ptr::<T>() }
    }

    /// Views `len` bytes of physical memory starting at `pa`.
    ///
    /// # Safety
    /// Same as [`phys_to_mut`](Self::phys_to_mut), for the whole range.
    #[inline]
    unsafe fn phys_to_bytes_mut<'a>(&self, pa: PhysicalAddress, len: usize) -> &'a mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.phys_to_virt(pa).as_mut_ptr::<u8>(), len) }
    }
}

impl<M: PhysMapper + ?Sized> PhysMapper for &M {
    #[inline]
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        (**self).phys_to_virt(pa)
    }
}

/// Invalidates the TLB entry of the page containing `va` on this CPU.
///
/// A no-op on hosted targets, where the page tables are never live.
///
/// # Safety
/// Ring 0 only.
#[inline]
pub unsafe fn invalidate_tlb_page(va: VirtualAddress) {
    #[cfg(target_os = "none")]
    unsafe {
        core::arch::asm!("invlpg [{}]", in(reg) va.as_u64(), options(nostack, preserves_flags));
    }
    #[cfg(not(target_os = "none"))]
    let _ = va;
}

/// Physical address of the active PML4 (`CR3` with the flag bits masked off).
///
/// # Safety
/// Ring 0 only.
#[inline]
#[must_use]
pub unsafe fn read_cr3_phys() -> PhysicalAddress {
    let cr3: u64;
    unsafe {
        core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
    }
    PhysicalAddress::new(cr3 & 0x000F_FFFF_FFFF_F000)
}
