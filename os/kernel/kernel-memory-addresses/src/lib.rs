//! # Physical and Virtual Address Types
//!
//! Zero-cost wrappers that keep physical and virtual addresses apart at the
//! type level, plus the page-size markers and the [`PhysicalFrame`] unit used
//! by the frame allocator.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A CPU physical address (RAM or MMIO). |
//! | [`VirtualAddress`] | An address as seen through paging. |
//! | [`PhysicalFrame`] | A 4 KiB physical frame, identified by its index. |
//! | [`PageSize`] | Marker trait implemented by [`Size4K`] and [`Size2M`]. |
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x0020_3042);
//! let frame = pa.frame();
//! assert_eq!(frame.index(), 0x203);
//! assert_eq!(frame.base().as_u64(), 0x0020_3000);
//!
//! let va = VirtualAddress::new(0xFFFF_9000_0000_1234);
//! assert_eq!(va.offset::<Size4K>(), 0x234);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod address;
mod frame;
mod page_size;
mod physical_address;
mod virtual_address;

pub use frame::PhysicalFrame;
pub use page_size::{PageSize, Size2M, Size4K};
pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

/// Rounds `value` up to the next multiple of `align` (a power of two).
#[inline]
#[must_use]
pub const fn align_up(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Rounds `value` down to a multiple of `align` (a power of two).
#[inline]
#[must_use]
pub const fn align_down(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    value & !(align - 1)
}
