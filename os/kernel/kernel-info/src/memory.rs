//! # Memory Layout

/// Base page size.
pub const PAGE_SIZE: u64 = 4096;

/// Size of a PD-level huge page.
pub const HUGE_PAGE_SIZE: u64 = 2 * 1024 * 1024;

/// Where the kernel executes (VMA).
///
/// # Kernel Build
/// Sourced by the kernel's `build.rs` to configure the linker.
pub const KERNEL_BASE: u64 = 0xffff_ffff_8000_0000;

/// Where the kernel image is placed in physical memory (LMA).
///
/// # Kernel Build
/// Sourced by the kernel's `build.rs` to configure the linker.
pub const PHYS_LOAD: u64 = 0x0010_0000; // 1 MiB

/// The size of the bootstrap processor's kernel stack (`TSS.rsp0`).
pub const KERNEL_STACK_SIZE: usize = 16 * 4096;

/// The size of each dedicated fault stack (double fault, NMI, machine check).
pub const IST_STACK_SIZE: usize = 8192;

/// Number of interrupt stack table slots that are populated.
pub const IST_STACK_COUNT: usize = 3;

const _: () = {
    assert!(KERNEL_STACK_SIZE.is_multiple_of(4096));
    assert!(IST_STACK_SIZE.is_multiple_of(16));
    assert!(HUGE_PAGE_SIZE.is_multiple_of(PAGE_SIZE));
    assert!(KERNEL_BASE.is_multiple_of(HUGE_PAGE_SIZE));
};
