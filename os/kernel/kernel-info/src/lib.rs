//! # Kernel Configuration and Boot Interface
//!
//! Shared contracts between the boot loader and the kernel, and the
//! compile-time layout constants the kernel subsystems agree on.
//!
//! * [`boot`]: the `#[repr(C)]` hand-off structure ([`KernelBootInfo`](boot::KernelBootInfo))
//!   carrying the memory map, the direct-map offset, the ACPI root pointer
//!   and the processor count.
//! * [`memory`]: page sizes, stack sizes and the kernel's link addresses.
//!
//! ## Boot Protocol
//!
//! The loader enters the kernel with a single pointer argument:
//!
//! ```rust
//! # use kernel_info::boot::KernelBootInfo;
//! pub type KernelEntryFn = extern "sysv64" fn(*const KernelBootInfo) -> !;
//! ```
//!
//! Interrupts are disabled on entry and all of physical memory is mapped at
//! `hhdm_offset`. Nothing else about the loader's page tables is assumed.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
