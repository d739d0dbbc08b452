//! # Physical Memory Management
//!
//! The kernel's physical frame allocator and the direct-map [`PhysMapper`](kernel_vmem::PhysMapper).
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  AddressSpace (kernel-vmem)  │  page tables, mappings
//! └──────────────┬───────────────┘
//!                │ FrameAlloc::alloc_4k
//! ┌──────────────▼───────────────┐
//! │  BitmapFrameAlloc            │  one bit per 4 KiB frame, first fit
//! └──────────────┬───────────────┘
//!                │ PhysMapper
//! ┌──────────────▼───────────────┐
//! │  HhdmPhysMapper              │  virt = phys + hhdm_offset
//! └──────────────────────────────┘
//! ```
//!
//! ## Frame allocator
//!
//! [`frame_alloc::BitmapFrameAlloc`] keeps a flat bitmap over every frame up
//! to the highest RAM address of the boot memory map. Allocation is a linear
//! first-fit scan, which is fine for boot-time use and nothing else.
//! Counters (`total`, `usable`, `free`, `used`) are maintained on every
//! change so queries never rescan the bitmap.
//!
//! Exhaustion is reported as `None`; callers decide whether that is fatal.
//!
//! ## Memory overview
//!
//! [`overview::MemoryOverview`] snapshots the counters for reporting.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod frame_alloc;
pub mod overview;
pub mod phys_mapper;

pub use frame_alloc::BitmapFrameAlloc;
pub use overview::MemoryOverview;
pub use phys_mapper::HhdmPhysMapper;
