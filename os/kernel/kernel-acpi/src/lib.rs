//! # ACPI Table Discovery
//!
//! Just enough ACPI to find the interrupt-controller description (MADT):
//!
//! ```text
//! RSDP (revision ≥ 2)
//!     ↓ xsdt_address
//! XSDT: 36-byte header + N × u64 table addresses
//!     ↓ linear scan by 4-byte signature
//! MADT ("APIC"): 44-byte prefix + variable-length entries
//! ```
//!
//! ACPI 1.0 roots (RSDT with 32-bit pointers) are rejected with
//! [`AcpiError::UnsupportedRevision`].
//!
//! ## Physical memory access
//!
//! Firmware tables live in physical memory. The [`PhysMapRo`] trait hands out
//! read-only byte slices for physical ranges; the kernel implements it with
//! the direct map and tests with a byte buffer.
//!
//! ## Parsing
//!
//! Tables are never cast to structs. Every field is read through
//! [`TableBytes`], which checks the offset against the table's length and
//! decodes little-endian integers.
//!
//! ```rust,no_run
//! use kernel_acpi::{AcpiTables, PhysMapRo, madt::Madt};
//!
//! struct Hhdm(u64);
//! impl PhysMapRo for Hhdm {
//!     unsafe fn map_ro<'a>(&self, paddr: u64, len: usize) -> &'a [u8] {
//!         unsafe { core::slice::from_raw_parts((paddr + self.0) as *const u8, len) }
//!     }
//! }
//!
//! let mapper = Hhdm(0xffff_8000_0000_0000);
//! let tables = unsafe { AcpiTables::new(&mapper, 0x000E_0000) }.unwrap();
//! if let Some(header) = tables.find_table(*b"APIC") {
//!     let madt = Madt::parse(tables.table_bytes(&header)).unwrap();
//!     for io in madt.io_apics() {
//!         let _ = (io.id, io.address, io.gsi_base);
//!     }
//! }
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod bytes;
pub mod madt;
pub mod rsdp;
mod sdt;
mod tables;

pub use bytes::TableBytes;
pub use sdt::SdtHeader;
pub use tables::AcpiTables;

/// Map a physical region and return a *read-only* byte slice for its contents.
/// You provide the implementation (identity map, direct map, etc.).
pub trait PhysMapRo {
    /// # Safety
    /// The implementor must ensure the returned slice is valid for `len` bytes.
    unsafe fn map_ro<'a>(&self, paddr: u64, len: usize) -> &'a [u8];
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AcpiError {
    #[error("RSDP signature mismatch")]
    BadSignature,
    #[error("ACPI revision {0} is not supported (need 2 or later)")]
    UnsupportedRevision(u8),
    #[error("table access at offset {offset} exceeds its length {len}")]
    Truncated { offset: usize, len: usize },
    #[error("expected table {expected:?}")]
    WrongTable { expected: [u8; 4] },
}

/// Byte sum; a valid ACPI structure sums to zero.
fn sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |a, &b| a.wrapping_add(b))
}
