//! # x86-64 descriptor tables and fault decoding
//!
//! Layout types for the structures the CPU consults on every interrupt and
//! privilege change, plus the pure logic for describing a fault:
//!
//! * [`gdt`]: the 7-entry GDT (null, kernel code/data, user code/data, TSS).
//! * [`tss`]: the 64-bit TSS with `rsp0` and three IST stacks.
//! * [`idt`]: 256 interrupt gates with a fluent builder and IST wiring.
//! * [`fault`]: the fault report, exception names, page-fault error decoding
//!   and the classification of exceptions.
//!
//! Nothing here executes `lgdt`, `ltr` or segment reloads; the kernel binary
//! owns that sequence. [`idt::Idt::load`] is the one privileged helper.
//!
//! ## GDT layout
//! Index | Selector | Meaning
//! ------|----------|--------
//! 0     | 0x00     | Null
//! 1     | 0x08     | Kernel code (64-bit, DPL=0)
//! 2     | 0x10     | Kernel data (DPL=0)
//! 3     | 0x1B     | User code (64-bit, DPL=3, RPL=3)
//! 4     | 0x23     | User data (DPL=3, RPL=3)
//! 5/6   | 0x28     | TSS (16-byte system descriptor)

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod fault;
pub mod gdt;
pub mod idt;
pub mod privilege;
pub mod selectors;
pub mod tss;

/// Operand of `lgdt` / `lidt`.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug)]
pub struct DescriptorTablePointer {
    /// Size of the table in bytes, minus one.
    pub limit: u16,
    /// Linear address of the table.
    pub base: u64,
}

const _: () = assert!(size_of::<DescriptorTablePointer>() == 10);
