//! # Statically reserved stacks
//!
//! | Stack | Size | Used for |
//! |-------|------|----------|
//! | [`BOOT_STACK`] | 64 KiB | entry until the idle loop |
//! | kernel stack | [`KERNEL_STACK_SIZE`] | `TSS.rsp0`, ring 3 → ring 0 transitions |
//! | IST 1..=3 | [`IST_STACK_SIZE`] each | double fault, NMI, machine check |
//!
//! All of them live in `.bss.boot`, so no frame allocator is needed to get
//! a working fault path.

use kernel_descriptors::tss::IST_STACKS;
use kernel_info::memory::{IST_STACK_COUNT, IST_STACK_SIZE, KERNEL_STACK_SIZE};
use kernel_memory_addresses::VirtualAddress;

/// Size of the stack the entry point switches to.
pub const BOOT_STACK_SIZE: usize = 64 * 1024;

/// A byte buffer with 16-byte alignment, as the SysV ABI expects of `RSP`.
#[repr(C, align(16))]
pub struct Aligned16<const N: usize>([u8; N]);

/// Entry stack of the bootstrap processor. Referenced by name from the
/// entry assembly.
#[unsafe(link_section = ".bss.boot")]
#[unsafe(no_mangle)]
pub static mut BOOT_STACK: Aligned16<BOOT_STACK_SIZE> = Aligned16([0; BOOT_STACK_SIZE]);

#[unsafe(link_section = ".bss.boot")]
static mut KERNEL_STACK: Aligned16<KERNEL_STACK_SIZE> = Aligned16([0; KERNEL_STACK_SIZE]);

#[unsafe(link_section = ".bss.boot")]
static mut IST_STACK_MEMORY: [Aligned16<IST_STACK_SIZE>; IST_STACK_COUNT] =
    [const { Aligned16([0; IST_STACK_SIZE]) }; IST_STACK_COUNT];

const _: () = {
    assert!(BOOT_STACK_SIZE.is_multiple_of(16));
    assert!(IST_STACK_COUNT == IST_STACKS);
};

/// First address past `base`, i.e. the initial `RSP` of a descending stack.
fn top_of<const N: usize>(base: *const Aligned16<N>) -> VirtualAddress {
    VirtualAddress::new(base as u64 + N as u64)
}

/// Initial `RSP` for ring-0 entry from user mode.
#[must_use]
pub fn kernel_stack_top() -> VirtualAddress {
    top_of(&raw const KERNEL_STACK)
}

/// Initial `RSP` of each IST slot, slot 1 first.
#[must_use]
pub fn ist_stack_tops() -> [VirtualAddress; IST_STACKS] {
    let base = (&raw const IST_STACK_MEMORY).cast::<Aligned16<IST_STACK_SIZE>>();
    core::array::from_fn(|i| top_of(base.wrapping_add(i)))
}
