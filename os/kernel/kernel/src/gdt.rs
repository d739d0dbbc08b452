//! # GDT and TSS activation
//!
//! The tables are built once into `'static` cells and then loaded:
//!
//! 1. `lgdt` with the 7-entry table.
//! 2. `DS`, `ES` and `SS` ← kernel data (0x10).
//! 3. Far return into kernel code (0x08) to reload `CS`.
//! 4. `ltr` with the TSS selector (0x28).

use crate::stacks;
use kernel_descriptors::gdt::GlobalDescriptorTable;
use kernel_descriptors::selectors::{KERNEL_CS, KERNEL_DS, TSS};
use kernel_descriptors::tss::TaskStateSegment;
use kernel_sync::SyncOnceCell;
use log::info;

static BSP_TSS: SyncOnceCell<TaskStateSegment> = SyncOnceCell::new();
static BSP_GDT: SyncOnceCell<GlobalDescriptorTable> = SyncOnceCell::new();

/// Builds the bootstrap processor's TSS and GDT and activates them.
///
/// Call once, with interrupts disabled.
pub fn init() {
    let tss = BSP_TSS.get_or_init(|| {
        TaskStateSegment::new(stacks::kernel_stack_top(), stacks::ist_stack_tops())
    });
    let gdt = BSP_GDT.get_or_init(|| GlobalDescriptorTable::new(tss));

    unsafe { activate(gdt) };

    info!(
        "GDT loaded; TSS rsp0={}, IST1={:?}, IST2={:?}, IST3={:?}",
        tss.rsp0(),
        tss.ist(1),
        tss.ist(2),
        tss.ist(3)
    );
}

/// Loads `gdt`, reloads every segment register and the task register.
///
/// # Safety
/// Ring 0 with interrupts disabled. `gdt` must be laid out as
/// [`GlobalDescriptorTable::new`] builds it.
unsafe fn activate(gdt: &'static GlobalDescriptorTable) {
    let ptr = gdt.pointer();
    unsafe {
        core::arch::asm!(
            "lgdt [{}]",
            in(reg) &raw const ptr,
            options(readonly, nostack, preserves_flags)
        );

        core::arch::asm!(
            "mov ds, {0:x}",
            "mov es, {0:x}",
            "mov ss, {0:x}",
            in(reg) KERNEL_DS,
            options(nostack, preserves_flags)
        );

        // far return into the new CS
        core::arch::asm!(
            "push {cs}",
            "lea {tmp}, [rip + 2f]",
            "push {tmp}",
            "retfq",
            "2:",
            cs = in(reg) u64::from(KERNEL_CS),
            tmp = lateout(reg) _,
        );

        core::arch::asm!(
            "ltr {0:x}",
            in(reg) TSS,
            options(nostack, preserves_flags)
        );
    }
}
