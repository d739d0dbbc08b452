//! # Bootstrap processor bring-up
//!
//! ```text
//! _start_kernel (naked)        switch to BOOT_STACK
//!   └─ kernel_entry_on_boot_stack
//!        ├─ logger, boot info
//!        ├─ GDT + TSS, IDT          faults are reported from here on
//!        ├─ PMM (bitmap), VMM (CR3)
//!        ├─ ACPI → LAPIC, I/O APICs
//!        ├─ Kernel context published
//!        ├─ self-tests, memory overview
//!        └─ sti → kernel_main
//! ```

use crate::context::{Kernel, TICKS};
use crate::stacks::{BOOT_STACK, BOOT_STACK_SIZE};
use crate::tracing::{memory_regions, trace_boot_info};
use crate::{gdt, interrupts, kernel_main, platform, selftest};
use kernel_alloc::{BitmapFrameAlloc, HhdmPhysMapper, MemoryOverview};
use kernel_apic::TimerConfig;
use kernel_info::boot::KernelBootInfo;
use kernel_qemu::QemuLogger;
use kernel_sync::{SpinLock, irq};
use kernel_vmem::{AddressSpace, read_cr3_phys};
use log::{LevelFilter, info};

/// The kernel entry point.
///
/// # ABI
/// System V (`extern "C"`): the loader passes `boot_info` in `RDI`, with
/// interrupts disabled and physical memory mapped at `hhdm_offset`.
///
/// # Naked function & Stack
/// Nothing about the loader's stack is assumed. The entry switches to
/// [`BOOT_STACK`] before any Rust code runs and never returns.
#[unsafe(no_mangle)]
#[unsafe(naked)]
#[unsafe(link_section = ".text._start_kernel")]
pub extern "C" fn _start_kernel(_boot_info: *const KernelBootInfo) {
    core::arch::naked_asm!(
        "cli",
        // keep boot_info
        "mov r12, rdi",
        "lea rax, [rip + {stack_sym}]",
        "add rax, {stack_size}",
        "and rax, -16",
        "mov rsp, rax",
        // RSP % 16 == 8 at entry, as after a CALL
        "push 0",
        "xor rbp, rbp",
        "mov rdi, r12",
        "jmp {rust_entry}",
        stack_sym = sym BOOT_STACK,
        stack_size = const BOOT_STACK_SIZE,
        rust_entry = sym kernel_entry_on_boot_stack,
    );
}

/// Kernel entry running on [`BOOT_STACK`].
#[unsafe(no_mangle)]
pub extern "C" fn kernel_entry_on_boot_stack(boot_info: *const KernelBootInfo) -> ! {
    QemuLogger::new(LevelFilter::Debug)
        .init()
        .expect("logger init");

    info!("Kernel reporting to QEMU! Initializing bootstrap processor now.");
    let bi = unsafe { &*boot_info };
    let regions = unsafe { memory_regions(bi) };
    trace_boot_info(bi, regions);

    info!("Initializing GDT and TSS ...");
    gdt::init();

    info!("Initializing IDT ...");
    interrupts::init();

    info!("Initializing physical memory manager ...");
    let hhdm = HhdmPhysMapper::new(bi.hhdm_offset);
    let mut pmm = unsafe { BitmapFrameAlloc::init(regions, hhdm) };
    assert!(pmm.is_functional(), "no usable memory for the frame bitmap");

    info!("Adopting the loader's page tables ...");
    let mut vmm = unsafe { AddressSpace::from_root(read_cr3_phys(), hhdm) };
    info!("PML4 at {}", vmm.root());

    info!("Initializing interrupt controllers ...");
    let controllers = platform::bring_up(bi.rsdp_addr, bi.hhdm_offset, &mut vmm, &mut pmm)
        .expect("local APIC mapping");

    let kernel = Kernel {
        hhdm_offset: bi.hhdm_offset,
        pmm: SpinLock::new(pmm),
        vmm: SpinLock::new(vmm),
        lapic: controllers.lapic,
        io_apics: controllers.io_apics,
    }
    .install();

    selftest::run_pmm_tests(kernel);
    selftest::run_vmm_tests(kernel);
    info!("{}", MemoryOverview::from(&*kernel.pmm.lock_irq()));

    let timer_hz = controllers.timer.frequency_hz(TimerConfig::QEMU_BUS_HZ);
    TICKS.set_frequency_hz(timer_hz);
    info!("LAPIC timer at ~{timer_hz} Hz (assuming the QEMU bus clock)");

    info!("Enabling interrupts ...");
    irq::enable();

    info!("Kernel early init is done, jumping into kernel main loop ...");
    kernel_main(kernel)
}
