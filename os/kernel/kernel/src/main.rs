//! # Kernel Entry Point
//!
//! The binary wires the library crates together on the bootstrap processor;
//! see [`init`] for the bring-up order. After init the CPU idles in
//! [`kernel_main`], woken by the LAPIC timer.

#![no_std]
#![no_main]
#![allow(unsafe_code)]

mod context;
mod gdt;
mod init;
mod interrupts;
mod platform;
mod selftest;
mod stacks;
mod tracing;

use crate::context::{Kernel, TICKS};
use kernel_apic::{Stopwatch, rdtsc};
use kernel_qemu::qemu_trace;
use log::info;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    qemu_trace!("\nKERNEL PANIC: {info}\n");
    interrupts::halt_forever()
}

fn kernel_main(kernel: &'static Kernel) -> ! {
    info!(
        "{} I/O APIC(s), local APIC id {}",
        kernel.io_apics.len(),
        kernel.lapic.id()
    );

    let mut stopwatch = Stopwatch::new();
    stopwatch.start(rdtsc());

    loop {
        unsafe { core::arch::asm!("hlt", options(nomem, nostack, preserves_flags)) };

        if let Some(tsc_hz) = TICKS.tsc_hz()
            && let Some(seconds) = stopwatch.poll(rdtsc(), tsc_hz)
        {
            info!("uptime {seconds} s ({} ticks)", TICKS.count());
        }
    }
}
