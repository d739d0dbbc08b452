//! # Interrupt entry and dispatch
//!
//! Every one of the 256 gates points into a table of 16-byte stubs. A stub
//! pushes a zero error code if the CPU does not supply one, pushes its
//! vector and jumps to a common path that saves the general-purpose
//! registers and calls [`dispatch`] with a [`TrapFrame`]:
//!
//! ```text
//!  higher addresses
//!  ┌──────────────┐
//!  │ SS           │  pushed by the CPU
//!  │ RSP          │
//!  │ RFLAGS       │
//!  │ CS           │
//!  │ RIP          │
//!  │ error code   │  CPU or stub
//!  │ vector       │  stub          ◄── &TrapFrame
//!  │ RAX .. R15   │  common path
//!  └──────────────┘
//! ```
//!
//! | Vector | Handling |
//! |--------|----------|
//! | 0..=31 | fault report, then halt |
//! | [`TIMER`] | tick, EOI |
//! | [`ERROR`] | log `ESR`, EOI |
//! | [`SPURIOUS`] | nothing, no EOI |
//! | anything else | reported as unhandled, then halt |

use crate::context::{Kernel, TICKS};
use kernel_apic::rdtsc;
use kernel_apic::vectors::{ERROR, SPURIOUS, TIMER};
use kernel_descriptors::fault::{ExceptionClass, FaultReport, TrapFrame};
use kernel_descriptors::idt::{EXCEPTION_VECTORS, Idt};
use kernel_sync::SyncOnceCell;
use log::{error, info, warn};

/// Distance between two entries of the stub table.
const STUB_STRIDE: u64 = 16;

core::arch::global_asm!(
    r#"
    .intel_syntax noprefix
    .section .text.isr,"ax",@progbits

    .balign 16
    .globl isr_stub_table
isr_stub_table:
    .set isr_vector, 0
    .rept 256
    .balign 16
    // Vectors for which the CPU pushes an error code itself.
    .if (isr_vector == 8) || ((isr_vector >= 10) && (isr_vector <= 14)) || (isr_vector == 17) || (isr_vector == 21) || (isr_vector == 29) || (isr_vector == 30)
    .else
    push 0
    .endif
    push isr_vector
    jmp isr_common
    .set isr_vector, isr_vector + 1
    .endr

isr_common:
    cld
    push rax
    push rbx
    push rcx
    push rdx
    push rsi
    push rdi
    push rbp
    push r8
    push r9
    push r10
    push r11
    push r12
    push r13
    push r14
    push r15

    // The trap frame starts right above the 15 saved registers.
    lea rdi, [rsp + 15 * 8]
    mov rbp, rsp
    and rsp, -16
    call {dispatch}
    mov rsp, rbp

    pop r15
    pop r14
    pop r13
    pop r12
    pop r11
    pop r10
    pop r9
    pop r8
    pop rbp
    pop rdi
    pop rsi
    pop rdx
    pop rcx
    pop rbx
    pop rax

    // vector and error code
    add rsp, 16
    iretq
"#,
    dispatch = sym dispatch,
);

unsafe extern "C" {
    static isr_stub_table: u8;
}

static IDT: SyncOnceCell<Idt> = SyncOnceCell::new();

/// Entry address of the stub for `vector`.
fn stub_address(vector: u8) -> u64 {
    (&raw const isr_stub_table) as u64 + u64::from(vector) * STUB_STRIDE
}

/// Builds the IDT over the stub table and loads it.
pub fn init() {
    let idt = IDT.get_or_init(|| {
        let mut idt = Idt::new();
        idt.fill(stub_address);
        idt
    });
    unsafe { idt.load() };
    info!(
        "IDT loaded; stubs at {:#018x}, #DF/NMI/#MC on IST 1/2/3",
        stub_address(0)
    );
}

extern "C" fn dispatch(frame: &TrapFrame) {
    #[allow(clippy::cast_possible_truncation)]
    let vector = frame.vector as u8;
    match vector {
        TIMER => on_timer(),
        ERROR => on_apic_error(),
        SPURIOUS => {}
        _ => report_and_halt(frame),
    }
}

fn on_timer() {
    TICKS.tick(rdtsc());
    if let Some(kernel) = Kernel::get() {
        kernel.lapic.eoi();
    }
}

fn on_apic_error() {
    if let Some(kernel) = Kernel::get() {
        warn!("LAPIC error, ESR={:#x}", kernel.lapic.error_status());
        kernel.lapic.eoi();
    }
}

/// Logs the fault and stops this CPU.
fn report_and_halt(frame: &TrapFrame) -> ! {
    let report = FaultReport::from_frame(frame, read_cr2());
    if usize::try_from(frame.vector).is_ok_and(|v| v < EXCEPTION_VECTORS) {
        error!("CPU exception\n{report}");
        error!("classified as {}", report.class());
        if report.class() != ExceptionClass::FatalHalt {
            warn!("no recovery path yet, halting anyway");
        }
    } else {
        error!("unhandled interrupt\n{report}");
    }
    halt_forever()
}

fn read_cr2() -> u64 {
    let cr2: u64;
    unsafe {
        core::arch::asm!("mov {}, cr2", out(reg) cr2, options(nomem, nostack, preserves_flags));
    }
    cr2
}

/// `cli; hlt` forever.
pub fn halt_forever() -> ! {
    loop {
        unsafe {
            core::arch::asm!("cli", "hlt", options(nomem, nostack));
        }
    }
}
