//! Interrupt vectors owned by the APIC code.

/// Local APIC timer.
pub const TIMER: u8 = 0x20;
/// Local APIC error LVT.
pub const ERROR: u8 = 0xFE;
/// Spurious-interrupt vector; the low nibble must be all ones on older parts.
pub const SPURIOUS: u8 = 0xFF;

const _: () = {
    assert!(TIMER >= 32);
    assert!(ERROR >= 32);
    assert!(SPURIOUS & 0x0F == 0x0F);
};
