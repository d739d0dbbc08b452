//! # Interrupt Descriptor Table
//!
//! 256 16-byte gates, built with a fluent API:
//!
//! ```
//! use kernel_descriptors::idt::{GateType, Idt, Ist};
//! use kernel_descriptors::selectors::KERNEL_CS;
//!
//! let mut idt = Idt::new();
//! idt[8]
//!     .set_handler_addr(0xFFFF_FFFF_8010_0000)
//!     .selector(KERNEL_CS)
//!     .ist(Ist::DOUBLE_FAULT)
//!     .present(true)
//!     .gate_type(GateType::InterruptGate);
//! assert_eq!(idt[8].handler_addr(), 0xFFFF_FFFF_8010_0000);
//! ```
//!
//! Vectors the kernel never binds keep whatever default handler it installs
//! first; a non-present gate would escalate to #NP/#DF instead of a report.

use crate::DescriptorTablePointer;
use crate::privilege::Ring;
use crate::selectors::KERNEL_CS;
use bitfield_struct::bitfield;
use core::ops::{Index, IndexMut};

pub const IDT_ENTRIES: usize = 256;

/// Vectors 0..32 are architectural exceptions.
pub const EXCEPTION_VECTORS: usize = 32;

/// IST index as written into a gate; 0 means "stay on the current stack".
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Ist(u8);

impl Ist {
    pub const NONE: Self = Self(0);
    pub const DOUBLE_FAULT: Self = Self(1);
    pub const NMI: Self = Self(2);
    pub const MACHINE_CHECK: Self = Self(3);

    /// `index` must be in `0..=7`.
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if index <= 7 { Some(Self(index)) } else { None }
    }

    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// The IST slot a vector must run on.
    #[must_use]
    pub const fn for_vector(vector: u8) -> Self {
        match vector {
            2 => Self::NMI,
            8 => Self::DOUBLE_FAULT,
            18 => Self::MACHINE_CHECK,
            _ => Self::NONE,
        }
    }
}

/// The attribute word of a gate: IST index plus `P | DPL | 0 | type`.
#[bitfield(u16)]
pub struct IdtGateAttr {
    #[bits(3)]
    pub ist: u8,
    #[bits(5)]
    __: u8,
    /// 0xE = interrupt gate, 0xF = trap gate.
    #[bits(4)]
    pub typ: u8,
    pub s: bool,
    #[bits(2)]
    pub dpl: Ring,
    pub present: bool,
}

/// Interrupt gates clear IF on entry, trap gates leave it alone.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum GateType {
    InterruptGate,
    TrapGate,
}

impl GateType {
    const fn bits(self) -> u8 {
        match self {
            Self::InterruptGate => 0xE,
            Self::TrapGate => 0xF,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct IdtEntry {
    offset_lo: u16,
    selector: u16,
    attr: IdtGateAttr,
    offset_mid: u16,
    offset_hi: u32,
    zero: u32,
}

const _: () = assert!(size_of::<IdtEntry>() == 16);

impl IdtEntry {
    /// A zeroed, non-present entry.
    pub const MISSING: Self = Self {
        offset_lo: 0,
        selector: 0,
        attr: IdtGateAttr::new(),
        offset_mid: 0,
        offset_hi: 0,
        zero: 0,
    };

    /// Points the gate at `handler` and resets it to a non-present ring 0
    /// interrupt gate on the kernel code segment without IST.
    pub fn set_handler(&mut self, handler: unsafe extern "C" fn()) -> IdtEntryBuilder<'_> {
        self.set_handler_addr(handler as usize as u64)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub const fn set_handler_addr(&mut self, addr: u64) -> IdtEntryBuilder<'_> {
        self.offset_lo = (addr & 0xFFFF) as u16;
        self.offset_mid = ((addr >> 16) & 0xFFFF) as u16;
        self.offset_hi = (addr >> 32) as u32;
        self.selector = KERNEL_CS;
        self.attr = IdtGateAttr::new().with_typ(GateType::InterruptGate.bits());
        IdtEntryBuilder { entry: self }
    }

    #[must_use]
    pub const fn handler_addr(&self) -> u64 {
        (self.offset_lo as u64) | ((self.offset_mid as u64) << 16) | ((self.offset_hi as u64) << 32)
    }

    #[must_use]
    pub const fn selector_value(&self) -> u16 {
        self.selector
    }

    #[must_use]
    pub const fn attr(&self) -> IdtGateAttr {
        self.attr
    }

    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.attr.present()
    }
}

/// Fluent builder for an [`IdtEntry`].
pub struct IdtEntryBuilder<'a> {
    entry: &'a mut IdtEntry,
}

impl IdtEntryBuilder<'_> {
    #[inline]
    #[must_use]
    pub const fn present(self, p: bool) -> Self {
        self.entry.attr = self.entry.attr.with_present(p);
        self
    }

    /// Lowest ring allowed to raise this vector with `int n`.
    #[inline]
    #[must_use]
    pub const fn dpl(self, dpl: Ring) -> Self {
        self.entry.attr = self.entry.attr.with_dpl(dpl);
        self
    }

    #[inline]
    #[must_use]
    pub const fn gate_type(self, gate_type: GateType) -> Self {
        self.entry.attr = self.entry.attr.with_typ(gate_type.bits()).with_s(false);
        self
    }

    #[inline]
    #[must_use]
    pub const fn ist(self, ist: Ist) -> Self {
        self.entry.attr = self.entry.attr.with_ist(ist.index());
        self
    }

    #[inline]
    #[must_use]
    pub const fn selector(self, sel: u16) -> Self {
        self.entry.selector = sel;
        self
    }
}

#[repr(C, align(16))]
pub struct Idt {
    entries: [IdtEntry; IDT_ENTRIES],
}

impl Default for Idt {
    fn default() -> Self {
        Self::new()
    }
}

impl Idt {
    /// All gates non-present.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [IdtEntry::MISSING; IDT_ENTRIES],
        }
    }

    /// Points every gate at `handler` as a present interrupt gate, then
    /// applies the IST slot of each vector.
    pub fn fill(&mut self, handler: impl Fn(u8) -> u64) {
        for (vector, entry) in (0..=u8::MAX).zip(self.entries.iter_mut()) {
            let _ = entry
                .set_handler_addr(handler(vector))
                .selector(KERNEL_CS)
                .ist(Ist::for_vector(vector))
                .present(true)
                .gate_type(GateType::InterruptGate);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &IdtEntry> {
        self.entries.iter()
    }

    /// Operand for `lidt`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn pointer(&'static self) -> DescriptorTablePointer {
        DescriptorTablePointer {
            limit: (size_of::<Self>() - 1) as u16,
            base: core::ptr::from_ref(self) as u64,
        }
    }

    /// Loads this table into IDTR.
    ///
    /// # Safety
    /// CPL 0, and every present gate must point at a valid handler.
    #[inline]
    pub unsafe fn load(&'static self) {
        let ptr = self.pointer();
        unsafe {
            core::arch::asm!("lidt [{}]", in(reg) &raw const ptr, options(readonly, nostack, preserves_flags));
        }
    }
}

impl Index<usize> for Idt {
    type Output = IdtEntry;
    fn index(&self, i: usize) -> &Self::Output {
        &self.entries[i]
    }
}

impl IndexMut<usize> for Idt {
    fn index_mut(&mut self, i: usize) -> &mut Self::Output {
        &mut self.entries[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_wires_ist_slots() {
        let mut idt = Box::new(Idt::new());
        idt.fill(|v| 0xFFFF_FFFF_8000_0000 + u64::from(v) * 16);

        assert!(idt.iter().all(IdtEntry::is_present));
        assert_eq!(idt[8].attr().ist(), 1);
        assert_eq!(idt[2].attr().ist(), 2);
        assert_eq!(idt[18].attr().ist(), 3);
        assert_eq!(idt[14].attr().ist(), 0);
        assert_eq!(idt[0x20].attr().ist(), 0);
        assert_eq!(idt[255].handler_addr(), 0xFFFF_FFFF_8000_0000 + 255 * 16);
        assert_eq!(idt[3].selector_value(), 0x08);
    }

    #[test]
    fn gate_attr_encodes_like_0x8e() {
        let mut idt = Idt::new();
        let _ = idt[0x20]
            .set_handler_addr(0x1234)
            .present(true)
            .gate_type(GateType::InterruptGate);
        // High byte 0x8E: present, DPL 0, interrupt gate.
        assert_eq!(idt[0x20].attr().into_bits() >> 8, 0x8E);

        let _ = idt[3].set_handler_addr(0x1234).dpl(Ring::Ring3).present(true).gate_type(GateType::TrapGate);
        assert_eq!(idt[3].attr().into_bits() >> 8, 0xEF);
        assert!(!idt[4].is_present());
    }
}
