//! # Global Descriptor Table
//!
//! In long mode base and limit of code/data descriptors are ignored; what
//! matters is the access byte (present, DPL, code vs data) and the `L` flag
//! that makes a code segment 64-bit. The TSS needs a 16-byte system
//! descriptor that spans two slots.

use crate::privilege::Ring;
use crate::tss::TaskStateSegment;
use crate::DescriptorTablePointer;
use bitfield_struct::bitfield;
use kernel_memory_addresses::VirtualAddress;

/// An 8-byte code or data segment descriptor.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct SegmentDescriptor {
    pub limit_lo: u16,
    pub base_lo: u16,
    pub base_mid: u8,
    pub accessed: bool,
    /// Readable for code, writable for data.
    pub read_write: bool,
    pub conforming: bool,
    pub executable: bool,
    /// 1 for code/data, 0 for system descriptors.
    pub code_data: bool,
    #[bits(2)]
    pub dpl: Ring,
    pub present: bool,
    #[bits(4)]
    pub limit_hi: u8,
    pub avl: bool,
    /// 64-bit code segment.
    pub long_mode: bool,
    /// Must be 0 when `long_mode` is set.
    pub db: bool,
    pub granularity: bool,
    pub base_hi: u8,
}

impl SegmentDescriptor {
    /// A 64-bit execute/read code segment.
    #[must_use]
    pub const fn code(dpl: Ring) -> Self {
        Self::new()
            .with_read_write(true)
            .with_executable(true)
            .with_code_data(true)
            .with_dpl(dpl)
            .with_present(true)
            .with_long_mode(true)
    }

    /// A read/write data segment.
    #[must_use]
    pub const fn data(dpl: Ring) -> Self {
        Self::new()
            .with_read_write(true)
            .with_code_data(true)
            .with_dpl(dpl)
            .with_present(true)
    }

    /// Bits 40..48: P, DPL, S and type.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn access_byte(self) -> u8 {
        (self.into_bits() >> 40) as u8
    }
}

/// Low half of a 64-bit available TSS descriptor.
#[bitfield(u64)]
pub struct TssDescriptorLow {
    pub limit_lo: u16,
    pub base_lo: u16,
    pub base_mid: u8,
    /// 0x9: available 64-bit TSS.
    #[bits(4)]
    pub typ: u8,
    pub code_data: bool,
    #[bits(2)]
    pub dpl: Ring,
    pub present: bool,
    #[bits(4)]
    pub limit_hi: u8,
    #[bits(3)]
    __: u8,
    pub granularity: bool,
    pub base_hi: u8,
}

/// 16-byte TSS system descriptor (two consecutive GDT entries).
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct TssDescriptor {
    pub low: TssDescriptorLow,
    /// `base[63:32]`, upper half reserved.
    pub high: u64,
}

impl TssDescriptor {
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(base: VirtualAddress, limit: u32) -> Self {
        let base = base.as_u64();
        let low = TssDescriptorLow::new()
            .with_limit_lo((limit & 0xFFFF) as u16)
            .with_base_lo((base & 0xFFFF) as u16)
            .with_base_mid(((base >> 16) & 0xFF) as u8)
            .with_typ(0x9)
            .with_dpl(Ring::Ring0)
            .with_present(true)
            .with_limit_hi(((limit >> 16) & 0xF) as u8)
            .with_base_hi(((base >> 24) & 0xFF) as u8);
        Self {
            low,
            high: base >> 32,
        }
    }

    /// The TSS base address split across both halves.
    #[must_use]
    pub const fn base(&self) -> u64 {
        let low = self.low;
        (low.base_lo() as u64)
            | ((low.base_mid() as u64) << 16)
            | ((low.base_hi() as u64) << 24)
            | (self.high << 32)
    }
}

pub const GDT_ENTRIES: usize = 7;

/// The bootstrap CPU's GDT.
#[repr(C, align(8))]
#[derive(Debug)]
pub struct GlobalDescriptorTable {
    null: u64,
    kernel_code: SegmentDescriptor,
    kernel_data: SegmentDescriptor,
    user_code: SegmentDescriptor,
    user_data: SegmentDescriptor,
    tss: TssDescriptor,
}

const _: () = {
    assert!(size_of::<SegmentDescriptor>() == 8);
    assert!(size_of::<TssDescriptor>() == 16);
    assert!(size_of::<GlobalDescriptorTable>() == GDT_ENTRIES * 8);
};

impl GlobalDescriptorTable {
    /// Builds the table around `tss`, which must stay at its address for as
    /// long as the table is loaded.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(tss: &TaskStateSegment) -> Self {
        Self {
            null: 0,
            kernel_code: SegmentDescriptor::code(Ring::Ring0),
            kernel_data: SegmentDescriptor::data(Ring::Ring0),
            user_code: SegmentDescriptor::code(Ring::Ring3),
            user_data: SegmentDescriptor::data(Ring::Ring3),
            tss: TssDescriptor::new(
                VirtualAddress::from_ptr(core::ptr::from_ref(tss)),
                (size_of::<TaskStateSegment>() - 1) as u32,
            ),
        }
    }

    /// The raw 8-byte slots, in the order the CPU sees them.
    #[must_use]
    pub const fn entries(&self) -> [u64; GDT_ENTRIES] {
        [
            self.null,
            self.kernel_code.into_bits(),
            self.kernel_data.into_bits(),
            self.user_code.into_bits(),
            self.user_data.into_bits(),
            self.tss.low.into_bits(),
            self.tss.high,
        ]
    }

    #[must_use]
    pub const fn tss_descriptor(&self) -> &TssDescriptor {
        &self.tss
    }

    /// Operand for `lgdt`, covering exactly the seven slots.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn pointer(&'static self) -> DescriptorTablePointer {
        DescriptorTablePointer {
            limit: (GDT_ENTRIES * 8 - 1) as u16,
            base: VirtualAddress::from_ptr(core::ptr::from_ref(self)).as_u64(),
        }
    }
}
