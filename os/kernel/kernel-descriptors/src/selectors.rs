//! # Segment selectors
//!
//! ```text
//!  15            3 2  1  0
//! +----------------+--+----+
//! |   Index[12:0]  |TI| RPL|
//! +----------------+--+----+  (TI=0 → GDT)
//! ```

use crate::privilege::Ring;
use bitfield_struct::bitfield;

#[bitfield(u16)]
#[derive(Eq, PartialEq)]
pub struct SegmentSelector {
    /// Requested privilege level.
    #[bits(2)]
    pub rpl: Ring,
    /// Table indicator; always the GDT here.
    pub ldt: bool,
    /// Descriptor index.
    #[bits(13)]
    pub index: u16,
}

impl SegmentSelector {
    /// A GDT selector.
    #[inline]
    #[must_use]
    pub const fn gdt(index: u16, rpl: Ring) -> Self {
        Self::new().with_index(index).with_rpl(rpl)
    }

    /// The value loaded into a segment register.
    #[inline]
    #[must_use]
    pub const fn encode(self) -> u16 {
        self.into_bits()
    }
}

pub const KERNEL_CS_SEL: SegmentSelector = SegmentSelector::gdt(1, Ring::Ring0);
pub const KERNEL_DS_SEL: SegmentSelector = SegmentSelector::gdt(2, Ring::Ring0);
pub const USER_CS_SEL: SegmentSelector = SegmentSelector::gdt(3, Ring::Ring3);
pub const USER_DS_SEL: SegmentSelector = SegmentSelector::gdt(4, Ring::Ring3);
pub const TSS_SEL: SegmentSelector = SegmentSelector::gdt(5, Ring::Ring0);

// Encoded selector numbers as `u16` (what the CPU actually loads).
pub const KERNEL_CS: u16 = KERNEL_CS_SEL.encode();
pub const KERNEL_DS: u16 = KERNEL_DS_SEL.encode();
pub const USER_CS: u16 = USER_CS_SEL.encode();
pub const USER_DS: u16 = USER_DS_SEL.encode();
pub const TSS: u16 = TSS_SEL.encode();

const _: () = {
    assert!(KERNEL_CS == 0x08);
    assert!(KERNEL_DS == 0x10);
    assert!(USER_CS == 0x1B);
    assert!(USER_DS == 0x23);
    assert!(TSS == 0x28);
};
