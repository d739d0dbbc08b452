//! # 64-bit Task State Segment
//!
//! In long mode the TSS only supplies stacks: `rsp0` on a ring 3 → ring 0
//! transition, and `ist1..ist7` for gates that request an IST slot. The I/O
//! permission bitmap offset points past the end, so there is no bitmap.

use kernel_memory_addresses::VirtualAddress;

/// Number of IST stacks the kernel provisions (double fault, NMI, machine check).
pub const IST_STACKS: usize = 3;

#[repr(C, packed)]
#[derive(Debug)]
pub struct TaskStateSegment {
    _reserved0: u32,
    /// Privilege stack table; only `rsp[0]` is used.
    rsp: [u64; 3],
    _reserved1: u64,
    ist: [u64; 7],
    _reserved2: u64,
    _reserved3: u16,
    iomap_base: u16,
}

const _: () = assert!(size_of::<TaskStateSegment>() == 104);

impl TaskStateSegment {
    /// A TSS with `rsp0` and the first [`IST_STACKS`] IST slots filled.
    /// Each pointer is the *top* of its stack.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(rsp0: VirtualAddress, ist: [VirtualAddress; IST_STACKS]) -> Self {
        let mut slots = [0; 7];
        let mut i = 0;
        while i < IST_STACKS {
            slots[i] = ist[i].as_u64();
            i += 1;
        }
        Self {
            _reserved0: 0,
            rsp: [rsp0.as_u64(), 0, 0],
            _reserved1: 0,
            ist: slots,
            _reserved2: 0,
            _reserved3: 0,
            iomap_base: size_of::<Self>() as u16,
        }
    }

    #[must_use]
    pub const fn rsp0(&self) -> VirtualAddress {
        let rsp = self.rsp;
        VirtualAddress::new(rsp[0])
    }

    pub const fn set_rsp0(&mut self, top: VirtualAddress) {
        let mut rsp = self.rsp;
        rsp[0] = top.as_u64();
        self.rsp = rsp;
    }

    /// IST slot `index` (1-based, as written in a gate).
    #[must_use]
    pub const fn ist(&self, index: u8) -> Option<VirtualAddress> {
        if index == 0 || index > 7 {
            return None;
        }
        let ist = self.ist;
        Some(VirtualAddress::new(ist[index as usize - 1]))
    }

    #[must_use]
    pub const fn iomap_base(&self) -> u16 {
        self.iomap_base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacks_land_in_their_slots() {
        let mut tss = TaskStateSegment::new(
            VirtualAddress::new(0x10_0000),
            [
                VirtualAddress::new(0x20_0000),
                VirtualAddress::new(0x30_0000),
                VirtualAddress::new(0x40_0000),
            ],
        );
        assert_eq!(tss.rsp0().as_u64(), 0x10_0000);
        assert_eq!(tss.ist(1).map(VirtualAddress::as_u64), Some(0x20_0000));
        assert_eq!(tss.ist(3).map(VirtualAddress::as_u64), Some(0x40_0000));
        assert_eq!(tss.ist(4).map(VirtualAddress::as_u64), Some(0));
        assert_eq!(tss.ist(0), None);
        assert_eq!(tss.iomap_base(), 104);

        tss.set_rsp0(VirtualAddress::new(0x50_0000));
        assert_eq!(tss.rsp0().as_u64(), 0x50_0000);
    }
}
