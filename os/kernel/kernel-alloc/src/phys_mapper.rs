//! # HHDM-based `PhysMapper`
//!
//! With a higher-half direct map, every physical address `pa` is reachable at
//! `hhdm_offset + pa`. The offset is chosen by the loader and handed over in
//! [`KernelBootInfo`](kernel_info::boot::KernelBootInfo).
//!
//! ```rust
//! use kernel_alloc::phys_mapper::HhdmPhysMapper;
//! use kernel_vmem::{PhysMapper, PhysicalAddress};
//!
//! let mapper = HhdmPhysMapper::new(0xffff_8000_0000_0000);
//! let va = mapper.phys_to_virt(PhysicalAddress::new(0xFEE0_0000));
//! assert_eq!(va.as_u64(), 0xffff_8000_fee0_0000);
//! assert_eq!(mapper.virt_to_phys(va), PhysicalAddress::new(0xFEE0_0000));
//! ```

use kernel_vmem::{PhysMapper, PhysicalAddress, VirtualAddress};

/// [`PhysMapper`] for the higher-half direct map.
///
/// # Safety
/// Dereferencing through it is only sound for physical ranges the direct map
/// actually covers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HhdmPhysMapper {
    offset: u64,
}

impl HhdmPhysMapper {
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Inverse of [`PhysMapper::phys_to_virt`] for addresses inside the window.
    #[must_use]
    pub const fn virt_to_phys(&self, va: VirtualAddress) -> PhysicalAddress {
        PhysicalAddress::new(va.as_u64().wrapping_sub(self.offset))
    }
}

impl PhysMapper for HhdmPhysMapper {
    #[inline]
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        VirtualAddress::new(pa.as_u64().wrapping_add(self.offset))
    }
}
